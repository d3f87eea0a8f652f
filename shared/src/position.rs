use serde::{Deserialize, Serialize};

/// Compass facing of a player or a transition cell.
///
/// The grid is row-major with y growing downward, so North is y-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Wire ordinal: North=0, East=1, South=2, West=3.
    pub fn ordinal(self) -> u8 {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }

    pub fn from_ordinal(value: u8) -> Option<Direction> {
        match value {
            0 => Some(Direction::North),
            1 => Some(Direction::East),
            2 => Some(Direction::South),
            3 => Some(Direction::West),
            _ => None,
        }
    }

    pub fn left(self) -> Direction {
        match self {
            Direction::North => Direction::West,
            Direction::West => Direction::South,
            Direction::South => Direction::East,
            Direction::East => Direction::North,
        }
    }

    pub fn right(self) -> Direction {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
        }
    }

    pub fn opposite(self) -> Direction {
        self.left().left()
    }

    /// Unit cell offset for moving one step in this direction.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }
}

/// A direction-relative movement request. Stepping never changes facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Forward,
    Back,
    Left,
    Right,
}

/// A rotation request. Turning never changes (x, y).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Left,
    Right,
}

/// Location of a player within the world: area, cell and facing.
///
/// Immutable value; movement produces a new Position rather than
/// mutating in place. Bounds are validated by the coordinator before a
/// candidate Position is adopted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub area: u32,
    pub x: i32,
    pub y: i32,
    pub facing: Direction,
}

impl Position {
    pub fn new(area: u32, x: i32, y: i32, facing: Direction) -> Self {
        Self { area, x, y, facing }
    }

    /// The absolute direction a step request resolves to given the
    /// current facing.
    pub fn step_direction(&self, step: Step) -> Direction {
        match step {
            Step::Forward => self.facing,
            Step::Back => self.facing.opposite(),
            Step::Left => self.facing.left(),
            Step::Right => self.facing.right(),
        }
    }

    /// Candidate position one cell away in the step's direction,
    /// keeping the current facing.
    pub fn stepped(&self, step: Step) -> Position {
        let (dx, dy) = self.step_direction(step).offset();
        Position {
            area: self.area,
            x: self.x + dx,
            y: self.y + dy,
            facing: self.facing,
        }
    }

    pub fn turned(&self, turn: Turn) -> Position {
        let facing = match turn {
            Turn::Left => self.facing.left(),
            Turn::Right => self.facing.right(),
        };
        Position { facing, ..*self }
    }

    /// The occupancy key: two players may never share a cell.
    pub fn cell(&self) -> (u32, i32, i32) {
        (self.area, self.x, self.y)
    }
}

//! Grid geometry: map elements, containers, locks and areas.
//!
//! A world is a set of areas. Each area is a rectangular grid of
//! `MapElement` cells plus a set of portal cells eligible for player
//! spawn. A locked area is a room: entering it through a transition
//! cell requires the room's lock to be opened first.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::item::Item;
use crate::position::{Direction, Position};

/// Impassable scenery variants, distinguished only for drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObstacleKind {
    Tree,
    Rock,
    RoomWall,
}

/// Container flavors. The flavor fixes the capacity and the map char.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerKind {
    Chest,
    Cupboard,
    ScrapPile,
}

impl ContainerKind {
    pub fn capacity(self) -> usize {
        match self {
            ContainerKind::Chest => crate::CHEST_CAPACITY,
            ContainerKind::Cupboard => crate::CUPBOARD_CAPACITY,
            ContainerKind::ScrapPile => crate::SCRAP_PILE_CAPACITY,
        }
    }
}

/// Key-id plus locked flag shared by rooms and lockable containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    pub key_id: u32,
    pub locked: bool,
}

impl Lock {
    pub fn new(key_id: u32) -> Self {
        Self {
            key_id,
            locked: true,
        }
    }
}

/// Anything that can be locked behind a key: containers and rooms.
/// Both unlock paths in the coordinator funnel through this trait.
pub trait Lockable {
    fn lock(&self) -> Option<&Lock>;
    fn lock_mut(&mut self) -> Option<&mut Lock>;

    fn is_locked(&self) -> bool {
        self.lock().is_some_and(|l| l.locked)
    }
}

/// An ordered, bounded list of loot sitting on a map cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub kind: ContainerKind,
    pub items: Vec<Item>,
    pub lock: Option<Lock>,
}

impl Container {
    pub fn new(kind: ContainerKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
            lock: None,
        }
    }

    pub fn locked_with(kind: ContainerKind, key_id: u32) -> Self {
        Self {
            kind,
            items: Vec::new(),
            lock: Some(Lock::new(key_id)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.kind.capacity()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity()
    }

    /// Removes and returns the first item, front to back.
    pub fn pop_item(&mut self) -> Option<Item> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.remove(0))
        }
    }

    /// Inserts one item, handing it back if the container is full.
    /// Lock state is the caller's concern.
    pub fn push_item(&mut self, item: Item) -> Result<(), Item> {
        if self.is_full() {
            Err(item)
        } else {
            self.items.push(item);
            Ok(())
        }
    }

    /// Unconditional insert used for disconnect key redistribution,
    /// where losing the key would be worse than exceeding capacity.
    pub fn force_item(&mut self, item: Item) {
        self.items.push(item);
    }
}

impl Lockable for Container {
    fn lock(&self) -> Option<&Lock> {
        self.lock.as_ref()
    }

    fn lock_mut(&mut self) -> Option<&mut Lock> {
        self.lock.as_mut()
    }
}

/// A one-way link from this cell to a destination in another area.
/// Using it requires standing on the cell and facing `required`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub required: Direction,
    pub dest: Position,
}

/// Closed variant set for one grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapElement {
    Ground,
    Obstacle(ObstacleKind),
    Transition(Transition),
    Container(Container),
}

impl MapElement {
    /// Whether a player may stand on this cell. Containers are
    /// interacted with from the adjacent cell, never stood on.
    pub fn is_walkable(&self) -> bool {
        matches!(self, MapElement::Ground | MapElement::Transition(_))
    }

    /// Fixed element-to-character table of the map string format.
    pub fn draw_char(&self) -> char {
        match self {
            MapElement::Ground => '.',
            MapElement::Obstacle(ObstacleKind::Tree) => 'T',
            MapElement::Obstacle(ObstacleKind::Rock) => 'R',
            MapElement::Obstacle(ObstacleKind::RoomWall) => '#',
            MapElement::Transition(_) => 'D',
            MapElement::Container(c) => match c.kind {
                ContainerKind::Chest => 'C',
                ContainerKind::Cupboard => 'U',
                ContainerKind::ScrapPile => 'S',
            },
        }
    }

    /// Inverse of `draw_char` for world construction and tests.
    ///
    /// `D` parses as ground: a transition's destination cannot be
    /// carried by one character, so the world builder installs the
    /// real transition afterwards.
    pub fn from_char(c: char) -> Option<MapElement> {
        match c {
            '.' | 'D' => Some(MapElement::Ground),
            'T' => Some(MapElement::Obstacle(ObstacleKind::Tree)),
            'R' => Some(MapElement::Obstacle(ObstacleKind::Rock)),
            '#' => Some(MapElement::Obstacle(ObstacleKind::RoomWall)),
            'C' => Some(MapElement::Container(Container::new(ContainerKind::Chest))),
            'U' => Some(MapElement::Container(Container::new(
                ContainerKind::Cupboard,
            ))),
            'S' => Some(MapElement::Container(Container::new(
                ContainerKind::ScrapPile,
            ))),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapParseError {
    #[error("missing map header line")]
    MissingHeader,
    #[error("malformed map header: {0}")]
    BadHeader(String),
    #[error("expected {expected} rows, found {found}")]
    RowCount { expected: usize, found: usize },
    #[error("row {row} has {found} cells, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("unknown map character '{0}'")]
    UnknownChar(char),
}

/// One rectangular map instance: the open world or a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Area {
    pub id: u32,
    pub width: i32,
    pub height: i32,
    pub description: String,
    grid: Vec<MapElement>,
    portals: Vec<(i32, i32)>,
    pub lock: Option<Lock>,
}

impl Area {
    pub fn new(id: u32, width: i32, height: i32, description: &str) -> Self {
        assert!(width > 0 && height > 0);
        Self {
            id,
            width,
            height,
            description: description.to_string(),
            grid: vec![MapElement::Ground; (width * height) as usize],
            portals: Vec::new(),
            lock: None,
        }
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    pub fn element(&self, x: i32, y: i32) -> Option<&MapElement> {
        if self.in_bounds(x, y) {
            self.grid.get((y * self.width + x) as usize)
        } else {
            None
        }
    }

    pub fn element_mut(&mut self, x: i32, y: i32) -> Option<&mut MapElement> {
        if self.in_bounds(x, y) {
            self.grid.get_mut((y * self.width + x) as usize)
        } else {
            None
        }
    }

    pub fn set_element(&mut self, x: i32, y: i32, element: MapElement) {
        assert!(self.in_bounds(x, y), "cell ({}, {}) out of bounds", x, y);
        self.grid[(y * self.width + x) as usize] = element;
    }

    /// Registers a walkable cell as eligible for player spawn.
    pub fn add_portal(&mut self, x: i32, y: i32) {
        assert!(
            self.element(x, y).is_some_and(MapElement::is_walkable),
            "portal ({}, {}) must be a walkable cell",
            x,
            y
        );
        self.portals.push((x, y));
    }

    pub fn portals(&self) -> &[(i32, i32)] {
        &self.portals
    }

    pub fn containers(&self) -> impl Iterator<Item = (i32, i32, &Container)> {
        self.grid.iter().enumerate().filter_map(|(i, e)| match e {
            MapElement::Container(c) => {
                Some((i as i32 % self.width, i as i32 / self.width, c))
            }
            _ => None,
        })
    }

    /// `areaId,width,height,description` header followed by `height`
    /// rows of `width` map characters.
    pub fn to_map_string(&self) -> String {
        let mut out = format!(
            "{},{},{},{}\n",
            self.id, self.width, self.height, self.description
        );
        for y in 0..self.height {
            for x in 0..self.width {
                out.push(self.element(x, y).expect("in bounds").draw_char());
            }
            out.push('\n');
        }
        out
    }

    pub fn parse(text: &str) -> Result<Area, MapParseError> {
        let mut lines = text.lines();
        let header = lines.next().ok_or(MapParseError::MissingHeader)?;
        let fields: Vec<&str> = header.splitn(4, ',').collect();
        if fields.len() != 4 {
            return Err(MapParseError::BadHeader(header.to_string()));
        }
        let id: u32 = fields[0]
            .parse()
            .map_err(|_| MapParseError::BadHeader(header.to_string()))?;
        let width: i32 = fields[1]
            .parse()
            .map_err(|_| MapParseError::BadHeader(header.to_string()))?;
        let height: i32 = fields[2]
            .parse()
            .map_err(|_| MapParseError::BadHeader(header.to_string()))?;
        if width <= 0 || height <= 0 {
            return Err(MapParseError::BadHeader(header.to_string()));
        }

        let mut area = Area::new(id, width, height, fields[3]);
        let rows: Vec<&str> = lines.collect();
        if rows.len() != height as usize {
            return Err(MapParseError::RowCount {
                expected: height as usize,
                found: rows.len(),
            });
        }
        for (y, row) in rows.iter().enumerate() {
            let cells: Vec<char> = row.chars().collect();
            if cells.len() != width as usize {
                return Err(MapParseError::RowWidth {
                    row: y,
                    expected: width as usize,
                    found: cells.len(),
                });
            }
            for (x, c) in cells.iter().enumerate() {
                let element =
                    MapElement::from_char(*c).ok_or(MapParseError::UnknownChar(*c))?;
                area.set_element(x as i32, y as i32, element);
            }
        }
        Ok(area)
    }
}

impl Lockable for Area {
    fn lock(&self) -> Option<&Lock> {
        self.lock.as_ref()
    }

    fn lock_mut(&mut self) -> Option<&mut Lock> {
        self.lock.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::VirusKind;

    #[test]
    fn test_container_capacity_by_kind() {
        assert_eq!(Container::new(ContainerKind::Chest).capacity(), 5);
        assert_eq!(Container::new(ContainerKind::Cupboard).capacity(), 3);
        assert_eq!(Container::new(ContainerKind::ScrapPile).capacity(), 2);
    }

    #[test]
    fn test_container_push_pop_order() {
        let mut chest = Container::new(ContainerKind::Chest);
        chest.push_item(Item::Key { key_id: 1 }).unwrap();
        chest.push_item(Item::new_torch()).unwrap();

        assert_eq!(chest.pop_item(), Some(Item::Key { key_id: 1 }));
        assert_eq!(chest.pop_item(), Some(Item::new_torch()));
        assert_eq!(chest.pop_item(), None);
    }

    #[test]
    fn test_container_push_full_hands_item_back() {
        let mut pile = Container::new(ContainerKind::ScrapPile);
        pile.push_item(Item::new_torch()).unwrap();
        pile.push_item(Item::new_torch()).unwrap();

        let overflow = Item::Antidote(VirusKind::Plague);
        assert_eq!(pile.push_item(overflow.clone()), Err(overflow));
        assert_eq!(pile.items.len(), 2);
    }

    #[test]
    fn test_lockable_states() {
        let open = Container::new(ContainerKind::Chest);
        assert!(!open.is_locked());

        let mut locked = Container::locked_with(ContainerKind::Chest, 456);
        assert!(locked.is_locked());
        locked.lock_mut().unwrap().locked = false;
        assert!(!locked.is_locked());
    }

    #[test]
    fn test_area_bounds_and_elements() {
        let mut area = Area::new(0, 4, 3, "clearing");
        assert!(area.in_bounds(3, 2));
        assert!(!area.in_bounds(4, 0));
        assert!(!area.in_bounds(0, -1));

        area.set_element(1, 1, MapElement::Obstacle(ObstacleKind::Tree));
        assert!(!area.element(1, 1).unwrap().is_walkable());
        assert!(area.element(0, 0).unwrap().is_walkable());
        assert!(area.element(9, 9).is_none());
    }

    #[test]
    fn test_map_string_render() {
        let mut area = Area::new(2, 3, 2, "tool shed");
        area.set_element(0, 0, MapElement::Obstacle(ObstacleKind::RoomWall));
        area.set_element(2, 1, MapElement::Container(Container::new(ContainerKind::Cupboard)));

        assert_eq!(area.to_map_string(), "2,3,2,tool shed\n#..\n..U\n");
    }

    #[test]
    fn test_map_string_parse() {
        let area = Area::parse("7,4,2,orchard\nT..C\n.RS.\n").unwrap();
        assert_eq!(area.id, 7);
        assert_eq!((area.width, area.height), (4, 2));
        assert_eq!(area.description, "orchard");
        assert_eq!(
            area.element(0, 0),
            Some(&MapElement::Obstacle(ObstacleKind::Tree))
        );
        assert!(matches!(
            area.element(3, 0),
            Some(MapElement::Container(c)) if c.kind == ContainerKind::Chest
        ));
        assert!(matches!(
            area.element(2, 1),
            Some(MapElement::Container(c)) if c.kind == ContainerKind::ScrapPile
        ));
    }

    #[test]
    fn test_map_string_parse_rejects_bad_input() {
        assert!(matches!(Area::parse(""), Err(MapParseError::MissingHeader)));
        assert!(matches!(
            Area::parse("0,2,2,x\n..\n.?\n"),
            Err(MapParseError::UnknownChar('?'))
        ));
        assert!(matches!(
            Area::parse("0,2,2,x\n..\n"),
            Err(MapParseError::RowCount { .. })
        ));
        assert!(matches!(
            Area::parse("0,2,1,x\n...\n"),
            Err(MapParseError::RowWidth { .. })
        ));
    }

    #[test]
    fn test_parse_description_may_contain_commas() {
        let area = Area::parse("1,2,1,shed, mostly empty\n..\n").unwrap();
        assert_eq!(area.description, "shed, mostly empty");
    }

    #[test]
    fn test_portal_registration() {
        let mut area = Area::new(0, 3, 3, "field");
        area.add_portal(1, 1);
        assert_eq!(area.portals(), &[(1, 1)]);
    }

    #[test]
    #[should_panic]
    fn test_portal_on_obstacle_panics() {
        let mut area = Area::new(0, 3, 3, "field");
        area.set_element(0, 0, MapElement::Obstacle(ObstacleKind::Rock));
        area.add_portal(0, 0);
    }
}

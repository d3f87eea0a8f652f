//! The default world: an open forest clearing plus two lockable rooms.
//!
//! Base geometry comes from literal map strings; transitions, room
//! locks, spawn portals and loot are wired in afterwards since one map
//! character cannot carry a destination or an item list.

use shared::{Area, Direction, Item, Lock, MapElement, Position, Transition, VirusKind};

use crate::game::Game;

const CLEARING: &str = "\
0,16,12,the forest clearing
TTTTTTTTTTTTTTTT
T......R.......T
T..C...........T
T......T....S..T
T.....T........T
T..D...........T
T........R.....T
T...S..........T
T......U.......T
T.....R....D...T
T..............T
TTTTTTTTTTTTTTTT
";

const CABIN: &str = "\
1,5,4,the ranger cabin
#####
#U..#
#...#
##D##
";

const CELLAR: &str = "\
2,6,4,the storage cellar
######
#..C.#
#....#
##D###
";

const CABIN_KEY: u32 = 101;
const CELLAR_KEY: u32 = 202;
const CLEARING_CHEST_KEY: u32 = 456;
const CELLAR_CHEST_KEY: u32 = 303;

fn stock(area: &mut Area, x: i32, y: i32, lock: Option<u32>, items: Vec<Item>) {
    match area.element_mut(x, y) {
        Some(MapElement::Container(container)) => {
            if let Some(key_id) = lock {
                container.lock = Some(Lock::new(key_id));
            }
            for item in items {
                container
                    .push_item(item)
                    .unwrap_or_else(|item| panic!("container at ({x}, {y}) overfilled: {item:?}"));
            }
        }
        other => panic!("expected a container at ({x}, {y}), found {other:?}"),
    }
}

fn door(area: &mut Area, x: i32, y: i32, required: Direction, dest: Position) {
    area.set_element(x, y, MapElement::Transition(Transition { required, dest }));
}

/// Builds the three areas with locks, doors, portals and loot. Every
/// lock has a reachable key and every virus an antidote somewhere.
pub fn build_areas() -> Vec<Area> {
    let mut clearing = Area::parse(CLEARING).expect("clearing map parses");
    let mut cabin = Area::parse(CABIN).expect("cabin map parses");
    let mut cellar = Area::parse(CELLAR).expect("cellar map parses");

    cabin.lock = Some(Lock::new(CABIN_KEY));
    cellar.lock = Some(Lock::new(CELLAR_KEY));

    // Doors into the rooms and back out again.
    door(
        &mut clearing,
        3,
        5,
        Direction::North,
        Position::new(1, 2, 2, Direction::North),
    );
    door(
        &mut cabin,
        2,
        3,
        Direction::South,
        Position::new(0, 3, 6, Direction::South),
    );
    door(
        &mut clearing,
        11,
        9,
        Direction::North,
        Position::new(2, 2, 2, Direction::North),
    );
    door(
        &mut cellar,
        2,
        3,
        Direction::South,
        Position::new(0, 11, 10, Direction::South),
    );

    for (x, y) in [(1, 1), (14, 1), (1, 10), (14, 10)] {
        clearing.add_portal(x, y);
    }

    // Loot. The scrap piles in the open seed the key chains.
    stock(
        &mut clearing,
        12,
        3,
        None,
        vec![Item::Key { key_id: CABIN_KEY }, Item::new_torch()],
    );
    stock(
        &mut clearing,
        4,
        7,
        None,
        vec![
            Item::Key {
                key_id: CLEARING_CHEST_KEY,
            },
            Item::new_torch(),
        ],
    );
    stock(
        &mut clearing,
        3,
        2,
        Some(CLEARING_CHEST_KEY),
        vec![
            Item::Key {
                key_id: CELLAR_KEY,
            },
            Item::Antidote(VirusKind::Cholera),
            Item::Bag(VirusKind::Malaria),
        ],
    );
    stock(
        &mut clearing,
        7,
        8,
        None,
        vec![
            Item::new_torch(),
            Item::Bag(VirusKind::Typhoid),
            Item::Antidote(VirusKind::Plague),
        ],
    );
    stock(
        &mut cabin,
        1,
        1,
        None,
        vec![
            Item::Key {
                key_id: CELLAR_CHEST_KEY,
            },
            Item::Antidote(VirusKind::Malaria),
            Item::new_torch(),
        ],
    );
    stock(
        &mut cellar,
        3,
        1,
        Some(CELLAR_CHEST_KEY),
        vec![
            Item::Antidote(VirusKind::Typhoid),
            Item::Antidote(VirusKind::Plague),
            Item::Bag(VirusKind::Cholera),
        ],
    );

    vec![clearing, cabin, cellar]
}

pub fn default_world(starting_health: i32) -> Game {
    Game::new(build_areas(), starting_health)
}

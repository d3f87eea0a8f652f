use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use shared::{Item, Position, VirusKind, INVENTORY_CAPACITY};

/// Server-side state of one connected player.
///
/// Health is decremented by the world clock; crossing zero is terminal.
/// A dead player stays registered and visible until their connection
/// handler deregisters them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub avatar: u8,
    pub virus: VirusKind,
    pub health: i32,
    pub alive: bool,
    pub won: bool,
    pub inventory: Vec<Item>,
    pub position: Position,
    #[serde(skip)]
    chat: VecDeque<String>,
    #[serde(skip)]
    notices: VecDeque<String>,
}

impl Player {
    pub fn new(
        id: u32,
        name: String,
        avatar: u8,
        virus: VirusKind,
        health: i32,
        position: Position,
    ) -> Self {
        Self {
            id,
            name,
            avatar,
            virus,
            health,
            alive: true,
            won: false,
            inventory: Vec::new(),
            position,
            chat: VecDeque::new(),
            notices: VecDeque::new(),
        }
    }

    pub fn free_slots(&self) -> usize {
        INVENTORY_CAPACITY.saturating_sub(self.inventory.len())
    }

    pub fn has_lit_torch(&self) -> bool {
        self.inventory
            .iter()
            .any(|item| matches!(item, Item::Torch { lit: true, .. }))
    }

    /// Snapshot status word.
    pub fn status(&self) -> &'static str {
        if self.won {
            "won"
        } else if self.alive {
            "playing"
        } else {
            "lost"
        }
    }

    pub fn push_chat(&mut self, line: String) {
        self.chat.push_back(line);
    }

    /// One chat line per tick, oldest first.
    pub fn pop_chat(&mut self) -> Option<String> {
        self.chat.pop_front()
    }

    pub fn push_notice(&mut self, line: String) {
        self.notices.push_back(line);
    }

    pub fn pop_notice(&mut self) -> Option<String> {
        self.notices.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Direction;

    fn test_player() -> Player {
        Player::new(
            1,
            "ida".to_string(),
            0,
            VirusKind::Malaria,
            100,
            Position::new(0, 1, 1, Direction::North),
        )
    }

    #[test]
    fn test_free_slots_track_inventory() {
        let mut player = test_player();
        assert_eq!(player.free_slots(), INVENTORY_CAPACITY);
        player.inventory.push(Item::new_torch());
        assert_eq!(player.free_slots(), INVENTORY_CAPACITY - 1);
    }

    #[test]
    fn test_lit_torch_detection() {
        let mut player = test_player();
        player.inventory.push(Item::new_torch());
        assert!(!player.has_lit_torch());

        player.inventory.push(Item::Torch {
            remaining: 5,
            lit: true,
        });
        assert!(player.has_lit_torch());
    }

    #[test]
    fn test_status_words() {
        let mut player = test_player();
        assert_eq!(player.status(), "playing");
        player.won = true;
        assert_eq!(player.status(), "won");
        player.won = false;
        player.alive = false;
        assert_eq!(player.status(), "lost");
    }

    #[test]
    fn test_queues_drain_in_order() {
        let mut player = test_player();
        player.push_chat("a: one".to_string());
        player.push_chat("b: two".to_string());
        assert_eq!(player.pop_chat().as_deref(), Some("a: one"));
        assert_eq!(player.pop_chat().as_deref(), Some("b: two"));
        assert_eq!(player.pop_chat(), None);
    }
}

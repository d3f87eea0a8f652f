//! Per-tick broadcast string.
//!
//! Newline-delimited so the client can parse each field independently:
//! simulated time, own health, own visibility radius, the roster of
//! all player positions, own inventory, per-player torch-lit flags,
//! per-player alive flags, the status word, then optional `M` (chat)
//! and `N` (notification) lines. The optional lines drain at most one
//! queued entry each per tick.

use crate::error::GameError;
use crate::game::Game;

impl Game {
    pub fn snapshot_for(&mut self, id: u32) -> Result<String, GameError> {
        let time = self.clock().display();
        let visibility = self.visibility(id)?;
        let health = self.player(id)?.health;
        let status = self.player(id)?.status();

        let players = self.players_sorted();
        let roster = players
            .iter()
            .map(|p| {
                format!(
                    "{},{},{},{},{}",
                    p.id,
                    p.position.area,
                    p.position.x,
                    p.position.y,
                    p.position.facing.ordinal()
                )
            })
            .collect::<Vec<_>>()
            .join("|");
        let torches = players
            .iter()
            .map(|p| if p.has_lit_torch() { "1" } else { "0" })
            .collect::<Vec<_>>()
            .join("|");
        let alive = players
            .iter()
            .map(|p| if p.alive { "1" } else { "0" })
            .collect::<Vec<_>>()
            .join("|");
        let inventory = self
            .player(id)?
            .inventory
            .iter()
            .map(|item| format!("{}@{}", item.type_char(), item.describe()))
            .collect::<Vec<_>>()
            .join("|");

        let mut out = format!(
            "{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}",
            time, health, visibility, roster, inventory, torches, alive, status
        );

        let player = self.player_mut(id)?;
        if let Some(chat) = player.pop_chat() {
            out.push_str("\nM");
            out.push_str(&chat);
        }
        if let Some(notice) = player.pop_notice() {
            out.push_str("\nN");
            out.push_str(&notice);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use crate::world::default_world;
    use shared::{Direction, Item, Position, VirusKind};

    #[test]
    fn test_snapshot_field_order() {
        let mut game = default_world(100);
        let id = game.add_player("ida".to_string(), 0).unwrap();
        game.player_mut(id).unwrap().position = Position::new(0, 5, 10, Direction::East);
        game.player_mut(id)
            .unwrap()
            .inventory
            .push(Item::Key { key_id: 456 });

        let snapshot = game.snapshot_for(id).unwrap();
        let lines: Vec<&str> = snapshot.lines().collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "06:00:00");
        assert_eq!(lines[1], "100");
        assert_eq!(lines[2], "5");
        assert_eq!(lines[3], format!("{},0,5,10,1", id));
        assert_eq!(lines[4], "K@key 456");
        assert_eq!(lines[5], "0");
        assert_eq!(lines[6], "1");
        assert_eq!(lines[7], "playing");
    }

    #[test]
    fn test_snapshot_multiple_players_sorted_by_id() {
        let mut game = default_world(50);
        let a = game.add_player("ida".to_string(), 0).unwrap();
        let b = game.add_player("bo".to_string(), 1).unwrap();

        let snapshot = game.snapshot_for(a).unwrap();
        let roster = snapshot.lines().nth(3).unwrap();
        let entries: Vec<&str> = roster.split('|').collect();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].starts_with(&format!("{},", a)));
        assert!(entries[1].starts_with(&format!("{},", b)));

        let alive = snapshot.lines().nth(6).unwrap();
        assert_eq!(alive, "1|1");
    }

    #[test]
    fn test_snapshot_empty_inventory_line_present() {
        let mut game = default_world(100);
        let id = game.add_player("ida".to_string(), 0).unwrap();
        let snapshot = game.snapshot_for(id).unwrap();
        assert_eq!(snapshot.lines().nth(4).unwrap(), "");
    }

    #[test]
    fn test_snapshot_drains_one_chat_and_notice_per_tick() {
        let mut game = default_world(100);
        let id = game.add_player("ida".to_string(), 0).unwrap();
        game.push_chat(id, "one").unwrap();
        game.push_chat(id, "two").unwrap();
        game.notify(id, "it is locked").unwrap();

        let first = game.snapshot_for(id).unwrap();
        let lines: Vec<&str> = first.lines().collect();
        assert_eq!(lines[8], "Mida: one");
        assert_eq!(lines[9], "Nit is locked");

        let second = game.snapshot_for(id).unwrap();
        let lines: Vec<&str> = second.lines().collect();
        assert_eq!(lines.len(), 9);
        assert_eq!(lines[8], "Mida: two");

        let third = game.snapshot_for(id).unwrap();
        assert_eq!(third.lines().count(), 8);
    }

    #[test]
    fn test_snapshot_reflects_death_and_win() {
        let mut game = default_world(3);
        let a = game.add_player("ida".to_string(), 0).unwrap();
        let b = game.add_player("bo".to_string(), 1).unwrap();

        let virus = game.player(b).unwrap().virus;
        game.player_mut(b)
            .unwrap()
            .inventory
            .push(shared::Item::Antidote(virus));
        assert!(game.use_item(b, 0).unwrap());

        game.tick(5);
        let snapshot = game.snapshot_for(a).unwrap();
        let lines: Vec<&str> = snapshot.lines().collect();
        assert_eq!(lines[1], "0");
        assert_eq!(lines[6], "0|0");
        assert_eq!(lines[7], "lost");

        let snapshot = game.snapshot_for(b).unwrap();
        assert_eq!(snapshot.lines().nth(7).unwrap(), "won");
    }

    #[test]
    fn test_snapshot_unknown_player_is_error() {
        let mut game = default_world(100);
        assert!(game.snapshot_for(9).is_err());
    }

    #[test]
    fn test_inventory_tokens_join_with_pipes() {
        let mut game = default_world(100);
        let id = game.add_player("ida".to_string(), 0).unwrap();
        let player = game.player_mut(id).unwrap();
        player.inventory.push(Item::new_torch());
        player.inventory.push(Item::Antidote(VirusKind::Plague));

        let snapshot = game.snapshot_for(id).unwrap();
        assert_eq!(
            snapshot.lines().nth(4).unwrap(),
            "T@torch|A@plague antidote"
        );
    }
}

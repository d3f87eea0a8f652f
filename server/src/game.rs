//! The authoritative world coordinator.
//!
//! Owns every area, every player and the world clock. All player
//! actions funnel through here and are validated against the spatial
//! and inventory invariants before anything mutates. Rejected actions
//! are ordinary `false` results; only broken invariants (unknown ids,
//! no spawn cell) surface as [`GameError`].

use std::collections::HashMap;

use log::{debug, info};
use rand::seq::SliceRandom;
use serde::Serialize;
use shared::{Area, Item, Lockable, MapElement, Position, Step, Turn, ALL_VIRUSES, AVATARS};

use crate::clock::WorldClock;
use crate::error::GameError;
use crate::player::Player;

/// Shared unlock routine: room doors and containers both end up here.
///
/// A target without a lock cannot be unlocked. An already-open lock is
/// a no-op success that consumes nothing. Flipping locked to unlocked
/// consumes exactly one matching key from the inventory.
fn try_unlock(target: &mut dyn Lockable, inventory: &mut Vec<Item>) -> bool {
    let Some(lock) = target.lock_mut() else {
        return false;
    };
    if !lock.locked {
        return true;
    }
    let wanted = lock.key_id;
    let matching = inventory
        .iter()
        .position(|item| matches!(item, Item::Key { key_id } if *key_id == wanted));
    match matching {
        Some(index) => {
            inventory.remove(index);
            lock.locked = false;
            true
        }
        None => false,
    }
}

#[derive(Serialize)]
struct SaveGame<'a> {
    clock_seconds: u64,
    areas: Vec<&'a Area>,
    players: Vec<&'a Player>,
}

pub struct Game {
    areas: HashMap<u32, Area>,
    players: HashMap<u32, Player>,
    /// Every container cell in the world, scanned once at construction.
    /// Disconnect key redistribution draws from this list.
    containers: Vec<(u32, i32, i32)>,
    clock: WorldClock,
    next_player_id: u32,
    starting_health: i32,
}

impl Game {
    pub fn new(areas: Vec<Area>, starting_health: i32) -> Self {
        let mut containers = Vec::new();
        for area in &areas {
            for (x, y, _) in area.containers() {
                containers.push((area.id, x, y));
            }
        }
        Self {
            areas: areas.into_iter().map(|a| (a.id, a)).collect(),
            players: HashMap::new(),
            containers,
            clock: WorldClock::new(),
            next_player_id: 1,
            starting_health,
        }
    }

    pub fn clock(&self) -> &WorldClock {
        &self.clock
    }

    pub fn player(&self, id: u32) -> Result<&Player, GameError> {
        self.players.get(&id).ok_or(GameError::UnknownPlayer(id))
    }

    pub(crate) fn player_mut(&mut self, id: u32) -> Result<&mut Player, GameError> {
        self.players
            .get_mut(&id)
            .ok_or(GameError::UnknownPlayer(id))
    }

    /// All players sorted by id, the order every pipe-delimited
    /// snapshot list uses.
    pub fn players_sorted(&self) -> Vec<&Player> {
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by_key(|p| p.id);
        players
    }

    /// Map strings of every area, sorted by area id, for the handshake.
    pub fn area_map_strings(&self) -> Vec<String> {
        let mut areas: Vec<&Area> = self.areas.values().collect();
        areas.sort_by_key(|a| a.id);
        areas.iter().map(|a| a.to_map_string()).collect()
    }

    fn cell_occupied(&self, cell: (u32, i32, i32), except: u32) -> bool {
        self.players
            .values()
            .any(|p| p.id != except && p.position.cell() == cell)
    }

    /// Hands out the next player id. The handshake sends the id to the
    /// client before the client's name and avatar arrive, so the id is
    /// reserved first and the player registered under it afterwards.
    pub fn reserve_id(&mut self) -> u32 {
        let id = self.next_player_id;
        self.next_player_id += 1;
        id
    }

    /// Registers a new player on a random free portal cell.
    pub fn add_player(&mut self, name: String, avatar: u8) -> Result<u32, GameError> {
        let id = self.reserve_id();
        self.register_player(id, name, avatar)?;
        Ok(id)
    }

    /// Places a player with a previously reserved id into the world.
    /// Out-of-range avatar picks wrap around the roster.
    pub fn register_player(&mut self, id: u32, name: String, avatar: u8) -> Result<(), GameError> {
        let avatar = avatar % AVATARS.len() as u8;
        let mut free_cells: Vec<Position> = Vec::new();
        for area in self.areas.values() {
            for &(x, y) in area.portals() {
                let pos = Position::new(area.id, x, y, shared::Direction::North);
                if !self.cell_occupied(pos.cell(), 0) {
                    free_cells.push(pos);
                }
            }
        }
        let mut rng = rand::thread_rng();
        let position = *free_cells.choose(&mut rng).ok_or(GameError::NoFreeSpawn)?;
        let virus = *ALL_VIRUSES.choose(&mut rng).expect("non-empty");

        info!(
            "player {} ({}) joined at area {} ({}, {}) with {}",
            id,
            name,
            position.area,
            position.x,
            position.y,
            virus.name()
        );
        self.players.insert(
            id,
            Player::new(id, name, avatar, virus, self.starting_health, position),
        );
        Ok(())
    }

    /// Deregisters a player. Any keys they carried are redistributed to
    /// random containers so no lock becomes permanently unopenable.
    pub fn remove_player(&mut self, id: u32) -> Result<(), GameError> {
        let player = self
            .players
            .remove(&id)
            .ok_or(GameError::UnknownPlayer(id))?;
        let mut keys = 0;
        for item in player.inventory {
            if let Item::Key { .. } = item {
                self.redistribute_key(item);
                keys += 1;
            }
        }
        info!(
            "player {} ({}) left, {} key(s) redistributed",
            id, player.name, keys
        );
        Ok(())
    }

    fn redistribute_key(&mut self, key: Item) {
        let mut rng = rand::thread_rng();
        let with_space: Vec<(u32, i32, i32)> = self
            .containers
            .iter()
            .copied()
            .filter(|&(area, x, y)| {
                matches!(
                    self.areas.get(&area).and_then(|a| a.element(x, y)),
                    Some(MapElement::Container(c)) if !c.is_full()
                )
            })
            .collect();
        let target = with_space
            .choose(&mut rng)
            .or_else(|| self.containers.choose(&mut rng))
            .copied();
        if let Some((area, x, y)) = target {
            if let Some(MapElement::Container(container)) =
                self.areas.get_mut(&area).and_then(|a| a.element_mut(x, y))
            {
                debug!("key dropped into container at area {} ({}, {})", area, x, y);
                container.force_item(key);
            }
        }
        // A world without containers simply loses the key; the default
        // world always has several.
    }

    /// One step in a direction relative to the current facing. Silent
    /// no-op returning false when blocked.
    pub fn move_player(&mut self, id: u32, step: Step) -> Result<bool, GameError> {
        let player = self.player(id)?;
        if !player.alive {
            return Ok(false);
        }
        let candidate = player.position.stepped(step);
        let walkable = self
            .areas
            .get(&candidate.area)
            .and_then(|a| a.element(candidate.x, candidate.y))
            .is_some_and(MapElement::is_walkable);
        if !walkable || self.cell_occupied(candidate.cell(), id) {
            return Ok(false);
        }
        self.player_mut(id)?.position = candidate;
        Ok(true)
    }

    /// Rotates facing only. Never changes the cell and never triggers
    /// the transition the player may be standing on.
    pub fn turn_player(&mut self, id: u32, turn: Turn) -> Result<bool, GameError> {
        let player = self.player_mut(id)?;
        if !player.alive {
            return Ok(false);
        }
        player.position = player.position.turned(turn);
        Ok(true)
    }

    /// Uses the transition cell under the player's feet. Succeeds only
    /// when facing matches, the destination area is unlocked and the
    /// destination cell is free; then the position is replaced
    /// wholesale with the destination.
    pub fn transit(&mut self, id: u32) -> Result<bool, GameError> {
        let player = self.player(id)?;
        if !player.alive {
            return Ok(false);
        }
        let position = player.position;
        let transition = match self
            .areas
            .get(&position.area)
            .and_then(|a| a.element(position.x, position.y))
        {
            Some(MapElement::Transition(t)) => *t,
            _ => return Ok(false),
        };
        if position.facing != transition.required {
            return Ok(false);
        }
        let dest = transition.dest;
        let dest_area = match self.areas.get(&dest.area) {
            Some(area) => area,
            None => return Ok(false),
        };
        if dest_area.is_locked()
            || !dest_area
                .element(dest.x, dest.y)
                .is_some_and(MapElement::is_walkable)
            || self.cell_occupied(dest.cell(), id)
        {
            return Ok(false);
        }
        self.player_mut(id)?.position = dest;
        Ok(true)
    }

    /// Unlocks either the container the player faces or the room linked
    /// by the transition cell the player stands on.
    pub fn unlock(&mut self, id: u32) -> Result<bool, GameError> {
        let player = self.player(id)?;
        if !player.alive {
            return Ok(false);
        }
        let position = player.position;
        let (dx, dy) = position.facing.offset();
        let faced = (position.x + dx, position.y + dy);

        // Standing in front of a container.
        let faced_is_container = matches!(
            self.areas
                .get(&position.area)
                .and_then(|a| a.element(faced.0, faced.1)),
            Some(MapElement::Container(_))
        );
        if faced_is_container {
            let player = self.players.get_mut(&id).expect("checked above");
            let area = self.areas.get_mut(&position.area).expect("player in area");
            if let Some(MapElement::Container(container)) = area.element_mut(faced.0, faced.1) {
                return Ok(try_unlock(container, &mut player.inventory));
            }
            return Ok(false);
        }

        // Standing on a transition cell, facing the linked room.
        let room = match self
            .areas
            .get(&position.area)
            .and_then(|a| a.element(position.x, position.y))
        {
            Some(MapElement::Transition(t)) if t.required == position.facing => t.dest.area,
            _ => return Ok(false),
        };
        let player = self.players.get_mut(&id).expect("checked above");
        match self.areas.get_mut(&room) {
            Some(area) => Ok(try_unlock(area, &mut player.inventory)),
            None => Ok(false),
        }
    }

    /// Moves items from the faced container into the inventory, one at
    /// a time, until either side is exhausted. False when the container
    /// is locked or nothing moved.
    pub fn take_items(&mut self, id: u32) -> Result<bool, GameError> {
        let player = self.player(id)?;
        if !player.alive {
            return Ok(false);
        }
        let position = player.position;
        let (dx, dy) = position.facing.offset();

        let player = self.players.get_mut(&id).expect("checked above");
        let container = match self
            .areas
            .get_mut(&position.area)
            .and_then(|a| a.element_mut(position.x + dx, position.y + dy))
        {
            Some(MapElement::Container(c)) => c,
            _ => return Ok(false),
        };
        if container.is_locked() {
            player.push_notice("it is locked".to_string());
            return Ok(false);
        }
        let mut moved = 0;
        while player.free_slots() > 0 {
            match container.pop_item() {
                Some(item) => {
                    player.inventory.push(item);
                    moved += 1;
                }
                None => break,
            }
        }
        Ok(moved > 0)
    }

    /// Puts one inventory item into the faced container. False when the
    /// index is bad, the container is locked, or it is full.
    pub fn put_item(&mut self, id: u32, index: usize) -> Result<bool, GameError> {
        let player = self.player(id)?;
        if !player.alive || index >= player.inventory.len() {
            return Ok(false);
        }
        let position = player.position;
        let (dx, dy) = position.facing.offset();

        let player = self.players.get_mut(&id).expect("checked above");
        let container = match self
            .areas
            .get_mut(&position.area)
            .and_then(|a| a.element_mut(position.x + dx, position.y + dy))
        {
            Some(MapElement::Container(c)) => c,
            _ => return Ok(false),
        };
        if container.is_locked() || container.is_full() {
            return Ok(false);
        }
        let item = player.inventory.remove(index);
        container.push_item(item).expect("capacity checked above");
        Ok(true)
    }

    /// Applies an inventory item to its owner.
    pub fn use_item(&mut self, id: u32, index: usize) -> Result<bool, GameError> {
        let player = self.player_mut(id)?;
        if !player.alive || index >= player.inventory.len() {
            return Ok(false);
        }
        let own_virus = player.virus;
        let has_lit = player.has_lit_torch();
        match &mut player.inventory[index] {
            Item::Antidote(virus) => {
                if *virus == own_virus {
                    player.inventory.remove(index);
                    player.won = true;
                    player.push_notice("the antidote takes: you are cured".to_string());
                    info!("player {} cured themselves and won", id);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Item::Torch { lit: lit @ true, .. } => {
                *lit = false;
                Ok(true)
            }
            Item::Torch { remaining, lit } => {
                if *remaining == 0 || has_lit {
                    Ok(false)
                } else {
                    *lit = true;
                    Ok(true)
                }
            }
            Item::Bag(virus) => {
                let antidote = Item::Antidote(*virus);
                player.inventory[index] = antidote;
                player.push_notice("the bag held an antidote".to_string());
                Ok(true)
            }
            Item::Key { .. } => Ok(false),
        }
    }

    /// Destroys an inventory item. Keys are never destroyable.
    pub fn destroy_item(&mut self, id: u32, index: usize) -> Result<bool, GameError> {
        let player = self.player_mut(id)?;
        if !player.alive || index >= player.inventory.len() {
            return Ok(false);
        }
        if !player.inventory[index].is_destroyable() {
            return Ok(false);
        }
        player.inventory.remove(index);
        Ok(true)
    }

    /// Fans a chat line out to every player, the sender included.
    pub fn push_chat(&mut self, id: u32, text: &str) -> Result<(), GameError> {
        let line = format!("{}: {}", self.player(id)?.name, text);
        debug!("chat {}", line);
        for player in self.players.values_mut() {
            player.push_chat(line.clone());
        }
        Ok(())
    }

    /// Delivers a notification line to one player.
    pub fn notify(&mut self, id: u32, text: &str) -> Result<(), GameError> {
        self.player_mut(id)?.push_notice(text.to_string());
        Ok(())
    }

    /// One decay tick of `k` simulated seconds: the clock advances,
    /// every living player loses `k` health, every lit torch burns
    /// down. Death flips `alive` exactly once.
    pub fn tick(&mut self, k: u64) {
        self.clock.advance(k);
        for player in self.players.values_mut() {
            if player.alive {
                player.health -= k as i32;
                if player.health <= 0 {
                    player.health = 0;
                    player.alive = false;
                    player.push_notice("your strength gives out".to_string());
                    info!("player {} ({}) died", player.id, player.name);
                }
            }
            for item in &mut player.inventory {
                if let Item::Torch {
                    remaining,
                    lit: lit @ true,
                } = item
                {
                    *remaining = remaining.saturating_sub(k as u32);
                    if *remaining == 0 {
                        *lit = false;
                    }
                }
            }
        }
    }

    /// Visibility radius for one player under the current clock.
    pub fn visibility(&self, id: u32) -> Result<u32, GameError> {
        let player = self.player(id)?;
        Ok(if self.clock.is_day() {
            shared::VISIBILITY_DAY
        } else if player.has_lit_torch() {
            shared::VISIBILITY_NIGHT_TORCH
        } else {
            shared::VISIBILITY_NIGHT
        })
    }

    /// Serialized world + player snapshot for the external save layer.
    pub fn save_string(&self) -> String {
        let mut areas: Vec<&Area> = self.areas.values().collect();
        areas.sort_by_key(|a| a.id);
        let save = SaveGame {
            clock_seconds: self.clock.seconds(),
            areas,
            players: self.players_sorted(),
        };
        serde_json::to_string(&save).expect("save state serializes")
    }

    #[cfg(test)]
    pub(crate) fn area_mut(&mut self, id: u32) -> &mut Area {
        self.areas.get_mut(&id).expect("test area exists")
    }

    #[cfg(test)]
    pub(crate) fn total_key_count(&self) -> usize {
        let in_containers: usize = self
            .areas
            .values()
            .flat_map(|a| a.containers())
            .map(|(_, _, c)| {
                c.items
                    .iter()
                    .filter(|i| matches!(i, Item::Key { .. }))
                    .count()
            })
            .sum();
        let held: usize = self
            .players
            .values()
            .map(|p| {
                p.inventory
                    .iter()
                    .filter(|i| matches!(i, Item::Key { .. }))
                    .count()
            })
            .sum();
        in_containers + held
    }
}

use serde::{Deserialize, Serialize};

use crate::TORCH_BURN_SECONDS;

/// The afflictions a player can spawn with. Curing your own virus with
/// a matching antidote wins the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VirusKind {
    Cholera,
    Malaria,
    Typhoid,
    Plague,
}

pub const ALL_VIRUSES: [VirusKind; 4] = [
    VirusKind::Cholera,
    VirusKind::Malaria,
    VirusKind::Typhoid,
    VirusKind::Plague,
];

impl VirusKind {
    pub fn ordinal(self) -> u32 {
        match self {
            VirusKind::Cholera => 0,
            VirusKind::Malaria => 1,
            VirusKind::Typhoid => 2,
            VirusKind::Plague => 3,
        }
    }

    pub fn from_ordinal(value: u32) -> Option<VirusKind> {
        ALL_VIRUSES.get(value as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            VirusKind::Cholera => "cholera",
            VirusKind::Malaria => "malaria",
            VirusKind::Typhoid => "typhoid",
            VirusKind::Plague => "plague",
        }
    }
}

/// Everything that can sit in an inventory or a container.
///
/// Destroyable and Tradable are capability queries on the variant, not
/// separate type hierarchies. Keys are deliberately not destroyable so
/// a lock can never become permanently unopenable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Item {
    Antidote(VirusKind),
    Key { key_id: u32 },
    Torch { remaining: u32, lit: bool },
    Bag(VirusKind),
}

impl Item {
    pub fn new_torch() -> Item {
        Item::Torch {
            remaining: TORCH_BURN_SECONDS,
            lit: false,
        }
    }

    pub fn is_destroyable(&self) -> bool {
        !matches!(self, Item::Key { .. })
    }

    pub fn is_tradable(&self) -> bool {
        true
    }

    /// Single-character type tag used in snapshot inventory tokens.
    pub fn type_char(&self) -> char {
        match self {
            Item::Antidote(_) => 'A',
            Item::Key { .. } => 'K',
            Item::Torch { .. } => 'T',
            Item::Bag(_) => 'B',
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Item::Antidote(virus) => format!("{} antidote", virus.name()),
            Item::Key { key_id } => format!("key {}", key_id),
            Item::Torch { lit: true, .. } => "torch (lit)".to_string(),
            Item::Torch { lit: false, .. } => "torch".to_string(),
            Item::Bag(_) => "sealed bag".to_string(),
        }
    }
}

//! Gameplay events that feed the mood score.
//!
//! The game publishes [`EventKind`]s on some [`EventBus`]; the intensity tracker
//! subscribes once and turns each kind into a score delta through an
//! [`EventIntensityTable`].

use std::collections::{BTreeMap, HashMap};

use log::warn;
use serde::Deserialize;

/// Closed set of gameplay events the soundtrack reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PlayerShoot,
    PlayerHit,
    EnemyKillStd,
    EnemyKillSpecial,
    ProjectileCollision,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::PlayerShoot,
        EventKind::PlayerHit,
        EventKind::EnemyKillStd,
        EventKind::EnemyKillSpecial,
        EventKind::ProjectileCollision,
    ];

    /// Parse the config-file spelling of an event (case-insensitive, `-` or `_`).
    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "player_shoot" => Some(EventKind::PlayerShoot),
            "player_hit" => Some(EventKind::PlayerHit),
            "enemy_kill_std" | "enemy_kill" => Some(EventKind::EnemyKillStd),
            "enemy_kill_special" => Some(EventKind::EnemyKillSpecial),
            "projectile_collision" => Some(EventKind::ProjectileCollision),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::PlayerShoot => "player_shoot",
            EventKind::PlayerHit => "player_hit",
            EventKind::EnemyKillStd => "enemy_kill_std",
            EventKind::EnemyKillSpecial => "enemy_kill_special",
            EventKind::ProjectileCollision => "projectile_collision",
        }
    }
}

/// Immutable event → delta mapping. Kinds without an entry contribute nothing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "BTreeMap<String, u32>")]
pub struct EventIntensityTable {
    deltas: HashMap<EventKind, u32>,
}

impl EventIntensityTable {
    pub fn empty() -> Self {
        Self { deltas: HashMap::new() }
    }

    /// Builder-style insert. Zero deltas are ignored so every stored entry is positive.
    pub fn with(mut self, kind: EventKind, delta: u32) -> Self {
        if delta > 0 {
            self.deltas.insert(kind, delta);
        }
        self
    }

    pub fn delta(&self, kind: EventKind) -> Option<u32> {
        self.deltas.get(&kind).copied()
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }
}

impl Default for EventIntensityTable {
    fn default() -> Self {
        Self::empty()
            .with(EventKind::PlayerShoot, 5)
            .with(EventKind::PlayerHit, 50)
            .with(EventKind::EnemyKillStd, 20)
            .with(EventKind::EnemyKillSpecial, 100)
            .with(EventKind::ProjectileCollision, 10)
    }
}

impl From<BTreeMap<String, u32>> for EventIntensityTable {
    fn from(raw: BTreeMap<String, u32>) -> Self {
        let mut table = Self::empty();
        for (name, delta) in raw {
            match EventKind::from_string(&name) {
                Some(_) if delta == 0 => warn!("ignoring zero intensity delta for event '{name}'"),
                Some(kind) => table = table.with(kind, delta),
                None => warn!("ignoring unknown event '{name}' in intensity table"),
            }
        }
        table
    }
}

/// Source of gameplay events. Deliveries to one handler must keep emission order.
pub trait EventBus {
    fn subscribe(&mut self, handler: Box<dyn FnMut(EventKind) + Send>);
}

/// Synchronous in-process bus: `emit` calls every handler in subscription order.
#[derive(Default)]
pub struct LocalEventBus {
    handlers: Vec<Box<dyn FnMut(EventKind) + Send>>,
}

impl LocalEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, kind: EventKind) {
        for handler in self.handlers.iter_mut() {
            handler(kind);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.len()
    }
}

impl EventBus for LocalEventBus {
    fn subscribe(&mut self, handler: Box<dyn FnMut(EventKind) + Send>) {
        self.handlers.push(handler);
    }
}

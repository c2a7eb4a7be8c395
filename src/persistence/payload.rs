//! Save payload types
//!
//! The snapshot the game hands to the store at each checkpoint. The store only
//! checks its shape; the simulation rules behind the numbers live elsewhere.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::codec::CodecError;
use crate::consts::MAX_STAT;

/// Keys the payload models directly; anything else at the top level is extra
pub(crate) const TOP_LEVEL_FIELDS: [&str; 6] = ["day", "time_phase", "money", "inventory", "minigame_used", "cat"];
/// Keys the cat snapshot models directly
pub(crate) const CAT_FIELDS: [&str; 6] = ["name", "stage", "hunger", "tiredness", "happiness", "cleanliness"];

/// Half of an in-game day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimePhase {
    #[default]
    Morning,
    Night,
}

impl TimePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimePhase::Morning => "morning",
            TimePhase::Night => "night",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "morning" => Some(TimePhase::Morning),
            "night" => Some(TimePhase::Night),
            _ => None,
        }
    }
}

/// Evolution stage of the cat, in evolution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvolutionStage {
    #[serde(alias = "아기고양이")]
    Baby,
    #[serde(alias = "어른고양이")]
    Adult,
    #[serde(alias = "사자고양이")]
    Lion,
    #[serde(alias = "공룡고양이")]
    Dino,
}

impl EvolutionStage {
    pub const ALL: [EvolutionStage; 4] = [
        EvolutionStage::Baby,
        EvolutionStage::Adult,
        EvolutionStage::Lion,
        EvolutionStage::Dino,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EvolutionStage::Baby => "baby",
            EvolutionStage::Adult => "adult",
            EvolutionStage::Lion => "lion",
            EvolutionStage::Dino => "dino",
        }
    }

    /// Parse a stored stage name, including the display names old releases wrote
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "baby" | "아기고양이" => Some(EvolutionStage::Baby),
            "adult" | "어른고양이" => Some(EvolutionStage::Adult),
            "lion" | "사자고양이" => Some(EvolutionStage::Lion),
            "dino" | "공룡고양이" => Some(EvolutionStage::Dino),
            _ => None,
        }
    }
}

/// The cat part of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatSnapshot {
    pub name: String,
    pub stage: EvolutionStage,
    /// 0..=100
    pub hunger: u8,
    /// 0..=100
    pub tiredness: u8,
    /// 0..=100
    pub happiness: u8,
    /// 0..=100
    pub cleanliness: u8,
    /// Cat fields the store carries without interpreting (`alive`, `runaway`, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CatSnapshot {
    pub const DEFAULT_HUNGER: u8 = 0;
    pub const DEFAULT_TIREDNESS: u8 = 0;
    pub const DEFAULT_HAPPINESS: u8 = 75;
    pub const DEFAULT_CLEANLINESS: u8 = 75;

    /// A newly adopted kitten
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stage: EvolutionStage::Baby,
            hunger: Self::DEFAULT_HUNGER,
            tiredness: Self::DEFAULT_TIREDNESS,
            happiness: Self::DEFAULT_HAPPINESS,
            cleanliness: Self::DEFAULT_CLEANLINESS,
            extra: Map::new(),
        }
    }
}

/// One point-in-time snapshot of a play session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavePayload {
    pub day: u64,
    pub time_phase: TimePhase,
    pub money: u64,
    /// Item name -> count
    pub inventory: BTreeMap<String, u64>,
    /// Minigame id -> played today
    pub minigame_used: BTreeMap<String, bool>,
    pub cat: CatSnapshot,
    /// Top-level fields the store carries without interpreting
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SavePayload {
    pub const FIRST_DAY: u64 = 1;

    /// Starting snapshot for a new game
    pub fn new(cat: CatSnapshot) -> Self {
        let minigame_used = ["jump", "memory"]
            .into_iter()
            .map(|id| (id.to_string(), false))
            .collect();
        Self {
            day: Self::FIRST_DAY,
            time_phase: TimePhase::Morning,
            money: 0,
            inventory: BTreeMap::new(),
            minigame_used,
            cat,
            extra: Map::new(),
        }
    }

    /// Copy with stats clamped to 0..=100 and extra keys that shadow modeled
    /// fields dropped, so what gets stored reads back unchanged
    pub fn normalized(&self) -> SavePayload {
        let mut payload = self.clone();
        let cat = &mut payload.cat;
        for stat in [
            &mut cat.hunger,
            &mut cat.tiredness,
            &mut cat.happiness,
            &mut cat.cleanliness,
        ] {
            *stat = (*stat).min(MAX_STAT);
        }
        for field in CAT_FIELDS {
            if cat.extra.remove(field).is_some() {
                log::warn!("Dropping extra cat field {:?} that shadows a modeled field", field);
            }
        }
        for field in TOP_LEVEL_FIELDS {
            if payload.extra.remove(field).is_some() {
                log::warn!("Dropping extra field {:?} that shadows a modeled field", field);
            }
        }
        payload
    }

    /// The normalized payload as a JSON mapping, the form that gets signed and stored
    pub fn to_mapping(&self) -> Result<Map<String, Value>, CodecError> {
        match serde_json::to_value(self.normalized())? {
            Value::Object(map) => Ok(map),
            _ => Err(CodecError::NotAMapping),
        }
    }
}

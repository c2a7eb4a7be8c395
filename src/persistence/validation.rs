//! Structural validation of decoded payloads
//!
//! Only the cat's `name` and `stage` are hard requirements. Everything else is
//! coerced: negative numbers clamp to zero, stats clamp to 0..=100, malformed
//! maps become empty and missing fields take new-game values.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

use super::payload::{CAT_FIELDS, CatSnapshot, EvolutionStage, SavePayload, TOP_LEVEL_FIELDS, TimePhase};
use crate::consts::{MAX_STAT, MIN_STAT};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("cat snapshot missing or not an object")]
    MissingCat,
    #[error("cat name must be a non-empty string")]
    BadName,
    #[error("cat stage must be a string")]
    BadStage,
    #[error("unknown evolution stage {0:?}")]
    UnknownStage(String),
}

/// Check and coerce a decoded mapping into a payload
pub fn validate(mut map: Map<String, Value>) -> Result<SavePayload, SchemaError> {
    let cat = match map.remove("cat") {
        Some(Value::Object(cat)) => validate_cat(cat)?,
        _ => return Err(SchemaError::MissingCat),
    };

    let day = map.get("day").and_then(count).unwrap_or(SavePayload::FIRST_DAY);
    let time_phase = map
        .get("time_phase")
        .and_then(Value::as_str)
        .and_then(TimePhase::from_str)
        .unwrap_or_default();
    let money = map.get("money").and_then(count).unwrap_or(0);
    let inventory = match map.get("inventory") {
        Some(Value::Object(items)) => items
            .iter()
            .filter_map(|(name, n)| count(n).map(|n| (name.clone(), n)))
            .collect(),
        _ => BTreeMap::new(),
    };
    let minigame_used = match map.get("minigame_used") {
        Some(Value::Object(flags)) => flags
            .iter()
            .filter_map(|(id, used)| used.as_bool().map(|used| (id.clone(), used)))
            .collect(),
        _ => BTreeMap::new(),
    };

    for field in TOP_LEVEL_FIELDS {
        map.remove(field);
    }

    Ok(SavePayload {
        day,
        time_phase,
        money,
        inventory,
        minigame_used,
        cat,
        extra: map,
    })
}

fn validate_cat(mut cat: Map<String, Value>) -> Result<CatSnapshot, SchemaError> {
    let name = match cat.get("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
        _ => return Err(SchemaError::BadName),
    };
    let stage = match cat.get("stage") {
        Some(Value::String(stage)) => {
            EvolutionStage::from_str(stage).ok_or_else(|| SchemaError::UnknownStage(stage.clone()))?
        }
        _ => return Err(SchemaError::BadStage),
    };

    let hunger = stat(cat.get("hunger"), CatSnapshot::DEFAULT_HUNGER);
    let tiredness = stat(cat.get("tiredness"), CatSnapshot::DEFAULT_TIREDNESS);
    let happiness = stat(cat.get("happiness"), CatSnapshot::DEFAULT_HAPPINESS);
    let cleanliness = stat(cat.get("cleanliness"), CatSnapshot::DEFAULT_CLEANLINESS);

    for field in CAT_FIELDS {
        cat.remove(field);
    }

    Ok(CatSnapshot {
        name,
        stage,
        hunger,
        tiredness,
        happiness,
        cleanliness,
        extra: cat,
    })
}

/// Non-negative integer view of a JSON number; negatives clamp to zero
fn count(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    if let Some(n) = value.as_i64() {
        return Some(n.max(0) as u64);
    }
    match value.as_f64() {
        Some(f) if f.is_finite() => Some(f.max(0.0) as u64),
        _ => None,
    }
}

fn stat(value: Option<&Value>, default: u8) -> u8 {
    match value.and_then(count) {
        Some(n) => n.clamp(MIN_STAT as u64, MAX_STAT as u64) as u8,
        None => default,
    }
}

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Item code -> quantity. Always shipped whole.
pub type Bank = BTreeMap<String, i64>;

pub const SKILLS: [&str; 8] = [
    "combat",
    "mining",
    "woodcutting",
    "fishing",
    "weaponcrafting",
    "gearcrafting",
    "jewelrycrafting",
    "cooking",
];

/// Equipment slots in display order.
pub const EQUIPMENT_SLOTS: [&str; 9] = [
    "weapon",
    "helmet",
    "amulet",
    "body_armor",
    "shield",
    "ring1",
    "ring2",
    "leg_armor",
    "boots",
];

pub mod keys {
    pub const CHARACTER: &str = "Character";
    pub const BANK: &str = "Bank";
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("message is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error("message is not a JSON object")]
    NotAnObject,
    #[error("message payload has an unexpected shape: {0}")]
    Shape(#[source] serde_json::Error),
    #[error("character payload has no Name")]
    MissingName,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "Name", default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "X", default)]
    pub x: i64,
    #[serde(rename = "Y", default)]
    pub y: i64,
}

/// One character as the producer last reported it. Every payload is a
/// complete record: fields the producer left out take their zero value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Character {
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub skin: String,
    #[serde(alias = "Actions", deserialize_with = "null_as_default")]
    pub state: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub task: String,
    #[serde(deserialize_with = "null_as_default")]
    pub task_type: String,
    pub task_progress: i64,
    pub task_total: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub levels: BTreeMap<String, i64>,
    #[serde(deserialize_with = "null_as_default")]
    pub xp: BTreeMap<String, i64>,
    #[serde(deserialize_with = "null_as_default")]
    pub max_xp: BTreeMap<String, i64>,
    #[serde(deserialize_with = "null_as_default")]
    pub inventory: BTreeMap<String, i64>,
    pub inventory_max_items: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub equipment: BTreeMap<String, String>,
    pub gold: i64,
    #[serde(with = "cooldown_expiry")]
    pub cooldown_expires: Option<OffsetDateTime>,
    pub cooldown_duration: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Character {
    pub fn level(&self, skill: &str) -> i64 {
        self.levels.get(skill).copied().unwrap_or(0)
    }

    pub fn xp(&self, skill: &str) -> i64 {
        self.xp.get(skill).copied().unwrap_or(0)
    }

    pub fn max_xp(&self, skill: &str) -> Option<i64> {
        self.max_xp.get(skill).copied()
    }

    /// Total quantity carried. Saturates instead of overflowing on
    /// absurd producer values.
    pub fn inventory_count(&self) -> i64 {
        self.inventory
            .values()
            .fold(0i64, |total, qty| total.saturating_add(*qty))
    }

    /// Item code in `slot`, `None` when the slot is empty or unknown.
    pub fn equipped(&self, slot: &str) -> Option<&str> {
        self.equipment
            .get(slot)
            .map(String::as_str)
            .filter(|code| !code.is_empty())
    }

    /// Every slot in [`EQUIPMENT_SLOTS`] order with what it holds.
    pub fn equipment_in_order(
        &self,
    ) -> impl Iterator<Item = (&'static str, Option<&str>)> + '_ {
        EQUIPMENT_SLOTS
            .iter()
            .map(move |slot| (*slot, self.equipped(slot)))
    }
}

/// A single stream event. Either half may be missing (or `null`), which
/// means "leave that part alone".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateMessage {
    #[serde(
        rename = "Character",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub character: Option<Character>,
    #[serde(rename = "Bank", default, skip_serializing_if = "Option::is_none")]
    pub bank: Option<Bank>,
}

impl UpdateMessage {
    pub fn character(character: Character) -> Self {
        Self {
            character: Some(character),
            bank: None,
        }
    }

    pub fn bank(bank: Bank) -> Self {
        Self {
            character: None,
            bank: Some(bank),
        }
    }

    /// Parses one event body. Blank bodies yield `Ok(None)`. Unknown
    /// top-level keys are ignored; a malformed `Character` or `Bank`
    /// rejects the whole message.
    pub fn parse(text: &str) -> Result<Option<Self>, ProtocolError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let value: serde_json::Value = serde_json::from_str(text).map_err(ProtocolError::Json)?;
        if !value.is_object() {
            return Err(ProtocolError::NotAnObject);
        }

        let message: UpdateMessage = serde_json::from_value(value).map_err(ProtocolError::Shape)?;
        if let Some(character) = &message.character {
            if character.name.trim().is_empty() {
                return Err(ProtocolError::MissingName);
            }
        }
        Ok(Some(message))
    }

    pub fn is_empty(&self) -> bool {
        self.character.is_none() && self.bank.is_none()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// RFC 3339 expiry. The producer's zero time (`0001-01-01T00:00:00Z`)
/// stands for "no cooldown".
mod cooldown_expiry {
    use serde::{Deserializer, Serializer};
    use time::OffsetDateTime;

    pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        time::serde::rfc3339::option::serialize(value, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let parsed = time::serde::rfc3339::option::deserialize(deserializer)?;
        Ok(parsed.filter(|ts| ts.year() > 1))
    }
}

#[cfg(test)]
mod tests;

//! Pipeline state types: phases and catalog items

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One complete pass over the catalog for a single artifact type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Lyrics,
    Audio,
}

impl Phase {
    /// Parse CLI/config string into enum
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "lyrics" => Some(Self::Lyrics),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Lyrics => "lyrics",
            Self::Audio => "audio",
        }
    }

    /// Heading used in summaries
    pub fn title(self) -> &'static str {
        match self {
            Self::Lyrics => "Lyrics",
            Self::Audio => "Audio",
        }
    }

    /// Phases in execution order
    pub fn all() -> &'static [Phase] {
        &[Self::Lyrics, Self::Audio]
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn unknown_title() -> String {
    "Unknown Title".to_string()
}

fn unknown_artist() -> String {
    "Unknown Artist".to_string()
}

/// Strings pass through, numbers and booleans are stringified, anything
/// else (null, arrays, objects) falls back.
fn scalar_or(value: Value, fallback: fn() -> String) -> String {
    match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => fallback(),
    }
}

fn lenient_title<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Value::deserialize(d).map(|v| scalar_or(v, unknown_title))
}

fn lenient_artist<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Value::deserialize(d).map(|v| scalar_or(v, unknown_artist))
}

fn lenient_url<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Value::deserialize(d).map(|v| scalar_or(v, String::new))
}

fn lenient_event<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Value::deserialize(d).map(|v| Some(scalar_or(v, String::new)).filter(|s| !s.is_empty()))
}

/// A catalog entry. `url` is the ledger key; empty means it was missing.
///
/// Null or non-scalar fields read as missing, so such entries stay in the
/// catalog and fail per item instead of vanishing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default = "unknown_title", deserialize_with = "lenient_title")]
    pub title: String,
    #[serde(default = "unknown_artist", deserialize_with = "lenient_artist")]
    pub artists: String,
    #[serde(default, deserialize_with = "lenient_url")]
    pub url: String,
    #[serde(
        default,
        deserialize_with = "lenient_event",
        skip_serializing_if = "Option::is_none"
    )]
    pub event: Option<String>,
}

impl Item {
    pub fn new(title: &str, artists: &str, url: &str) -> Self {
        Self {
            title: title.to_string(),
            artists: artists.to_string(),
            url: url.to_string(),
            event: None,
        }
    }

    pub fn has_url(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire shape of every inbound event.
///
/// Bus deliveries name the kind `detail-type`; both spellings are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub source: String,
    #[serde(alias = "detail-type")]
    pub kind: String,
    #[serde(default)]
    pub detail: Value,
}

impl EventEnvelope {
    pub fn new(source: impl Into<String>, kind: impl Into<String>, detail: Value) -> Self {
        Self {
            source: source.into(),
            kind: kind.into(),
            detail,
        }
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

//! Clipboard payload exchanged between designer instances.
//!
//! `{"$components": [<component object>...], "$blocks": ["<block xml>"...]}`

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipboardPayload {
    /// Encoded component subtrees.
    #[serde(rename = "$components")]
    pub components: Vec<Value>,
    /// Opaque block fragments owned by the copied components.
    #[serde(rename = "$blocks", default)]
    pub blocks: Vec<String>,
}

impl ClipboardPayload {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// The first copied component of type `root_type`, if any.
    pub fn root_component(&self, root_type: &str) -> Option<&Value> {
        self.components
            .iter()
            .find(|c| c.get("$Type").and_then(Value::as_str) == Some(root_type))
    }
}

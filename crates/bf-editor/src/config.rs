//! Designer configuration.
//!
//! Supplied by the host page as JSON. Every field has a default, so an empty
//! object is a valid configuration.

use crate::error::DesignerError;
use bf_core::DecodeContext;
use serde::{Deserialize, Serialize};

/// Experimental and internal-only switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeatureFlags {
    /// Show the `INTERNAL` palette category.
    pub show_internal_components: bool,
    /// Show the `FUTURE` palette category.
    pub enable_future_features: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DesignerConfig {
    /// Deployment host recorded in the document's provenance list.
    pub host: String,
    pub session_id: String,
    pub project_id: u64,
    pub project_name: String,
    pub file_id: String,
    pub root_type: String,
    /// Upgrades are applied in memory but nothing is ever saved.
    pub read_only: bool,
    pub features: FeatureFlags,
}

impl Default for DesignerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            session_id: String::new(),
            project_id: 0,
            project_name: String::new(),
            file_id: "src/Screen1.scm".into(),
            root_type: "Form".into(),
            read_only: false,
            features: FeatureFlags::default(),
        }
    }
}

impl DesignerConfig {
    pub fn from_json(text: &str) -> Result<Self, DesignerError> {
        serde_json::from_str(text).map_err(DesignerError::Config)
    }

    pub fn decode_context(&self) -> DecodeContext {
        DecodeContext {
            root_type: self.root_type.clone(),
            project_name: (!self.project_name.is_empty()).then(|| self.project_name.clone()),
        }
    }
}

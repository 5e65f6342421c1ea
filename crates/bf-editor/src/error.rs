//! Designer-level errors.

use crate::designer::DesignerState;
use bf_core::{CodecError, ModelError, UpgradeError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DesignerError {
    #[error("cannot paste here: {0}")]
    InvalidPasteTarget(String),

    #[error("cannot paste: {0}")]
    IncompatiblePaste(#[source] UpgradeError),

    #[error("checksum mismatch in {file_id}: expected {expected}, computed {actual}")]
    ChecksumedFile {
        file_id: String,
        expected: String,
        actual: String,
    },

    #[error("{file_id} uses component type {component_type}, which is not installed")]
    ComponentNotFound {
        component_type: String,
        file_id: String,
    },

    /// A notification arrived out of sequence. Logged, never shown to the user.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("{operation} is not allowed while {state:?}")]
    InvalidState {
        operation: &'static str,
        state: DesignerState,
    },

    #[error("a {0} request is already in flight")]
    RequestInFlight(&'static str),

    #[error("loading {file_id} failed: {message}")]
    Load { file_id: String, message: String },

    #[error("saving {file_id} failed: {message}")]
    Save { file_id: String, message: String },

    #[error("invalid designer configuration: {0}")]
    Config(#[source] serde_json::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Upgrade(#[from] UpgradeError),
}

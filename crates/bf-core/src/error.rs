//! Error types for the component model, codec and upgrader.

use thiserror::Error;

/// Validation failures of single tree mutations. A failing mutation never
/// partially applies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("{parent} ({parent_type}) cannot contain a component of type {child_type}")]
    InvalidContainment {
        parent: String,
        parent_type: String,
        child_type: String,
    },

    #[error("a component named \"{0}\" already exists")]
    NameCollision(String),

    #[error("\"{0}\" is not a valid component name")]
    InvalidName(String),

    #[error("component type {component_type} has no property \"{property}\"")]
    UnknownProperty {
        component_type: String,
        property: String,
    },

    #[error("{child} is not a child of {parent}")]
    NotFound { parent: String, child: String },

    #[error("no component named \"{0}\"")]
    NoSuchComponent(String),

    #[error("the root component cannot be removed or moved")]
    RootImmovable,

    #[error("component type \"{0}\" is not installed")]
    ComponentNotFound(String),
}

/// Failures while reading or writing the source text format.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed source file: {0}")]
    Envelope(String),

    #[error("component object is missing \"{0}\"")]
    MissingKey(&'static str),

    #[error("\"{key}\" has an unexpected value: {value}")]
    BadValue { key: &'static str, value: String },

    #[error("root type {0} may only appear once, at the top of the document")]
    DuplicateRoot(String),

    #[error("document root must be of type {expected}, found {found}")]
    RootTypeMismatch { expected: String, found: String },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Upgrade(#[from] UpgradeError),
}

impl CodecError {
    /// The missing component type, if this failure is a missing-type error.
    pub fn missing_component_type(&self) -> Option<&str> {
        match self {
            CodecError::Model(ModelError::ComponentNotFound(t))
            | CodecError::Upgrade(UpgradeError::ComponentNotFound(t)) => Some(t),
            _ => None,
        }
    }
}

/// Failures of the schema upgrader.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpgradeError {
    #[error("component type \"{0}\" is not installed")]
    ComponentNotFound(String),

    #[error("{component_type} was saved at version {found}, newer than installed version {installed}")]
    NewerThanInstalled {
        component_type: String,
        found: u32,
        installed: u32,
    },

    #[error("document format version {found} is newer than supported version {supported}")]
    NewerDocument { found: u32, supported: u32 },

    #[error("\"{key}\" is not a version number: {value}")]
    BadVersion { key: &'static str, value: String },

    #[error("component object {0} has no \"$Type\"")]
    MissingType(String),

    #[error("upgrade step for {component_type} from version {version} registered out of order")]
    StepOutOfOrder { component_type: String, version: u32 },
}

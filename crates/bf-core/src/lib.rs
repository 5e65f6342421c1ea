pub mod codec;
pub mod error;
pub mod events;
pub mod id;
pub mod model;
pub mod properties;
pub mod source;
pub mod types;
pub mod upgrade;

pub use codec::{
    CURRENT_YA_VERSION, DecodeContext, Document, SubstitutionMap, decode_document, encode_document,
};
pub use error::{CodecError, ModelError, UpgradeError};
pub use events::{TreeEvent, TreeEventKind};
pub use id::{ComponentName, ComponentUuid};
pub use model::{ComponentInstance, ComponentTree, DetachedComponent};
pub use properties::{EditableProperty, MergedProperty, MergedValue, PropertyStore};
pub use types::{ComponentCategory, ComponentDatabase, ComponentFactory, ComponentTypeInfo};
pub use upgrade::SchemaUpgrader;

// Re-export petgraph types so downstream crates don't need a direct dependency
pub use petgraph::graph::NodeIndex;

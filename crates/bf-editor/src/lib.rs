pub mod bridge;
pub mod clipboard;
pub mod config;
pub mod designer;
pub mod error;
pub mod palette;
pub mod service;
pub mod sinks;

pub use bridge::{BlockEditor, MemoryBlockEditor, SyncBridge};
pub use clipboard::ClipboardPayload;
pub use config::{DesignerConfig, FeatureFlags};
pub use designer::{CorruptProject, Designer, DesignerState};
pub use error::DesignerError;
pub use palette::{Palette, PaletteChange, Translations};
pub use service::{ChecksumedLoadFile, MemoryProjectService, ProjectService, ServiceRequest};
pub use sinks::{PanelView, PropertyPanelSink, SourceStructureSink, StructureNode};

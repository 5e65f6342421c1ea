//! Schema upgrader: rewrites component property maps saved by older
//! component versions into the shape the installed version expects.
//!
//! Upgrades run on the JSON form of a document, before it is decoded into a
//! [`ComponentTree`](crate::ComponentTree). Each component type carries an
//! ordered list of steps, one per `v → v+1` transition; a version with no
//! registered step is a plain version bump. Steps are never skipped and stop
//! at the installed version, so upgrading an already-upgraded document
//! performs no work.

use crate::codec::CURRENT_YA_VERSION;
use crate::error::UpgradeError;
use crate::source::{AuthUrls, EncodedDocument};
use crate::types::ComponentDatabase;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Property name → raw value, as stored in a component object.
pub type PropertyMap = Map<String, Value>;

/// Tag prepended to the provenance list of a recent document that arrived
/// without one.
pub const UNKNOWN_HOST: &str = "*UNKNOWN*";

/// Documents at or above this format version are expected to carry a
/// provenance list.
pub const PROVENANCE_VERSION: u32 = 150;

// ─── Steps ───────────────────────────────────────────────────────────────

/// One rewrite within an upgrade step.
#[derive(Debug, Clone)]
pub enum StepAction {
    /// Move a value to a new property name.
    Rename { from: String, to: String },
    /// Rewrite a value in place.
    Reformat {
        property: String,
        transform: fn(&str) -> String,
    },
    /// Replace one property by several, each value derived from the old one.
    Split {
        property: String,
        into: Vec<String>,
        transform: fn(&str) -> Vec<String>,
    },
    /// Set a value when the property is absent.
    InjectDefault { property: String, value: String },
    /// Drop a property the new version no longer declares.
    Remove { property: String },
}

impl StepAction {
    pub fn rename(from: &str, to: &str) -> Self {
        StepAction::Rename {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn reformat(property: &str, transform: fn(&str) -> String) -> Self {
        StepAction::Reformat {
            property: property.into(),
            transform,
        }
    }

    pub fn split(property: &str, into: &[&str], transform: fn(&str) -> Vec<String>) -> Self {
        StepAction::Split {
            property: property.into(),
            into: into.iter().map(|p| (*p).to_string()).collect(),
            transform,
        }
    }

    pub fn inject(property: &str, value: &str) -> Self {
        StepAction::InjectDefault {
            property: property.into(),
            value: value.into(),
        }
    }

    pub fn remove(property: &str) -> Self {
        StepAction::Remove {
            property: property.into(),
        }
    }

    fn apply(&self, props: &mut PropertyMap) {
        match self {
            StepAction::Rename { from, to } => {
                if let Some(value) = props.remove(from) {
                    props.insert(to.clone(), value);
                }
            }
            StepAction::Reformat { property, transform } => {
                if let Some(Value::String(value)) = props.get_mut(property) {
                    *value = transform(value);
                }
            }
            StepAction::Split {
                property,
                into,
                transform,
            } => {
                if let Some(Value::String(value)) = props.remove(property) {
                    for (name, part) in into.iter().zip(transform(&value)) {
                        props.insert(name.clone(), Value::String(part));
                    }
                }
            }
            StepAction::InjectDefault { property, value } => {
                props
                    .entry(property.clone())
                    .or_insert_with(|| Value::String(value.clone()));
            }
            StepAction::Remove { property } => {
                props.remove(property);
            }
        }
    }
}

/// The rewrite from `from_version` to `from_version + 1`.
#[derive(Debug, Clone)]
pub struct UpgradeStep {
    pub from_version: u32,
    pub actions: Vec<StepAction>,
}

impl UpgradeStep {
    pub fn new(from_version: u32, actions: Vec<StepAction>) -> Self {
        Self {
            from_version,
            actions,
        }
    }
}

// ─── Results ─────────────────────────────────────────────────────────────

/// A property map brought to a newer version.
#[derive(Debug, Clone, PartialEq)]
pub struct Upgraded {
    pub properties: PropertyMap,
    /// Number of `v → v+1` transitions performed, bump-only ones included.
    pub steps: u32,
}

/// Summary of a document-level upgrade.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeReport {
    /// Format version the document was loaded with.
    pub loaded_ya_version: u32,
    /// Component steps performed across the whole tree.
    pub component_steps: u32,
}

impl UpgradeReport {
    /// Whether anything about the document changed and must be saved.
    pub fn upgraded(&self) -> bool {
        self.loaded_ya_version < CURRENT_YA_VERSION || self.component_steps > 0
    }
}

// ─── Upgrader ────────────────────────────────────────────────────────────

/// Registered upgrade steps for every component type.
#[derive(Debug, Clone, Default)]
pub struct SchemaUpgrader {
    steps: HashMap<String, Vec<UpgradeStep>>,
}

impl SchemaUpgrader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step. Steps for a type must be registered in strictly
    /// ascending version order.
    pub fn register(&mut self, component_type: &str, step: UpgradeStep) -> Result<(), UpgradeError> {
        let steps = self.steps.entry(component_type.to_string()).or_default();
        if steps
            .last()
            .is_some_and(|last| last.from_version >= step.from_version)
        {
            return Err(UpgradeError::StepOutOfOrder {
                component_type: component_type.to_string(),
                version: step.from_version,
            });
        }
        steps.push(step);
        Ok(())
    }

    fn step(&self, component_type: &str, from_version: u32) -> Option<&UpgradeStep> {
        self.steps
            .get(component_type)?
            .iter()
            .find(|s| s.from_version == from_version)
    }

    /// Bring `properties` from `found` to `installed`. Pure: the input map is
    /// consumed and the rewritten map returned.
    pub fn upgrade_properties(
        &self,
        component_type: &str,
        found: u32,
        installed: u32,
        mut properties: PropertyMap,
    ) -> Result<Upgraded, UpgradeError> {
        if found > installed {
            return Err(UpgradeError::NewerThanInstalled {
                component_type: component_type.to_string(),
                found,
                installed,
            });
        }
        for version in found..installed {
            if let Some(step) = self.step(component_type, version) {
                for action in &step.actions {
                    action.apply(&mut properties);
                }
            }
        }
        Ok(Upgraded {
            properties,
            steps: installed - found,
        })
    }

    /// Upgrade one component object and its `$Components`, recursively.
    /// Returns the number of steps performed.
    pub fn upgrade_component(
        &self,
        object: &mut PropertyMap,
        db: &ComponentDatabase,
    ) -> Result<u32, UpgradeError> {
        let Some(Value::String(component_type)) = object.get("$Type").cloned() else {
            let name = object.get("$Name").map_or_else(String::new, Value::to_string);
            return Err(UpgradeError::MissingType(name));
        };
        let installed = db
            .version(&component_type)
            .ok_or_else(|| UpgradeError::ComponentNotFound(component_type.clone()))?;
        let found = parse_version("$Version", object.get("$Version"))?;

        if found > installed {
            return Err(UpgradeError::NewerThanInstalled {
                component_type,
                found,
                installed,
            });
        }

        let mut steps = 0;
        if found != installed {
            let (reserved, properties): (PropertyMap, PropertyMap) = std::mem::take(object)
                .into_iter()
                .partition(|(key, _)| key.starts_with('$') || key == "Uuid");
            let upgraded = self.upgrade_properties(&component_type, found, installed, properties)?;
            if upgraded.steps > 0 {
                log::info!(
                    "upgraded {component_type} from version {found} to {installed} ({} steps)",
                    upgraded.steps
                );
            }
            steps += upgraded.steps;
            *object = reserved;
            object.extend(upgraded.properties);
            object.insert("$Version".into(), Value::String(installed.to_string()));
        }

        if let Some(Value::Array(children)) = object.get_mut("$Components") {
            for child in children.iter_mut() {
                if let Value::Object(child) = child {
                    steps += self.upgrade_component(child, db)?;
                }
            }
        }
        Ok(steps)
    }

    /// Upgrade a whole document: format version first, then every component.
    /// `YaVersion` is set to the current format version.
    pub fn upgrade_document(
        &self,
        document: &mut EncodedDocument,
        db: &ComponentDatabase,
    ) -> Result<UpgradeReport, UpgradeError> {
        let loaded = parse_version("YaVersion", Some(&document.ya_version))?;
        if loaded > CURRENT_YA_VERSION {
            return Err(UpgradeError::NewerDocument {
                found: loaded,
                supported: CURRENT_YA_VERSION,
            });
        }
        let component_steps = match &mut document.properties {
            Value::Object(root) => self.upgrade_component(root, db)?,
            _ => 0,
        };
        document.ya_version = Value::String(CURRENT_YA_VERSION.to_string());
        Ok(UpgradeReport {
            loaded_ya_version: loaded,
            component_steps,
        })
    }

    /// The built-in upgrade history.
    pub fn builtin() -> Self {
        let mut upgrader = Self::new();
        for (component_type, step) in builtin_steps() {
            if let Err(e) = upgrader.register(component_type, step) {
                log::error!("built-in upgrade table: {e}");
            }
        }
        upgrader
    }
}

/// Read a version number stored as a string or an integer. A missing
/// component version counts as version 1.
pub fn parse_version(key: &'static str, value: Option<&Value>) -> Result<u32, UpgradeError> {
    let bad = |v: &Value| UpgradeError::BadVersion {
        key,
        value: v.to_string(),
    };
    match value {
        None => Ok(1),
        Some(v @ Value::String(s)) => s.trim().parse().map_err(|_| bad(v)),
        Some(v @ Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| bad(v)),
        Some(v) => Err(bad(v)),
    }
}

/// Record that the document has been opened on `host`.
///
/// A document without a list gets one; if its format version is recent
/// enough that it should already have had one, it came from an unknown host
/// and `*UNKNOWN*` is recorded first. `host` is appended once.
pub fn apply_provenance(auth_urls: &mut Option<AuthUrls>, loaded_ya_version: u32, host: &str) {
    let urls = auth_urls.get_or_insert_with(|| {
        let mut fresh = AuthUrls::new();
        if loaded_ya_version >= PROVENANCE_VERSION {
            fresh.push(UNKNOWN_HOST.to_string());
        }
        fresh
    });
    if !urls.iter().any(|u| u == host) {
        urls.push(host.to_string());
    }
}

// ─── Built-in history ────────────────────────────────────────────────────

fn builtin_steps() -> Vec<(&'static str, UpgradeStep)> {
    vec![
        // Old screens were laid out at a fixed size.
        ("Form", UpgradeStep::new(1, vec![StepAction::inject("Sizing", "Fixed")])),
        (
            "Button",
            UpgradeStep::new(1, vec![StepAction::rename("Alignment", "TextAlignment")]),
        ),
        (
            "Button",
            UpgradeStep::new(3, vec![StepAction::reformat("BackgroundColor", named_color_to_hex)]),
        ),
        (
            "Label",
            UpgradeStep::new(1, vec![StepAction::rename("Alignment", "TextAlignment")]),
        ),
        // Labels had no margins before version 3.
        ("Label", UpgradeStep::new(2, vec![StepAction::inject("HasMargins", "False")])),
        (
            "TextBox",
            UpgradeStep::new(1, vec![StepAction::remove("BackgroundImage")]),
        ),
        (
            "HorizontalArrangement",
            UpgradeStep::new(
                1,
                vec![StepAction::split(
                    "Alignment",
                    &["AlignHorizontal", "AlignVertical"],
                    split_alignment,
                )],
            ),
        ),
        (
            "VerticalArrangement",
            UpgradeStep::new(
                1,
                vec![StepAction::split(
                    "Alignment",
                    &["AlignHorizontal", "AlignVertical"],
                    split_alignment,
                )],
            ),
        ),
    ]
}

/// `red` → `&HFFFF0000`. Values already in `&H` form pass through.
fn named_color_to_hex(value: &str) -> String {
    let hex = match value.to_ascii_lowercase().as_str() {
        "black" => "&HFF000000",
        "white" => "&HFFFFFFFF",
        "red" => "&HFFFF0000",
        "green" => "&HFF00FF00",
        "blue" => "&HFF0000FF",
        "yellow" => "&HFFFFFF00",
        "gray" | "grey" => "&HFF888888",
        "none" => "&H00000000",
        _ => return value.to_string(),
    };
    hex.to_string()
}

/// Legacy single alignment `0|1|2` (left, center, right) → horizontal
/// alignment `1|3|2` plus the default vertical alignment.
fn split_alignment(value: &str) -> Vec<String> {
    let horizontal = match value.trim() {
        "1" => "3",
        "2" => "2",
        _ => "1",
    };
    vec![horizontal.to_string(), "1".to_string()]
}

//! Component type database.
//!
//! Every component type is described once by a [`ComponentTypeInfo`]: its
//! installed schema version, palette category, visibility, containment
//! policy and property definition table. Instances hold a shared handle to
//! the info they were built from, so containment and property lookups never
//! go back through type-name string comparisons.
//!
//! The database is loadable from the same JSON shape the component build
//! emits (`simple_components.json`), and can be hot-swapped between mutation
//! steps when extensions are installed or removed.

use crate::error::ModelError;
use crate::model::ComponentInstance;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

// ─── Categories ──────────────────────────────────────────────────────────

/// Palette category. Declaration order is palette order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentCategory {
    #[serde(rename = "USERINTERFACE")]
    UserInterface,
    Layout,
    Media,
    Charts,
    Sensors,
    Storage,
    Connectivity,
    Extension,
    Internal,
    Future,
    Uninitialized,
}

/// Property-panel grouping of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PropertyCategory {
    Appearance,
    Behavior,
    Advanced,
    #[default]
    Unspecified,
}

// ─── Property definitions ────────────────────────────────────────────────

/// How one property is presented, validated and persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDefinition {
    pub name: String,
    #[serde(rename = "type", default = "default_property_type")]
    pub property_type: String,
    #[serde(default)]
    pub default_value: String,
    #[serde(default)]
    pub category: PropertyCategory,
    #[serde(default = "default_editor_type")]
    pub editor_type: String,
    #[serde(default)]
    pub editor_args: Vec<String>,
    /// Transient properties are editable but never written to the source file.
    #[serde(default = "yes")]
    pub persisted: bool,
}

fn default_property_type() -> String {
    "text".into()
}

fn default_editor_type() -> String {
    "string".into()
}

fn yes() -> bool {
    true
}

impl PropertyDefinition {
    pub fn new(name: &str, property_type: &str, default_value: &str) -> Self {
        Self {
            name: name.into(),
            property_type: property_type.into(),
            default_value: default_value.into(),
            category: PropertyCategory::Unspecified,
            editor_type: property_type.into(),
            editor_args: Vec::new(),
            persisted: true,
        }
    }

    pub fn category(mut self, category: PropertyCategory) -> Self {
        self.category = category;
        self
    }

    pub fn editor(mut self, editor_type: &str, args: &[&str]) -> Self {
        self.editor_type = editor_type.into();
        self.editor_args = args.iter().map(|a| (*a).to_string()).collect();
        self
    }

    pub fn transient(mut self) -> Self {
        self.persisted = false;
        self
    }
}

// ─── Containment ─────────────────────────────────────────────────────────

/// Which children a container type accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "accepts", content = "types", rename_all = "snake_case")]
pub enum Containment {
    /// Visible and non-visible components (the screen root).
    Any,
    /// Visible components only (arrangements).
    Visible,
    /// Only the listed component types (charts accept chart data).
    Only(Vec<String>),
}

// ─── Type info ───────────────────────────────────────────────────────────

/// Registry entry for one component type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentTypeInfo {
    pub name: String,
    #[serde(deserialize_with = "de_version")]
    pub version: u32,
    #[serde(rename = "categoryString")]
    pub category: ComponentCategory,
    #[serde(default)]
    pub non_visible: bool,
    #[serde(default = "yes")]
    pub show_on_palette: bool,
    /// Installed as an extension rather than built in.
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub container: Option<Containment>,
    /// If non-empty, the only container types this type may be placed in.
    #[serde(default)]
    pub allowed_parents: Vec<String>,
    #[serde(default)]
    pub help_string: String,
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
}

/// Versions are string-encoded in the component build output; accept both.
fn de_version<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u32),
        Str(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl ComponentTypeInfo {
    pub fn new(name: &str, version: u32, category: ComponentCategory) -> Self {
        Self {
            name: name.into(),
            version,
            category,
            non_visible: false,
            show_on_palette: true,
            external: false,
            container: None,
            allowed_parents: Vec::new(),
            help_string: String::new(),
            properties: Vec::new(),
        }
    }

    pub fn non_visible(mut self) -> Self {
        self.non_visible = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.show_on_palette = false;
        self
    }

    pub fn external(mut self) -> Self {
        self.external = true;
        self
    }

    pub fn container(mut self, containment: Containment) -> Self {
        self.container = Some(containment);
        self
    }

    pub fn only_in(mut self, parents: &[&str]) -> Self {
        self.allowed_parents = parents.iter().map(|p| (*p).to_string()).collect();
        self
    }

    pub fn with_properties(mut self, props: impl IntoIterator<Item = PropertyDefinition>) -> Self {
        self.properties.extend(props);
        self
    }

    pub fn is_container(&self) -> bool {
        self.container.is_some()
    }

    pub fn is_visible(&self) -> bool {
        !self.non_visible
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Whether an instance of this type may hold a child of type `child`.
    pub fn accepts(&self, child: &ComponentTypeInfo) -> bool {
        let by_policy = match &self.container {
            None => false,
            Some(Containment::Any) => true,
            Some(Containment::Visible) => child.is_visible(),
            Some(Containment::Only(types)) => types.iter().any(|t| *t == child.name),
        };
        by_policy && (child.allowed_parents.is_empty() || child.allowed_parents.contains(&self.name))
    }
}

// ─── Factory ─────────────────────────────────────────────────────────────

/// Instantiates components by type name.
pub trait ComponentFactory {
    fn type_info(&self, type_name: &str) -> Option<Arc<ComponentTypeInfo>>;

    /// Build a fresh instance with default property values and a new UUID.
    fn create_component(&self, type_name: &str, name: &str) -> Result<ComponentInstance, ModelError> {
        let info = self
            .type_info(type_name)
            .ok_or_else(|| ModelError::ComponentNotFound(type_name.to_string()))?;
        Ok(ComponentInstance::new(info, name))
    }
}

// ─── Database ────────────────────────────────────────────────────────────

/// The installed component types, keyed by type name.
#[derive(Debug, Clone, Default)]
pub struct ComponentDatabase {
    types: BTreeMap<String, Arc<ComponentTypeInfo>>,
}

impl ComponentDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON array of type descriptions.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let infos: Vec<ComponentTypeInfo> = serde_json::from_str(text)?;
        let mut db = Self::new();
        db.install(infos);
        Ok(db)
    }

    /// Install or replace types. Returns the names that were added or whose
    /// version changed; re-installing an identical version is not reported.
    pub fn install(&mut self, infos: impl IntoIterator<Item = ComponentTypeInfo>) -> Vec<String> {
        let mut changed = Vec::new();
        for info in infos {
            let is_new = self
                .types
                .get(&info.name)
                .is_none_or(|existing| existing.version != info.version);
            if is_new {
                changed.push(info.name.clone());
            }
            self.types.insert(info.name.clone(), Arc::new(info));
        }
        changed
    }

    /// Remove types, returning the infos that were actually installed.
    pub fn uninstall(&mut self, type_names: &[String]) -> Vec<Arc<ComponentTypeInfo>> {
        type_names
            .iter()
            .filter_map(|name| self.types.remove(name))
            .collect()
    }

    pub fn get(&self, type_name: &str) -> Option<&Arc<ComponentTypeInfo>> {
        self.types.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn version(&self, type_name: &str) -> Option<u32> {
        self.types.get(type_name).map(|info| info.version)
    }

    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ComponentTypeInfo>> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The built-in component set.
    pub fn builtin() -> Self {
        let mut db = Self::new();
        db.install(builtin_types());
        db
    }
}

impl ComponentFactory for ComponentDatabase {
    fn type_info(&self, type_name: &str) -> Option<Arc<ComponentTypeInfo>> {
        self.types.get(type_name).cloned()
    }
}

// ─── Built-in catalog ────────────────────────────────────────────────────

/// Properties every visible component carries. `Row`/`Column` place a
/// component inside a table arrangement.
fn visible_properties() -> Vec<PropertyDefinition> {
    use PropertyCategory::*;
    vec![
        PropertyDefinition::new("Visible", "boolean", "True").category(Appearance),
        PropertyDefinition::new("Width", "length", "-1").category(Appearance),
        PropertyDefinition::new("Height", "length", "-1").category(Appearance),
        PropertyDefinition::new("Row", "integer", "-1").editor("non_negative_integer", &[]),
        PropertyDefinition::new("Column", "integer", "-1").editor("non_negative_integer", &[]),
    ]
}

fn text_properties(default_text: &str, alignment: &str) -> Vec<PropertyDefinition> {
    use PropertyCategory::*;
    vec![
        PropertyDefinition::new("Text", "text", default_text).category(Appearance),
        PropertyDefinition::new("FontSize", "non_negative_float", "14.0").category(Appearance),
        PropertyDefinition::new("TextAlignment", "alignment", alignment)
            .category(Appearance)
            .editor("textalignment", &["0", "1", "2"]),
    ]
}

fn arrangement_properties() -> Vec<PropertyDefinition> {
    use PropertyCategory::*;
    vec![
        PropertyDefinition::new("AlignHorizontal", "horizontal_alignment", "1")
            .category(Appearance)
            .editor("horizontal_alignment", &["1", "2", "3"]),
        PropertyDefinition::new("AlignVertical", "vertical_alignment", "1")
            .category(Appearance)
            .editor("vertical_alignment", &["1", "2", "3"]),
        PropertyDefinition::new("BackgroundColor", "color", "&H00000000").category(Appearance),
    ]
}

fn builtin_types() -> Vec<ComponentTypeInfo> {
    use ComponentCategory::*;
    use PropertyCategory::*;
    vec![
        ComponentTypeInfo::new("Form", 3, UserInterface)
            .hidden()
            .container(Containment::Any)
            .with_properties([
                PropertyDefinition::new("AppName", "text", "").category(Behavior),
                PropertyDefinition::new("Title", "text", "").category(Appearance),
                PropertyDefinition::new("AlignHorizontal", "horizontal_alignment", "1")
                    .category(Appearance),
                PropertyDefinition::new("AlignVertical", "vertical_alignment", "1")
                    .category(Appearance),
                PropertyDefinition::new("BackgroundColor", "color", "&HFFFFFFFF")
                    .category(Appearance),
                PropertyDefinition::new("Scrollable", "boolean", "False").category(Appearance),
                PropertyDefinition::new("Sizing", "sizing", "Responsive")
                    .category(Advanced)
                    .editor("sizing", &["Fixed", "Responsive"]),
                PropertyDefinition::new("Theme", "theme", "Classic").category(Appearance),
                PropertyDefinition::new("BlockSubset", "subset_json", "").category(Advanced),
                PropertyDefinition::new("ShowHiddenComponents", "boolean", "False").transient(),
            ]),
        ComponentTypeInfo::new("Button", 4, UserInterface)
            .with_properties(text_properties("Text for Button", "1"))
            .with_properties([
                PropertyDefinition::new("BackgroundColor", "color", "&H00000000")
                    .category(Appearance),
                PropertyDefinition::new("Enabled", "boolean", "True").category(Behavior),
                PropertyDefinition::new("Image", "asset", "").category(Appearance),
            ])
            .with_properties(visible_properties()),
        ComponentTypeInfo::new("Label", 3, UserInterface)
            .with_properties(text_properties("Text for Label", "0"))
            .with_properties([
                PropertyDefinition::new("HasMargins", "boolean", "True").category(Appearance),
                PropertyDefinition::new("HTMLFormat", "boolean", "False").category(Behavior),
            ])
            .with_properties(visible_properties()),
        ComponentTypeInfo::new("TextBox", 2, UserInterface)
            .with_properties(text_properties("", "0"))
            .with_properties([
                PropertyDefinition::new("Hint", "text", "Hint for TextBox").category(Behavior),
                PropertyDefinition::new("MultiLine", "boolean", "False").category(Behavior),
                PropertyDefinition::new("NumbersOnly", "boolean", "False").category(Behavior),
            ])
            .with_properties(visible_properties()),
        ComponentTypeInfo::new("Image", 1, Media)
            .with_properties([
                PropertyDefinition::new("Picture", "asset", "").category(Appearance),
                PropertyDefinition::new("ScalePictureToFit", "boolean", "False")
                    .category(Appearance),
            ])
            .with_properties(visible_properties()),
        ComponentTypeInfo::new("HorizontalArrangement", 2, Layout)
            .container(Containment::Visible)
            .with_properties(arrangement_properties())
            .with_properties(visible_properties()),
        ComponentTypeInfo::new("VerticalArrangement", 2, Layout)
            .container(Containment::Visible)
            .with_properties(arrangement_properties())
            .with_properties(visible_properties()),
        ComponentTypeInfo::new("TableArrangement", 1, Layout)
            .container(Containment::Visible)
            .with_properties([
                PropertyDefinition::new("Columns", "non_negative_integer", "2").category(Appearance),
                PropertyDefinition::new("Rows", "non_negative_integer", "2").category(Appearance),
            ])
            .with_properties(visible_properties()),
        ComponentTypeInfo::new("Chart", 1, Charts)
            .container(Containment::Only(vec!["ChartData2D".into()]))
            .with_properties([
                PropertyDefinition::new("Type", "chart_type", "0")
                    .category(Appearance)
                    .editor("chart_type", &["0", "1", "2", "3", "4"]),
                PropertyDefinition::new("Description", "text", "").category(Appearance),
            ])
            .with_properties(visible_properties()),
        ComponentTypeInfo::new("ChartData2D", 1, Charts)
            .only_in(&["Chart"])
            .with_properties([
                PropertyDefinition::new("Color", "color", "&HFF000000").category(Appearance),
                PropertyDefinition::new("Label", "text", "").category(Appearance),
                PropertyDefinition::new("PointShape", "point_shape", "0").category(Appearance),
                PropertyDefinition::new("ElementsFromPairs", "text", "").category(Behavior),
            ]),
        ComponentTypeInfo::new("Clock", 1, Sensors)
            .non_visible()
            .with_properties([
                PropertyDefinition::new("TimerAlwaysFires", "boolean", "True").category(Behavior),
                PropertyDefinition::new("TimerEnabled", "boolean", "True").category(Behavior),
                PropertyDefinition::new("TimerInterval", "non_negative_integer", "1000")
                    .category(Behavior),
            ]),
        ComponentTypeInfo::new("Notifier", 1, UserInterface)
            .non_visible()
            .with_properties([
                PropertyDefinition::new("BackgroundColor", "color", "&HFF444444")
                    .category(Appearance),
                PropertyDefinition::new("NotifierLength", "toast_length", "1")
                    .category(Appearance),
            ]),
    ]
}

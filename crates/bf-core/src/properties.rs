//! Editable property sets and their multi-select merged view.

use crate::error::ModelError;
use crate::types::PropertyDefinition;
use std::collections::HashSet;

/// Identity properties are unique per instance and never part of a merged view.
pub const IDENTITY_PROPERTIES: [&str; 2] = ["Uuid", "Name"];

/// One property definition plus the instance's current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditableProperty {
    pub definition: PropertyDefinition,
    pub value: String,
}

impl EditableProperty {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn is_default(&self) -> bool {
        self.value == self.definition.default_value
    }
}

/// The ordered property set of one component instance.
///
/// Order is declaration order of the type's property table and is the order
/// properties are written to the source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyStore {
    entries: Vec<EditableProperty>,
}

impl PropertyStore {
    /// A store holding every definition at its default value.
    pub fn from_definitions(definitions: &[PropertyDefinition]) -> Self {
        Self {
            entries: definitions
                .iter()
                .map(|def| EditableProperty {
                    definition: def.clone(),
                    value: def.default_value.clone(),
                })
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&EditableProperty> {
        self.entries.iter().find(|p| p.name() == name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).map(|p| p.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Assign a value. Returns the previous value.
    ///
    /// `component_type` only feeds the error message.
    pub fn set(&mut self, component_type: &str, name: &str, value: &str) -> Result<String, ModelError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|p| p.definition.name == name)
            .ok_or_else(|| ModelError::UnknownProperty {
                component_type: component_type.to_string(),
                property: name.to_string(),
            })?;
        Ok(std::mem::replace(&mut entry.value, value.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &EditableProperty> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Name/value pairs that belong in the source file: persisted properties
    /// whose value differs from the default.
    pub fn persisted_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter(|p| p.definition.persisted && !p.is_default())
            .map(|p| (p.name(), p.value.as_str()))
    }
}

// ─── Multi-select merge ──────────────────────────────────────────────────

/// Value of a property across a multi-selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergedValue {
    /// Every selected instance holds this value.
    Shared(String),
    /// Selected instances disagree; shown blank.
    Mixed,
}

impl MergedValue {
    /// The text a property editor shows: the shared value, or blank.
    pub fn display(&self) -> &str {
        match self {
            MergedValue::Shared(v) => v,
            MergedValue::Mixed => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedProperty {
    pub definition: PropertyDefinition,
    pub value: MergedValue,
}

/// Intersect property sets by `(name, type)`, keeping the first store's
/// order. Identity properties are excluded. A single store yields all its
/// properties as shared values.
pub fn merge_properties<'a, I>(stores: I) -> Vec<MergedProperty>
where
    I: IntoIterator<Item = &'a PropertyStore>,
{
    let stores: Vec<&PropertyStore> = stores.into_iter().collect();
    let Some((first, rest)) = stores.split_first() else {
        return Vec::new();
    };

    let keys_of = |store: &PropertyStore| -> HashSet<(String, String)> {
        store
            .iter()
            .map(|p| (p.definition.name.clone(), p.definition.property_type.clone()))
            .collect()
    };
    let rest_keys: Vec<HashSet<(String, String)>> = rest.iter().map(|s| keys_of(*s)).collect();

    first
        .iter()
        .filter(|p| !IDENTITY_PROPERTIES.contains(&p.name()))
        .filter(|p| {
            let key = (p.definition.name.clone(), p.definition.property_type.clone());
            rest_keys.iter().all(|keys| keys.contains(&key))
        })
        .map(|p| {
            let agree = rest
                .iter()
                .all(|store| store.value(p.name()) == Some(p.value.as_str()));
            MergedProperty {
                definition: p.definition.clone(),
                value: if agree {
                    MergedValue::Shared(p.value.clone())
                } else {
                    MergedValue::Mixed
                },
            }
        })
        .collect()
}

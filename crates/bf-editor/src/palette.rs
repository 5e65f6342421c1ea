//! Component palette: the instantiable component types, grouped by category,
//! with a substring search over translated names.
//!
//! The palette reads from a [`ComponentDatabase`] but owns its own entries,
//! so it is independent of any open document. Extension installs and
//! removals change the search index; rebuilding it is deferred to the next
//! scheduling tick and coalesced, so a burst of installs rebuilds once.

use crate::config::FeatureFlags;
use bf_core::{ComponentCategory, ComponentDatabase, ComponentTypeInfo};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Whether a palette category is shown at all under the given features.
pub fn show_category(category: ComponentCategory, features: &FeatureFlags) -> bool {
    match category {
        ComponentCategory::Uninitialized => false,
        ComponentCategory::Internal => features.show_internal_components,
        ComponentCategory::Future => features.enable_future_features,
        _ => true,
    }
}

// ─── Translations ────────────────────────────────────────────────────────

/// User-facing component names.
pub trait Translations {
    fn component_name(&self, type_name: &str) -> String;
}

/// Shows type names as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTranslations;

impl Translations for NoTranslations {
    fn component_name(&self, type_name: &str) -> String {
        type_name.to_string()
    }
}

impl Translations for HashMap<String, String> {
    fn component_name(&self, type_name: &str) -> String {
        self.get(type_name)
            .cloned()
            .unwrap_or_else(|| type_name.to_string())
    }
}

// ─── Entries ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct PaletteItem {
    pub info: Arc<ComponentTypeInfo>,
    pub display_name: String,
}

/// Outcome of [`Palette::add_component`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteChange {
    Added,
    /// A different version was present and has been replaced.
    Replaced,
    /// Already present at the same version.
    Unchanged,
    /// Not shown on the palette (flagged hidden, or category disabled).
    Hidden,
    /// Not in the component database.
    Missing,
}

#[derive(Debug, Default, Deserialize)]
struct BlockSubset {
    #[serde(rename = "shownComponentTypes", default)]
    shown_component_types: BTreeMap<String, Vec<SubsetEntry>>,
}

#[derive(Debug, Deserialize)]
struct SubsetEntry {
    #[serde(rename = "type")]
    component_type: String,
}

/// Component types listed by a blocks-toolkit subset (`BlockSubset` JSON).
pub fn subset_component_types(subset_json: &str) -> Result<BTreeSet<String>, serde_json::Error> {
    let subset: BlockSubset = serde_json::from_str(subset_json)?;
    Ok(subset
        .shown_component_types
        .into_values()
        .flatten()
        .map(|entry| entry.component_type)
        .collect())
}

// ─── Palette ─────────────────────────────────────────────────────────────

pub struct Palette {
    features: FeatureFlags,
    translations: Box<dyn Translations>,
    categories: BTreeMap<ComponentCategory, Vec<PaletteItem>>,

    /// Lowercase translated name → type names. Translations may coincide
    /// once case is folded.
    translation_map: BTreeMap<String, Vec<String>>,
    /// Sorted lowercase names searched by [`Palette::search`].
    search_index: Vec<String>,
    rebuild_pending: bool,
    rebuilds: usize,

    last_search: String,
    results: Vec<String>,
}

impl Palette {
    pub fn new(features: FeatureFlags, translations: Box<dyn Translations>) -> Self {
        Self {
            features,
            translations,
            categories: BTreeMap::new(),
            translation_map: BTreeMap::new(),
            search_index: Vec::new(),
            rebuild_pending: false,
            rebuilds: 0,
            last_search: String::new(),
            results: Vec::new(),
        }
    }

    /// Add every type in `db`.
    pub fn load(&mut self, db: &ComponentDatabase) {
        for info in db.iter() {
            self.insert(Arc::clone(info));
        }
        self.request_rebuild();
    }

    /// Add one type from `db`. A type already present at a different version
    /// is replaced in one step.
    pub fn add_component(&mut self, db: &ComponentDatabase, type_name: &str) -> PaletteChange {
        let Some(info) = db.get(type_name) else {
            log::warn!("palette: {type_name} is not in the component database");
            return PaletteChange::Missing;
        };
        let replacing = match self.item(type_name) {
            Some(existing) if existing.info.version == info.version => {
                return PaletteChange::Unchanged;
            }
            Some(_) => true,
            None => false,
        };
        if replacing {
            self.remove_component(type_name);
        }
        if !self.insert(Arc::clone(info)) {
            return PaletteChange::Hidden;
        }
        if replacing {
            log::info!("palette: upgraded {type_name} to version {}", info.version);
            PaletteChange::Replaced
        } else {
            PaletteChange::Added
        }
    }

    fn insert(&mut self, info: Arc<ComponentTypeInfo>) -> bool {
        if !info.show_on_palette || !show_category(info.category, &self.features) {
            return false;
        }
        let display_name = self.translations.component_name(&info.name);
        let types = self
            .translation_map
            .entry(display_name.to_lowercase())
            .or_default();
        if !types.contains(&info.name) {
            types.push(info.name.clone());
        }
        if info.external {
            self.request_rebuild();
        }
        let items = self.categories.entry(info.category).or_default();
        items.retain(|item| item.info.name != info.name);
        items.push(PaletteItem { info, display_name });
        true
    }

    /// Remove a type. Returns false if it was not present.
    pub fn remove_component(&mut self, type_name: &str) -> bool {
        let mut removed = None;
        for items in self.categories.values_mut() {
            if let Some(pos) = items.iter().position(|i| i.info.name == type_name) {
                removed = Some(items.remove(pos));
                break;
            }
        }
        self.categories.retain(|_, items| !items.is_empty());
        let Some(item) = removed else {
            return false;
        };
        if item.info.external {
            let key = item.display_name.to_lowercase();
            if let Some(types) = self.translation_map.get_mut(&key) {
                types.retain(|name| *name != item.info.name);
                if types.is_empty() {
                    self.translation_map.remove(&key);
                }
            }
            self.request_rebuild();
        }
        true
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.item(type_name).is_some()
    }

    pub fn item(&self, type_name: &str) -> Option<&PaletteItem> {
        self.categories
            .values()
            .flatten()
            .find(|item| item.info.name == type_name)
    }

    /// Non-empty categories in palette order.
    pub fn categories(&self) -> Vec<ComponentCategory> {
        self.categories.keys().copied().collect()
    }

    /// Type names in `category`, in insertion order.
    pub fn components(&self, category: ComponentCategory) -> Vec<&str> {
        self.categories
            .get(&category)
            .map(|items| items.iter().map(|i| i.info.name.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    // ─── Clearing and reloading ──────────────────────────────────────────

    pub fn clear(&mut self) {
        self.categories.clear();
    }

    /// Clear everything but the extension category, which a blocks-toolkit
    /// subset does not govern.
    pub fn clear_except_extensions(&mut self) {
        self.categories
            .retain(|category, _| *category == ComponentCategory::Extension);
    }

    /// Rebuild the palette from `db`, restricted to the types a non-empty
    /// `BlockSubset` lists. An unparsable subset shows no built-in types.
    pub fn reload(&mut self, db: &ComponentDatabase, subset_json: &str) {
        if subset_json.trim().is_empty() {
            self.clear();
            self.load(db);
            return;
        }
        let shown = subset_component_types(subset_json).unwrap_or_else(|e| {
            log::error!("invalid subset string: {e}");
            BTreeSet::new()
        });
        self.clear_except_extensions();
        for type_name in &shown {
            self.add_component(db, type_name);
        }
    }

    // ─── Search ──────────────────────────────────────────────────────────

    /// Schedule a search index rebuild. Repeated requests before the next
    /// tick collapse into one.
    pub fn request_rebuild(&mut self) {
        self.rebuild_pending = true;
    }

    pub fn rebuild_pending(&self) -> bool {
        self.rebuild_pending
    }

    /// Number of index rebuilds performed so far.
    pub fn rebuild_count(&self) -> usize {
        self.rebuilds
    }

    /// Run deferred work for this tick. Returns whether the index was
    /// rebuilt. The last search is repeated against the new index.
    pub fn run_scheduled(&mut self) -> bool {
        if !self.rebuild_pending {
            return false;
        }
        self.rebuild_pending = false;
        self.search_index = self.translation_map.keys().cloned().collect();
        self.rebuilds += 1;
        let query = std::mem::take(&mut self.last_search);
        self.run_search(&query);
        true
    }

    /// Case-insensitive substring search over translated names. Returns type
    /// names of matching palette entries.
    pub fn search(&mut self, query: &str) -> &[String] {
        let query = query.trim().to_lowercase();
        if query != self.last_search {
            self.run_search(&query);
        }
        &self.results
    }

    fn run_search(&mut self, query: &str) {
        self.results = if query.is_empty() {
            Vec::new()
        } else {
            self.search_index
                .iter()
                .filter(|name| name.contains(query))
                .filter_map(|name| self.translation_map.get(name))
                .flatten()
                .filter(|type_name| self.contains(type_name))
                .cloned()
                .collect()
        };
        self.last_search = query.to_string();
    }
}

impl std::fmt::Debug for Palette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Palette")
            .field("categories", &self.categories.keys().collect::<Vec<_>>())
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn palette(db: &ComponentDatabase) -> Palette {
        let mut p = Palette::new(FeatureFlags::default(), Box::new(NoTranslations));
        p.load(db);
        p.run_scheduled();
        p
    }

    fn extension(name: &str, version: u32) -> ComponentTypeInfo {
        ComponentTypeInfo::new(name, version, ComponentCategory::Extension)
            .external()
            .non_visible()
    }

    #[test]
    fn category_visibility_follows_features() {
        let off = FeatureFlags::default();
        let on = FeatureFlags {
            show_internal_components: true,
            enable_future_features: true,
        };
        assert!(show_category(ComponentCategory::Layout, &off));
        assert!(!show_category(ComponentCategory::Internal, &off));
        assert!(!show_category(ComponentCategory::Future, &off));
        assert!(show_category(ComponentCategory::Internal, &on));
        assert!(!show_category(ComponentCategory::Uninitialized, &on));
    }

    #[test]
    fn load_skips_hidden_types() {
        let db = ComponentDatabase::builtin();
        let p = palette(&db);
        assert!(!p.contains("Form"), "the screen type is not on the palette");
        assert!(p.contains("Button"));
        assert_eq!(p.categories()[0], ComponentCategory::UserInterface);
        assert!(p.components(ComponentCategory::Layout).contains(&"TableArrangement"));
    }

    #[test]
    fn add_component_replaces_other_versions_only() {
        let mut db = ComponentDatabase::builtin();
        let mut p = palette(&db);
        db.install([extension("Sharing", 1)]);

        assert_eq!(p.add_component(&db, "Sharing"), PaletteChange::Added);
        assert_eq!(p.add_component(&db, "Sharing"), PaletteChange::Unchanged);
        db.install([extension("Sharing", 2)]);
        assert_eq!(p.add_component(&db, "Sharing"), PaletteChange::Replaced);
        assert_eq!(p.item("Sharing").unwrap().info.version, 2);
        assert_eq!(p.components(ComponentCategory::Extension), vec!["Sharing"]);

        assert_eq!(p.add_component(&db, "Teleporter"), PaletteChange::Missing);
        assert!(p.remove_component("Sharing"));
        assert!(!p.remove_component("Sharing"), "second removal is a no-op");
        assert!(!p.categories().contains(&ComponentCategory::Extension));
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let db = ComponentDatabase::builtin();
        let mut p = palette(&db);
        assert_eq!(p.search("ARRANGE").to_vec(), vec![
            "HorizontalArrangement".to_string(),
            "TableArrangement".to_string(),
            "VerticalArrangement".to_string(),
        ]);
        assert!(p.search("  ").is_empty());
    }

    #[test]
    fn extension_changes_rebuild_once_per_tick() {
        let mut db = ComponentDatabase::builtin();
        let mut p = palette(&db);
        let before = p.rebuild_count();
        db.install([extension("Sharing", 1), extension("Scanner", 1)]);

        p.add_component(&db, "Sharing");
        p.add_component(&db, "Scanner");
        assert!(p.search("shar").is_empty(), "index not rebuilt yet");
        assert!(p.run_scheduled());
        assert!(!p.run_scheduled());
        assert_eq!(p.rebuild_count(), before + 1);
        assert_eq!(p.search("shar").to_vec(), vec!["Sharing".to_string()]);

        p.remove_component("Sharing");
        p.run_scheduled();
        assert!(p.search("shar").is_empty());
    }

    #[test]
    fn translated_names_are_searched() {
        let db = ComponentDatabase::builtin();
        let names: HashMap<String, String> =
            [("Button".to_string(), "Botón".to_string())].into_iter().collect();
        let mut p = Palette::new(FeatureFlags::default(), Box::new(names));
        p.load(&db);
        p.run_scheduled();
        assert_eq!(p.search("botón").to_vec(), vec!["Button".to_string()]);
        assert_eq!(p.item("Button").unwrap().display_name, "Botón");
    }

    #[test]
    fn translations_equal_up_to_case_find_every_type() {
        let db = ComponentDatabase::builtin();
        let names: HashMap<String, String> = [
            ("Button".to_string(), "Knopf".to_string()),
            ("Label".to_string(), "KNOPF".to_string()),
        ]
        .into_iter()
        .collect();
        let mut p = Palette::new(FeatureFlags::default(), Box::new(names));
        p.load(&db);
        p.run_scheduled();
        let mut found = p.search("knopf").to_vec();
        found.sort();
        assert_eq!(found, vec!["Button".to_string(), "Label".to_string()]);
    }

    #[test]
    fn subset_restricts_builtins_but_keeps_extensions() {
        let mut db = ComponentDatabase::builtin();
        db.install([extension("Sharing", 1)]);
        let mut p = palette(&db);
        assert!(p.contains("Sharing"));

        let subset = r#"{"name":"Intro","shownComponentTypes":{
            "USERINTERFACE":[{"type":"Button"},{"type":"Label"}],
            "LAYOUT":[{"type":"VerticalArrangement"}]}}"#;
        p.reload(&db, subset);
        assert!(p.contains("Button"));
        assert!(p.contains("VerticalArrangement"));
        assert!(!p.contains("TextBox"));
        assert!(p.contains("Sharing"));

        p.reload(&db, "");
        assert!(p.contains("TextBox"));
    }
}

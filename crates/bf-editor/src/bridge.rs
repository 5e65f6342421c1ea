//! Cross-editor sync bridge: designer → block editor.
//!
//! The bridge holds a command/query handle to the paired block editor and
//! forwards tree changes into its component catalog, so blocks referring to
//! a component stay resolvable after adds, renames and deletes. It also
//! gathers the block fragments owned by copied components and re-targets
//! pasted fragments through the paste's substitution map.
//!
//! Block fragments are opaque XML to everything but two reference forms,
//! which are rewritten in a single pass:
//!
//! ```text
//! <mutation component_type="Button" instance_name="Button1" .../>
//! <field name="COMPONENT_SELECTOR">Button1</field>
//! ```

use bf_core::{ComponentTree, NodeIndex, SubstitutionMap, TreeEvent};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

/// The block editor's command/query surface.
pub trait BlockEditor {
    fn add_component(&mut self, component_type: &str, name: &str, uuid: &str);
    fn remove_component(&mut self, component_type: &str, name: &str, uuid: &str);
    fn rename_component(&mut self, old_name: &str, new_name: &str, uuid: &str);
    fn component_types_added(&mut self, types: &[String]);
    fn component_types_removed(&mut self, types: &[String]);
    fn property_changed(&mut self, name: &str, property: &str, value: &str);
    /// Top-level block fragments that reference component `name`.
    fn top_blocks_for_component(&self, name: &str) -> Vec<String>;
    /// Insert already re-targeted fragments.
    fn paste_blocks(&mut self, fragments: &[String], substitutions: &SubstitutionMap);
}

// ─── Reference scanning ──────────────────────────────────────────────────

const INSTANCE_ATTR: &str = "instance_name=\"";
const SELECTOR_FIELD: &str = "<field name=\"COMPONENT_SELECTOR\">";

/// Rewrite every component reference in `fragment` through `map`, leaving
/// the rest of the text untouched.
fn map_references(fragment: &str, mut map: impl FnMut(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut rest = fragment;
    loop {
        let attr = rest.find(INSTANCE_ATTR).map(|i| (i, INSTANCE_ATTR, '"'));
        let field = rest.find(SELECTOR_FIELD).map(|i| (i, SELECTOR_FIELD, '<'));
        let next = match (attr, field) {
            (Some(a), Some(f)) => Some(if a.0 <= f.0 { a } else { f }),
            (a, f) => a.or(f),
        };
        let Some((at, marker, terminator)) = next else {
            out.push_str(rest);
            return out;
        };
        let value_start = at + marker.len();
        out.push_str(&rest[..value_start]);
        rest = &rest[value_start..];
        let Some(end) = rest.find(terminator) else {
            out.push_str(rest);
            return out;
        };
        let name = &rest[..end];
        match map(name) {
            Some(replacement) => out.push_str(&replacement),
            None => out.push_str(name),
        }
        rest = &rest[end..];
    }
}

/// Component names referenced by a block fragment, in order of appearance.
pub fn referenced_components(fragment: &str) -> Vec<String> {
    let mut names = Vec::new();
    map_references(fragment, |name| {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
        None
    });
    names
}

/// Re-target component references after a renaming paste.
pub fn rewrite_references(fragment: &str, substitutions: &SubstitutionMap) -> String {
    if substitutions.is_empty() {
        return fragment.to_string();
    }
    map_references(fragment, |name| substitutions.get(name).map(str::to_string))
}

// ─── Bridge ──────────────────────────────────────────────────────────────

pub struct SyncBridge {
    editor: Box<dyn BlockEditor>,
}

impl SyncBridge {
    pub fn new(editor: Box<dyn BlockEditor>) -> Self {
        Self { editor }
    }

    pub fn editor(&self) -> &dyn BlockEditor {
        self.editor.as_ref()
    }

    /// Register every component of a freshly loaded tree.
    pub fn push_catalog(&mut self, tree: &ComponentTree) {
        for (_, component) in tree.iter() {
            self.editor.add_component(
                component.component_type(),
                component.name.as_str(),
                component.uuid.as_str(),
            );
        }
    }

    /// Forward one tree change. Detach-for-move is not a catalog change.
    pub fn forward(&mut self, event: &TreeEvent) {
        match event {
            TreeEvent::Added {
                name,
                component_type,
                uuid,
                ..
            } => self
                .editor
                .add_component(component_type, name.as_str(), uuid.as_str()),
            TreeEvent::Removed {
                name,
                component_type,
                uuid,
                permanent: true,
            } => self
                .editor
                .remove_component(component_type, name.as_str(), uuid.as_str()),
            TreeEvent::Removed { .. } => {}
            TreeEvent::Renamed {
                old_name,
                new_name,
                uuid,
                ..
            } => self
                .editor
                .rename_component(old_name.as_str(), new_name.as_str(), uuid.as_str()),
            TreeEvent::PropertyChanged {
                name,
                property,
                value,
                ..
            } => self.editor.property_changed(name.as_str(), property, value),
        }
    }

    pub fn component_types_added(&mut self, types: &[String]) {
        if !types.is_empty() {
            self.editor.component_types_added(types);
        }
    }

    pub fn component_types_removed(&mut self, types: &[String]) {
        if !types.is_empty() {
            self.editor.component_types_removed(types);
        }
    }

    /// Block fragments owned by the given components and their descendants,
    /// each fragment once.
    pub fn collect_blocks(&self, tree: &ComponentTree, roots: &[NodeIndex]) -> Vec<String> {
        let mut fragments: Vec<String> = Vec::new();
        for &root in roots {
            for idx in tree.descendants(root) {
                let name = tree.graph[idx].name;
                for fragment in self.editor.top_blocks_for_component(name.as_str()) {
                    if !fragments.contains(&fragment) {
                        fragments.push(fragment);
                    }
                }
            }
        }
        fragments
    }

    /// Re-target pasted fragments and hand them to the block editor.
    pub fn paste_blocks(&mut self, fragments: &[String], substitutions: &SubstitutionMap) -> usize {
        if fragments.is_empty() {
            return 0;
        }
        let rewritten: Vec<String> = fragments
            .iter()
            .map(|f| rewrite_references(f, substitutions))
            .collect();
        self.editor.paste_blocks(&rewritten, substitutions);
        rewritten.len()
    }
}

// ─── In-memory block editor ──────────────────────────────────────────────

/// Catalog entry: component type and identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub component_type: String,
    pub uuid: String,
}

#[derive(Debug, Default)]
pub struct BlockWorkspace {
    pub catalog: BTreeMap<String, CatalogEntry>,
    pub component_types: BTreeSet<String>,
    pub blocks: Vec<String>,
    pub property_changes: Vec<(String, String, String)>,
}

/// A block editor that keeps its workspace in memory. Clones share the
/// workspace, so a test can inspect what the designer pushed.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlockEditor {
    workspace: Rc<RefCell<BlockWorkspace>>,
}

impl MemoryBlockEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_block(&self, fragment: &str) {
        self.workspace.borrow_mut().blocks.push(fragment.to_string());
    }

    pub fn blocks(&self) -> Vec<String> {
        self.workspace.borrow().blocks.clone()
    }

    pub fn catalog(&self) -> BTreeMap<String, CatalogEntry> {
        self.workspace.borrow().catalog.clone()
    }

    pub fn component_types(&self) -> BTreeSet<String> {
        self.workspace.borrow().component_types.clone()
    }

    pub fn property_changes(&self) -> Vec<(String, String, String)> {
        self.workspace.borrow().property_changes.clone()
    }
}

impl BlockEditor for MemoryBlockEditor {
    fn add_component(&mut self, component_type: &str, name: &str, uuid: &str) {
        let mut ws = self.workspace.borrow_mut();
        ws.component_types.insert(component_type.to_string());
        ws.catalog.insert(
            name.to_string(),
            CatalogEntry {
                component_type: component_type.to_string(),
                uuid: uuid.to_string(),
            },
        );
    }

    fn remove_component(&mut self, _component_type: &str, name: &str, _uuid: &str) {
        let mut ws = self.workspace.borrow_mut();
        ws.catalog.remove(name);
        // Blocks of a deleted component go with it.
        ws.blocks
            .retain(|b| !referenced_components(b).iter().any(|n| n == name));
    }

    fn rename_component(&mut self, old_name: &str, new_name: &str, _uuid: &str) {
        let mut ws = self.workspace.borrow_mut();
        if let Some(entry) = ws.catalog.remove(old_name) {
            ws.catalog.insert(new_name.to_string(), entry);
        }
        let mut map = SubstitutionMap::new();
        map.insert(old_name, new_name);
        for block in ws.blocks.iter_mut() {
            *block = rewrite_references(block, &map);
        }
    }

    fn component_types_added(&mut self, types: &[String]) {
        self.workspace
            .borrow_mut()
            .component_types
            .extend(types.iter().cloned());
    }

    fn component_types_removed(&mut self, types: &[String]) {
        let mut ws = self.workspace.borrow_mut();
        for t in types {
            ws.component_types.remove(t);
        }
    }

    fn property_changed(&mut self, name: &str, property: &str, value: &str) {
        self.workspace.borrow_mut().property_changes.push((
            name.to_string(),
            property.to_string(),
            value.to_string(),
        ));
    }

    fn top_blocks_for_component(&self, name: &str) -> Vec<String> {
        self.workspace
            .borrow()
            .blocks
            .iter()
            .filter(|b| referenced_components(b).iter().any(|n| n == name))
            .cloned()
            .collect()
    }

    fn paste_blocks(&mut self, fragments: &[String], _substitutions: &SubstitutionMap) {
        self.workspace
            .borrow_mut()
            .blocks
            .extend(fragments.iter().cloned());
    }
}

//! Output sinks the designer pushes views into: the property panel and the
//! source-structure tree. Both are injected at construction.

use bf_core::properties::merge_properties;
use bf_core::{ComponentTree, MergedProperty, NodeIndex};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

/// What the property panel shows for the current selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelView {
    /// Selected component names, in selection order.
    pub components: Vec<String>,
    /// One property when a single component is selected; the `(name, type)`
    /// intersection when several are.
    pub properties: Vec<MergedProperty>,
}

impl PanelView {
    pub fn build(tree: &ComponentTree, selection: &[NodeIndex]) -> Self {
        let selected: Vec<_> = selection.iter().filter_map(|&idx| tree.get(idx)).collect();
        Self {
            components: selected.iter().map(|c| c.name.to_string()).collect(),
            properties: merge_properties(selected.iter().map(|c| &c.properties)),
        }
    }

    pub fn property(&self, name: &str) -> Option<&MergedProperty> {
        self.properties.iter().find(|p| p.definition.name == name)
    }
}

pub trait PropertyPanelSink {
    fn show(&mut self, view: &PanelView);
    fn clear(&mut self);
}

/// One node of the source-structure tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureNode {
    pub name: String,
    pub component_type: String,
    pub visible: bool,
    /// The last selected component is highlighted.
    pub selected: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<StructureNode>,
}

impl StructureNode {
    pub fn build(tree: &ComponentTree, highlighted: Option<NodeIndex>) -> Self {
        Self::build_at(tree, tree.root, highlighted)
    }

    fn build_at(tree: &ComponentTree, idx: NodeIndex, highlighted: Option<NodeIndex>) -> Self {
        let component = &tree.graph[idx];
        Self {
            name: component.name.to_string(),
            component_type: component.component_type().to_string(),
            visible: component.is_visible(),
            selected: highlighted == Some(idx),
            children: tree
                .children(idx)
                .iter()
                .map(|&child| Self::build_at(tree, child, highlighted))
                .collect(),
        }
    }

    /// Depth-first search by name.
    pub fn find(&self, name: &str) -> Option<&StructureNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }
}

pub trait SourceStructureSink {
    fn show(&mut self, root: &StructureNode);
    fn clear(&mut self);
}

// ─── Recording sinks ─────────────────────────────────────────────────────

/// Keeps the last pushed panel view. Clones share state, so a host can keep
/// one handle while the designer owns another.
#[derive(Debug, Clone, Default)]
pub struct PanelRecorder {
    state: Rc<RefCell<Option<PanelView>>>,
}

impl PanelRecorder {
    pub fn current(&self) -> Option<PanelView> {
        self.state.borrow().clone()
    }
}

impl PropertyPanelSink for PanelRecorder {
    fn show(&mut self, view: &PanelView) {
        *self.state.borrow_mut() = Some(view.clone());
    }

    fn clear(&mut self) {
        *self.state.borrow_mut() = None;
    }
}

/// Keeps the last pushed structure tree and counts pushes.
#[derive(Debug, Clone, Default)]
pub struct StructureRecorder {
    state: Rc<RefCell<(Option<StructureNode>, usize)>>,
}

impl StructureRecorder {
    pub fn current(&self) -> Option<StructureNode> {
        self.state.borrow().0.clone()
    }

    pub fn pushes(&self) -> usize {
        self.state.borrow().1
    }
}

impl SourceStructureSink for StructureRecorder {
    fn show(&mut self, root: &StructureNode) {
        let mut state = self.state.borrow_mut();
        state.0 = Some(root.clone());
        state.1 += 1;
    }

    fn clear(&mut self) {
        self.state.borrow_mut().0 = None;
    }
}

//! Component tree model for one screen document.
//!
//! The document is a tree held in a `StableDiGraph`: nodes are component
//! instances, edges are parent→child containment. Indices stay valid across
//! deletes, and an explicit per-parent child order preserves the designer's
//! ordering. A name index keeps every component name unique across the
//! whole document.
//!
//! All mutations validate first and apply second, so a failing call leaves
//! the tree unchanged. Each successful mutation emits [`TreeEvent`]s to the
//! registered subscribers and appends them to a journal the owner drains.

use crate::error::ModelError;
use crate::events::{Listener, Subscribers, TreeEvent, TreeEventKind};
use crate::id::{ComponentName, ComponentUuid};
use crate::properties::PropertyStore;
use crate::types::ComponentTypeInfo;
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

// ─── Instances ───────────────────────────────────────────────────────────

/// One node (widget or service) of the component tree.
#[derive(Debug, Clone)]
pub struct ComponentInstance {
    pub uuid: ComponentUuid,
    pub name: ComponentName,
    /// Registry entry this instance was built from.
    pub info: Arc<ComponentTypeInfo>,
    /// Schema version the property values conform to.
    pub version: u32,
    pub properties: PropertyStore,
}

impl ComponentInstance {
    /// A fresh instance with default property values and a new UUID.
    pub fn new(info: Arc<ComponentTypeInfo>, name: &str) -> Self {
        Self {
            uuid: ComponentUuid::generate(),
            name: ComponentName::intern(name),
            version: info.version,
            properties: PropertyStore::from_definitions(&info.properties),
            info,
        }
    }

    pub fn component_type(&self) -> &str {
        &self.info.name
    }

    pub fn is_visible(&self) -> bool {
        self.info.is_visible()
    }

    pub fn is_container(&self) -> bool {
        self.info.is_container()
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.value(name)
    }

    /// Rebind to a newer type definition. Values for properties the new
    /// definition still declares are carried over; the rest are returned.
    pub fn reconfigure(
        &mut self,
        info: Arc<ComponentTypeInfo>,
        values: &[(String, String)],
    ) -> Vec<String> {
        let mut store = PropertyStore::from_definitions(&info.properties);
        let mut dropped = Vec::new();
        for (key, value) in values {
            if store.set(&info.name, key, value).is_err() {
                dropped.push(key.clone());
            }
        }
        self.version = info.version;
        self.info = info;
        self.properties = store;
        dropped
    }
}

/// A subtree taken out of the document, ready to be attached elsewhere.
#[derive(Debug, Clone)]
pub struct DetachedComponent {
    pub instance: ComponentInstance,
    pub children: Vec<DetachedComponent>,
}

impl DetachedComponent {
    pub fn leaf(instance: ComponentInstance) -> Self {
        Self {
            instance,
            children: Vec::new(),
        }
    }

    /// Every name in the subtree, parent first.
    pub fn names(&self) -> Vec<ComponentName> {
        let mut out = vec![self.instance.name];
        for child in &self.children {
            out.extend(child.names());
        }
        out
    }
}

// ─── Tree ────────────────────────────────────────────────────────────────

pub struct ComponentTree {
    /// The underlying directed graph.
    pub graph: StableDiGraph<ComponentInstance, ()>,

    /// The root (screen) node.
    pub root: NodeIndex,

    /// Name → node, covering every instance including the root.
    name_index: HashMap<ComponentName, NodeIndex>,

    /// Children of each container in designer order.
    child_order: HashMap<NodeIndex, Vec<NodeIndex>>,

    subscribers: Subscribers,

    /// Events not yet drained by the owner.
    journal: Vec<TreeEvent>,
}

impl std::fmt::Debug for ComponentTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentTree")
            .field("root", &self.graph[self.root].name)
            .field("components", &self.len())
            .finish()
    }
}

impl ComponentTree {
    /// Create a tree holding only `root`.
    pub fn new(root: ComponentInstance) -> Self {
        let mut graph = StableDiGraph::new();
        let name = root.name;
        let root = graph.add_node(root);
        let mut name_index = HashMap::new();
        name_index.insert(name, root);
        Self {
            graph,
            root,
            name_index,
            child_order: HashMap::new(),
            subscribers: Subscribers::default(),
            journal: Vec::new(),
        }
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn root_instance(&self) -> &ComponentInstance {
        &self.graph[self.root]
    }

    pub fn root_type(&self) -> &str {
        self.root_instance().component_type()
    }

    pub fn get(&self, idx: NodeIndex) -> Option<&ComponentInstance> {
        self.graph.node_weight(idx)
    }

    fn instance(&self, idx: NodeIndex) -> Result<&ComponentInstance, ModelError> {
        self.graph
            .node_weight(idx)
            .ok_or_else(|| ModelError::NoSuchComponent(format!("{idx:?}")))
    }

    pub fn index_of(&self, name: &str) -> Option<NodeIndex> {
        ComponentName::lookup(name).and_then(|key| self.name_index.get(&key).copied())
    }

    pub fn get_by_name(&self, name: &str) -> Option<&ComponentInstance> {
        self.index_of(name).map(|idx| &self.graph[idx])
    }

    pub fn index_of_uuid(&self, uuid: &ComponentUuid) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|&idx| self.graph[idx].uuid == *uuid)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .next()
    }

    /// Children in designer order.
    pub fn children(&self, idx: NodeIndex) -> &[NodeIndex] {
        self.child_order.get(&idx).map_or(&[], Vec::as_slice)
    }

    pub fn visible_children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.children(idx)
            .iter()
            .copied()
            .filter(|&c| self.graph[c].is_visible())
            .collect()
    }

    /// Position of `idx` among its parent's children.
    pub fn position(&self, idx: NodeIndex) -> Option<usize> {
        let parent = self.parent(idx)?;
        self.children(parent).iter().position(|&c| c == idx)
    }

    /// `idx` and all its descendants, depth-first, parent before children.
    pub fn descendants(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let mut stack = vec![idx];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    /// Every instance, depth-first from the root.
    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &ComponentInstance)> {
        self.descendants(self.root)
            .into_iter()
            .map(move |idx| (idx, &self.graph[idx]))
    }

    pub fn names(&self) -> Vec<String> {
        self.iter().map(|(_, c)| c.name.as_str().to_string()).collect()
    }

    /// Whether `ancestor` is `idx` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: NodeIndex, idx: NodeIndex) -> bool {
        let mut cursor = Some(idx);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    // ─── Naming ──────────────────────────────────────────────────────────

    /// Default name for a new instance: `<Type><N>` with the smallest free N.
    pub fn generate_name(&self, type_name: &str) -> String {
        (1..)
            .map(|n| format!("{type_name}{n}"))
            .find(|candidate| !self.contains_name(candidate))
            .unwrap_or_else(|| type_name.to_string())
    }

    /// Collision-free variant of `name` for pasted components:
    /// `<name>_<n>` with the smallest n ≥ 2 neither in the document nor in
    /// `reserved`.
    pub fn gensym_name(&self, name: &str, reserved: &HashSet<String>) -> String {
        (2..)
            .map(|n| format!("{name}_{n}"))
            .find(|candidate| !self.contains_name(candidate) && !reserved.contains(candidate))
            .unwrap_or_else(|| name.to_string())
    }

    // ─── Validation ──────────────────────────────────────────────────────

    /// Check that `child` may be attached under `parent` with the given names.
    pub fn check_insert(
        &self,
        parent: NodeIndex,
        child: &ComponentTypeInfo,
        names: &[ComponentName],
    ) -> Result<(), ModelError> {
        let parent_instance = self.instance(parent)?;
        if child.name == self.root_type() || !parent_instance.info.accepts(child) {
            return Err(ModelError::InvalidContainment {
                parent: parent_instance.name.to_string(),
                parent_type: parent_instance.component_type().to_string(),
                child_type: child.name.clone(),
            });
        }
        let mut seen = HashSet::new();
        for name in names {
            if self.name_index.contains_key(name) || !seen.insert(*name) {
                return Err(ModelError::NameCollision(name.to_string()));
            }
        }
        Ok(())
    }

    // ─── Mutations ───────────────────────────────────────────────────────

    /// Attach a new instance under `parent` at `index` (appended when `None`
    /// or past the end).
    pub fn add_child(
        &mut self,
        parent: NodeIndex,
        child: ComponentInstance,
        index: Option<usize>,
    ) -> Result<NodeIndex, ModelError> {
        self.attach(parent, DetachedComponent::leaf(child), index)
    }

    /// Attach a whole subtree under `parent`. Every name in the subtree must
    /// be free.
    pub fn attach(
        &mut self,
        parent: NodeIndex,
        subtree: DetachedComponent,
        index: Option<usize>,
    ) -> Result<NodeIndex, ModelError> {
        self.check_insert(parent, &subtree.instance.info, &subtree.names())?;
        let idx = self.insert_subtree(parent, subtree, index);
        for added in self.descendants(idx) {
            let c = &self.graph[added];
            let event = TreeEvent::Added {
                index: added,
                name: c.name,
                component_type: c.component_type().to_string(),
                uuid: c.uuid.clone(),
            };
            self.emit(event);
        }
        Ok(idx)
    }

    fn insert_subtree(
        &mut self,
        parent: NodeIndex,
        subtree: DetachedComponent,
        index: Option<usize>,
    ) -> NodeIndex {
        let DetachedComponent { instance, children } = subtree;
        let name = instance.name;
        let idx = self.graph.add_node(instance);
        self.graph.add_edge(parent, idx, ());
        self.name_index.insert(name, idx);
        let order = self.child_order.entry(parent).or_default();
        let at = index.map_or(order.len(), |i| i.min(order.len()));
        order.insert(at, idx);
        for child in children {
            self.insert_subtree(idx, child, None);
        }
        idx
    }

    /// Remove `child` (and its subtree) from `parent`.
    ///
    /// `permanent` distinguishes deletion from detaching for a move; both
    /// emit `Removed` for every instance of the subtree, children first.
    pub fn remove_child(
        &mut self,
        parent: NodeIndex,
        child: NodeIndex,
        permanent: bool,
    ) -> Result<DetachedComponent, ModelError> {
        let parent_instance = self.instance(parent)?;
        if self.parent(child) != Some(parent) {
            let child_name = self
                .get(child)
                .map_or_else(|| format!("{child:?}"), |c| c.name.to_string());
            return Err(ModelError::NotFound {
                parent: parent_instance.name.to_string(),
                child: child_name,
            });
        }

        let removed: Vec<TreeEvent> = self
            .descendants(child)
            .into_iter()
            .rev()
            .map(|idx| {
                let c = &self.graph[idx];
                TreeEvent::Removed {
                    name: c.name,
                    component_type: c.component_type().to_string(),
                    uuid: c.uuid.clone(),
                    permanent,
                }
            })
            .collect();

        if let Some(order) = self.child_order.get_mut(&parent) {
            order.retain(|&c| c != child);
        }
        let subtree = self
            .take_subtree(child)
            .ok_or_else(|| ModelError::NoSuchComponent(format!("{child:?}")))?;

        for event in removed {
            self.emit(event);
        }
        Ok(subtree)
    }

    fn take_subtree(&mut self, idx: NodeIndex) -> Option<DetachedComponent> {
        let child_indices = self.child_order.remove(&idx).unwrap_or_default();
        let children = child_indices
            .into_iter()
            .filter_map(|c| self.take_subtree(c))
            .collect();
        let instance = self.graph.remove_node(idx)?;
        self.name_index.remove(&instance.name);
        Some(DetachedComponent { instance, children })
    }

    /// Move `child` under `new_parent` at `index` (position counted after the
    /// child has left its old place). Node indices are preserved.
    pub fn move_child(
        &mut self,
        child: NodeIndex,
        new_parent: NodeIndex,
        index: Option<usize>,
    ) -> Result<(), ModelError> {
        let old_parent = self.parent(child).ok_or(ModelError::RootImmovable)?;
        let target = self.instance(new_parent)?;
        let moving = self.instance(child)?;
        if self.is_ancestor_or_self(child, new_parent) || !target.info.accepts(&moving.info) {
            return Err(ModelError::InvalidContainment {
                parent: target.name.to_string(),
                parent_type: target.component_type().to_string(),
                child_type: moving.component_type().to_string(),
            });
        }

        if let Some(edge) = self.graph.find_edge(old_parent, child) {
            self.graph.remove_edge(edge);
        }
        if let Some(order) = self.child_order.get_mut(&old_parent) {
            order.retain(|&c| c != child);
        }
        self.graph.add_edge(new_parent, child, ());
        let order = self.child_order.entry(new_parent).or_default();
        let at = index.map_or(order.len(), |i| i.min(order.len()));
        order.insert(at, child);

        let c = &self.graph[child];
        let (name, component_type, uuid) = (c.name, c.component_type().to_string(), c.uuid.clone());
        self.emit(TreeEvent::Removed {
            name,
            component_type: component_type.clone(),
            uuid: uuid.clone(),
            permanent: false,
        });
        self.emit(TreeEvent::Added {
            index: child,
            name,
            component_type,
            uuid,
        });
        Ok(())
    }

    /// Rename an instance. Renaming to the current name is a no-op.
    pub fn rename(&mut self, idx: NodeIndex, new_name: &str) -> Result<(), ModelError> {
        let instance = self.instance(idx)?;
        let old_name = instance.name;
        if old_name.as_str() == new_name {
            return Ok(());
        }
        if !ComponentName::is_valid(new_name) {
            return Err(ModelError::InvalidName(new_name.to_string()));
        }
        let new = ComponentName::intern(new_name);
        if self.name_index.contains_key(&new) {
            return Err(ModelError::NameCollision(new_name.to_string()));
        }

        self.name_index.remove(&old_name);
        self.name_index.insert(new, idx);
        let instance = &mut self.graph[idx];
        instance.name = new;
        let event = TreeEvent::Renamed {
            index: idx,
            old_name,
            new_name: new,
            component_type: instance.component_type().to_string(),
            uuid: instance.uuid.clone(),
        };
        self.emit(event);
        Ok(())
    }

    /// Assign a property value. Returns whether the value changed; only a
    /// change emits `PropertyChanged`.
    pub fn set_property(
        &mut self,
        idx: NodeIndex,
        property: &str,
        value: &str,
    ) -> Result<bool, ModelError> {
        self.instance(idx)?;
        let instance = &mut self.graph[idx];
        let component_type = instance.info.name.clone();
        let previous = instance.properties.set(&component_type, property, value)?;
        if previous == value {
            return Ok(false);
        }
        let event = TreeEvent::PropertyChanged {
            index: idx,
            name: instance.name,
            property: property.to_string(),
            value: value.to_string(),
        };
        self.emit(event);
        Ok(true)
    }

    /// Rebind an instance to a newer type definition (extension upgrade).
    /// Returns the property keys the new definition no longer declares.
    pub fn reconfigure(
        &mut self,
        idx: NodeIndex,
        info: Arc<ComponentTypeInfo>,
        values: &[(String, String)],
    ) -> Result<Vec<String>, ModelError> {
        self.instance(idx)?;
        Ok(self.graph[idx].reconfigure(info, values))
    }

    // ─── Events ──────────────────────────────────────────────────────────

    pub fn subscribe(&mut self, kind: TreeEventKind, listener: Listener) {
        self.subscribers.subscribe(kind, listener);
    }

    /// Drain events emitted since the last call.
    pub fn take_events(&mut self) -> Vec<TreeEvent> {
        std::mem::take(&mut self.journal)
    }

    fn emit(&mut self, event: TreeEvent) {
        self.subscribers.emit(&event);
        self.journal.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ComponentDatabase, ComponentFactory};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn screen() -> (ComponentDatabase, ComponentTree) {
        let db = ComponentDatabase::builtin();
        let root = db.create_component("Form", "Screen1").unwrap();
        (db, ComponentTree::new(root))
    }

    fn add(db: &ComponentDatabase, tree: &mut ComponentTree, parent: NodeIndex, ty: &str, name: &str) -> NodeIndex {
        let c = db.create_component(ty, name).unwrap();
        tree.add_child(parent, c, None).unwrap()
    }

    #[test]
    fn add_child_keeps_order_and_index() {
        let (db, mut tree) = screen();
        let root = tree.root;
        let b1 = add(&db, &mut tree, root, "Button", "Button1");
        let b2 = add(&db, &mut tree, root, "Button", "Button2");
        let l1 = db.create_component("Label", "Label1").unwrap();
        let l1 = tree.add_child(root, l1, Some(1)).unwrap();
        assert_eq!(tree.children(root), &[b1, l1, b2]);
        assert_eq!(tree.index_of("Label1"), Some(l1));
        assert_eq!(tree.position(b2), Some(2));
    }

    #[test]
    fn name_lookups_do_not_grow_the_interner() {
        let (db, mut tree) = screen();
        let root = tree.root;
        add(&db, &mut tree, root, "Button", "LookupButton1");
        let reserved = HashSet::new();
        assert_eq!(tree.gensym_name("LookupButton1", &reserved), "LookupButton1_2");
        assert!(!tree.contains_name("Unused_Lookup_Name9"));
        assert!(ComponentName::lookup("LookupButton1_2").is_none());
        assert!(ComponentName::lookup("Unused_Lookup_Name9").is_none());
    }

    #[test]
    fn add_child_rejects_bad_containment_without_change() {
        let (db, mut tree) = screen();
        let root = tree.root;
        let row = add(&db, &mut tree, root, "HorizontalArrangement", "HorizontalArrangement1");
        tree.take_events();

        let clock = db.create_component("Clock", "Clock1").unwrap();
        let err = tree.add_child(row, clock, None).unwrap_err();
        assert!(matches!(err, ModelError::InvalidContainment { .. }));
        assert!(!tree.contains_name("Clock1"));
        assert!(tree.take_events().is_empty());

        let form = db.create_component("Form", "Screen2").unwrap();
        assert!(matches!(
            tree.add_child(root, form, None),
            Err(ModelError::InvalidContainment { .. })
        ));
    }

    #[test]
    fn add_child_rejects_name_collision() {
        let (db, mut tree) = screen();
        let root = tree.root;
        add(&db, &mut tree, root, "Button", "Button1");
        let dup = db.create_component("Label", "Button1").unwrap();
        assert_eq!(
            tree.add_child(root, dup, None).unwrap_err(),
            ModelError::NameCollision("Button1".into())
        );
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn rename_is_idempotent_and_detects_collisions() {
        let (db, mut tree) = screen();
        let root = tree.root;
        let b1 = add(&db, &mut tree, root, "Button", "Button1");
        add(&db, &mut tree, root, "Button", "Button2");
        tree.take_events();

        tree.rename(b1, "Button1").unwrap();
        assert!(tree.take_events().is_empty(), "same-name rename emits nothing");

        assert_eq!(
            tree.rename(b1, "Button2").unwrap_err(),
            ModelError::NameCollision("Button2".into())
        );
        assert_eq!(tree.graph[b1].name.as_str(), "Button1");

        tree.rename(b1, "OkButton").unwrap();
        assert_eq!(tree.index_of("OkButton"), Some(b1));
        assert!(!tree.contains_name("Button1"));
        assert!(matches!(tree.take_events().as_slice(), [TreeEvent::Renamed { .. }]));
    }

    #[test]
    fn remove_child_requires_direct_parent() {
        let (db, mut tree) = screen();
        let root = tree.root;
        let row = add(&db, &mut tree, root, "HorizontalArrangement", "HorizontalArrangement1");
        let b1 = add(&db, &mut tree, row, "Button", "Button1");

        let err = tree.remove_child(root, b1, true).unwrap_err();
        assert!(matches!(err, ModelError::NotFound { .. }));
        assert!(tree.contains_name("Button1"));
    }

    #[test]
    fn remove_container_removes_subtree_children_first() {
        let (db, mut tree) = screen();
        let root = tree.root;
        let row = add(&db, &mut tree, root, "HorizontalArrangement", "HorizontalArrangement1");
        add(&db, &mut tree, row, "Button", "Button1");
        tree.take_events();

        let detached = tree.remove_child(root, row, true).unwrap();
        assert_eq!(detached.children.len(), 1);
        assert_eq!(tree.len(), 1);
        assert!(!tree.contains_name("Button1"));

        let removed: Vec<String> = tree
            .take_events()
            .into_iter()
            .map(|e| match e {
                TreeEvent::Removed { name, permanent, .. } => {
                    assert!(permanent);
                    name.to_string()
                }
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(removed, vec!["Button1", "HorizontalArrangement1"]);
    }

    #[test]
    fn detached_subtree_can_be_reattached() {
        let (db, mut tree) = screen();
        let root = tree.root;
        let row = add(&db, &mut tree, root, "HorizontalArrangement", "HorizontalArrangement1");
        add(&db, &mut tree, row, "Button", "Button1");
        let detached = tree.remove_child(root, row, false).unwrap();
        let row = tree.attach(root, detached, None).unwrap();
        assert_eq!(tree.children(row).len(), 1);
        assert!(tree.contains_name("Button1"));
    }

    #[test]
    fn move_child_keeps_index_and_rejects_cycles() {
        let (db, mut tree) = screen();
        let root = tree.root;
        let outer = add(&db, &mut tree, root, "VerticalArrangement", "VerticalArrangement1");
        let inner = add(&db, &mut tree, outer, "HorizontalArrangement", "HorizontalArrangement1");
        let b1 = add(&db, &mut tree, root, "Button", "Button1");

        tree.move_child(b1, inner, None).unwrap();
        assert_eq!(tree.parent(b1), Some(inner));
        assert_eq!(tree.graph[b1].name.as_str(), "Button1");

        assert!(matches!(
            tree.move_child(outer, inner, None),
            Err(ModelError::InvalidContainment { .. })
        ));
        assert_eq!(tree.move_child(root, outer, None), Err(ModelError::RootImmovable));
    }

    #[test]
    fn set_property_notifies_subscribers_synchronously() {
        let (db, mut tree) = screen();
        let root = tree.root;
        let b1 = add(&db, &mut tree, root, "Button", "Button1");

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        tree.subscribe(
            TreeEventKind::PropertyChanged,
            Box::new(move |e| sink.borrow_mut().push(e.clone())),
        );

        assert!(tree.set_property(b1, "Text", "OK").unwrap());
        assert_eq!(seen.borrow().len(), 1);
        assert!(!tree.set_property(b1, "Text", "OK").unwrap(), "unchanged value");
        assert_eq!(seen.borrow().len(), 1);

        let err = tree.set_property(b1, "Colour", "red").unwrap_err();
        assert!(matches!(err, ModelError::UnknownProperty { .. }));
    }

    #[test]
    fn generated_names_fill_gaps() {
        let (db, mut tree) = screen();
        let root = tree.root;
        add(&db, &mut tree, root, "Button", "Button1");
        add(&db, &mut tree, root, "Button", "Button3");
        assert_eq!(tree.generate_name("Button"), "Button2");

        let mut reserved = HashSet::new();
        assert_eq!(tree.gensym_name("Button1", &reserved), "Button1_2");
        reserved.insert("Button1_2".to_string());
        assert_eq!(tree.gensym_name("Button1", &reserved), "Button1_3");
    }
}

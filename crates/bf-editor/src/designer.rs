//! Designer controller: owns one screen document and keeps the property
//! panel, the source-structure view and the paired block editor in step
//! with it.
//!
//! Lifecycle:
//!
//! ```text
//! Unloaded ─begin_load─▶ Loading ─complete_load─▶ Loaded ⇄ Modified ─unload─▶ Unloaded
//!                               └─(upgraded)─▶ Upgrading ─complete_save─▶ Loaded
//! ```
//!
//! Every edit goes through the tree, whose change journal is drained after
//! the edit and fed to the `on_*` handlers. Handlers forward to the sync
//! bridge, refresh the sinks and schedule a coalesced auto-save.

use crate::bridge::{BlockEditor, SyncBridge};
use crate::clipboard::ClipboardPayload;
use crate::config::DesignerConfig;
use crate::error::DesignerError;
use crate::service::{ChecksumedLoadFile, ProjectId, ProjectService, Revision, ServiceRequest};
use crate::sinks::{PanelView, PropertyPanelSink, SourceStructureSink, StructureNode};
use bf_core::codec::{component_value, decode_components, decode_encoded, encode_document};
use bf_core::source::{EncodedDocument, unwrap_envelope};
use bf_core::upgrade::{PropertyMap, UpgradeReport, apply_provenance};
use bf_core::{
    CodecError, ComponentDatabase, ComponentFactory, ComponentInstance, ComponentTree,
    ComponentTypeInfo, ComponentUuid, Document, ModelError, NodeIndex, SchemaUpgrader,
    SubstitutionMap, TreeEvent, TreeEventKind,
};
use serde::Serialize;
use serde_json::Value;
use smallvec::{SmallVec, smallvec};
use std::sync::Arc;

/// Root property holding the blocks-toolkit subset JSON.
pub const BLOCK_SUBSET_PROPERTY: &str = "BlockSubset";

/// Ordered, non-empty once a document is loaded.
pub type Selection = SmallVec<[NodeIndex; 4]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DesignerState {
    Unloaded,
    Loading,
    /// Loaded and upgraded; the upgraded text is being saved.
    Upgrading,
    Loaded,
    /// Loaded with edits not yet saved.
    Modified,
}

impl DesignerState {
    pub fn is_loaded(self) -> bool {
        matches!(self, DesignerState::Loaded | DesignerState::Modified)
    }
}

/// Recorded when a file cannot be opened because it is damaged or needs a
/// component type that is not installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptProject {
    pub project_id: ProjectId,
    pub file_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingSave {
    Upgrade,
    /// Carries the edit generation the saved text was encoded at.
    Auto { generation: u64 },
}

pub struct Designer {
    config: DesignerConfig,
    db: ComponentDatabase,
    upgrader: SchemaUpgrader,
    bridge: SyncBridge,
    panel: Box<dyn PropertyPanelSink>,
    structure: Box<dyn SourceStructureSink>,

    state: DesignerState,
    document: Option<Document>,
    selection: Selection,
    /// Recorded by `copy`; a target deleted since then resolves to the root.
    paste_target: Option<ComponentUuid>,

    /// The document JSON as loaded, before any upgrade.
    pre_upgrade_json: Option<String>,
    corrupt: Option<CorruptProject>,

    /// Request id and kind of the save awaiting its result.
    save_in_flight: Option<(u64, PendingSave)>,
    next_request_id: u64,
    auto_save_scheduled: bool,
    /// Bumped on every edit.
    generation: u64,
    last_save_error: Option<String>,

    /// Subset JSON the palette should be reloaded with.
    palette_reload: Option<String>,
}

impl std::fmt::Debug for Designer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Designer")
            .field("file_id", &self.config.file_id)
            .field("state", &self.state)
            .field("document", &self.document)
            .field("selection", &self.selection)
            .finish()
    }
}

impl Designer {
    pub fn new(
        config: DesignerConfig,
        db: ComponentDatabase,
        upgrader: SchemaUpgrader,
        panel: Box<dyn PropertyPanelSink>,
        structure: Box<dyn SourceStructureSink>,
        editor: Box<dyn BlockEditor>,
    ) -> Self {
        Self {
            config,
            db,
            upgrader,
            bridge: SyncBridge::new(editor),
            panel,
            structure,
            state: DesignerState::Unloaded,
            document: None,
            selection: Selection::new(),
            paste_target: None,
            pre_upgrade_json: None,
            corrupt: None,
            save_in_flight: None,
            next_request_id: 0,
            auto_save_scheduled: false,
            generation: 0,
            last_save_error: None,
            palette_reload: None,
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn state(&self) -> DesignerState {
        self.state
    }

    pub fn config(&self) -> &DesignerConfig {
        &self.config
    }

    pub fn database(&self) -> &ComponentDatabase {
        &self.db
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn tree(&self) -> Option<&ComponentTree> {
        self.document.as_ref().map(|doc| &doc.tree)
    }

    pub fn bridge(&self) -> &SyncBridge {
        &self.bridge
    }

    /// The current source text.
    pub fn encode(&self) -> Option<String> {
        self.document.as_ref().map(encode_document)
    }

    /// The document JSON as it was before the load-time upgrade.
    pub fn pre_upgrade_json(&self) -> Option<&str> {
        self.pre_upgrade_json.as_deref()
    }

    pub fn corrupt_report(&self) -> Option<&CorruptProject> {
        self.corrupt.as_ref()
    }

    pub fn last_save_error(&self) -> Option<&str> {
        self.last_save_error.as_deref()
    }

    pub fn auto_save_scheduled(&self) -> bool {
        self.auto_save_scheduled
    }

    /// Selected component names, in selection order.
    pub fn selection(&self) -> Vec<String> {
        let Some(tree) = self.tree() else {
            return Vec::new();
        };
        self.selection
            .iter()
            .filter_map(|&idx| tree.get(idx))
            .map(|c| c.name.to_string())
            .collect()
    }

    pub fn panel_view(&self) -> PanelView {
        self.tree()
            .map(|tree| PanelView::build(tree, &self.selection))
            .unwrap_or_default()
    }

    /// The subset the palette should be reloaded with, once. Set on load and
    /// whenever the root's `BlockSubset` changes.
    pub fn take_palette_reload(&mut self) -> Option<String> {
        self.palette_reload.take()
    }

    fn set_state(&mut self, state: DesignerState) {
        if self.state != state {
            log::debug!("{}: {:?} -> {:?}", self.config.file_id, self.state, state);
            self.state = state;
        }
    }

    fn loaded_tree(&self, operation: &'static str) -> Result<&ComponentTree, DesignerError> {
        let state = self.state;
        self.document
            .as_ref()
            .filter(|_| state.is_loaded())
            .map(|doc| &doc.tree)
            .ok_or(DesignerError::InvalidState { operation, state })
    }

    fn tree_mut(&mut self, operation: &'static str) -> Result<&mut ComponentTree, DesignerError> {
        let state = self.state;
        self.document
            .as_mut()
            .filter(|_| state.is_loaded())
            .map(|doc| &mut doc.tree)
            .ok_or(DesignerError::InvalidState { operation, state })
    }

    fn index(&self, operation: &'static str, name: &str) -> Result<NodeIndex, DesignerError> {
        self.loaded_tree(operation)?
            .index_of(name)
            .ok_or_else(|| ModelError::NoSuchComponent(name.to_string()).into())
    }

    // ─── Loading ─────────────────────────────────────────────────────────

    /// Start loading the configured file.
    pub fn begin_load(&mut self) -> Result<ServiceRequest, DesignerError> {
        if self.state != DesignerState::Unloaded {
            return Err(DesignerError::InvalidState {
                operation: "load",
                state: self.state,
            });
        }
        self.corrupt = None;
        self.set_state(DesignerState::Loading);
        Ok(ServiceRequest::Load {
            project_id: self.config.project_id,
            file_id: self.config.file_id.clone(),
        })
    }

    /// Deliver the result of a load request.
    ///
    /// When the document had to be upgraded (and the designer is not
    /// read-only) the upgraded text must be saved before editing starts: the
    /// returned save request is that save, and the designer stays in
    /// `Upgrading` until it completes.
    pub fn complete_load(
        &mut self,
        result: Result<ChecksumedLoadFile, String>,
    ) -> Result<Option<ServiceRequest>, DesignerError> {
        match self.state {
            DesignerState::Loading => {}
            DesignerState::Unloaded => {
                log::debug!("discarding result of cancelled load of {}", self.config.file_id);
                return Ok(None);
            }
            state => {
                return Err(DesignerError::InvalidState {
                    operation: "complete_load",
                    state,
                });
            }
        }

        let (document, report) = match self.open(result) {
            Ok(opened) => opened,
            Err(e) => {
                self.set_state(DesignerState::Unloaded);
                if matches!(
                    e,
                    DesignerError::ChecksumedFile { .. } | DesignerError::ComponentNotFound { .. }
                ) {
                    self.report_corrupt(&e);
                }
                return Err(e);
            }
        };

        let root = document.tree.root;
        self.bridge.push_catalog(&document.tree);
        self.palette_reload = Some(
            document
                .tree
                .root_instance()
                .property(BLOCK_SUBSET_PROPERTY)
                .unwrap_or_default()
                .to_string(),
        );
        self.document = Some(document);
        self.selection = smallvec![root];
        self.paste_target = None;
        self.refresh();

        if report.upgraded() && !self.config.read_only {
            log::info!(
                "{} upgraded from format {} ({} component steps), saving",
                self.config.file_id,
                report.loaded_ya_version,
                report.component_steps
            );
            self.set_state(DesignerState::Upgrading);
            return self.save_request(PendingSave::Upgrade).map(Some);
        }
        self.set_state(DesignerState::Loaded);
        Ok(None)
    }

    fn open(
        &mut self,
        result: Result<ChecksumedLoadFile, String>,
    ) -> Result<(Document, UpgradeReport), DesignerError> {
        let file_id = self.config.file_id.clone();
        let file = result.map_err(|message| DesignerError::Load {
            file_id: file_id.clone(),
            message,
        })?;
        let content = file.verified(&file_id)?;

        let mut encoded = EncodedDocument::from_source(&content)?;
        self.pre_upgrade_json = Some(unwrap_envelope(&content)?.trim().to_string());

        let report = self
            .upgrader
            .upgrade_document(&mut encoded, &self.db)
            .map_err(|e| self.missing_type(e.into()))?;
        apply_provenance(&mut encoded.auth_urls, report.loaded_ya_version, &self.config.host);

        let document = decode_encoded(&encoded, &self.config.decode_context(), &self.db)
            .map_err(|e| self.missing_type(e))?;
        Ok((document, report))
    }

    fn missing_type(&self, e: CodecError) -> DesignerError {
        match e.missing_component_type() {
            Some(component_type) => DesignerError::ComponentNotFound {
                component_type: component_type.to_string(),
                file_id: self.config.file_id.clone(),
            },
            None => e.into(),
        }
    }

    fn report_corrupt(&mut self, e: &DesignerError) {
        log::error!("project {} is corrupt: {e}", self.config.project_id);
        self.corrupt = Some(CorruptProject {
            project_id: self.config.project_id,
            file_id: self.config.file_id.clone(),
            reason: e.to_string(),
        });
    }

    /// Drop the document. Cancels a load in flight; refused while an
    /// upgrade is being saved.
    pub fn unload(&mut self) -> Result<(), DesignerError> {
        if self.state == DesignerState::Upgrading {
            return Err(DesignerError::InvalidState {
                operation: "unload",
                state: self.state,
            });
        }
        if self.state == DesignerState::Loading {
            log::debug!("cancelling load of {}", self.config.file_id);
        }
        self.document = None;
        self.selection.clear();
        self.paste_target = None;
        self.save_in_flight = None;
        self.auto_save_scheduled = false;
        self.palette_reload = None;
        self.panel.clear();
        self.structure.clear();
        self.set_state(DesignerState::Unloaded);
        Ok(())
    }

    // ─── Saving ──────────────────────────────────────────────────────────

    fn save_request(&mut self, kind: PendingSave) -> Result<ServiceRequest, DesignerError> {
        if self.save_in_flight.is_some() {
            return Err(DesignerError::RequestInFlight("save"));
        }
        let content = self.encode().ok_or(DesignerError::InvalidState {
            operation: "save",
            state: self.state,
        })?;
        self.next_request_id += 1;
        let request_id = self.next_request_id;
        self.save_in_flight = Some((request_id, kind));
        Ok(ServiceRequest::Save {
            request_id,
            session_id: self.config.session_id.clone(),
            project_id: self.config.project_id,
            file_id: self.config.file_id.clone(),
            content,
        })
    }

    fn schedule_auto_save(&mut self) {
        self.generation += 1;
        if self.state == DesignerState::Loaded {
            self.set_state(DesignerState::Modified);
        }
        if !self.config.read_only {
            self.auto_save_scheduled = true;
        }
    }

    /// The pending auto-save, if one is due. Any number of edits since the
    /// last save produce one request; none is issued while another save is
    /// in flight.
    pub fn take_auto_save_request(&mut self) -> Option<ServiceRequest> {
        if !self.auto_save_scheduled || self.save_in_flight.is_some() || !self.state.is_loaded() {
            return None;
        }
        let request = self
            .save_request(PendingSave::Auto {
                generation: self.generation,
            })
            .ok()?;
        self.auto_save_scheduled = false;
        Some(request)
    }

    /// Request the upgrade save again after a failure.
    pub fn retry_upgrade_save(&mut self) -> Result<ServiceRequest, DesignerError> {
        if self.state != DesignerState::Upgrading {
            return Err(DesignerError::InvalidState {
                operation: "retry_upgrade_save",
                state: self.state,
            });
        }
        self.save_request(PendingSave::Upgrade)
    }

    /// Deliver the result of save request `request_id`. A failure leaves the
    /// document untouched; a failed auto-save stays scheduled and a failed
    /// upgrade save keeps the designer in `Upgrading`. Results for any other
    /// request, such as a save abandoned by `unload`, are ignored.
    pub fn complete_save(
        &mut self,
        request_id: u64,
        result: Result<Revision, String>,
    ) -> Result<(), DesignerError> {
        let pending = match self.save_in_flight {
            None => {
                return Err(DesignerError::InvalidState {
                    operation: "complete_save",
                    state: self.state,
                });
            }
            Some((id, _)) if id != request_id => {
                log::debug!("ignoring result of stale save request {request_id} (awaiting {id})");
                return Ok(());
            }
            Some((_, pending)) => pending,
        };
        self.save_in_flight = None;
        let file_id = self.config.file_id.clone();
        match (pending, result) {
            (PendingSave::Upgrade, Ok(revision)) => {
                log::info!("saved upgraded {file_id} (revision {revision})");
                self.last_save_error = None;
                self.set_state(DesignerState::Loaded);
                Ok(())
            }
            (PendingSave::Auto { generation }, Ok(revision)) => {
                log::info!("saved {file_id} (revision {revision})");
                self.last_save_error = None;
                if generation == self.generation && self.state == DesignerState::Modified {
                    self.set_state(DesignerState::Loaded);
                }
                Ok(())
            }
            (pending, Err(message)) => {
                log::error!("saving {file_id} failed: {message}");
                if matches!(pending, PendingSave::Auto { .. }) {
                    self.auto_save_scheduled = true;
                }
                self.last_save_error = Some(message.clone());
                Err(DesignerError::Save { file_id, message })
            }
        }
    }

    // ─── Synchronous drivers ─────────────────────────────────────────────

    /// Carry out `request` against `service` and deliver the result,
    /// following up with the upgrade save a load may require.
    pub fn perform(
        &mut self,
        service: &mut dyn ProjectService,
        request: ServiceRequest,
    ) -> Result<(), DesignerError> {
        match request {
            ServiceRequest::Load {
                project_id,
                file_id,
            } => {
                let result = service.load(project_id, &file_id);
                if let Some(save) = self.complete_load(result)? {
                    self.perform(service, save)?;
                }
                Ok(())
            }
            ServiceRequest::Save {
                request_id,
                session_id,
                project_id,
                file_id,
                content,
            } => {
                let result = service.save(&session_id, project_id, &file_id, &content);
                self.complete_save(request_id, result)
            }
        }
    }

    pub fn load_with(&mut self, service: &mut dyn ProjectService) -> Result<(), DesignerError> {
        let request = self.begin_load()?;
        self.perform(service, request)
    }

    /// Save now if an auto-save is due. Returns whether one was issued.
    pub fn flush_auto_save(&mut self, service: &mut dyn ProjectService) -> Result<bool, DesignerError> {
        match self.take_auto_save_request() {
            Some(request) => self.perform(service, request).map(|()| true),
            None => Ok(false),
        }
    }

    // ─── Change handlers ─────────────────────────────────────────────────

    fn dispatch(&mut self) {
        let events = match self.document.as_mut() {
            Some(doc) => doc.tree.take_events(),
            None => return,
        };
        for event in &events {
            match event.kind() {
                TreeEventKind::Added => self.on_component_added(event),
                TreeEventKind::Removed => self.on_component_removed(event),
                TreeEventKind::Renamed => self.on_component_renamed(event),
                TreeEventKind::PropertyChanged => self.on_property_changed(event),
            }
        }
    }

    fn accepts_notification(&self, handler: &str) -> bool {
        if self.state.is_loaded() {
            return true;
        }
        let violation =
            DesignerError::IntegrityViolation(format!("{handler} while {:?}", self.state));
        log::error!("{}: {violation}", self.config.file_id);
        false
    }

    pub fn on_component_added(&mut self, event: &TreeEvent) {
        if !self.accepts_notification("on_component_added") {
            return;
        }
        self.bridge.forward(event);
        self.schedule_auto_save();
        self.refresh();
    }

    /// A detach-for-move (`permanent == false`) only refreshes the views; the
    /// matching add does the rest.
    pub fn on_component_removed(&mut self, event: &TreeEvent) {
        if !self.accepts_notification("on_component_removed") {
            return;
        }
        self.prune_selection();
        if matches!(event, TreeEvent::Removed { permanent: true, .. }) {
            self.bridge.forward(event);
            self.schedule_auto_save();
        }
        self.refresh();
    }

    pub fn on_component_renamed(&mut self, event: &TreeEvent) {
        if !self.accepts_notification("on_component_renamed") {
            return;
        }
        self.bridge.forward(event);
        self.schedule_auto_save();
        self.refresh();
    }

    pub fn on_property_changed(&mut self, event: &TreeEvent) {
        if !self.accepts_notification("on_property_changed") {
            return;
        }
        if let TreeEvent::PropertyChanged {
            index,
            property,
            value,
            ..
        } = event
            && property == BLOCK_SUBSET_PROPERTY
            && self.tree().is_some_and(|tree| tree.root == *index)
        {
            self.palette_reload = Some(value.clone());
        }
        self.bridge.forward(event);
        self.schedule_auto_save();
        self.refresh();
    }

    /// Selection is not part of the document, so nothing is saved.
    pub fn on_selection_changed(&mut self) {
        if !self.accepts_notification("on_selection_changed") {
            return;
        }
        self.refresh();
    }

    fn prune_selection(&mut self) {
        let Some(doc) = &self.document else {
            return;
        };
        self.selection.retain(|idx| doc.tree.get(*idx).is_some());
        if self.selection.is_empty() {
            self.selection.push(doc.tree.root);
        }
    }

    fn refresh(&mut self) {
        let Some(doc) = &self.document else {
            return;
        };
        self.panel.show(&PanelView::build(&doc.tree, &self.selection));
        let highlighted = self.selection.last().copied();
        self.structure.show(&StructureNode::build(&doc.tree, highlighted));
    }

    // ─── Selection ───────────────────────────────────────────────────────

    pub fn select(&mut self, name: &str) -> Result<(), DesignerError> {
        self.select_many(&[name])
    }

    /// Replace the selection. Duplicates are ignored; an empty list selects
    /// the root.
    pub fn select_many(&mut self, names: &[&str]) -> Result<(), DesignerError> {
        let tree = self.loaded_tree("select")?;
        let mut selection = Selection::new();
        for name in names {
            let idx = tree
                .index_of(name)
                .ok_or_else(|| ModelError::NoSuchComponent(name.to_string()))?;
            if !selection.contains(&idx) {
                selection.push(idx);
            }
        }
        if selection.is_empty() {
            selection.push(tree.root);
        }
        self.selection = selection;
        self.on_selection_changed();
        Ok(())
    }

    // ─── Editing ─────────────────────────────────────────────────────────

    /// Write `property` on every selected component that declares it.
    /// Returns how many values changed.
    pub fn write_property(&mut self, property: &str, value: &str) -> Result<usize, DesignerError> {
        let selection = self.selection.clone();
        let tree = self.tree_mut("write_property")?;
        let mut declared = 0;
        let mut changed = 0;
        for &idx in &selection {
            if !tree.get(idx).is_some_and(|c| c.properties.contains(property)) {
                continue;
            }
            declared += 1;
            if tree.set_property(idx, property, value)? {
                changed += 1;
            }
        }
        if declared == 0 {
            let component_type = selection
                .last()
                .and_then(|&idx| tree.get(idx))
                .map(|c| c.component_type().to_string())
                .unwrap_or_default();
            return Err(ModelError::UnknownProperty {
                component_type,
                property: property.to_string(),
            }
            .into());
        }
        self.dispatch();
        Ok(changed)
    }

    /// Set one property of one component.
    pub fn set_property(&mut self, name: &str, property: &str, value: &str) -> Result<bool, DesignerError> {
        let idx = self.index("set_property", name)?;
        let changed = self.tree_mut("set_property")?.set_property(idx, property, value)?;
        self.dispatch();
        Ok(changed)
    }

    /// Create a component of `type_name` with the next default name and
    /// select it. Non-visible components always go to the root.
    pub fn add_component(
        &mut self,
        type_name: &str,
        parent: Option<&str>,
        index: Option<usize>,
    ) -> Result<String, DesignerError> {
        let tree = self.loaded_tree("add_component")?;
        let name = tree.generate_name(type_name);
        let instance = self.db.create_component(type_name, &name)?;
        let (parent, index) = match parent {
            Some(parent) if instance.is_visible() => (self.index("add_component", parent)?, index),
            _ if !instance.is_visible() => (tree.root, None),
            _ => (tree.root, index),
        };
        let idx = self.tree_mut("add_component")?.add_child(parent, instance, index)?;
        self.dispatch();
        self.selection = smallvec![idx];
        self.on_selection_changed();
        Ok(name)
    }

    /// Permanently delete one component and its descendants.
    pub fn delete(&mut self, name: &str) -> Result<(), DesignerError> {
        let idx = self.index("delete", name)?;
        let tree = self.tree_mut("delete")?;
        let parent = tree.parent(idx).ok_or(ModelError::RootImmovable)?;
        tree.remove_child(parent, idx, true)?;
        self.dispatch();
        Ok(())
    }

    /// Delete every selected component. The root cannot be deleted.
    pub fn delete_selected(&mut self) -> Result<usize, DesignerError> {
        let tree = self.loaded_tree("delete")?;
        if self.selection.contains(&tree.root) {
            return Err(ModelError::RootImmovable.into());
        }
        let names: Vec<String> = self
            .selection
            .iter()
            .filter_map(|&idx| tree.get(idx))
            .map(|c| c.name.to_string())
            .collect();
        let tree = self.tree_mut("delete")?;
        let mut deleted = 0;
        for name in names {
            // Already gone with a selected ancestor.
            let Some(idx) = tree.index_of(&name) else {
                continue;
            };
            let parent = tree.parent(idx).ok_or(ModelError::RootImmovable)?;
            tree.remove_child(parent, idx, true)?;
            deleted += 1;
        }
        self.dispatch();
        Ok(deleted)
    }

    pub fn rename(&mut self, name: &str, new_name: &str) -> Result<(), DesignerError> {
        let idx = self.index("rename", name)?;
        self.tree_mut("rename")?.rename(idx, new_name)?;
        self.dispatch();
        Ok(())
    }

    pub fn move_component(
        &mut self,
        name: &str,
        new_parent: &str,
        index: Option<usize>,
    ) -> Result<(), DesignerError> {
        let idx = self.index("move", name)?;
        let parent = self.index("move", new_parent)?;
        self.tree_mut("move")?.move_child(idx, parent, index)?;
        self.dispatch();
        Ok(())
    }

    // ─── Component types ─────────────────────────────────────────────────

    /// Install (or upgrade) component types, typically extensions. Existing
    /// instances of a type whose version changed are brought to the new
    /// version. Returns the types that were added or changed.
    pub fn on_component_types_added(
        &mut self,
        infos: Vec<ComponentTypeInfo>,
    ) -> Result<Vec<String>, DesignerError> {
        let changed = self.db.install(infos);
        self.bridge.component_types_added(&changed);
        if changed.is_empty() {
            return Ok(changed);
        }
        let Some(document) = self.document.as_mut() else {
            return Ok(changed);
        };
        let tree = &mut document.tree;

        let mut plans = Vec::new();
        for (idx, instance) in tree.iter() {
            if !changed.iter().any(|t| t == instance.component_type()) {
                continue;
            }
            let Some(info) = self.db.get(instance.component_type()) else {
                continue;
            };
            let properties: PropertyMap = instance
                .properties
                .iter()
                .filter(|p| !p.is_default())
                .map(|p| (p.name().to_string(), Value::String(p.value.clone())))
                .collect();
            let upgraded = self.upgrader.upgrade_properties(
                &info.name,
                instance.version,
                info.version,
                properties,
            )?;
            let values: Vec<(String, String)> = upgraded
                .properties
                .iter()
                .map(|(key, value)| (key.clone(), value_text(value)))
                .collect();
            plans.push((idx, Arc::clone(info), values));
        }

        let reconfigured = plans.len();
        for (idx, info, values) in plans {
            for dropped in tree.reconfigure(idx, info, &values)? {
                log::warn!("dropping {dropped}: no longer declared after upgrade");
            }
        }
        if reconfigured > 0 && self.state.is_loaded() {
            log::info!("upgraded {reconfigured} components to newly installed types");
            self.schedule_auto_save();
            self.refresh();
        }
        Ok(changed)
    }

    /// Uninstall component types. Instances of them are deleted first.
    /// Returns how many components were deleted.
    pub fn on_component_types_removed(&mut self, types: &[String]) -> Result<usize, DesignerError> {
        let mut deleted = 0;
        if let Ok(tree) = self.tree_mut("remove_component_types") {
            let root = tree.root;
            let doomed: Vec<String> = tree
                .iter()
                .filter(|&(idx, c)| idx != root && types.iter().any(|t| t == c.component_type()))
                .map(|(_, c)| c.name.to_string())
                .collect();
            for name in doomed {
                let Some(idx) = tree.index_of(&name) else {
                    continue;
                };
                let parent = tree.parent(idx).ok_or(ModelError::RootImmovable)?;
                tree.remove_child(parent, idx, true)?;
                deleted += 1;
            }
            self.dispatch();
        }
        self.db.uninstall(types);
        self.bridge.component_types_removed(types);
        Ok(deleted)
    }

    // ─── Clipboard ───────────────────────────────────────────────────────

    /// Copy the selection with its descendants and the block fragments they
    /// own, and record where a paste should go.
    pub fn copy(&mut self) -> Result<ClipboardPayload, DesignerError> {
        let tree = self.loaded_tree("copy")?;
        let roots: Vec<NodeIndex> = self
            .selection
            .iter()
            .copied()
            .filter(|&idx| {
                !self
                    .selection
                    .iter()
                    .any(|&other| other != idx && tree.is_ancestor_or_self(other, idx))
            })
            .collect();
        let components = roots
            .iter()
            .map(|&idx| component_value(tree, idx))
            .collect::<Result<Vec<_>, _>>()?;
        let blocks = self.bridge.collect_blocks(tree, &roots);
        let target = paste_target_for(tree, &self.selection);
        let target_uuid = tree.graph[target].uuid.clone();

        self.paste_target = Some(target_uuid);
        Ok(ClipboardPayload { components, blocks })
    }

    /// Copy, then delete the selection.
    pub fn cut(&mut self) -> Result<ClipboardPayload, DesignerError> {
        let tree = self.loaded_tree("cut")?;
        if self.selection.contains(&tree.root) {
            return Err(ModelError::RootImmovable.into());
        }
        let payload = self.copy()?;
        self.delete_selected()?;
        Ok(payload)
    }

    /// Paste a clipboard payload. Names already in use are replaced and the
    /// pasted block fragments re-targeted to the new names, unless
    /// `components_only`. Either everything is placed or nothing is.
    /// Returns the names of the pasted top-level components.
    pub fn paste(
        &mut self,
        payload: &ClipboardPayload,
        components_only: bool,
    ) -> Result<Vec<String>, DesignerError> {
        let tree = self.loaded_tree("paste")?;
        if payload.is_empty() {
            return Ok(Vec::new());
        }
        let root = tree.root;
        let root_type = tree.root_type().to_string();

        // Copies from an older designer are brought to the installed schema.
        let mut components = payload.components.clone();
        for object in components.iter_mut() {
            if let Value::Object(object) = object {
                self.upgrader
                    .upgrade_component(object, &self.db)
                    .map_err(DesignerError::IncompatiblePaste)?;
            }
        }

        let mut objects = Vec::new();
        let mut root_properties = Vec::new();
        let mut pasting_root = false;
        for object in &components {
            if object.get("$Type").and_then(Value::as_str) != Some(root_type.as_str()) {
                objects.push(object.clone());
                continue;
            }
            if self.selection.as_slice() != [root] {
                return Err(DesignerError::InvalidPasteTarget(format!(
                    "a {root_type} can only be pasted onto the selected {root_type}"
                )));
            }
            pasting_root = true;
            for (key, value) in object.as_object().into_iter().flatten() {
                match key.as_str() {
                    "$Components" => {
                        objects.extend(value.as_array().into_iter().flatten().cloned());
                    }
                    k if k.starts_with('$') || k == "Uuid" => {}
                    k if tree.root_instance().properties.contains(k) => {
                        root_properties.push((k.to_string(), value_text(value)));
                    }
                    k => log::warn!("not pasting unknown {root_type} property {k}"),
                }
            }
        }

        let mut substitutions = SubstitutionMap::new();
        let planned = decode_components(tree, &objects, &self.db, Some(&mut substitutions))?;

        let target = if pasting_root {
            root
        } else {
            match &self.paste_target {
                Some(uuid) => tree.index_of_uuid(uuid).unwrap_or(root),
                None => paste_target_for(tree, &self.selection),
            }
        };
        let mut next_visible = self.insertion_index(tree, target);
        let mut placements = Vec::with_capacity(planned.len());
        for subtree in &planned {
            let info = &subtree.instance.info;
            let placement = if info.is_visible() {
                next_visible += 1;
                (target, Some(next_visible - 1))
            } else {
                (root, None)
            };
            tree.check_insert(placement.0, info, &[])
                .map_err(|e| DesignerError::InvalidPasteTarget(e.to_string()))?;
            placements.push(placement);
        }

        let tree = self.tree_mut("paste")?;
        for (key, value) in &root_properties {
            tree.set_property(root, key, value)?;
        }
        let mut pasted = Vec::with_capacity(planned.len());
        for (subtree, (parent, index)) in planned.into_iter().zip(placements) {
            pasted.push(tree.attach(parent, subtree, index)?);
        }
        let names: Vec<String> = pasted
            .iter()
            .filter_map(|&idx| tree.get(idx))
            .map(|c| c.name.to_string())
            .collect();
        self.dispatch();

        if !components_only {
            let count = self.bridge.paste_blocks(&payload.blocks, &substitutions);
            log::debug!("pasted {count} block fragments ({} renames)", substitutions.len());
        }
        if let Some(&last) = pasted.last() {
            self.selection = smallvec![last];
            self.on_selection_changed();
        }
        Ok(names)
    }

    /// Where the next pasted visible component goes among the children of
    /// `target`: after the right-most selected visible child, else after the
    /// last visible child.
    fn insertion_index(&self, tree: &ComponentTree, target: NodeIndex) -> usize {
        let children = tree.children(target);
        self.selection
            .iter()
            .filter(|&&idx| children.contains(&idx))
            .filter(|&&idx| tree.get(idx).is_some_and(ComponentInstance::is_visible))
            .filter_map(|&idx| tree.position(idx))
            .max()
            .or_else(|| {
                tree.visible_children(target)
                    .last()
                    .and_then(|&idx| tree.position(idx))
            })
            .map_or(0, |pos| pos + 1)
    }
}

/// The root when only the root is selected, a lone selected container
/// itself, otherwise the container of the last selected component.
fn paste_target_for(tree: &ComponentTree, selection: &[NodeIndex]) -> NodeIndex {
    match selection {
        [only] if tree.get(*only).is_some_and(ComponentInstance::is_container) => *only,
        [.., last] => tree.parent(*last).unwrap_or(tree.root),
        [] => tree.root,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => (if *b { "True" } else { "False" }).to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MemoryBlockEditor;
    use crate::service::MemoryProjectService;
    use crate::sinks::{PanelRecorder, StructureRecorder};
    use pretty_assertions::assert_eq;

    const SCREEN: &str = r#"{"YaVersion":"208","Source":"Form","Properties":{"$Name":"Screen1","$Type":"Form","$Version":"3","Uuid":"0","$Components":[{"$Name":"HorizontalArrangement1","$Type":"HorizontalArrangement","$Version":"2","Uuid":"1","$Components":[{"$Name":"Button1","$Type":"Button","$Version":"4","Uuid":"2"}]},{"$Name":"Label1","$Type":"Label","$Version":"3","Uuid":"3","Text":"Hi"},{"$Name":"Clock1","$Type":"Clock","$Version":"1","Uuid":"4"}]}}"#;

    fn designer(config: DesignerConfig) -> (Designer, MemoryProjectService) {
        let mut service = MemoryProjectService::new();
        service.insert(config.project_id, &config.file_id, SCREEN);
        let designer = Designer::new(
            config,
            ComponentDatabase::builtin(),
            SchemaUpgrader::builtin(),
            Box::new(PanelRecorder::default()),
            Box::new(StructureRecorder::default()),
            Box::new(MemoryBlockEditor::new()),
        );
        (designer, service)
    }

    fn loaded() -> (Designer, MemoryProjectService) {
        let (mut d, mut service) = designer(DesignerConfig::default());
        d.load_with(&mut service).unwrap();
        (d, service)
    }

    #[test]
    fn current_document_loads_straight_to_loaded() {
        let (d, service) = loaded();
        assert_eq!(d.state(), DesignerState::Loaded);
        assert_eq!(d.selection(), vec!["Screen1".to_string()]);
        assert_eq!(service.saves, 0);
    }

    #[test]
    fn load_cannot_start_twice() {
        let (mut d, _) = designer(DesignerConfig::default());
        d.begin_load().unwrap();
        assert!(matches!(
            d.begin_load(),
            Err(DesignerError::InvalidState {
                state: DesignerState::Loading,
                ..
            })
        ));
    }

    #[test]
    fn cancelled_load_discards_late_result() {
        let (mut d, _) = designer(DesignerConfig::default());
        d.begin_load().unwrap();
        d.unload().unwrap();
        let late = d.complete_load(Ok(ChecksumedLoadFile::new(SCREEN))).unwrap();
        assert_eq!(late, None);
        assert_eq!(d.state(), DesignerState::Unloaded);
        assert!(d.document().is_none());
    }

    #[test]
    fn edits_before_load_are_rejected() {
        let (mut d, _) = designer(DesignerConfig::default());
        assert!(matches!(
            d.add_component("Button", None, None),
            Err(DesignerError::InvalidState { .. })
        ));
    }

    #[test]
    fn notifications_while_unloaded_are_ignored() {
        let (mut d, _) = designer(DesignerConfig::default());
        let event = TreeEvent::PropertyChanged {
            index: NodeIndex::new(0),
            name: bf_core::ComponentName::intern("Screen1"),
            property: "Title".into(),
            value: "x".into(),
        };
        d.on_property_changed(&event);
        assert!(!d.auto_save_scheduled());
        assert_eq!(d.state(), DesignerState::Unloaded);
    }

    #[test]
    fn edits_coalesce_into_one_auto_save() {
        let (mut d, mut service) = loaded();
        d.select("Label1").unwrap();
        d.write_property("Text", "One").unwrap();
        d.write_property("Text", "Two").unwrap();
        assert_eq!(d.state(), DesignerState::Modified);

        assert!(d.flush_auto_save(&mut service).unwrap());
        assert!(!d.flush_auto_save(&mut service).unwrap());
        assert_eq!(service.saves, 1);
        assert_eq!(d.state(), DesignerState::Loaded);
        assert!(service.file(0, "src/Screen1.scm").unwrap().contains(r#""Text":"Two""#));
    }

    #[test]
    fn edit_during_auto_save_keeps_document_modified() {
        let (mut d, _) = loaded();
        d.add_component("Button", None, None).unwrap();
        let Some(ServiceRequest::Save { request_id, .. }) = d.take_auto_save_request() else {
            panic!("expected an auto-save request");
        };
        assert!(d.take_auto_save_request().is_none(), "one save in flight");

        d.write_property("Text", "later").unwrap();
        d.complete_save(request_id, Ok(1)).unwrap();
        assert_eq!(d.state(), DesignerState::Modified);
        assert!(d.auto_save_scheduled());
    }

    #[test]
    fn failed_auto_save_stays_scheduled() {
        let (mut d, mut service) = loaded();
        d.rename("Label1", "Greeting").unwrap();
        service.failing_saves = 1;
        assert!(matches!(
            d.flush_auto_save(&mut service),
            Err(DesignerError::Save { .. })
        ));
        assert!(d.auto_save_scheduled());
        assert_eq!(d.last_save_error(), Some("storage unavailable"));
        assert!(d.tree().unwrap().contains_name("Greeting"));

        assert!(d.flush_auto_save(&mut service).unwrap());
        assert_eq!(d.last_save_error(), None);
    }

    #[test]
    fn read_only_never_saves() {
        let config = DesignerConfig {
            read_only: true,
            ..DesignerConfig::default()
        };
        let (mut d, mut service) = designer(config);
        d.load_with(&mut service).unwrap();
        d.add_component("Button", None, None).unwrap();
        assert!(d.take_auto_save_request().is_none());
        assert_eq!(service.saves, 0);
    }

    #[test]
    fn non_visible_components_go_to_the_root() {
        let (mut d, _) = loaded();
        let name = d
            .add_component("Notifier", Some("HorizontalArrangement1"), Some(0))
            .unwrap();
        let tree = d.tree().unwrap();
        let idx = tree.index_of(&name).unwrap();
        assert_eq!(tree.parent(idx), Some(tree.root));
        assert_eq!(d.selection(), vec![name]);
    }

    #[test]
    fn multi_select_write_skips_undeclaring_components() {
        let (mut d, _) = loaded();
        d.select_many(&["Button1", "Label1", "Clock1"]).unwrap();
        assert_eq!(d.write_property("FontSize", "18.0").unwrap(), 2);
        let tree = d.tree().unwrap();
        assert_eq!(tree.get_by_name("Label1").unwrap().property("FontSize"), Some("18.0"));

        d.select("Clock1").unwrap();
        assert!(matches!(
            d.write_property("FontSize", "20.0"),
            Err(DesignerError::Model(ModelError::UnknownProperty { .. }))
        ));
    }

    #[test]
    fn deleting_the_selection_falls_back_to_root() {
        let (mut d, _) = loaded();
        d.select_many(&["HorizontalArrangement1", "Button1"]).unwrap();
        assert_eq!(d.delete_selected().unwrap(), 1);
        assert_eq!(d.selection(), vec!["Screen1".to_string()]);
        assert!(matches!(
            d.delete_selected(),
            Err(DesignerError::Model(ModelError::RootImmovable))
        ));
    }

    #[test]
    fn block_subset_change_requests_palette_reload() {
        let (mut d, _) = loaded();
        assert_eq!(d.take_palette_reload(), Some(String::new()));
        assert_eq!(d.take_palette_reload(), None);
        d.set_property("Screen1", "BlockSubset", r#"{"shownComponentTypes":{}}"#)
            .unwrap();
        assert_eq!(
            d.take_palette_reload().as_deref(),
            Some(r#"{"shownComponentTypes":{}}"#)
        );
    }

    #[test]
    fn paste_target_rules() {
        let (d, _) = loaded();
        let tree = d.tree().unwrap();
        let arrangement = tree.index_of("HorizontalArrangement1").unwrap();
        let button = tree.index_of("Button1").unwrap();
        let label = tree.index_of("Label1").unwrap();
        assert_eq!(paste_target_for(tree, &[tree.root]), tree.root);
        assert_eq!(paste_target_for(tree, &[arrangement]), arrangement);
        assert_eq!(paste_target_for(tree, &[button]), arrangement);
        assert_eq!(paste_target_for(tree, &[arrangement, label]), tree.root);
        assert_eq!(paste_target_for(tree, &[label, button]), arrangement);
    }
}

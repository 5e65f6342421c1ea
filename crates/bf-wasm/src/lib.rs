//! WASM bridge for Blockform. Exposes the designer to the browser shell.
//!
//! Compiled via `wasm-pack build --target web`. Every call returns plain
//! values or JSON text; persistence stays on the JavaScript side, which
//! performs the returned load/save requests and reports their results back.

mod console;
mod js_editor;

use bf_core::codec::decode_encoded;
use bf_core::source::EncodedDocument;
use bf_core::upgrade::{UpgradeReport, apply_provenance};
use bf_core::{
    ComponentDatabase, ComponentTypeInfo, DecodeContext, Document, MergedValue, SchemaUpgrader,
    encode_document,
};
use bf_editor::designer::BLOCK_SUBSET_PROPERTY;
use bf_editor::palette::NoTranslations;
use bf_editor::sinks::{PanelRecorder, StructureRecorder};
use bf_editor::{
    BlockEditor, ChecksumedLoadFile, ClipboardPayload, Designer, DesignerConfig, DesignerError,
    Palette, PanelView, ServiceRequest, Translations,
};
use js_editor::JsBlockEditor;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use wasm_bindgen::prelude::*;

/// One open designer: the component tree controller plus its palette.
///
/// The property panel and structure tree are kept as snapshots that the
/// shell reads back with [`get_panel`](Self::get_panel) and
/// [`get_structure`](Self::get_structure) after each call.
#[wasm_bindgen]
pub struct DesignerHandle {
    designer: Designer,
    palette: Palette,
    panel: PanelRecorder,
    structure: StructureRecorder,
}

#[wasm_bindgen]
impl DesignerHandle {
    /// Create a designer from a JSON [`DesignerConfig`] and the block
    /// editor object it keeps in sync.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str, block_editor: js_sys::Object) -> Result<DesignerHandle, JsValue> {
        console_error_panic_hook_setup();
        console::init(log::LevelFilter::Info);

        let config =
            DesignerConfig::from_json(config_json).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(Self::with_editor(config, Box::new(JsBlockEditor::new(block_editor))))
    }

    /// Current lifecycle state, e.g. `"Loaded"`.
    pub fn state(&self) -> String {
        format!("{:?}", self.designer.state())
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    /// Start loading. Returns `{"ok":true,"request":{...}}` with the load
    /// request to perform.
    pub fn begin_load(&mut self) -> String {
        respond("request", self.designer.begin_load().map(|r| request_json(&r)))
    }

    /// Deliver a loaded file. `save` is the upgrade save to perform before
    /// editing, or `null`.
    pub fn complete_load(&mut self, content: String, checksum: String) -> String {
        let result = self
            .designer
            .complete_load(Ok(ChecksumedLoadFile { content, checksum }));
        self.reload_palette();
        match result {
            Ok(save) => ok_json("save", save.as_ref().map_or(Value::Null, request_json)),
            Err(e) => self.load_error(e),
        }
    }

    pub fn fail_load(&mut self, message: String) -> String {
        match self.designer.complete_load(Err(message)) {
            Ok(_) => ok_json("save", Value::Null),
            Err(e) => self.load_error(e),
        }
    }

    /// `request_id` is the `requestId` of the save request being answered.
    pub fn complete_save(&mut self, request_id: f64, revision: f64) -> String {
        respond_unit(self.designer.complete_save(request_id as u64, Ok(revision as u64)))
    }

    pub fn fail_save(&mut self, request_id: f64, message: String) -> String {
        respond_unit(self.designer.complete_save(request_id as u64, Err(message)))
    }

    /// The pending auto-save as a request object, or `null`.
    pub fn take_auto_save(&mut self) -> String {
        self.designer
            .take_auto_save_request()
            .map_or(Value::Null, |r| request_json(&r))
            .to_string()
    }

    pub fn retry_upgrade_save(&mut self) -> String {
        respond("request", self.designer.retry_upgrade_save().map(|r| request_json(&r)))
    }

    pub fn unload(&mut self) -> String {
        respond_unit(self.designer.unload())
    }

    /// The document in its `.scm` form, or an empty string when none is
    /// loaded.
    pub fn get_text(&self) -> String {
        self.designer.encode().unwrap_or_default()
    }

    /// The document JSON as it was before upgrading.
    pub fn get_pre_upgrade_json(&self) -> String {
        self.designer.pre_upgrade_json().unwrap_or_default().to_string()
    }

    // ─── Editing ─────────────────────────────────────────────────────────

    /// Select components by name. Takes a JSON array; `[]` selects the root.
    pub fn select(&mut self, names_json: &str) -> String {
        let names: Vec<String> = match serde_json::from_str(names_json) {
            Ok(names) => names,
            Err(e) => return error_json(e),
        };
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        respond_unit(self.designer.select_many(&names))
    }

    pub fn get_selection(&self) -> String {
        json!(self.designer.selection()).to_string()
    }

    /// Write a property on every selected component that declares it.
    pub fn write_property(&mut self, property: &str, value: &str) -> String {
        let result = self.designer.write_property(property, value);
        self.reload_palette();
        respond("changed", result.map(Value::from))
    }

    pub fn set_property(&mut self, name: &str, property: &str, value: &str) -> String {
        let result = self.designer.set_property(name, property, value);
        self.reload_palette();
        respond("changed", result.map(Value::from))
    }

    /// Add a component of `component_type`. A negative `index` appends.
    pub fn add_component(&mut self, component_type: &str, parent: Option<String>, index: i32) -> String {
        let result = self
            .designer
            .add_component(component_type, parent.as_deref(), position(index));
        respond("name", result.map(Value::from))
    }

    pub fn delete_selected(&mut self) -> String {
        respond("deleted", self.designer.delete_selected().map(Value::from))
    }

    pub fn rename(&mut self, name: &str, new_name: &str) -> String {
        respond_unit(self.designer.rename(name, new_name))
    }

    pub fn move_component(&mut self, name: &str, new_parent: &str, index: i32) -> String {
        respond_unit(self.designer.move_component(name, new_parent, position(index)))
    }

    // ─── Clipboard ───────────────────────────────────────────────────────

    pub fn copy(&mut self) -> String {
        respond("payload", self.designer.copy().map(payload_json))
    }

    pub fn cut(&mut self) -> String {
        respond("payload", self.designer.cut().map(payload_json))
    }

    /// Paste clipboard JSON. Returns the names of the pasted components.
    pub fn paste(&mut self, payload_json: &str, components_only: bool) -> String {
        let payload = match ClipboardPayload::from_json(payload_json) {
            Ok(payload) => payload,
            Err(e) => return error_json(format!("invalid clipboard payload: {e}")),
        };
        let result = self.designer.paste(&payload, components_only);
        self.reload_palette();
        respond("names", result.map(|names| json!(names)))
    }

    // ─── Component types ─────────────────────────────────────────────────

    /// Install component types from a JSON array of type descriptions.
    pub fn install_component_types(&mut self, types_json: &str) -> String {
        let infos: Vec<ComponentTypeInfo> = match serde_json::from_str(types_json) {
            Ok(infos) => infos,
            Err(e) => return error_json(format!("invalid component types: {e}")),
        };
        match self.designer.on_component_types_added(infos) {
            Ok(changed) => {
                for name in &changed {
                    self.palette.add_component(self.designer.database(), name);
                }
                ok_json("changed", json!(changed))
            }
            Err(e) => error_json(e),
        }
    }

    /// Remove component types (and their instances) by name.
    pub fn remove_component_types(&mut self, types_json: &str) -> String {
        let types: Vec<String> = match serde_json::from_str(types_json) {
            Ok(types) => types,
            Err(e) => return error_json(e),
        };
        match self.designer.on_component_types_removed(&types) {
            Ok(deleted) => {
                for name in &types {
                    self.palette.remove_component(name);
                }
                ok_json("deleted", Value::from(deleted))
            }
            Err(e) => error_json(e),
        }
    }

    // ─── Views ───────────────────────────────────────────────────────────

    /// The property panel: `{"components":[...],"properties":[...]}`.
    /// Mixed values across a multi-selection are `null`.
    pub fn get_panel(&self) -> String {
        self.panel
            .current()
            .map_or(Value::Null, |view| panel_json(&view))
            .to_string()
    }

    /// The component structure tree, or `null` when nothing is loaded.
    pub fn get_structure(&self) -> String {
        serde_json::to_string(&self.structure.current()).unwrap_or_else(|_| "null".to_string())
    }

    /// Palette contents grouped by category, in palette order.
    pub fn get_palette(&self) -> String {
        let categories: Vec<Value> = self
            .palette
            .categories()
            .into_iter()
            .map(|category| {
                let components: Vec<Value> = self
                    .palette
                    .components(category)
                    .into_iter()
                    .filter_map(|name| self.palette.item(name))
                    .map(|item| json!({"type": item.info.name, "displayName": item.display_name}))
                    .collect();
                json!({"category": category, "components": components})
            })
            .collect();
        Value::Array(categories).to_string()
    }

    /// Type names matching `query`, as a JSON array.
    pub fn search_palette(&mut self, query: &str) -> String {
        json!(self.palette.search(query)).to_string()
    }

    /// Replace the palette's display names with a JSON object of
    /// `type -> translated name`.
    pub fn set_translations(&mut self, translations_json: &str) -> String {
        let translations: HashMap<String, String> = match serde_json::from_str(translations_json) {
            Ok(t) => t,
            Err(e) => return error_json(e),
        };
        self.rebuild_palette(Box::new(translations));
        r#"{"ok":true}"#.to_string()
    }

    /// Run deferred palette work. Call when the shell is idle; returns
    /// `true` if the search index was rebuilt.
    pub fn tick(&mut self) -> bool {
        self.reload_palette();
        self.palette.run_scheduled()
    }

    /// Why the project could not be opened, or `null`.
    pub fn get_corrupt_report(&self) -> String {
        self.designer
            .corrupt_report()
            .map_or(Value::Null, |report| {
                json!({
                    "projectId": report.project_id,
                    "fileId": report.file_id,
                    "reason": report.reason,
                })
            })
            .to_string()
    }
}

impl DesignerHandle {
    fn with_editor(config: DesignerConfig, editor: Box<dyn BlockEditor>) -> Self {
        let panel = PanelRecorder::default();
        let structure = StructureRecorder::default();
        let features = config.features;
        let designer = Designer::new(
            config,
            ComponentDatabase::builtin(),
            SchemaUpgrader::builtin(),
            Box::new(panel.clone()),
            Box::new(structure.clone()),
            editor,
        );
        let mut palette = Palette::new(features, Box::new(NoTranslations));
        palette.load(designer.database());
        Self {
            designer,
            palette,
            panel,
            structure,
        }
    }

    fn reload_palette(&mut self) {
        if let Some(subset) = self.designer.take_palette_reload() {
            self.palette.reload(self.designer.database(), &subset);
        }
    }

    fn rebuild_palette(&mut self, translations: Box<dyn Translations>) {
        self.palette = Palette::new(self.designer.config().features, translations);
        let subset = self
            .designer
            .tree()
            .and_then(|tree| tree.root_instance().property(BLOCK_SUBSET_PROPERTY))
            .unwrap_or_default()
            .to_string();
        self.palette.reload(self.designer.database(), &subset);
    }

    fn load_error(&self, e: DesignerError) -> String {
        json!({
            "ok": false,
            "error": e.to_string(),
            "corrupt": self.designer.corrupt_report().is_some(),
        })
        .to_string()
    }
}

// ─── JSON helpers ────────────────────────────────────────────────────────

fn ok_json(field: &str, value: Value) -> String {
    let mut map = Map::new();
    map.insert("ok".to_string(), Value::Bool(true));
    map.insert(field.to_string(), value);
    Value::Object(map).to_string()
}

fn error_json(e: impl std::fmt::Display) -> String {
    json!({"ok": false, "error": e.to_string()}).to_string()
}

fn respond(field: &str, result: Result<Value, DesignerError>) -> String {
    match result {
        Ok(value) => ok_json(field, value),
        Err(e) => {
            log::warn!("{e}");
            error_json(e)
        }
    }
}

fn respond_unit(result: Result<(), DesignerError>) -> String {
    match result {
        Ok(()) => r#"{"ok":true}"#.to_string(),
        Err(e) => {
            log::warn!("{e}");
            error_json(e)
        }
    }
}

fn position(index: i32) -> Option<usize> {
    usize::try_from(index).ok()
}

fn request_json(request: &ServiceRequest) -> Value {
    match request {
        ServiceRequest::Load {
            project_id,
            file_id,
        } => json!({"kind": "load", "projectId": project_id, "fileId": file_id}),
        ServiceRequest::Save {
            request_id,
            session_id,
            project_id,
            file_id,
            content,
        } => json!({
            "kind": "save",
            "requestId": request_id,
            "sessionId": session_id,
            "projectId": project_id,
            "fileId": file_id,
            "content": content,
        }),
    }
}

fn payload_json(payload: ClipboardPayload) -> Value {
    serde_json::to_value(payload).unwrap_or(Value::Null)
}

fn panel_json(view: &PanelView) -> Value {
    let properties: Vec<Value> = view
        .properties
        .iter()
        .map(|p| {
            let value = match &p.value {
                MergedValue::Shared(v) => Value::from(v.as_str()),
                MergedValue::Mixed => Value::Null,
            };
            json!({
                "name": p.definition.name,
                "type": p.definition.property_type,
                "editor": p.definition.editor_type,
                "category": p.definition.category,
                "value": value,
            })
        })
        .collect();
    json!({"components": view.components, "properties": properties})
}

fn console_error_panic_hook_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("Blockform WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}

// ─── Standalone functions (no designer needed) ───────────────────────────

/// Set the console log level (`"error"` through `"trace"`).
#[wasm_bindgen]
pub fn set_log_level(level: &str) {
    console::init(console::parse_level(level));
}

/// Check that a `.scm` source opens with the built-in component types.
/// Returns `{"ok":true,"components":N,"upgraded":bool}` or
/// `{"ok":false,"error":"..."}`.
#[wasm_bindgen]
pub fn validate(source: &str) -> String {
    match open_source(source, None) {
        Ok((document, report)) => json!({
            "ok": true,
            "components": document.tree.iter().count(),
            "upgraded": report.upgraded(),
        })
        .to_string(),
        Err(e) => error_json(e),
    }
}

/// Upgrade a `.scm` source to the current format, recording `host` in its
/// provenance list. Returns `{"ok":true,"text":"..."}`.
#[wasm_bindgen]
pub fn upgrade_source(source: &str, host: &str) -> String {
    match open_source(source, Some(host)) {
        Ok((document, _)) => ok_json("text", Value::from(encode_document(&document))),
        Err(e) => error_json(e),
    }
}

fn open_source(source: &str, host: Option<&str>) -> Result<(Document, UpgradeReport), String> {
    let db = ComponentDatabase::builtin();
    let mut encoded = EncodedDocument::from_source(source).map_err(|e| e.to_string())?;
    let report = SchemaUpgrader::builtin()
        .upgrade_document(&mut encoded, &db)
        .map_err(|e| e.to_string())?;
    if let Some(host) = host {
        apply_provenance(&mut encoded.auth_urls, report.loaded_ya_version, host);
    }
    let ctx = DecodeContext {
        root_type: "Form".to_string(),
        project_name: None,
    };
    let document = decode_encoded(&encoded, &ctx, &db).map_err(|e| e.to_string())?;
    Ok((document, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bf_editor::MemoryBlockEditor;
    use bf_editor::service::checksum;
    use pretty_assertions::assert_eq;

    const BUTTON: &str = include_str!("../../bf-editor/tests/fixtures/button_screen.scm");
    const LEGACY: &str = include_str!("../../bf-editor/tests/fixtures/legacy_screen.scm");

    fn parse(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    fn loaded() -> (DesignerHandle, MemoryBlockEditor) {
        let blocks = MemoryBlockEditor::new();
        let mut handle =
            DesignerHandle::with_editor(DesignerConfig::default(), Box::new(blocks.clone()));
        let request = parse(&handle.begin_load());
        assert_eq!(request["request"]["kind"], "load");
        assert_eq!(request["request"]["fileId"], "src/Screen1.scm");

        let done = parse(&handle.complete_load(BUTTON.to_string(), checksum(BUTTON)));
        assert_eq!(done, json!({"ok": true, "save": null}));
        (handle, blocks)
    }

    #[test]
    fn load_reports_state_and_views() {
        let (handle, blocks) = loaded();
        assert_eq!(handle.state(), "Loaded");
        assert_eq!(blocks.catalog().len(), 3);

        let panel = parse(&handle.get_panel());
        assert_eq!(panel["components"], json!(["Screen1"]));
        let structure = parse(&handle.get_structure());
        assert_eq!(structure["children"][0]["name"], "Button1");
        assert!(handle.get_text().contains("\"AppName\":\"Clicker\""));
    }

    #[test]
    fn bad_checksum_is_reported_as_corrupt() {
        let mut handle =
            DesignerHandle::with_editor(DesignerConfig::default(), Box::new(MemoryBlockEditor::new()));
        handle.begin_load();
        let reply = parse(&handle.complete_load(BUTTON.to_string(), checksum("")));
        assert_eq!(reply["ok"], false);
        assert_eq!(reply["corrupt"], true);
        assert_eq!(handle.state(), "Unloaded");
        assert_eq!(parse(&handle.get_corrupt_report())["fileId"], "src/Screen1.scm");
    }

    #[test]
    fn edits_round_trip_through_json() {
        let (mut handle, _) = loaded();
        let added = parse(&handle.add_component("Label", None, -1));
        assert_eq!(added, json!({"ok": true, "name": "Label2"}));
        assert_eq!(handle.get_selection(), r#"["Label2"]"#);

        assert_eq!(
            parse(&handle.write_property("Text", "hi")),
            json!({"ok": true, "changed": 1})
        );
        let reply = parse(&handle.rename("Label2", "Button1"));
        assert_eq!(reply["ok"], false);

        let saved = parse(&handle.take_auto_save());
        assert_eq!(saved["kind"], "save");
        let request_id = saved["requestId"].as_f64().unwrap();
        assert_eq!(parse(&handle.complete_save(request_id, 3.0)), json!({"ok": true}));
        assert_eq!(handle.state(), "Loaded");
    }

    #[test]
    fn mixed_values_are_null_in_the_panel() {
        let (mut handle, _) = loaded();
        handle.select(r#"["Button1","Label1"]"#);
        let panel = parse(&handle.get_panel());
        let text = panel["properties"]
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["name"] == "Text")
            .unwrap();
        assert_eq!(text["value"], Value::Null);
    }

    #[test]
    fn copy_and_paste_through_json() {
        let (mut handle, _) = loaded();
        handle.select(r#"["Button1"]"#);
        let copied = parse(&handle.copy());
        let payload = copied["payload"].to_string();
        let pasted = parse(&handle.paste(&payload, false));
        assert_eq!(pasted, json!({"ok": true, "names": ["Button1_2"]}));

        let bad = parse(&handle.paste("{}", false));
        assert_eq!(bad["ok"], false);
    }

    #[test]
    fn palette_search_and_translations() {
        let (mut handle, _) = loaded();
        let palette = parse(&handle.get_palette());
        assert_eq!(palette[0]["category"], "USERINTERFACE");

        assert!(handle.tick());
        let found = parse(&handle.search_palette("butt"));
        assert_eq!(found, json!(["Button"]));

        handle.set_translations(r#"{"Button":"Botón"}"#);
        handle.tick();
        assert_eq!(parse(&handle.search_palette("botó")), json!(["Button"]));
    }

    #[test]
    fn standalone_validate_and_upgrade() {
        let reply = parse(&validate(BUTTON));
        assert_eq!(reply, json!({"ok": true, "components": 3, "upgraded": false}));

        let upgraded = parse(&upgrade_source(LEGACY, "x.org"));
        assert_eq!(upgraded["ok"], true);
        assert!(upgraded["text"].as_str().unwrap().contains("\"x.org\""));

        assert_eq!(parse(&validate("not a source"))["ok"], false);
    }
}

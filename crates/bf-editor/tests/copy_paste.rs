//! Integration tests: copy, cut and paste between designers, with name
//! collision rewriting carried into the pasted block fragments.

use bf_core::{ComponentDatabase, ComponentTree, SchemaUpgrader};
use bf_editor::sinks::{PanelRecorder, StructureRecorder};
use bf_editor::{
    ClipboardPayload, Designer, DesignerConfig, DesignerError, MemoryBlockEditor,
    MemoryProjectService,
};
use pretty_assertions::assert_eq;

const BUTTON: &str = include_str!("fixtures/button_screen.scm");
const HELLO: &str = include_str!("fixtures/hello_screen.scm");

const CLICK: &str = r#"<block type="component_event"><mutation component_type="Button" instance_name="Button1" event_name="Click"></mutation><field name="COMPONENT_SELECTOR">Button1</field><statement name="DO"><block type="component_set_get"><mutation component_type="Label" set_or_get="set" property_name="Text" is_generic="false" instance_name="Label1"></mutation><field name="COMPONENT_SELECTOR">Label1</field></block></statement></block>"#;

fn open(source: &str) -> (Designer, MemoryBlockEditor) {
    let config = DesignerConfig::default();
    let mut service = MemoryProjectService::new();
    service.insert(config.project_id, &config.file_id, source);
    let blocks = MemoryBlockEditor::new();
    let mut designer = Designer::new(
        config,
        ComponentDatabase::builtin(),
        SchemaUpgrader::builtin(),
        Box::new(PanelRecorder::default()),
        Box::new(StructureRecorder::default()),
        Box::new(blocks.clone()),
    );
    designer.load_with(&mut service).expect("load failed");
    (designer, blocks)
}

fn children(tree: &ComponentTree, name: &str) -> Vec<String> {
    let idx = tree.index_of(name).unwrap();
    tree.children(idx)
        .iter()
        .map(|&c| tree.graph[c].name.to_string())
        .collect()
}

fn parent(tree: &ComponentTree, name: &str) -> String {
    let idx = tree.index_of(name).unwrap();
    let parent = tree.parent(idx).unwrap();
    tree.graph[parent].name.to_string()
}

// ─── Copy + paste in one designer ────────────────────────────────────────

#[test]
fn pasted_button_gets_fresh_name_and_retargeted_blocks() {
    let (mut d, blocks) = open(BUTTON);
    blocks.add_block(CLICK);

    d.select("Button1").unwrap();
    let payload = d.copy().unwrap();
    assert_eq!(payload.components.len(), 1);
    assert_eq!(payload.blocks, vec![CLICK.to_string()]);

    let pasted = d.paste(&payload, false).unwrap();
    assert_eq!(pasted, vec!["Button1_2".to_string()]);

    let tree = d.tree().unwrap();
    assert_eq!(children(tree, "Screen1"), vec!["Button1", "Button1_2", "Label1"]);
    let original = tree.get_by_name("Button1").unwrap();
    let copy = tree.get_by_name("Button1_2").unwrap();
    assert_ne!(original.uuid, copy.uuid);
    assert_eq!(copy.property("Text"), Some("Click me"));
    assert_eq!(d.selection(), vec!["Button1_2".to_string()]);

    assert_eq!(
        blocks.blocks(),
        vec![CLICK.to_string(), CLICK.replace("Button1", "Button1_2")]
    );
    assert!(blocks.catalog().contains_key("Button1_2"));
}

#[test]
fn components_only_paste_leaves_blocks_alone() {
    let (mut d, blocks) = open(BUTTON);
    blocks.add_block(CLICK);
    d.select("Button1").unwrap();
    let payload = d.copy().unwrap();
    d.paste(&payload, true).unwrap();
    assert_eq!(blocks.blocks().len(), 1);
}

#[test]
fn repeated_paste_keeps_counting() {
    let (mut d, _) = open(BUTTON);
    d.select("Button1").unwrap();
    let payload = d.copy().unwrap();
    d.paste(&payload, false).unwrap();
    let second = d.paste(&payload, false).unwrap();
    assert_eq!(second, vec!["Button1_3".to_string()]);
    assert_eq!(
        children(d.tree().unwrap(), "Screen1"),
        vec!["Button1", "Button1_2", "Button1_3", "Label1"]
    );
}

#[test]
fn a_lone_container_receives_the_paste() {
    let (mut d, _) = open(HELLO);
    d.select("HorizontalArrangement1").unwrap();
    let payload = d.copy().unwrap();
    let pasted = d.paste(&payload, false).unwrap();
    assert_eq!(pasted, vec!["HorizontalArrangement1_2".to_string()]);

    let tree = d.tree().unwrap();
    assert_eq!(
        children(tree, "HorizontalArrangement1"),
        vec!["Button1", "Label1", "HorizontalArrangement1_2"]
    );
    assert_eq!(
        children(tree, "HorizontalArrangement1_2"),
        vec!["Button1_2", "Label1_2"]
    );
}

#[test]
fn non_visible_components_always_land_on_the_root() {
    let (mut d, _) = open(HELLO);
    d.select_many(&["Clock1", "Button1"]).unwrap();
    let payload = d.copy().unwrap();
    let pasted = d.paste(&payload, false).unwrap();
    assert_eq!(pasted, vec!["Clock1_2".to_string(), "Button1_2".to_string()]);

    let tree = d.tree().unwrap();
    assert_eq!(parent(tree, "Clock1_2"), "Screen1");
    assert_eq!(
        children(tree, "HorizontalArrangement1"),
        vec!["Button1", "Button1_2", "Label1"]
    );
}

#[test]
fn deleted_target_falls_back_to_the_root() {
    let (mut d, _) = open(HELLO);
    d.select("Button1").unwrap();
    let payload = d.copy().unwrap();
    d.delete("HorizontalArrangement1").unwrap();

    let pasted = d.paste(&payload, false).unwrap();
    assert_eq!(pasted, vec!["Button1".to_string()], "the name is free again");
    let tree = d.tree().unwrap();
    assert_eq!(
        children(tree, "Screen1"),
        vec!["Chart1", "Button1", "Clock1", "Notifier1"]
    );
}

#[test]
fn paste_the_target_cannot_hold_is_rejected_whole() {
    let (mut d, blocks) = open(HELLO);
    d.select_many(&["ChartData2D1", "Button1"]).unwrap();
    let payload = d.copy().unwrap();
    let before = d.encode().unwrap();
    let catalog = blocks.catalog();

    let err = d.paste(&payload, false).unwrap_err();
    assert!(matches!(err, DesignerError::InvalidPasteTarget(_)));
    assert_eq!(d.encode().unwrap(), before);
    assert_eq!(blocks.catalog(), catalog);
    assert!(!d.auto_save_scheduled());
}

#[test]
fn renamed_original_keeps_its_identity_through_a_paste() {
    let (mut d, _) = open(BUTTON);
    d.select("Button1").unwrap();
    let payload = d.copy().unwrap();
    d.rename("Button1", "OkButton").unwrap();

    let pasted = d.paste(&payload, false).unwrap();
    assert_eq!(pasted, vec!["Button1".to_string()], "the old name is free");
    let tree = d.tree().unwrap();
    assert_eq!(tree.get_by_name("OkButton").unwrap().uuid.to_string(), "201");
    assert_ne!(tree.get_by_name("Button1").unwrap().uuid.to_string(), "201");
}

#[test]
fn old_copies_are_upgraded_before_they_land() {
    let (mut d, _) = open(BUTTON);
    d.select("Label1").unwrap();
    let payload = ClipboardPayload::from_json(
        r#"{"$components":[{"$Name":"Button9","$Type":"Button","$Version":"1","Alignment":"2"}]}"#,
    )
    .unwrap();

    let pasted = d.paste(&payload, false).unwrap();
    assert_eq!(pasted, vec!["Button9".to_string()]);
    let button = d.tree().unwrap().get_by_name("Button9").unwrap();
    assert_eq!(button.version, 4);
    assert_eq!(button.property("TextAlignment"), Some("2"));
}

#[test]
fn copies_from_a_newer_designer_are_refused() {
    let (mut d, blocks) = open(BUTTON);
    let before = d.encode().unwrap();
    let catalog = blocks.catalog();
    d.select("Label1").unwrap();
    let payload = ClipboardPayload::from_json(
        r#"{"$components":[{"$Name":"Button9","$Type":"Button","$Version":"99"}]}"#,
    )
    .unwrap();

    let err = d.paste(&payload, false).unwrap_err();
    assert!(matches!(err, DesignerError::IncompatiblePaste(_)));
    assert_eq!(d.encode().unwrap(), before);
    assert_eq!(blocks.catalog(), catalog);
    assert!(!d.auto_save_scheduled());
}

// ─── Root paste ──────────────────────────────────────────────────────────

#[test]
fn root_pastes_onto_the_selected_root_only() {
    let (mut d, _) = open(BUTTON);
    let payload = d.copy().unwrap();
    assert_eq!(payload.components.len(), 1);

    d.select("Label1").unwrap();
    assert!(matches!(
        d.paste(&payload, false),
        Err(DesignerError::InvalidPasteTarget(_))
    ));

    d.select("Screen1").unwrap();
    d.set_property("Screen1", "AppName", "Other").unwrap();
    let pasted = d.paste(&payload, false).unwrap();
    assert_eq!(pasted, vec!["Button1_2".to_string(), "Label1_2".to_string()]);
    let tree = d.tree().unwrap();
    assert_eq!(tree.root_instance().property("AppName"), Some("Clicker"));
    assert_eq!(
        children(tree, "Screen1"),
        vec!["Button1", "Label1", "Button1_2", "Label1_2"]
    );
}

// ─── Cut and cross-designer paste ────────────────────────────────────────

#[test]
fn cut_then_paste_restores_name_and_identity() {
    let (mut d, blocks) = open(HELLO);
    d.select("Label1").unwrap();
    let payload = d.cut().unwrap();
    assert!(!d.tree().unwrap().contains_name("Label1"));
    assert!(!blocks.catalog().contains_key("Label1"));

    let pasted = d.paste(&payload, false).unwrap();
    assert_eq!(pasted, vec!["Label1".to_string()]);
    let tree = d.tree().unwrap();
    assert_eq!(parent(tree, "Label1"), "HorizontalArrangement1");
    assert_eq!(tree.get_by_name("Label1").unwrap().uuid.to_string(), "103");

    d.select("Screen1").unwrap();
    assert!(d.cut().is_err(), "the root cannot be cut");
}

#[test]
fn payload_travels_between_designers_as_json() {
    let (mut source, source_blocks) = open(BUTTON);
    source_blocks.add_block(CLICK);
    source.select("Button1").unwrap();
    let text = source.copy().unwrap().to_json().unwrap();

    let (mut target, target_blocks) = open(HELLO);
    target.select("Label1").unwrap();
    let payload = ClipboardPayload::from_json(&text).unwrap();
    let pasted = target.paste(&payload, false).unwrap();
    assert_eq!(pasted, vec!["Button1_2".to_string()]);
    assert_eq!(
        children(target.tree().unwrap(), "HorizontalArrangement1"),
        vec!["Button1", "Label1", "Button1_2"]
    );
    assert_eq!(target_blocks.blocks(), vec![CLICK.replace("Button1", "Button1_2")]);
}

//! Integration tests: decode → encode → re-decode round-trip.
//!
//! Verifies that no component data is lost when converting source text →
//! ComponentTree → source text.

use bf_core::codec::{component_json, decode_components};
use bf_core::{
    ComponentDatabase, ComponentFactory, ComponentTree, DecodeContext, Document, NodeIndex,
    SubstitutionMap, decode_document, encode_document,
};
use pretty_assertions::assert_eq;

const HELLO: &str = include_str!("fixtures/hello_screen.scm");

// ─── Helpers ─────────────────────────────────────────────────────────────

fn decode(text: &str) -> Document {
    let db = ComponentDatabase::builtin();
    decode_document(text, &DecodeContext::default(), &db).expect("decode failed")
}

/// (name, type, uuid, parent name, persisted properties) for every component.
fn summary(tree: &ComponentTree) -> Vec<(String, String, String, Option<String>, Vec<(String, String)>)> {
    tree.iter()
        .map(|(idx, c)| {
            let parent = tree
                .parent(idx)
                .and_then(|p| tree.get(p))
                .map(|p| p.name.to_string());
            let props = c
                .properties
                .persisted_pairs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            (
                c.name.to_string(),
                c.component_type().to_string(),
                c.uuid.to_string(),
                parent,
                props,
            )
        })
        .collect()
}

// ─── Fixture-based tests ─────────────────────────────────────────────────

#[test]
fn roundtrip_hello_screen() {
    let first = decode(HELLO);
    let encoded = encode_document(&first);
    let second = decode(&encoded);

    assert_eq!(summary(&first.tree), summary(&second.tree));
    assert_eq!(first.auth_urls, second.auth_urls);
    assert_eq!(second.ya_version, 208);
}

#[test]
fn encoding_is_stable() {
    let once = encode_document(&decode(HELLO));
    let twice = encode_document(&decode(&once));
    assert_eq!(once, twice);
}

#[test]
fn decoded_structure_matches_fixture() {
    let doc = decode(HELLO);
    let tree = &doc.tree;
    assert_eq!(
        tree.names(),
        vec![
            "Screen1",
            "HorizontalArrangement1",
            "Button1",
            "Label1",
            "Chart1",
            "ChartData2D1",
            "Clock1",
            "Notifier1",
        ]
    );

    let row = tree.index_of("HorizontalArrangement1").unwrap();
    let kids: Vec<String> = tree
        .children(row)
        .iter()
        .map(|&c| tree.get(c).unwrap().name.to_string())
        .collect();
    assert_eq!(kids, vec!["Button1", "Label1"]);

    let visible: Vec<NodeIndex> = tree.visible_children(tree.root);
    assert_eq!(visible.len(), 2, "arrangement and chart are visible");
    assert_eq!(
        tree.get_by_name("Clock1").unwrap().property("TimerInterval"),
        Some("500")
    );
}

#[test]
fn defaults_are_not_written() {
    let db = ComponentDatabase::builtin();
    let root = db.create_component("Form", "Screen1").unwrap();
    let mut tree = ComponentTree::new(root);
    let button = db.create_component("Button", "Button1").unwrap();
    let uuid = button.uuid.clone();
    let idx = tree.add_child(tree.root, button, None).unwrap();

    assert_eq!(
        component_json(&tree, idx),
        format!(r#"{{"$Name":"Button1","$Type":"Button","$Version":"4","Uuid":"{uuid}"}}"#)
    );

    tree.set_property(idx, "Text", "Say \"hi\"").unwrap();
    assert!(component_json(&tree, idx).ends_with(r#""Text":"Say \"hi\""}"#));
}

#[test]
fn pasted_subtree_is_renamed_throughout() {
    let doc = decode(HELLO);
    let db = ComponentDatabase::builtin();
    let row = doc.tree.index_of("HorizontalArrangement1").unwrap();
    let object = bf_core::codec::component_value(&doc.tree, row).unwrap();

    let mut subst = SubstitutionMap::new();
    let planned = decode_components(&doc.tree, &[object], &db, Some(&mut subst)).unwrap();
    assert_eq!(planned.len(), 1);
    let names: Vec<String> = planned[0].names().iter().map(|n| n.to_string()).collect();
    assert_eq!(
        names,
        vec!["HorizontalArrangement1_2", "Button1_2", "Label1_2"]
    );
    assert_eq!(subst.len(), 3);
    assert_eq!(subst.get("Label1"), Some("Label1_2"));
}

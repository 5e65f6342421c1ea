//! Integration tests: legacy source files upgraded to the installed schema.

use bf_core::codec::decode_encoded;
use bf_core::source::EncodedDocument;
use bf_core::upgrade::apply_provenance;
use bf_core::{ComponentDatabase, DecodeContext, SchemaUpgrader, UpgradeError};
use pretty_assertions::assert_eq;

const LEGACY: &str = include_str!("fixtures/legacy_screen.scm");
const HELLO: &str = include_str!("fixtures/hello_screen.scm");

#[test]
fn legacy_screen_upgrades_every_component() {
    let db = ComponentDatabase::builtin();
    let upgrader = SchemaUpgrader::builtin();
    let mut encoded = EncodedDocument::from_source(LEGACY).unwrap();

    let report = upgrader.upgrade_document(&mut encoded, &db).unwrap();
    assert!(report.upgraded());
    assert_eq!(report.loaded_ya_version, 150);
    // Form 2, VerticalArrangement 1, Button 3, Label 2, TextBox 1.
    assert_eq!(report.component_steps, 9);

    let doc = decode_encoded(&encoded, &DecodeContext::default(), &db).unwrap();
    let tree = &doc.tree;

    let root = tree.root_instance();
    assert_eq!(root.property("Sizing"), Some("Fixed"));
    assert_eq!(root.property("Title"), Some("Legacy"));

    let column = tree.get_by_name("VerticalArrangement1").unwrap();
    assert_eq!(column.property("AlignHorizontal"), Some("2"));
    assert_eq!(column.property("AlignVertical"), Some("1"));

    let button = tree.get_by_name("Button1").unwrap();
    assert_eq!(button.version, 4);
    assert_eq!(button.property("TextAlignment"), Some("0"));
    assert_eq!(button.property("BackgroundColor"), Some("&HFF0000FF"));

    let label = tree.get_by_name("Label1").unwrap();
    assert_eq!(label.property("TextAlignment"), Some("2"));
    assert_eq!(label.property("HasMargins"), Some("False"));

    let text_box = tree.get_by_name("TextBox1").unwrap();
    assert_eq!(text_box.property("Hint"), Some("Name"));
    assert_eq!(text_box.uuid.as_str(), "-1204");
}

#[test]
fn second_upgrade_performs_no_steps() {
    let db = ComponentDatabase::builtin();
    let upgrader = SchemaUpgrader::builtin();
    let mut encoded = EncodedDocument::from_source(LEGACY).unwrap();
    upgrader.upgrade_document(&mut encoded, &db).unwrap();

    let report = upgrader.upgrade_document(&mut encoded, &db).unwrap();
    assert_eq!(report.component_steps, 0);
    assert!(!report.upgraded());
}

#[test]
fn current_screen_needs_no_upgrade() {
    let db = ComponentDatabase::builtin();
    let mut encoded = EncodedDocument::from_source(HELLO).unwrap();
    let report = SchemaUpgrader::builtin()
        .upgrade_document(&mut encoded, &db)
        .unwrap();
    assert!(!report.upgraded());
}

#[test]
fn legacy_screen_gains_provenance() {
    let db = ComponentDatabase::builtin();
    let mut encoded = EncodedDocument::from_source(LEGACY).unwrap();
    let report = SchemaUpgrader::builtin()
        .upgrade_document(&mut encoded, &db)
        .unwrap();
    apply_provenance(&mut encoded.auth_urls, report.loaded_ya_version, "x.org");
    assert_eq!(
        encoded.auth_urls.unwrap().to_vec(),
        vec!["*UNKNOWN*".to_string(), "x.org".to_string()]
    );
}

#[test]
fn component_newer_than_installed_is_rejected() {
    let db = ComponentDatabase::builtin();
    let text = r#"{"YaVersion":"208","Source":"Form","Properties":{
        "$Name":"Screen1","$Type":"Form","$Version":"3",
        "$Components":[{"$Name":"Button1","$Type":"Button","$Version":"12"}]}}"#;
    let mut encoded = EncodedDocument::from_source(text).unwrap();
    let err = SchemaUpgrader::builtin()
        .upgrade_document(&mut encoded, &db)
        .unwrap_err();
    assert_eq!(
        err,
        UpgradeError::NewerThanInstalled {
            component_type: "Button".into(),
            found: 12,
            installed: 4,
        }
    );
}

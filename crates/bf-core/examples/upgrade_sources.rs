//! Upgrade screen source files in place to the installed component schema.
//!
//! Usage: `cargo run -p bf-core --example upgrade_sources -- [files...]`
//! With no arguments, every `.scm` under `crates/bf-core/tests/fixtures` is
//! checked but not rewritten.

use bf_core::codec::{decode_encoded, encode_document};
use bf_core::source::EncodedDocument;
use bf_core::{ComponentDatabase, DecodeContext, SchemaUpgrader};
use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let dry_run = args.is_empty();
    let paths: Vec<PathBuf> = if dry_run {
        fs::read_dir("crates/bf-core/tests/fixtures")
            .map(|entries| {
                entries
                    .flatten()
                    .map(|entry| entry.path())
                    .filter(|path| path.extension().is_some_and(|e| e == "scm"))
                    .collect()
            })
            .unwrap_or_default()
    } else {
        args.iter().map(PathBuf::from).collect()
    };

    let db = ComponentDatabase::builtin();
    let upgrader = SchemaUpgrader::builtin();
    let mut upgraded = 0;
    let mut skipped = 0;

    for path in &paths {
        let input = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("SKIP {}: {}", path.display(), e);
                skipped += 1;
                continue;
            }
        };

        let mut encoded = match EncodedDocument::from_source(&input) {
            Ok(doc) => doc,
            Err(e) => {
                eprintln!("PARSE ERROR {}: {}", path.display(), e);
                skipped += 1;
                continue;
            }
        };

        let report = match upgrader.upgrade_document(&mut encoded, &db) {
            Ok(report) => report,
            Err(e) => {
                eprintln!("UPGRADE ERROR {}: {}", path.display(), e);
                skipped += 1;
                continue;
            }
        };
        if !report.upgraded() {
            skipped += 1;
            continue;
        }

        match decode_encoded(&encoded, &DecodeContext::default(), &db) {
            Ok(doc) if dry_run => {
                upgraded += 1;
                println!(
                    "would upgrade {} ({} steps, {} components)",
                    path.display(),
                    report.component_steps,
                    doc.tree.len()
                );
            }
            Ok(doc) => {
                if let Err(e) = fs::write(path, encode_document(&doc)) {
                    eprintln!("ERROR writing {}: {}", path.display(), e);
                } else {
                    upgraded += 1;
                    println!("✓ {}", path.display());
                }
            }
            Err(e) => {
                eprintln!("DECODE ERROR {}: {}", path.display(), e);
                skipped += 1;
            }
        }
    }

    println!("\nUpgraded: {upgraded}, Skipped: {skipped}");
}

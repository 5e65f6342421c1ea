//! Source-file envelope and the document object it carries.
//!
//! Screen files are stored as
//!
//! ```text
//! #|
//! $JSON
//! {"authURL":["example.org"],"YaVersion":"208","Source":"Form","Properties":{...}}
//! |#
//! ```
//!
//! Bare JSON (no envelope) is accepted on read. Built on `winnow` 0.7.

use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use winnow::ascii::multispace0;
use winnow::combinator::{delimited, preceded};
use winnow::prelude::*;
use winnow::token::take_until;

pub const ENVELOPE_OPEN: &str = "#|";
pub const ENVELOPE_CLOSE: &str = "|#";
pub const JSON_MARKER: &str = "$JSON";

/// Host names a document has been opened on, oldest first.
pub type AuthUrls = SmallVec<[String; 2]>;

/// The top-level object of a screen file, component tree still as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedDocument {
    #[serde(rename = "authURL", default, skip_serializing_if = "Option::is_none")]
    pub auth_urls: Option<AuthUrls>,
    /// Document format version; historically a string, sometimes a number.
    #[serde(rename = "YaVersion")]
    pub ya_version: serde_json::Value,
    #[serde(rename = "Source", default = "default_source")]
    pub source: String,
    #[serde(rename = "Properties")]
    pub properties: serde_json::Value,
}

fn default_source() -> String {
    "Form".into()
}

impl EncodedDocument {
    /// Parse a screen file, with or without the envelope.
    pub fn from_source(text: &str) -> Result<Self, CodecError> {
        let json = unwrap_envelope(text)?;
        Ok(serde_json::from_str(json)?)
    }
}

/// Extract the JSON payload of a source file.
pub fn unwrap_envelope(text: &str) -> Result<&str, CodecError> {
    let mut rest = text.trim_start();
    if !rest.starts_with(ENVELOPE_OPEN) {
        return Ok(rest.trim_end());
    }
    parse_envelope
        .parse_next(&mut rest)
        .map(str::trim)
        .map_err(|e| CodecError::Envelope(format!("{e}")))
}

/// Wrap a JSON payload in the source-file envelope.
pub fn wrap_envelope(json: &str) -> String {
    format!("{ENVELOPE_OPEN}\n{JSON_MARKER}\n{json}\n{ENVELOPE_CLOSE}\n")
}

fn parse_envelope<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    preceded(
        (ENVELOPE_OPEN, multispace0, JSON_MARKER),
        delimited(multispace0, take_until(0.., ENVELOPE_CLOSE), ENVELOPE_CLOSE),
    )
    .parse_next(input)
}

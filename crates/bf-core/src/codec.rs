//! Codec: ComponentTree ⇄ screen source JSON.
//!
//! Component objects are written by a hand-rolled emitter so key order is
//! canonical: `$Name`, `$Type`, `$Version`, `Uuid`, then persisted non-default
//! properties in declaration order, then `$Components`.
//!
//! Decoding runs in two phases. The planning phase walks the JSON, resolves
//! every type through the component factory, checks containment and names,
//! and builds detached subtrees. Only when the whole input is valid are the
//! subtrees attached, so a failed decode never leaves a half-built tree.

use crate::error::{CodecError, ModelError};
use crate::id::{ComponentName, ComponentUuid};
use crate::model::{ComponentInstance, ComponentTree, DetachedComponent};
use crate::source::{AuthUrls, EncodedDocument, wrap_envelope};
use crate::types::{ComponentFactory, ComponentTypeInfo};
use crate::upgrade::parse_version;
use petgraph::graph::NodeIndex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt::Write;
use std::sync::Arc;

/// Document format version written by this build.
pub const CURRENT_YA_VERSION: u32 = 208;

/// Root properties that only make sense on components inside a table.
const ROOT_STRAY_PROPERTIES: [&str; 2] = ["Row", "Column"];

// ─── Document ────────────────────────────────────────────────────────────

/// A decoded screen: the component tree plus file metadata.
#[derive(Debug)]
pub struct Document {
    pub tree: ComponentTree,
    pub ya_version: u32,
    pub source: String,
    pub auth_urls: Option<AuthUrls>,
}

impl Document {
    pub fn new(tree: ComponentTree) -> Self {
        Self {
            tree,
            ya_version: CURRENT_YA_VERSION,
            source: "Form".into(),
            auth_urls: None,
        }
    }
}

/// What the decoder needs to know about the document being read.
#[derive(Debug, Clone)]
pub struct DecodeContext {
    /// The only type allowed at the top of the tree.
    pub root_type: String,
    /// Used to fill in a missing `AppName` on the root.
    pub project_name: Option<String>,
}

impl Default for DecodeContext {
    fn default() -> Self {
        Self {
            root_type: "Form".into(),
            project_name: None,
        }
    }
}

/// Old name → new name for components renamed while pasting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionMap {
    entries: Vec<(String, String)>,
}

impl SubstitutionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, old: &str, new: &str) {
        match self.entries.iter_mut().find(|(o, _)| o == old) {
            Some(entry) => entry.1 = new.to_string(),
            None => self.entries.push((old.to_string(), new.to_string())),
        }
    }

    pub fn get(&self, old: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(o, _)| o == old)
            .map(|(_, n)| n.as_str())
    }

    /// The name `old` maps to, or `old` itself.
    pub fn resolve<'a>(&'a self, old: &'a str) -> &'a str {
        self.get(old).unwrap_or(old)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(o, n)| (o.as_str(), n.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ─── Encoding ────────────────────────────────────────────────────────────

fn push_json_str(out: &mut String, s: &str) {
    let _ = write!(out, "{}", Value::from(s));
}

/// Append one component object (and its subtree) to `out`.
pub fn encode_component(out: &mut String, tree: &ComponentTree, idx: NodeIndex) {
    let Some(component) = tree.get(idx) else {
        return;
    };
    out.push_str("{\"$Name\":");
    push_json_str(out, component.name.as_str());
    out.push_str(",\"$Type\":");
    push_json_str(out, component.component_type());
    let _ = write!(out, ",\"$Version\":\"{}\",\"Uuid\":", component.version);
    push_json_str(out, component.uuid.as_str());

    for (key, value) in component.properties.persisted_pairs() {
        out.push(',');
        push_json_str(out, key);
        out.push(':');
        push_json_str(out, value);
    }

    let children = tree.children(idx);
    if !children.is_empty() {
        out.push_str(",\"$Components\":[");
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            encode_component(out, tree, *child);
        }
        out.push(']');
    }
    out.push('}');
}

/// One component subtree as a JSON string.
#[must_use]
pub fn component_json(tree: &ComponentTree, idx: NodeIndex) -> String {
    let mut out = String::with_capacity(256);
    encode_component(&mut out, tree, idx);
    out
}

/// One component subtree as a JSON value.
pub fn component_value(tree: &ComponentTree, idx: NodeIndex) -> Result<Value, CodecError> {
    Ok(serde_json::from_str(&component_json(tree, idx))?)
}

/// The document object without the source-file envelope.
#[must_use]
pub fn encode_document_json(doc: &Document) -> String {
    let mut out = String::with_capacity(1024);
    out.push('{');
    if let Some(urls) = &doc.auth_urls {
        out.push_str("\"authURL\":[");
        for (i, url) in urls.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            push_json_str(&mut out, url);
        }
        out.push_str("],");
    }
    let _ = write!(out, "\"YaVersion\":\"{}\",\"Source\":", doc.ya_version);
    push_json_str(&mut out, &doc.source);
    out.push_str(",\"Properties\":");
    encode_component(&mut out, &doc.tree, doc.tree.root);
    out.push('}');
    out
}

/// The complete screen source file.
#[must_use]
pub fn encode_document(doc: &Document) -> String {
    wrap_envelope(&encode_document_json(doc))
}

// ─── Decoding ────────────────────────────────────────────────────────────

/// Decode a screen source file (enveloped or bare JSON). No upgrade is run.
pub fn decode_document<F>(text: &str, ctx: &DecodeContext, factory: &F) -> Result<Document, CodecError>
where
    F: ComponentFactory + ?Sized,
{
    let encoded = EncodedDocument::from_source(text)?;
    decode_encoded(&encoded, ctx, factory)
}

/// Decode an already parsed (and usually already upgraded) document.
pub fn decode_encoded<F>(
    encoded: &EncodedDocument,
    ctx: &DecodeContext,
    factory: &F,
) -> Result<Document, CodecError>
where
    F: ComponentFactory + ?Sized,
{
    let ya_version = parse_version("YaVersion", Some(&encoded.ya_version))?;
    let mut root_object = as_object("Properties", &encoded.properties)?.clone();
    fix_up_root(&mut root_object, ctx);

    let (type_name, name) = read_header(&root_object)?;
    if type_name != ctx.root_type {
        return Err(CodecError::RootTypeMismatch {
            expected: ctx.root_type.clone(),
            found: type_name.to_string(),
        });
    }
    let info = factory
        .type_info(type_name)
        .ok_or_else(|| ModelError::ComponentNotFound(type_name.to_string()))?;
    if !ComponentName::is_valid(name) {
        return Err(ModelError::InvalidName(name.to_string()).into());
    }
    let (uuid, values) = read_values(&info, name, &root_object)?;
    let root = build_instance(info.clone(), name, uuid, &values);
    let mut tree = ComponentTree::new(root);

    let planned = {
        let mut planner = Planner::new(&tree, factory, &ctx.root_type, None);
        planner.plan_children(&root_object, &info, name)?
    };
    let root = tree.root;
    for subtree in planned {
        tree.attach(root, subtree, None)?;
    }
    // Load-time structure is not a user edit.
    tree.take_events();

    Ok(Document {
        tree,
        ya_version,
        source: encoded.source.clone(),
        auth_urls: encoded.auth_urls.clone(),
    })
}

/// Decode component objects for insertion into an existing tree.
///
/// Nothing is attached: the caller places the returned subtrees. With a
/// substitution map, names already in use are replaced by fresh ones, and a
/// component gets a fresh UUID unless it was renamed or its stored UUID is
/// still held by a component in the tree; without one a taken name is a
/// [`ModelError::NameCollision`].
pub fn decode_components<F>(
    tree: &ComponentTree,
    objects: &[Value],
    factory: &F,
    substitutions: Option<&mut SubstitutionMap>,
) -> Result<Vec<DetachedComponent>, CodecError>
where
    F: ComponentFactory + ?Sized,
{
    let root_type = tree.root_type().to_string();
    let mut planner = Planner::new(tree, factory, &root_type, substitutions);
    objects
        .iter()
        .map(|object| planner.plan(object, None))
        .collect()
}

fn fix_up_root(root: &mut Map<String, Value>, ctx: &DecodeContext) {
    for key in ROOT_STRAY_PROPERTIES {
        if root.remove(key).is_some() {
            log::debug!("removed stray {key} property from the root component");
        }
    }
    if let Some(project) = &ctx.project_name {
        let missing = root
            .get("AppName")
            .and_then(Value::as_str)
            .is_none_or(str::is_empty);
        if missing {
            root.insert("AppName".into(), Value::String(project.clone()));
        }
    }
}

fn as_object<'a>(key: &'static str, value: &'a Value) -> Result<&'a Map<String, Value>, CodecError> {
    value.as_object().ok_or_else(|| CodecError::BadValue {
        key,
        value: value.to_string(),
    })
}

fn read_header(object: &Map<String, Value>) -> Result<(&str, &str), CodecError> {
    let field = |key: &'static str| -> Result<&str, CodecError> {
        match object.get(key) {
            None => Err(CodecError::MissingKey(key)),
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(other) => Err(CodecError::BadValue {
                key,
                value: other.to_string(),
            }),
        }
    };
    Ok((field("$Type")?, field("$Name")?))
}

/// Split a component object into its stored UUID and the declared property
/// values. Undeclared properties are dropped with a warning.
fn read_values(
    info: &ComponentTypeInfo,
    name: &str,
    object: &Map<String, Value>,
) -> Result<(Option<ComponentUuid>, Vec<(String, String)>), CodecError> {
    let mut uuid = None;
    let mut values = Vec::new();
    for (key, value) in object {
        if key.starts_with('$') {
            continue;
        }
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => (if *b { "True" } else { "False" }).to_string(),
            other => {
                return Err(CodecError::BadValue {
                    key: "property",
                    value: format!("{key}={other}"),
                });
            }
        };
        if key == "Uuid" {
            uuid = Some(ComponentUuid::from_stored(&text));
        } else if info.property(key).is_some() {
            values.push((key.clone(), text));
        } else {
            log::warn!("dropping unknown property {key} of {name} ({})", info.name);
        }
    }
    Ok((uuid, values))
}

fn build_instance(
    info: Arc<ComponentTypeInfo>,
    name: &str,
    uuid: Option<ComponentUuid>,
    values: &[(String, String)],
) -> ComponentInstance {
    let mut instance = ComponentInstance::new(info, name);
    if let Some(uuid) = uuid {
        instance.uuid = uuid;
    }
    for (key, value) in values {
        // Keys were checked against the type's definitions by `read_values`.
        let _ = instance.properties.set(&instance.info.name, key, value);
    }
    instance
}

/// Validating first pass of decoding.
struct Planner<'a, F: ?Sized> {
    tree: &'a ComponentTree,
    factory: &'a F,
    root_type: &'a str,
    /// Names claimed by components planned so far.
    taken: HashSet<String>,
    /// UUIDs kept by components planned so far.
    kept_uuids: HashSet<ComponentUuid>,
    substitutions: Option<&'a mut SubstitutionMap>,
}

impl<'a, F: ComponentFactory + ?Sized> Planner<'a, F> {
    fn new(
        tree: &'a ComponentTree,
        factory: &'a F,
        root_type: &'a str,
        substitutions: Option<&'a mut SubstitutionMap>,
    ) -> Self {
        Self {
            tree,
            factory,
            root_type,
            taken: HashSet::new(),
            kept_uuids: HashSet::new(),
            substitutions,
        }
    }

    fn in_use(&self, name: &str) -> bool {
        self.taken.contains(name) || self.tree.contains_name(name)
    }

    fn plan_children(
        &mut self,
        object: &Map<String, Value>,
        parent: &ComponentTypeInfo,
        parent_name: &str,
    ) -> Result<Vec<DetachedComponent>, CodecError> {
        let Some(children) = object.get("$Components") else {
            return Ok(Vec::new());
        };
        let Value::Array(children) = children else {
            return Err(CodecError::BadValue {
                key: "$Components",
                value: children.to_string(),
            });
        };
        children
            .iter()
            .map(|child| self.plan(child, Some((parent, parent_name))))
            .collect()
    }

    fn plan(
        &mut self,
        value: &Value,
        parent: Option<(&ComponentTypeInfo, &str)>,
    ) -> Result<DetachedComponent, CodecError> {
        let object = as_object("$Components", value)?;
        let (type_name, name) = read_header(object)?;
        if type_name == self.root_type {
            return Err(CodecError::DuplicateRoot(type_name.to_string()));
        }
        let info = self
            .factory
            .type_info(type_name)
            .ok_or_else(|| ModelError::ComponentNotFound(type_name.to_string()))?;
        if let Some((parent_info, parent_name)) = parent
            && !parent_info.accepts(&info)
        {
            return Err(ModelError::InvalidContainment {
                parent: parent_name.to_string(),
                parent_type: parent_info.name.clone(),
                child_type: type_name.to_string(),
            }
            .into());
        }
        if !ComponentName::is_valid(name) {
            return Err(ModelError::InvalidName(name.to_string()).into());
        }

        let (mut uuid, values) = read_values(&info, name, object)?;
        let mut final_name = name.to_string();
        if self.in_use(name) {
            let fresh = self.tree.gensym_name(name, &self.taken);
            let Some(substitutions) = self.substitutions.as_deref_mut() else {
                return Err(ModelError::NameCollision(name.to_string()).into());
            };
            log::debug!("pasted {name} renamed to {fresh}");
            substitutions.insert(name, &fresh);
            uuid = None;
            final_name = fresh;
        }
        self.taken.insert(final_name.clone());
        if self.substitutions.is_some() {
            // A pasted copy may only keep its UUID when nothing else holds it,
            // as after a cut.
            uuid = uuid.filter(|u| {
                self.tree.index_of_uuid(u).is_none() && !self.kept_uuids.contains(u)
            });
        }
        if let Some(kept) = &uuid {
            self.kept_uuids.insert(kept.clone());
        }

        let instance = build_instance(info.clone(), &final_name, uuid, &values);
        let children = self.plan_children(object, &info, &final_name)?;
        Ok(DetachedComponent { instance, children })
    }
}

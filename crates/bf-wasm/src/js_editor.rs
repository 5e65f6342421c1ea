//! Block editor backed by a JavaScript object.
//!
//! The host passes an object whose methods mirror [`BlockEditor`]:
//! `addComponent(type, name, uuid)`, `removeComponent(type, name, uuid)`,
//! `renameComponent(old, new, uuid)`, `componentTypesAdded(types)`,
//! `componentTypesRemoved(types)`, `propertyChanged(name, property, value)`,
//! `topBlocksForComponent(name) -> string[]` and
//! `pasteBlocks(fragments, substitutions)`. Missing methods are skipped.

use bf_core::SubstitutionMap;
use bf_editor::BlockEditor;
use js_sys::{Array, Function, Object, Reflect};
use wasm_bindgen::prelude::*;

pub struct JsBlockEditor {
    target: Object,
}

impl JsBlockEditor {
    pub fn new(target: Object) -> Self {
        Self { target }
    }

    fn call(&self, method: &str, args: &[JsValue]) -> Option<JsValue> {
        let function = Reflect::get(&self.target, &JsValue::from_str(method))
            .ok()?
            .dyn_into::<Function>()
            .ok()?;
        let args: Array = args.iter().collect();
        match function.apply(&self.target, &args) {
            Ok(value) => Some(value),
            Err(e) => {
                log::error!("block editor {method} threw: {e:?}");
                None
            }
        }
    }
}

fn string_array(items: &[String]) -> JsValue {
    items
        .iter()
        .map(|s| JsValue::from_str(s))
        .collect::<Array>()
        .into()
}

fn substitution_object(map: &SubstitutionMap) -> JsValue {
    let object = Object::new();
    for (old, new) in map.iter() {
        let _ = Reflect::set(&object, &JsValue::from_str(old), &JsValue::from_str(new));
    }
    object.into()
}

impl BlockEditor for JsBlockEditor {
    fn add_component(&mut self, component_type: &str, name: &str, uuid: &str) {
        self.call(
            "addComponent",
            &[component_type.into(), name.into(), uuid.into()],
        );
    }

    fn remove_component(&mut self, component_type: &str, name: &str, uuid: &str) {
        self.call(
            "removeComponent",
            &[component_type.into(), name.into(), uuid.into()],
        );
    }

    fn rename_component(&mut self, old_name: &str, new_name: &str, uuid: &str) {
        self.call(
            "renameComponent",
            &[old_name.into(), new_name.into(), uuid.into()],
        );
    }

    fn component_types_added(&mut self, types: &[String]) {
        self.call("componentTypesAdded", &[string_array(types)]);
    }

    fn component_types_removed(&mut self, types: &[String]) {
        self.call("componentTypesRemoved", &[string_array(types)]);
    }

    fn property_changed(&mut self, name: &str, property: &str, value: &str) {
        self.call(
            "propertyChanged",
            &[name.into(), property.into(), value.into()],
        );
    }

    fn top_blocks_for_component(&self, name: &str) -> Vec<String> {
        let Some(value) = self.call("topBlocksForComponent", &[name.into()]) else {
            return Vec::new();
        };
        match value.dyn_into::<Array>() {
            Ok(array) => array.iter().filter_map(|v| v.as_string()).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn paste_blocks(&mut self, fragments: &[String], substitutions: &SubstitutionMap) {
        self.call(
            "pasteBlocks",
            &[string_array(fragments), substitution_object(substitutions)],
        );
    }
}

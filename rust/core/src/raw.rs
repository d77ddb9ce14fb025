// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Raw element records as delivered by the model tree.
//!
//! The upstream tree is untyped JSON. This module is the single place where
//! that JSON is checked: a record must be an object, everything else about
//! its shape is optional and looked up defensively by [`RawElement`].

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Structural buckets scanned for parameters, in priority order.
pub const IDENTITY_DATA: &str = "Identity Data";
pub const CONSTRAINTS: &str = "Constraints";
pub const OTHER: &str = "Other";
pub const PARAMETERS: &str = "parameters";

pub const KNOWN_BUCKETS: [&str; 4] = [IDENTITY_DATA, CONSTRAINTS, OTHER, PARAMETERS];

/// Keys that describe tree structure rather than element data.
const CONTAINER_KEYS: [&str; 3] = ["children", "elements", "raw"];

/// An untyped record extracted from the model tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawElement {
    fields: Map<String, Value>,
}

impl RawElement {
    /// Decodes a record, rejecting anything that is not a JSON object.
    pub fn decode(value: Value, index: usize) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(Error::MalformedElement {
                index,
                reason: format!("expected an object, found {}", json_kind(&other)),
            }),
        }
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Nested field inside a named bucket, e.g. `Constraints.Host`.
    pub fn get_in(&self, bucket: &str, key: &str) -> Option<&Value> {
        self.bucket(bucket)?.get(key)
    }

    /// A structural bucket, when present and shaped as an object.
    pub fn bucket(&self, name: &str) -> Option<&Map<String, Value>> {
        self.fields.get(name).and_then(Value::as_object)
    }

    /// Non-empty string at the first matching path.
    ///
    /// Paths are `(bucket, key)` pairs, `None` meaning top level. Numbers are
    /// rendered as strings so numeric marks still act as join keys.
    pub fn first_string(&self, paths: &[(Option<&str>, &str)]) -> Option<String> {
        paths.iter().find_map(|(bucket, key)| {
            let value = match bucket {
                Some(b) => self.get_in(b, key),
                None => self.get(key),
            }?;
            let s = match value {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            (!s.is_empty()).then_some(s)
        })
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether this record carries element data, as opposed to being a
    /// pure grouping node in the tree.
    pub fn has_element_data(&self) -> bool {
        ["id", "elementId", "category", "type", "speckle_type"]
            .iter()
            .any(|k| self.fields.contains_key(*k))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Flattens an upstream model tree into element records, depth-first and
/// pre-order.
///
/// The root may be an array of nodes or a single node. A node nests its
/// children under `children` or `elements`; its own record either sits under
/// `raw` or is the node itself. Grouping nodes without element data are
/// walked but not emitted.
pub fn flatten_tree(root: Value) -> Result<Vec<RawElement>> {
    let mut out = Vec::new();
    let mut stack: Vec<Value> = match root {
        Value::Array(items) => items.into_iter().rev().collect(),
        other => vec![other],
    };
    let mut position = 0usize;

    while let Some(node) = stack.pop() {
        let index = position;
        position += 1;

        let mut map = match node {
            Value::Object(map) => map,
            other => {
                return Err(Error::MalformedElement {
                    index,
                    reason: format!("tree node is {}", json_kind(&other)),
                })
            }
        };

        let mut nested = Vec::new();
        for key in ["children", "elements"] {
            match map.remove(key) {
                Some(Value::Array(items)) => nested.extend(items),
                Some(Value::Null) | None => {}
                Some(other) => {
                    tracing::warn!(index, key, kind = json_kind(&other), "Ignoring non-array child list");
                }
            }
        }

        let record = match map.remove("raw") {
            Some(Value::Object(raw)) => RawElement::from_map(raw),
            Some(_) | None => {
                map.retain(|k, _| !CONTAINER_KEYS.contains(&k.as_str()));
                RawElement::from_map(map)
            }
        };

        if record.has_element_data() {
            out.push(record);
        }

        stack.extend(nested.into_iter().rev());
    }

    tracing::debug!(nodes = position, elements = out.len(), "Flattened model tree");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_rejects_non_objects() {
        let err = RawElement::decode(json!("wall"), 3).unwrap_err();
        assert!(matches!(err, Error::MalformedElement { index: 3, .. }));
    }

    #[test]
    fn first_string_follows_path_order() {
        let raw = RawElement::decode(
            json!({
                "Identity Data": { "Mark": "M-2" },
                "Tag": "T-1"
            }),
            0,
        )
        .unwrap();
        let mark = raw.first_string(&[(None, "mark"), (Some(IDENTITY_DATA), "Mark"), (None, "Tag")]);
        assert_eq!(mark.as_deref(), Some("M-2"));
    }

    #[test]
    fn first_string_skips_blank_and_renders_numbers() {
        let raw = RawElement::decode(json!({ "mark": "  ", "Tag": 104 }), 0).unwrap();
        let mark = raw.first_string(&[(None, "mark"), (None, "Tag")]);
        assert_eq!(mark.as_deref(), Some("104"));
    }

    #[test]
    fn flatten_walks_children_in_preorder() {
        let tree = json!({
            "name": "root",
            "children": [
                { "id": "a", "category": "Walls", "children": [
                    { "raw": { "id": "a1", "category": "Doors" } }
                ]},
                { "id": "b", "category": "Floors" }
            ]
        });
        let flat = flatten_tree(tree).unwrap();
        let ids: Vec<_> = flat
            .iter()
            .map(|r| r.get("id").and_then(Value::as_str).unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "a1", "b"]);
        assert!(flat[0].get("children").is_none());
    }

    #[test]
    fn flatten_accepts_array_root_and_elements_key() {
        let tree = json!([
            { "id": "1", "type": "Wall", "elements": [{ "id": "2", "type": "Door" }] }
        ]);
        let flat = flatten_tree(tree).unwrap();
        assert_eq!(flat.len(), 2);
    }

    #[test]
    fn flatten_fails_on_scalar_node() {
        let tree = json!([{ "id": "1" }, 42]);
        assert!(flatten_tree(tree).is_err());
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Materialised elements and the arena that owns them during a pipeline pass.
//!
//! Host/hosted links are stored as [`ElementKey`]s, never as nested values,
//! so a parent and its details can be rearranged without copying subtrees.
//! [`ElementArena::rows`] materialises the nested output once at the end.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

use crate::inference::{bucket_group_name, GENERAL_GROUP};
use crate::raw::{RawElement, CONSTRAINTS, IDENTITY_DATA, KNOWN_BUCKETS, OTHER, PARAMETERS};
use crate::value::PrimitiveValue;

/// Category used when a record carries none.
pub const UNCATEGORIZED: &str = "Uncategorized";

new_key_type! {
    /// Key for an element stored in an [`ElementArena`].
    pub struct ElementKey;
}

/// Top-level keys that never become parameters.
const RESERVED_KEYS: [&str; 12] = [
    "id",
    "elementId",
    "type",
    "speckle_type",
    "category",
    "mark",
    "host",
    "children",
    "elements",
    "raw",
    "applicationId",
    "totalChildrenCount",
];

type LookupPath = SmallVec<[(Option<&'static str>, &'static str); 5]>;

fn type_paths() -> LookupPath {
    SmallVec::from_slice(&[(None, "type"), (None, "speckle_type"), (Some(IDENTITY_DATA), "Type")])
}

fn category_paths() -> LookupPath {
    SmallVec::from_slice(&[
        (None, "category"),
        (Some(OTHER), "Category"),
        (Some(IDENTITY_DATA), "Category"),
    ])
}

fn mark_paths() -> LookupPath {
    SmallVec::from_slice(&[
        (None, "mark"),
        (None, "Mark"),
        (Some(IDENTITY_DATA), "Mark"),
        (None, "Tag"),
        (None, "tag"),
    ])
}

fn host_paths() -> LookupPath {
    SmallVec::from_slice(&[(None, "host"), (None, "Host"), (Some(CONSTRAINTS), "Host")])
}

/// Parameter values of one element plus the group each value came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    values: BTreeMap<String, PrimitiveValue>,
    #[serde(skip)]
    groups: FxHashMap<String, String>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value; the first group recorded for a key is kept.
    pub fn insert(&mut self, key: impl Into<String>, value: PrimitiveValue, group: &str) {
        let key = key.into();
        self.groups.entry(key.clone()).or_insert_with(|| group.to_string());
        self.values.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&PrimitiveValue> {
        self.values.get(key)
    }

    pub fn group_of(&self, key: &str) -> Option<&str> {
        self.groups.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PrimitiveValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &BTreeMap<String, PrimitiveValue> {
        &self.values
    }
}

/// Role of an element in the host/hosted relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Parent,
    Child,
}

/// A building element materialised from one raw record.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: String,
    pub element_type: String,
    pub mark: String,
    pub category: String,
    pub host: Option<String>,
    pub parameters: Parameters,
    pub details: Vec<ElementKey>,
    pub is_child: bool,
    pub visible: bool,
}

impl Element {
    /// An element with identity fields only.
    pub fn new(id: impl Into<String>, category: impl Into<String>, mark: impl Into<String>) -> Self {
        let category = category.into();
        Self {
            id: id.into(),
            element_type: String::new(),
            mark: mark.into(),
            category: if category.trim().is_empty() {
                UNCATEGORIZED.to_string()
            } else {
                category
            },
            host: None,
            parameters: Parameters::new(),
            details: Vec::new(),
            is_child: false,
            visible: true,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        let host = host.into();
        self.host = (!host.trim().is_empty()).then_some(host);
        self
    }

    pub fn with_type(mut self, element_type: impl Into<String>) -> Self {
        self.element_type = element_type.into();
        self
    }

    pub fn with_parameter(mut self, key: &str, value: impl Into<PrimitiveValue>) -> Self {
        self.parameters.insert(key, value.into(), GENERAL_GROUP);
        self
    }

    /// Materialises a raw record.
    ///
    /// Identity fields never fail; they fall back to defaults. With
    /// `essential_only` set, parameter extraction is skipped entirely.
    pub fn from_raw(raw: &RawElement, index: usize, essential_only: bool) -> Self {
        let id = raw
            .first_string(&[(None, "id"), (None, "elementId")])
            .unwrap_or_else(|| format!("element-{}", index));
        let category = raw
            .first_string(&category_paths())
            .unwrap_or_else(|| UNCATEGORIZED.to_string());
        let mark = raw.first_string(&mark_paths()).unwrap_or_default();

        let mut element = Element::new(id, category, mark);
        element.element_type = raw.first_string(&type_paths()).unwrap_or_default();
        element.host = raw.first_string(&host_paths());

        if !essential_only {
            element.parameters = extract_parameters(raw, index);
        }
        element
    }

    /// Reads a column value: identity fields first, then parameters.
    pub fn value(&self, field: &str) -> Option<PrimitiveValue> {
        match field {
            "id" => Some(self.id.as_str().into()),
            "type" => Some(self.element_type.as_str().into()),
            "mark" => Some(self.mark.as_str().into()),
            "category" => Some(self.category.as_str().into()),
            "host" => self.host.as_deref().map(Into::into),
            _ => self.parameters.get(field).cloned(),
        }
    }
}

/// Collects primitive parameters from the known buckets and the top level.
///
/// A bucket that is not an object is skipped with a warning; the element
/// keeps whatever the other buckets yield.
fn extract_parameters(raw: &RawElement, index: usize) -> Parameters {
    let mut params = Parameters::new();

    for bucket in KNOWN_BUCKETS {
        let Some(value) = raw.get(bucket) else {
            continue;
        };
        let Some(map) = value.as_object() else {
            tracing::warn!(index, bucket, "Skipping malformed parameter bucket");
            continue;
        };
        let group = bucket_group_name(bucket);

        for (key, entry) in map {
            if let Some(v) = PrimitiveValue::from_json(entry) {
                if !params.contains_key(key) {
                    params.insert(key.as_str(), v, group);
                }
                continue;
            }
            if bucket == PARAMETERS {
                if let Some((name, v)) = named_entry(entry) {
                    if !params.contains_key(&name) {
                        params.insert(name, v, group);
                    }
                }
            }
        }
    }

    for (key, value) in raw.fields() {
        if RESERVED_KEYS.contains(&key.as_str()) || KNOWN_BUCKETS.contains(&key.as_str()) {
            continue;
        }
        if params.contains_key(key) {
            continue;
        }
        if let Some(v) = PrimitiveValue::from_json(value) {
            params.insert(key.as_str(), v, GENERAL_GROUP);
        }
    }

    params
}

/// Speckle-style parameter entry: `{ "name": "Width", "value": 200 }`.
fn named_entry(entry: &Value) -> Option<(String, PrimitiveValue)> {
    let name = entry.get("name")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }
    let value = PrimitiveValue::from_json(entry.get("value")?)?;
    Some((name.to_string(), value))
}

/// A table row: the element plus its materialised details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    pub id: String,
    #[serde(rename = "type")]
    pub element_type: String,
    pub mark: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub parameters: BTreeMap<String, PrimitiveValue>,
    #[serde(default)]
    pub details: Vec<TableRow>,
    pub is_child: bool,
    pub visible: bool,
}

/// Owner of all elements created during one pipeline pass.
#[derive(Debug, Default)]
pub struct ElementArena {
    elements: SlotMap<ElementKey, Element>,
}

impl ElementArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, element: Element) -> ElementKey {
        self.elements.insert(element)
    }

    pub fn get(&self, key: ElementKey) -> Option<&Element> {
        self.elements.get(key)
    }

    pub fn get_mut(&mut self, key: ElementKey) -> Option<&mut Element> {
        self.elements.get_mut(key)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ElementKey, &Element)> {
        self.elements.iter()
    }

    /// Links `child` under `parent`. Returns false if either key is stale.
    pub fn attach(&mut self, parent: ElementKey, child: ElementKey) -> bool {
        if !self.elements.contains_key(child) {
            return false;
        }
        match self.elements.get_mut(parent) {
            Some(p) => {
                p.details.push(child);
                true
            }
            None => false,
        }
    }

    /// Materialises rows for the given top-level keys, with nested details.
    pub fn rows(&self, keys: &[ElementKey]) -> Vec<TableRow> {
        keys.iter().filter_map(|&k| self.row(k, 0)).collect()
    }

    fn row(&self, key: ElementKey, depth: usize) -> Option<TableRow> {
        let e = self.elements.get(key)?;
        // details never nest deeper than one level; the guard keeps a bad
        // link from recursing forever
        let details = if depth == 0 {
            e.details.iter().filter_map(|&k| self.row(k, depth + 1)).collect()
        } else {
            Vec::new()
        };
        Some(TableRow {
            id: e.id.clone(),
            element_type: e.element_type.clone(),
            mark: e.mark.clone(),
            category: e.category.clone(),
            host: e.host.clone(),
            parameters: e.parameters.values().clone(),
            details,
            is_child: e.is_child,
            visible: e.visible,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawElement {
        RawElement::decode(value, 0).unwrap()
    }

    #[test]
    fn identity_fields_follow_lookup_order() {
        let r = raw(json!({
            "id": "abc",
            "speckle_type": "Objects.BuiltElements.Door",
            "Other": { "Category": "Doors" },
            "Identity Data": { "Mark": "D-01" },
            "Constraints": { "Host": "W-01" }
        }));
        let e = Element::from_raw(&r, 0, false);
        assert_eq!(e.id, "abc");
        assert_eq!(e.element_type, "Objects.BuiltElements.Door");
        assert_eq!(e.category, "Doors");
        assert_eq!(e.mark, "D-01");
        assert_eq!(e.host.as_deref(), Some("W-01"));
    }

    #[test]
    fn missing_identity_falls_back() {
        let e = Element::from_raw(&raw(json!({ "type": "Wall" })), 7, false);
        assert_eq!(e.id, "element-7");
        assert_eq!(e.category, UNCATEGORIZED);
        assert_eq!(e.mark, "");
        assert!(e.host.is_none());
    }

    #[test]
    fn parameters_carry_groups() {
        let r = raw(json!({
            "id": "1",
            "Width": 200,
            "Identity Data": { "Comments": "north" },
            "Constraints": { "Base Offset": 0.0 },
            "parameters": {
                "FIRE_RATING": { "name": "Fire Rating", "value": "EI60" },
                "Load Bearing": true
            }
        }));
        let e = Element::from_raw(&r, 0, false);
        assert_eq!(e.parameters.group_of("Width"), Some(GENERAL_GROUP));
        assert_eq!(e.parameters.group_of("Comments"), Some("Identity Data"));
        assert_eq!(e.parameters.group_of("Base Offset"), Some("Constraints"));
        assert_eq!(e.parameters.group_of("Fire Rating"), Some("Parameters"));
        assert_eq!(
            e.parameters.get("Load Bearing"),
            Some(&PrimitiveValue::Boolean(true))
        );
        assert!(!e.parameters.contains_key("id"));
    }

    #[test]
    fn malformed_bucket_is_skipped() {
        let r = raw(json!({ "id": "1", "parameters": "oops", "Height": 3 }));
        let e = Element::from_raw(&r, 0, false);
        assert_eq!(e.parameters.len(), 1);
        assert!(e.parameters.contains_key("Height"));
    }

    #[test]
    fn essential_only_skips_parameters() {
        let r = raw(json!({ "id": "1", "Height": 3 }));
        assert!(Element::from_raw(&r, 0, true).parameters.is_empty());
    }

    #[test]
    fn groups_are_not_serialized() {
        let mut p = Parameters::new();
        p.insert("Width", PrimitiveValue::Number(1.0), "Other");
        let json = serde_json::to_value(&p).unwrap();
        assert!(json.get("groups").is_none());
    }

    #[test]
    fn rows_nest_details_one_level() {
        let mut arena = ElementArena::new();
        let wall = arena.insert(Element::new("w", "Walls", "W1"));
        let door = arena.insert(Element::new("d", "Doors", "D1").with_host("W1"));
        assert!(arena.attach(wall, door));
        // a bad back-link must not recurse
        assert!(arena.attach(door, wall));

        let rows = arena.rows(&[wall]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].details.len(), 1);
        assert!(rows[0].details[0].details.is_empty());
    }
}

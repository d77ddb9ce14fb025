// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parent/child classification and mark↔host matching.
//!
//! Every element is classified as a parent (host) or a child (hosted). Each
//! child whose `host` equals some parent's `mark` is attached to that
//! parent's details. Children that match nothing are collected under one
//! synthetic "Without Host" parent, created only when such an orphan exists.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::element::{Element, ElementArena, ElementKey, Role, UNCATEGORIZED};

/// Mark and id of the synthetic parent holding orphaned children.
pub const WITHOUT_HOST: &str = "Without Host";
pub const WITHOUT_HOST_ID: &str = "without-host";

/// Static category lists deciding which categories host and which are hosted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryConfig {
    pub parent_categories: Vec<String>,
    pub child_categories: Vec<String>,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            parent_categories: [
                "Walls",
                "Floors",
                "Ceilings",
                "Roofs",
                "Curtain Walls",
                "Structural Columns",
                "Structural Framing",
                "Structural Foundations",
                "Stairs",
                "Railings",
                "Ducts",
                "Pipes",
                "Cable Trays",
                "Conduits",
            ]
            .map(String::from)
            .to_vec(),
            child_categories: [
                "Doors",
                "Windows",
                "Generic Models",
                "Duct Fittings",
                "Duct Accessories",
                "Pipe Fittings",
                "Pipe Accessories",
                "Air Terminals",
                "Mechanical Equipment",
                "Plumbing Fixtures",
                "Lighting Fixtures",
                "Electrical Fixtures",
                "Furniture",
                "Casework",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

impl CategoryConfig {
    pub fn classifier<'a>(
        &'a self,
        selected_parent: &'a [String],
        selected_child: &'a [String],
    ) -> Classifier<'a> {
        Classifier {
            known_parent: self.parent_categories.iter().map(String::as_str).collect(),
            known_child: self.child_categories.iter().map(String::as_str).collect(),
            selected_parent: selected_parent.iter().map(String::as_str).collect(),
            selected_child: selected_child.iter().map(String::as_str).collect(),
        }
    }
}

/// Category lookup sets prepared once per pass.
#[derive(Debug)]
pub struct Classifier<'a> {
    known_parent: FxHashSet<&'a str>,
    known_child: FxHashSet<&'a str>,
    selected_parent: FxHashSet<&'a str>,
    selected_child: FxHashSet<&'a str>,
}

impl Classifier<'_> {
    /// Known child categories win, then known parent categories (and
    /// `Uncategorized`), then membership in the selected child list.
    /// Anything else is a parent.
    pub fn classify(&self, element: &Element) -> Role {
        let category = element.category.as_str();
        if self.known_child.contains(category) {
            Role::Child
        } else if self.known_parent.contains(category) || category == UNCATEGORIZED {
            Role::Parent
        } else if self.selected_child.contains(category) {
            Role::Child
        } else {
            Role::Parent
        }
    }

    /// Whether an element of the given role passes the category selection.
    /// An empty selection keeps everything.
    pub fn is_selected(&self, role: Role, category: &str) -> bool {
        let selected = match role {
            Role::Parent => &self.selected_parent,
            Role::Child => &self.selected_child,
        };
        selected.is_empty() || selected.contains(category)
    }
}

/// Classifies a single element against the given lists.
pub fn classify(
    element: &Element,
    categories: &CategoryConfig,
    selected_parent: &[String],
    selected_child: &[String],
) -> Role {
    categories
        .classifier(selected_parent, selected_child)
        .classify(element)
}

/// Result of matching children to parents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    /// Top-level rows in output order; the synthetic parent, if any, is last.
    pub parents: Vec<ElementKey>,
    pub matched: usize,
    pub orphaned: usize,
    pub without_host: Option<ElementKey>,
}

/// Attaches each child to the parent whose mark equals its host.
///
/// Parents with an empty mark cannot be matched. On a mark collision the
/// later parent replaces the earlier one in the lookup.
pub fn match_children(
    arena: &mut ElementArena,
    parents: &[ElementKey],
    children: &[ElementKey],
) -> MatchOutcome {
    let mut by_mark: FxHashMap<String, ElementKey> = FxHashMap::default();
    for &key in parents {
        let Some(parent) = arena.get(key) else {
            continue;
        };
        if parent.mark.is_empty() {
            continue;
        }
        if let Some(previous) = by_mark.insert(parent.mark.clone(), key) {
            tracing::debug!(mark = %parent.mark, ?previous, "Duplicate parent mark, later element wins");
        }
    }

    let mut outcome = MatchOutcome {
        parents: parents.to_vec(),
        ..MatchOutcome::default()
    };

    for &key in children {
        let target = match arena.get_mut(key) {
            Some(child) => {
                child.is_child = true;
                child.host.as_ref().and_then(|h| by_mark.get(h)).copied()
            }
            None => continue,
        };

        match target {
            Some(parent) => {
                arena.attach(parent, key);
                outcome.matched += 1;
            }
            None => {
                let bucket = *outcome.without_host.get_or_insert_with(|| {
                    let synthetic = arena.insert(without_host_parent());
                    outcome.parents.push(synthetic);
                    synthetic
                });
                arena.attach(bucket, key);
                outcome.orphaned += 1;
            }
        }
    }

    tracing::debug!(
        parents = parents.len(),
        matched = outcome.matched,
        orphaned = outcome.orphaned,
        "Matched hosted elements"
    );
    outcome
}

fn without_host_parent() -> Element {
    let mut e = Element::new(WITHOUT_HOST_ID, UNCATEGORIZED, WITHOUT_HOST);
    e.element_type = WITHOUT_HOST.to_string();
    e
}

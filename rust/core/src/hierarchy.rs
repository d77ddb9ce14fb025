// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! General-purpose category tree used for filtering.
//!
//! Built from flat `{id, parent?}` definitions. Construction validates the
//! whole input (duplicate ids, dangling parents, cycles) before any tree is
//! returned, and batch updates are applied to a copy so a rejected batch
//! leaves the current hierarchy untouched.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Flat category definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl CategoryDefinition {
    pub fn root(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            parent: None,
        }
    }

    pub fn child_of(id: &str, parent: &str) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            parent: Some(parent.to_string()),
        }
    }
}

/// A node of the built tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub id: String,
    pub name: String,
    pub parent: Option<String>,
    pub children: Vec<String>,
    /// Distance from the root (roots are 0).
    pub depth: usize,
}

/// One change in a batch applied by [`CategoryHierarchy::apply_updates`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum HierarchyUpdate {
    /// Insert or replace a definition.
    Upsert(CategoryDefinition),
    /// Remove a category; its children become roots.
    Remove { id: String },
    /// Move a category under another parent (or to the root).
    Reparent { id: String, parent: Option<String> },
}

/// Acyclic forest of categories.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryHierarchy {
    nodes: FxHashMap<String, CategoryNode>,
    roots: Vec<String>,
    /// Definitions in input order, kept so updates can rebuild.
    definitions: Vec<CategoryDefinition>,
}

impl CategoryHierarchy {
    /// Builds and validates a hierarchy from flat definitions.
    pub fn build(definitions: Vec<CategoryDefinition>) -> Result<Self> {
        let mut nodes: FxHashMap<String, CategoryNode> = FxHashMap::default();
        for def in &definitions {
            let node = CategoryNode {
                id: def.id.clone(),
                name: def.name.clone().unwrap_or_else(|| def.id.clone()),
                parent: def.parent.clone(),
                children: Vec::new(),
                depth: 0,
            };
            if nodes.insert(def.id.clone(), node).is_some() {
                return Err(Error::DuplicateCategory(def.id.clone()));
            }
        }

        for def in &definitions {
            if let Some(parent) = &def.parent {
                if !nodes.contains_key(parent) {
                    return Err(Error::UnknownParent {
                        id: def.id.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }

        detect_cycle(&definitions)?;

        let mut roots = Vec::new();
        for def in &definitions {
            match &def.parent {
                Some(parent) => {
                    if let Some(p) = nodes.get_mut(parent) {
                        p.children.push(def.id.clone());
                    }
                }
                None => roots.push(def.id.clone()),
            }
        }

        // Breadth-first from the roots to stamp depths.
        let mut queue: std::collections::VecDeque<(String, usize)> =
            roots.iter().map(|r| (r.clone(), 0)).collect();
        while let Some((id, depth)) = queue.pop_front() {
            if let Some(node) = nodes.get_mut(&id) {
                node.depth = depth;
                for child in &node.children {
                    queue.push_back((child.clone(), depth + 1));
                }
            }
        }

        Ok(Self {
            nodes,
            roots,
            definitions,
        })
    }

    pub fn get(&self, id: &str) -> Option<&CategoryNode> {
        self.nodes.get(id)
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn definitions(&self) -> &[CategoryDefinition] {
        &self.definitions
    }

    /// Ancestors from the direct parent up to the root.
    pub fn ancestors(&self, id: &str) -> Result<Vec<String>> {
        let mut node = self
            .nodes
            .get(id)
            .ok_or_else(|| Error::UnknownCategory(id.to_string()))?;
        let mut out = Vec::new();
        while let Some(parent) = &node.parent {
            out.push(parent.clone());
            node = match self.nodes.get(parent) {
                Some(n) => n,
                None => break,
            };
        }
        Ok(out)
    }

    /// All descendants, depth-first in child order.
    pub fn descendants(&self, id: &str) -> Result<Vec<String>> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| Error::UnknownCategory(id.to_string()))?;
        let mut out = Vec::new();
        let mut stack: Vec<&String> = node.children.iter().rev().collect();
        while let Some(child) = stack.pop() {
            out.push(child.clone());
            if let Some(n) = self.nodes.get(child) {
                stack.extend(n.children.iter().rev());
            }
        }
        Ok(out)
    }

    /// The selection plus every descendant of a selected category.
    /// Unknown ids are kept as-is so flat category names still filter.
    pub fn expand_selection(&self, selected: &[String]) -> FxHashSet<String> {
        let mut out = FxHashSet::default();
        for id in selected {
            out.insert(id.clone());
            if let Ok(desc) = self.descendants(id) {
                out.extend(desc);
            }
        }
        out
    }

    /// Applies a batch of updates atomically.
    ///
    /// The batch is applied to a copy of the definitions and the result is
    /// rebuilt and validated; on any error `self` is left unchanged.
    pub fn apply_updates(&mut self, updates: &[HierarchyUpdate]) -> Result<()> {
        let mut defs = self.definitions.clone();

        for update in updates {
            match update {
                HierarchyUpdate::Upsert(def) => match defs.iter_mut().find(|d| d.id == def.id) {
                    Some(existing) => *existing = def.clone(),
                    None => defs.push(def.clone()),
                },
                HierarchyUpdate::Remove { id } => {
                    if !defs.iter().any(|d| &d.id == id) {
                        return Err(Error::UnknownCategory(id.clone()));
                    }
                    defs.retain(|d| &d.id != id);
                    for d in defs.iter_mut() {
                        if d.parent.as_ref() == Some(id) {
                            d.parent = None;
                        }
                    }
                }
                HierarchyUpdate::Reparent { id, parent } => {
                    let def = defs
                        .iter_mut()
                        .find(|d| &d.id == id)
                        .ok_or_else(|| Error::UnknownCategory(id.clone()))?;
                    def.parent = parent.clone();
                }
            }
        }

        match Self::build(defs) {
            Ok(rebuilt) => {
                *self = rebuilt;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, updates = updates.len(), "Rejected category hierarchy update batch");
                Err(e)
            }
        }
    }
}

/// Depth-first search over parent links with an explicit recursion stack.
///
/// A node reached again while still on the stack closes a cycle.
fn detect_cycle(definitions: &[CategoryDefinition]) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        OnStack,
        Done,
    }

    let parent_of: FxHashMap<&str, &str> = definitions
        .iter()
        .filter_map(|d| d.parent.as_deref().map(|p| (d.id.as_str(), p)))
        .collect();
    let mut marks: FxHashMap<&str, Mark> = FxHashMap::default();

    for def in definitions {
        let mut stack: Vec<&str> = Vec::new();
        let mut current = Some(def.id.as_str());

        while let Some(id) = current {
            match marks.get(id) {
                Some(Mark::Done) => break,
                Some(Mark::OnStack) => return Err(Error::HierarchyCycle(id.to_string())),
                None => {
                    marks.insert(id, Mark::OnStack);
                    stack.push(id);
                    current = parent_of.get(id).copied();
                }
            }
        }

        for id in stack {
            marks.insert(id, Mark::Done);
        }
    }
    Ok(())
}

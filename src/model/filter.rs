//! Filter tree, stored flat as `id -> node` rather than as owning
//! references, so it stays wire-serializable and free of cycles.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    And,
    Or,
    Eq,
    Range,
    Not,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterQuery {
    pub id: i32,
    pub operator: FilterOperator,
    pub column: Option<String>,
    pub values: Vec<String>,
    pub children: Vec<i32>,
}

/// Flat `id -> node` arena plus a `root_id`. Negative ids are reserved
/// for nodes synthesized by the broker itself (e.g. the hybrid splitter's
/// time-boundary filter and AND-combiner), so they never collide with
/// parser-generated (non-negative) ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSubQueryMap {
    pub nodes: HashMap<i32, FilterQuery>,
    pub root_id: i32,
}

impl FilterSubQueryMap {
    pub fn single(node: FilterQuery) -> Self {
        let root_id = node.id;
        let mut nodes = HashMap::new();
        nodes.insert(root_id, node);
        Self { nodes, root_id }
    }

    pub fn root(&self) -> &FilterQuery {
        self.nodes
            .get(&self.root_id)
            .expect("root_id must exist in nodes: invariant of FilterSubQueryMap")
    }

    /// Check that every id referenced as a child exists in the map and
    /// that the tree rooted at `root_id` contains no cycles.
    pub fn validate(&self) -> Result<(), String> {
        if !self.nodes.contains_key(&self.root_id) {
            return Err(format!("root_id {} not present in filter map", self.root_id));
        }
        let mut visiting = std::collections::HashSet::new();
        self.check_acyclic(self.root_id, &mut visiting)
    }

    fn check_acyclic(
        &self,
        id: i32,
        visiting: &mut std::collections::HashSet<i32>,
    ) -> Result<(), String> {
        if !visiting.insert(id) {
            return Err(format!("cycle detected at filter node {id}"));
        }
        let node = self
            .nodes
            .get(&id)
            .ok_or_else(|| format!("filter node {id} referenced but not present in map"))?;
        for &child in &node.children {
            self.check_acyclic(child, visiting)?;
        }
        visiting.remove(&id);
        Ok(())
    }

    /// Merge `other` into `self`, returning the id `other`'s root was
    /// inserted under. Used by the hybrid splitter to attach a
    /// broker-synthesized time filter into a deep-copied request's map.
    pub fn absorb(&mut self, other: FilterSubQueryMap) -> i32 {
        let root = other.root_id;
        self.nodes.extend(other.nodes);
        root
    }
}

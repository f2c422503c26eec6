#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

/// The ancestor closure of one commit: every reachable commit with its
/// shortest distance from the tip, plus the parent edges between them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ancestry {
    tip: String,
    depth: BTreeMap<String, usize>,
    parents: BTreeMap<String, BTreeSet<String>>,
    truncated: bool,
}

impl Ancestry {
    pub fn new(tip: impl Into<String>) -> Self {
        let tip = tip.into();
        let mut depth = BTreeMap::new();
        depth.insert(tip.clone(), 0);
        Self {
            tip,
            depth,
            parents: BTreeMap::new(),
            truncated: false,
        }
    }

    pub fn tip(&self) -> &str {
        &self.tip
    }

    pub fn insert_commit(&mut self, commit_id: impl Into<String>, depth: usize) {
        let entry = self.depth.entry(commit_id.into()).or_insert(depth);
        if depth < *entry {
            *entry = depth;
        }
    }

    /// Records `parent -> child`. Edges leaving the closure are ignored.
    pub fn insert_edge(&mut self, parent_id: &str, child_id: &str) {
        if !self.depth.contains_key(parent_id) || !self.depth.contains_key(child_id) {
            return;
        }
        self.parents
            .entry(child_id.to_string())
            .or_default()
            .insert(parent_id.to_string());
    }

    pub fn mark_truncated(&mut self) {
        self.truncated = true;
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn contains(&self, commit_id: &str) -> bool {
        self.depth.contains_key(commit_id)
    }

    pub fn depth_of(&self, commit_id: &str) -> Option<usize> {
        self.depth.get(commit_id).copied()
    }

    pub fn len(&self) -> usize {
        self.depth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depth.is_empty()
    }

    pub fn commits(&self) -> impl Iterator<Item = &str> {
        self.depth.keys().map(String::as_str)
    }

    pub fn parents_of(&self, commit_id: &str) -> impl Iterator<Item = &str> {
        self.parents
            .get(commit_id)
            .into_iter()
            .flat_map(|parents| parents.iter().map(String::as_str))
    }

    /// Proper ancestors of `commit_id` inside this closure.
    pub fn ancestors_of(&self, commit_id: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&str> = self.parents_of(commit_id).collect();
        while let Some(current) = stack.pop() {
            if !seen.insert(current.to_string()) {
                continue;
            }
            stack.extend(self.parents_of(current));
        }
        seen
    }

    /// Every commit exactly once, each one before all of its ancestors.
    /// Ties are broken by (depth, id); commits stuck on a cycle are appended
    /// in that same order instead of looping.
    pub fn descendant_first_order(&self) -> Vec<String> {
        let mut pending_children: BTreeMap<&str, usize> =
            self.depth.keys().map(|id| (id.as_str(), 0)).collect();
        for parents in self.parents.values() {
            for parent in parents {
                if let Some(count) = pending_children.get_mut(parent.as_str()) {
                    *count += 1;
                }
            }
        }

        let mut ready: BTreeSet<(usize, &str)> = pending_children
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| (self.depth[*id], *id))
            .collect();

        let mut order = Vec::with_capacity(self.depth.len());
        let mut emitted = BTreeSet::new();
        while let Some(next) = ready.pop_first() {
            let (_, id) = next;
            order.push(id.to_string());
            emitted.insert(id);
            for parent in self.parents_of(id) {
                let Some(count) = pending_children.get_mut(parent) else {
                    continue;
                };
                *count = count.saturating_sub(1);
                if *count == 0 {
                    ready.insert((self.depth[parent], parent));
                }
            }
        }

        if order.len() < self.depth.len() {
            let mut rest: Vec<(usize, &str)> = self
                .depth
                .iter()
                .filter(|(id, _)| !emitted.contains(id.as_str()))
                .map(|(id, depth)| (*depth, id.as_str()))
                .collect();
            rest.sort();
            order.extend(rest.into_iter().map(|(_, id)| id.to_string()));
        }
        order
    }
}

/// Lowest common ancestor of two closures: a shared commit that is not an
/// ancestor of any other shared commit. Several candidates (criss-cross
/// merges) resolve to the one nearest to both tips, then by id.
pub fn lowest_common_ancestor(a: &Ancestry, b: &Ancestry) -> Option<String> {
    let common: BTreeSet<&str> = a.commits().filter(|id| b.contains(id)).collect();
    if common.is_empty() {
        return None;
    }

    let mut dominated = BTreeSet::new();
    for id in &common {
        dominated.extend(a.ancestors_of(id));
        dominated.extend(b.ancestors_of(id));
    }

    common
        .into_iter()
        .filter(|id| !dominated.contains(*id))
        .min_by_key(|id| {
            let distance = a.depth_of(id).unwrap_or(usize::MAX / 2)
                + b.depth_of(id).unwrap_or(usize::MAX / 2);
            (distance, id.to_string())
        })
        .map(str::to_string)
}

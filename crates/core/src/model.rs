#![forbid(unsafe_code)]

use std::collections::BTreeMap;

/// Identity of one entity inside one file under one schema.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    pub entity_id: String,
    pub schema_key: String,
    pub file_id: String,
}

impl EntityKey {
    pub fn new(
        entity_id: impl Into<String>,
        schema_key: impl Into<String>,
        file_id: impl Into<String>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            schema_key: schema_key.into(),
            file_id: file_id.into(),
        }
    }
}

/// The parts of a change the graph algorithms need.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeRef {
    pub id: String,
    pub key: EntityKey,
    pub created_at: String,
    pub tombstone: bool,
}

impl ChangeRef {
    /// Total order used to decide which of two concurrent changes arrived later.
    pub fn arrived_after(&self, other: &ChangeRef) -> bool {
        (self.created_at.as_str(), self.id.as_str()) > (other.created_at.as_str(), other.id.as_str())
    }
}

/// Leaf changes of one ancestry, at most one per entity key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LeafSet {
    leaves: BTreeMap<EntityKey, ChangeRef>,
}

impl LeafSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a leaf set from change layers ordered newest first. The first
    /// change seen for a key wins; later layers only fill in missing keys.
    pub fn from_layers<I, L>(layers: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: IntoIterator<Item = ChangeRef>,
    {
        let mut out = Self::new();
        for layer in layers {
            for change in layer {
                out.leaves.entry(change.key.clone()).or_insert(change);
            }
        }
        out
    }

    pub fn get(&self, key: &EntityKey) -> Option<&ChangeRef> {
        self.leaves.get(key)
    }

    pub fn insert(&mut self, change: ChangeRef) -> Option<ChangeRef> {
        self.leaves.insert(change.key.clone(), change)
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &EntityKey> {
        self.leaves.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityKey, &ChangeRef)> {
        self.leaves.iter()
    }

    pub fn into_changes(self) -> impl Iterator<Item = ChangeRef> {
        self.leaves.into_values()
    }

    fn changed_since(&self, base: &LeafSet, key: &EntityKey) -> Option<&ChangeRef> {
        let leaf = self.leaves.get(key)?;
        match base.get(key) {
            Some(base_leaf) if base_leaf.id == leaf.id => None,
            _ => Some(leaf),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffKind {
    OnlySource,
    OnlyTarget,
    Modified,
}

impl DiffKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnlySource => "only_source",
            Self::OnlyTarget => "only_target",
            Self::Modified => "modified",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffEntry {
    pub key: EntityKey,
    pub source_change_id: Option<String>,
    pub target_change_id: Option<String>,
    pub kind: DiffKind,
}

/// Change pointers for every key whose leaf differs between the two sides.
pub fn diff_leaves(source: &LeafSet, target: &LeafSet) -> Vec<DiffEntry> {
    let mut out = Vec::new();
    for (key, source_leaf) in source.iter() {
        match target.get(key) {
            None => out.push(DiffEntry {
                key: key.clone(),
                source_change_id: Some(source_leaf.id.clone()),
                target_change_id: None,
                kind: DiffKind::OnlySource,
            }),
            Some(target_leaf) if target_leaf.id != source_leaf.id => out.push(DiffEntry {
                key: key.clone(),
                source_change_id: Some(source_leaf.id.clone()),
                target_change_id: Some(target_leaf.id.clone()),
                kind: DiffKind::Modified,
            }),
            Some(_) => {}
        }
    }
    for (key, target_leaf) in target.iter() {
        if source.get(key).is_none() {
            out.push(DiffEntry {
                key: key.clone(),
                source_change_id: None,
                target_change_id: Some(target_leaf.id.clone()),
                kind: DiffKind::OnlyTarget,
            });
        }
    }
    out.sort_by(|a, b| a.key.cmp(&b.key));
    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictReason {
    DivergentChange,
    DeleteModify,
}

impl ConflictReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DivergentChange => "divergent_change",
            Self::DeleteModify => "delete_modify",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "divergent_change" => Some(Self::DivergentChange),
            "delete_modify" => Some(Self::DeleteModify),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConflictCandidate {
    pub key: EntityKey,
    pub change: ChangeRef,
    pub conflicting_change: ChangeRef,
    pub reason: ConflictReason,
}

/// Pairwise divergence between `a` and `b` relative to their common `base`.
/// Keys touched on only one side never conflict.
pub fn detect_conflicts(base: &LeafSet, a: &LeafSet, b: &LeafSet) -> Vec<ConflictCandidate> {
    let mut out = Vec::new();
    for key in a.keys() {
        let Some(leaf_a) = a.changed_since(base, key) else {
            continue;
        };
        let Some(leaf_b) = b.changed_since(base, key) else {
            continue;
        };
        if leaf_a.id == leaf_b.id {
            continue;
        }
        let reason = if leaf_a.tombstone != leaf_b.tombstone {
            ConflictReason::DeleteModify
        } else {
            ConflictReason::DivergentChange
        };
        out.push(ConflictCandidate {
            key: key.clone(),
            change: leaf_a.clone(),
            conflicting_change: leaf_b.clone(),
            reason,
        });
    }
    out
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergePlan {
    /// Keys only the source touched since the base; the source leaf wins.
    pub from_source: Vec<ChangeRef>,
    /// Keys only the target touched since the base; re-stated so the merge
    /// commit pins them regardless of DAG depth.
    pub from_target: Vec<ChangeRef>,
    pub conflicts: Vec<ConflictCandidate>,
}

pub fn plan_merge(base: &LeafSet, source: &LeafSet, target: &LeafSet) -> MergePlan {
    let mut plan = MergePlan {
        conflicts: detect_conflicts(base, source, target),
        ..MergePlan::default()
    };
    for key in source.keys() {
        let source_leaf = source.changed_since(base, key);
        let target_leaf = target.changed_since(base, key);
        match (source_leaf, target_leaf) {
            (Some(leaf), None) => plan.from_source.push(leaf.clone()),
            (Some(s), Some(t)) if s.id == t.id => plan.from_target.push(t.clone()),
            _ => {}
        }
    }
    for key in target.keys() {
        if source.changed_since(base, key).is_some() {
            continue;
        }
        if let Some(leaf) = target.changed_since(base, key) {
            plan.from_target.push(leaf.clone());
        }
    }
    plan
}

/// Leaf set the target would hold after merging `source` into it.
///
/// `resolution` returns the selected change id for a conflict that has been
/// resolved. Unresolved conflicts keep the side that arrived first.
pub fn simulate_merge<F>(
    base: &LeafSet,
    source: &LeafSet,
    target: &LeafSet,
    mut resolution: F,
) -> LeafSet
where
    F: FnMut(&ConflictCandidate) -> Option<String>,
{
    let plan = plan_merge(base, source, target);
    let mut out = target.clone();
    for leaf in plan.from_source {
        out.insert(leaf);
    }
    for conflict in plan.conflicts {
        let winner = match resolution(&conflict) {
            Some(selected) if selected == conflict.conflicting_change.id => conflict.conflicting_change,
            Some(selected) if selected == conflict.change.id => conflict.change,
            _ if conflict.change.arrived_after(&conflict.conflicting_change) => {
                conflict.conflicting_change
            }
            _ => conflict.change,
        };
        out.insert(winner);
    }
    out
}

use super::*;

fn change(id: &str, entity: &str, created_at: &str) -> ChangeRef {
    ChangeRef {
        id: id.to_string(),
        key: EntityKey::new(entity, "kv", "f"),
        created_at: created_at.to_string(),
        tombstone: false,
    }
}

fn tombstone(id: &str, entity: &str, created_at: &str) -> ChangeRef {
    ChangeRef {
        tombstone: true,
        ..change(id, entity, created_at)
    }
}

fn leaves(changes: Vec<ChangeRef>) -> LeafSet {
    LeafSet::from_layers([changes])
}

#[test]
fn first_layer_wins_per_key() {
    let set = LeafSet::from_layers([
        vec![change("new", "x", "2")],
        vec![change("old", "x", "1"), change("y1", "y", "1")],
    ]);
    assert_eq!(set.len(), 2);
    assert_eq!(set.get(&EntityKey::new("x", "kv", "f")).map(|c| c.id.as_str()), Some("new"));
}

#[test]
fn diff_reports_each_side_and_modified_keys() {
    let source = leaves(vec![change("s-x", "x", "2"), change("s-only", "s", "2")]);
    let target = leaves(vec![change("t-x", "x", "3"), change("t-only", "t", "3")]);
    let diff = diff_leaves(&source, &target);
    let kinds: Vec<(&str, DiffKind)> = diff
        .iter()
        .map(|d| (d.key.entity_id.as_str(), d.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("s", DiffKind::OnlySource),
            ("t", DiffKind::OnlyTarget),
            ("x", DiffKind::Modified)
        ]
    );

    assert!(diff_leaves(&source, &source).is_empty());
}

#[test]
fn conflicts_need_both_sides_to_move_away_from_base() {
    let base = leaves(vec![change("c0", "x", "1"), change("c0y", "y", "1")]);
    let a = leaves(vec![change("a-x", "x", "2"), change("a-y", "y", "2")]);
    let b = leaves(vec![change("b-x", "x", "3"), change("c0y", "y", "1")]);

    let conflicts = detect_conflicts(&base, &a, &b);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].change.id, "a-x");
    assert_eq!(conflicts[0].conflicting_change.id, "b-x");
    assert_eq!(conflicts[0].reason, ConflictReason::DivergentChange);
}

#[test]
fn delete_against_modify_is_flagged() {
    let base = leaves(vec![change("c0", "x", "1")]);
    let a = leaves(vec![tombstone("a-del", "x", "2")]);
    let b = leaves(vec![change("b-x", "x", "3")]);
    let conflicts = detect_conflicts(&base, &a, &b);
    assert_eq!(conflicts[0].reason, ConflictReason::DeleteModify);
    assert_eq!(ConflictReason::parse("delete_modify"), Some(ConflictReason::DeleteModify));
}

#[test]
fn merge_plan_splits_trivial_and_conflicting_keys() {
    let base = leaves(vec![change("c0", "x", "1"), change("c0y", "y", "1")]);
    let source = leaves(vec![
        change("c0", "x", "1"),
        change("s-y", "y", "2"),
        change("s-new", "n", "2"),
    ]);
    let target = leaves(vec![change("t-x", "x", "3"), change("c0y", "y", "1")]);

    let plan = plan_merge(&base, &source, &target);
    let from_source: Vec<&str> = plan.from_source.iter().map(|c| c.id.as_str()).collect();
    let from_target: Vec<&str> = plan.from_target.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(from_source, vec!["s-new", "s-y"]);
    assert_eq!(from_target, vec!["t-x"]);
    assert!(plan.conflicts.is_empty());
}

#[test]
fn later_arrival_uses_timestamp_then_id() {
    assert!(change("b", "x", "2").arrived_after(&change("a", "x", "1")));
    assert!(change("b", "x", "1").arrived_after(&change("a", "x", "1")));
    assert!(!change("a", "x", "1").arrived_after(&change("b", "x", "1")));
}

#[test]
fn identifiers_are_trimmed_and_validated() {
    assert_eq!(canonical_identifier(" main ").as_deref(), Ok("main"));
    assert_eq!(canonical_identifier(""), Err(IdentifierError::Empty));
    assert_eq!(canonical_identifier("-x"), Err(IdentifierError::InvalidFirstChar));
    assert!(matches!(
        canonical_identifier("a b"),
        Err(IdentifierError::InvalidChar { ch: ' ', index: 1 })
    ));
    assert!(StoreId::try_new("team/a").is_err());
    assert_eq!(VersionName::try_new("feature-1").map(VersionName::into_string).as_deref(), Ok("feature-1"));
}

#[test]
fn simulated_merge_honours_resolutions_and_arrival_order() {
    let base = leaves(vec![change("c0", "x", "1"), change("c0y", "y", "1")]);
    let source = leaves(vec![change("a-x", "x", "2"), change("a-y", "y", "4")]);
    let target = leaves(vec![change("b-x", "x", "3"), change("b-y", "y", "3")]);
    let x = EntityKey::new("x", "kv", "f");
    let y = EntityKey::new("y", "kv", "f");

    let unresolved = simulate_merge(&base, &source, &target, |_| None);
    // a-x arrived first; b-y arrived first.
    assert_eq!(unresolved.get(&x).map(|c| c.id.as_str()), Some("a-x"));
    assert_eq!(unresolved.get(&y).map(|c| c.id.as_str()), Some("b-y"));

    let resolved = simulate_merge(&base, &source, &target, |conflict| {
        (conflict.key.entity_id == "x").then(|| "b-x".to_string())
    });
    assert_eq!(resolved.get(&x).map(|c| c.id.as_str()), Some("b-x"));
    assert_eq!(resolved.get(&y).map(|c| c.id.as_str()), Some("b-y"));
}

mod support;

use crmsync_model::Entity;
use crmsync_sync::{SkipOption, SkipOptionCollection, SkipRuleConfig, StrategyPredicate, SyncError};
use crmsync_types::{BusinessUnitId, EntityType, Operation, StrategyKind};
use proptest::prelude::*;
use serde_json::json;
use support::{company, store};

// ── StrategyPredicate ────────────────────────────────────────────

#[test]
fn predicate_from_kind_matches_only_that_kind() {
    let p = StrategyPredicate::from(StrategyKind::push(EntityType::Company));
    assert!(p.matches(&StrategyKind::push(EntityType::Company)));
    assert!(!p.matches(&StrategyKind::pull(EntityType::Company)));
    assert!(!p.matches(&StrategyKind::push(EntityType::Contact)));
}

#[test]
fn predicate_wildcards() {
    assert!(StrategyPredicate::any().matches(&StrategyKind::change_ownership(EntityType::Task)));

    let pushes = StrategyPredicate::operation(Operation::Push);
    assert!(pushes.matches(&StrategyKind::push(EntityType::Quote)));
    assert!(!pushes.matches(&StrategyKind::pull(EntityType::Quote)));

    let contacts = StrategyPredicate::entity_type(EntityType::Contact);
    assert!(contacts.matches(&StrategyKind::pull(EntityType::Contact)));
    assert!(!contacts.matches(&StrategyKind::pull(EntityType::Company)));
}

// ── SkipOption ───────────────────────────────────────────────────

#[test]
fn skip_listed_company_only_for_push() {
    let unit = BusinessUnitId::new();
    let company_a = company("A", unit);
    let company_b = company("B", unit);

    let option = SkipOption::for_strategy(StrategyKind::push(EntityType::Company))
        .for_entities([company_a.clone()]);

    assert!(option.implies(&StrategyKind::push(EntityType::Company), &company_a));
    assert!(!option.implies(&StrategyKind::pull(EntityType::Company), &company_a));
    assert!(!option.implies(&StrategyKind::push(EntityType::Company), &company_b));
}

#[test]
fn empty_entity_list_covers_every_entity() {
    let option = SkipOption::for_strategy(StrategyKind::pull(EntityType::Contact));
    let entity = Entity::new(EntityType::Contact, json!({ "last_name": "Doe" }));
    assert!(option.entities().is_empty());
    assert!(option.implies(&StrategyKind::pull(EntityType::Contact), &entity));
}

#[test]
fn builders_leave_original_untouched() {
    let unit = BusinessUnitId::new();
    let base = SkipOption::for_strategy(StrategyKind::push(EntityType::Company));
    let narrowed = base.clone().for_entities([company("A", unit)]);

    assert!(base.entities().is_empty());
    assert_eq!(narrowed.entities().len(), 1);
}

#[test]
fn custom_comparator_is_used() {
    let unit = BusinessUnitId::new();
    let listed = company("Acme", unit);
    let same_name = company("Acme", unit);
    let other = company("Globex", unit);

    let option = SkipOption::for_strategy(StrategyKind::push(EntityType::Company))
        .for_entities([listed])
        .compare_entities_using(|a, b| a.display_name() == b.display_name());

    let kind = StrategyKind::push(EntityType::Company);
    assert!(option.implies(&kind, &same_name));
    assert!(!option.implies(&kind, &other));
}

// ── SkipOptionCollection ─────────────────────────────────────────

#[test]
fn empty_collection_never_skips() {
    let skips = SkipOptionCollection::new();
    let entity = company("A", BusinessUnitId::new());
    assert!(skips.is_empty());
    assert!(skips.doesnt_imply(&StrategyKind::push(EntityType::Company), &entity));
}

#[test]
fn collection_skips_when_any_member_does() {
    let entity = company("A", BusinessUnitId::new());
    let skips = SkipOptionCollection::new()
        .with(SkipOption::for_strategy(StrategyKind::pull(EntityType::Contact)))
        .with(SkipOption::for_strategy(StrategyPredicate::operation(Operation::Push)));

    assert_eq!(skips.len(), 2);
    assert!(skips.should_skip(&StrategyKind::push(EntityType::Company), &entity));
    assert!(!skips.should_skip(&StrategyKind::pull(EntityType::Company), &entity));
}

// ── SkipRuleConfig ───────────────────────────────────────────────

#[test]
fn rule_config_resolves_entities_from_store() {
    let store = store();
    let stored = store.insert(&company("A", BusinessUnitId::new())).unwrap();

    let rule: SkipRuleConfig = serde_json::from_value(json!({
        "entity_type": "company",
        "operation": "push",
        "entities": [{ "entity_type": "company", "id": stored.id.to_string() }]
    }))
    .unwrap();

    let option = rule.build(&store).unwrap();
    assert_eq!(option.entities().len(), 1);
    assert!(option.implies(&StrategyKind::push(EntityType::Company), &stored));
}

#[test]
fn rule_config_without_fields_matches_everything() {
    let rule: SkipRuleConfig = serde_json::from_value(json!({})).unwrap();
    assert_eq!(rule.strategy, StrategyPredicate::any());
    assert!(rule.entities.is_empty());
}

#[test]
fn rule_config_with_unknown_entity_is_configuration_error() {
    let store = store();
    let missing = company("Ghost", BusinessUnitId::new()).entity_ref();
    let rule = SkipRuleConfig {
        strategy: StrategyPredicate::any(),
        entities: vec![missing],
    };
    let err = rule.build(&store).unwrap_err();
    assert!(matches!(err, SyncError::Configuration(_)));
}

// ── Properties ───────────────────────────────────────────────────

fn entity_type() -> impl Strategy<Value = EntityType> {
    prop::sample::select(EntityType::ALL.to_vec())
}

fn operation() -> impl Strategy<Value = Operation> {
    prop::sample::select(vec![Operation::Push, Operation::Pull, Operation::ChangeOwnership])
}

fn kind() -> impl Strategy<Value = StrategyKind> {
    (entity_type(), operation()).prop_map(|(t, o)| StrategyKind::new(t, o))
}

proptest! {
    #[test]
    fn unrestricted_rule_skips_exactly_matching_kinds(rule in kind(), probe in kind(), name in "[a-z]{1,8}") {
        let entity = Entity::new(probe.entity_type, json!({ "name": name }));
        let option = SkipOption::for_strategy(rule);
        prop_assert_eq!(option.implies(&probe, &entity), rule == probe);
    }

    #[test]
    fn restricted_rule_skips_iff_comparator_matches_a_listed_entity(
        listed in prop::collection::vec(0u8..20, 1..5),
        probe in 0u8..20,
    ) {
        let kind = StrategyKind::push(EntityType::Company);
        let make = |n: u8| Entity::new(EntityType::Company, json!({ "name": n.to_string() }));
        let option = SkipOption::for_strategy(kind)
            .for_entities(listed.iter().copied().map(make))
            .compare_entities_using(|a, b| a.display_name() == b.display_name());

        prop_assert_eq!(option.implies(&kind, &make(probe)), listed.contains(&probe));
    }

    #[test]
    fn collection_is_disjunction_of_members(rules in prop::collection::vec(kind(), 0..6), probe in kind()) {
        let entity = Entity::new(probe.entity_type, json!({}));
        let skips: SkipOptionCollection = rules.iter().map(|r| SkipOption::for_strategy(*r)).collect();
        let expected = rules.iter().any(|r| *r == probe);
        prop_assert_eq!(skips.implies(&probe, &entity), expected);
        prop_assert_eq!(skips.doesnt_imply(&probe, &entity), !expected);
    }
}

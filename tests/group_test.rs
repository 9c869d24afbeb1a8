//! Integration tests for groups: aggregation, paths, propagation, structure.

use formtree::model::{ControlPath, PathSegment, SetValueOptions, ValidateError, validate_errors};
use formtree::{
    ControlOptions, FormArray, FormControl, FormGroup, Trigger, ValidateStatus, ValidatorFn,
    ValueOptions, Validators,
};
use serde_json::{Value, json};

/// Fails on any falsy value, `0` and `false` included.
fn truthy() -> ValidatorFn {
    ValidatorFn::new(|value, _| {
        let falsy = match value {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Number(n) => n.as_f64() == Some(0.0),
            Value::String(s) => s.is_empty(),
            Value::Array(_) | Value::Object(_) => false,
        };
        falsy.then(|| validate_errors("required", ValidateError::new()))
    })
}

fn profile() -> FormGroup {
    FormGroup::new([
        ("name", FormControl::new("").control()),
        ("age", FormControl::with_options(0, truthy()).control()),
    ])
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[test]
fn group_with_failing_child_is_invalid() {
    let form = profile();
    assert_eq!(form.status(), ValidateStatus::Invalid);
    assert_eq!(form.value(), json!({"name": "", "age": 0}));
    assert!(form.errors().is_none());
    assert!(form.get("age").unwrap().has_error("required"));
}

#[test]
fn group_is_invalid_even_when_its_own_validators_pass() {
    let pass = ValidatorFn::new(|_, _| None);
    let form = FormGroup::with_options(
        [
            ("a", FormControl::with_options("", Validators::required()).control()),
            ("b", FormControl::new("ok").control()),
        ],
        pass,
    );
    assert!(form.invalid());

    form.get("a").unwrap().set_value("filled", SetValueOptions::default());
    assert!(form.valid());
}

#[test]
fn child_writes_update_the_group_value() {
    let form = profile();
    form.get("name").unwrap().set_value("Ada", SetValueOptions::default());
    form.get("age").unwrap().set_value(36, SetValueOptions::default());
    assert_eq!(form.value(), json!({"name": "Ada", "age": 36}));
    assert!(form.valid());
}

#[test]
fn group_set_value_distributes_and_ignores_unknown_keys() {
    let form = profile();
    form.set_value(json!({"name": "Ada", "nickname": "countess"}), SetValueOptions::default());
    assert_eq!(form.value(), json!({"name": "Ada", "age": 0}));
    assert!(!form.contains("nickname"));
}

#[test]
fn group_validators_see_the_aggregated_value() {
    let matching = ValidatorFn::new(|value, _| {
        (value["password"] != value["confirm"])
            .then(|| validate_errors("mismatch", ValidateError::new()))
    });
    let form = FormGroup::with_options(
        [
            ("password", FormControl::new("secret").control()),
            ("confirm", FormControl::new("secret").control()),
        ],
        matching,
    );
    assert!(form.valid());

    form.get("confirm").unwrap().set_value("typo", SetValueOptions::default());
    assert!(form.has_error("mismatch"));
    assert!(form.invalid());

    form.get("confirm").unwrap().set_value("secret", SetValueOptions::default());
    assert!(form.valid());
}

#[test]
fn interaction_flags_roll_up_and_fan_out() {
    let form = profile();
    assert!(form.pristine() && form.unblurred());

    form.get("name").unwrap().mark_as_dirty();
    assert!(form.dirty());

    form.mark_as_blurred();
    assert!(form.get("name").unwrap().blurred());
    assert!(form.get("age").unwrap().blurred());

    form.mark_as_pristine();
    assert!(form.pristine());
    assert!(form.get("name").unwrap().pristine());
}

#[test]
fn reset_restores_every_child() {
    let form = profile();
    form.set_value(json!({"name": "Ada", "age": 36}), SetValueOptions::dirty());
    assert!(form.dirty());

    form.reset();
    assert_eq!(form.value(), json!({"name": "", "age": 0}));
    assert!(form.pristine());
    assert!(form.invalid());
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

#[test]
fn paths_resolve_through_groups_and_arrays() {
    let first = FormControl::new(1);
    let list = FormArray::new([first.control(), FormControl::new(2).control()]);
    let form = FormGroup::new([(
        "a",
        FormGroup::new([("b", list.control())]).control(),
    )]);

    assert_eq!(form.get("a.b.0"), Some(first.control()));
    assert_eq!(form.get("a.b"), Some(list.control()));
    assert!(form.get("a.b.99").is_none());
    assert!(form.get("a.missing").is_none());
    assert!(form.get("").is_none());

    let segments = ControlPath::from(vec![
        PathSegment::from("a"),
        PathSegment::from("b"),
        PathSegment::from(1usize),
    ]);
    assert_eq!(form.get(segments).unwrap().value(), json!(2));
    assert_eq!(form.get_error_at("required", "a.b.0"), None);
}

#[test]
fn children_know_their_parent_and_root() {
    let inner = FormGroup::new([("leaf", FormControl::new("x").control())]);
    let form = FormGroup::new([("inner", inner.control())]);
    let leaf = form.get("inner.leaf").unwrap();

    assert_eq!(leaf.parent(), Some(inner.control()));
    assert_eq!(leaf.root(), form.control());
    assert!(form.parent().is_none());
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

#[test]
fn trigger_is_inherited_from_nearest_declaring_ancestor() {
    let leaf = FormControl::new("");
    let own = FormControl::with_options("", ControlOptions::new().trigger(Trigger::Submit));
    let _form = FormGroup::with_options(
        [("leaf", leaf.control()), ("own", own.control())],
        ControlOptions::new().trigger(Trigger::Blur),
    );
    assert_eq!(leaf.trigger(), Trigger::Blur);
    assert_eq!(own.trigger(), Trigger::Submit);
    assert_eq!(FormControl::new("").trigger(), Trigger::Change);
}

// ---------------------------------------------------------------------------
// Disabled
// ---------------------------------------------------------------------------

#[test]
fn disabling_a_group_disables_descendants() {
    let form = profile();
    form.disable();
    assert_eq!(form.status(), ValidateStatus::Disabled);
    assert!(form.get("name").unwrap().disabled());
    assert!(form.get("age").unwrap().errors().is_none());

    form.enable();
    assert!(form.get("age").unwrap().has_error("required"));
    assert!(form.invalid());
}

#[test]
fn disabled_children_count_as_valid() {
    let form = profile();
    assert!(form.invalid());

    form.get("age").unwrap().disable();
    assert!(form.valid());
    assert_eq!(form.get("age").unwrap().status(), ValidateStatus::Disabled);
}

#[test]
fn get_value_can_skip_disabled_children() {
    let form = profile();
    form.get("name").unwrap().disable();

    assert_eq!(form.value(), json!({"name": "", "age": 0}));
    assert_eq!(
        form.get_value(ValueOptions { skip_disabled: true }),
        json!({"age": 0})
    );
}

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------

#[test]
fn adding_and_removing_controls_updates_value_and_status() {
    let form = profile();
    form.get("age").unwrap().set_value(36, SetValueOptions::default());
    assert!(form.valid());

    let email = FormControl::with_options("", Validators::required());
    assert!(form.add_control("email", email.control()));
    assert!(!form.add_control("email", FormControl::new("dup").control()));
    assert!(form.invalid());
    assert_eq!(form.value()["email"], json!(""));
    assert_eq!(email.parent(), Some(form.control()));

    let removed = form.remove_control("email").unwrap();
    assert_eq!(removed, email.control());
    assert!(email.parent().is_none());
    assert!(form.valid());
    assert_eq!(form.names(), vec!["name".to_string(), "age".to_string()]);
}

#[test]
fn set_control_replaces_and_detaches_previous_child() {
    let form = profile();
    let old = form.child("name").unwrap();
    let replacement = FormControl::new("Grace");

    let replaced = form.set_control("name", replacement.control());
    assert_eq!(replaced, Some(old.clone()));
    assert!(old.parent().is_none());
    assert_eq!(form.value()["name"], json!("Grace"));
}

#[test]
fn duplicate_names_at_construction_keep_the_last() {
    let form = FormGroup::new([
        ("x", FormControl::new(1).control()),
        ("x", FormControl::new(2).control()),
    ]);
    assert_eq!(form.names(), vec!["x".to_string()]);
    assert_eq!(form.value(), json!({"x": 2}));
}

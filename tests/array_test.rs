//! Integration tests for arrays: ordering, renumbering, aggregation.

use formtree::model::SetValueOptions;
use formtree::{FormArray, FormControl, FormGroup, ValidateStatus, Validators};
use serde_json::json;

fn tags(values: &[&str]) -> FormArray {
    FormArray::new(values.iter().map(|v| FormControl::new(*v).control()))
}

#[test]
fn value_follows_child_order() {
    let array = tags(&["a", "b", "c"]);
    assert_eq!(array.value(), json!(["a", "b", "c"]));
    assert_eq!(array.len(), 3);
    assert_eq!(array.at(1).unwrap().value(), json!("b"));
    assert_eq!(array.get("2").unwrap().value(), json!("c"));
    assert!(array.at(3).is_none());
}

#[test]
fn push_and_insert_adopt_children() {
    let array = tags(&["a"]);
    let pushed = FormControl::new("z");
    array.push(pushed.control());
    array.insert(0, FormControl::new("first").control());
    array.insert(99, FormControl::new("last").control());

    assert_eq!(array.value(), json!(["first", "a", "z", "last"]));
    assert_eq!(pushed.parent(), Some(array.control()));
}

#[test]
fn removing_renumbers_later_children() {
    let array = tags(&["a", "b", "c"]);
    let b = array.at(1).unwrap();

    let removed = array.remove_at(0).unwrap();
    assert_eq!(removed.value(), json!("a"));
    assert!(removed.parent().is_none());

    assert_eq!(array.at(0), Some(b));
    assert_eq!(array.value(), json!(["b", "c"]));
    assert!(array.remove_at(5).is_none());
}

#[test]
fn set_value_writes_by_index_and_ignores_extra_items() {
    let array = tags(&["a", "b"]);
    array.set_value(json!(["x", "y", "z"]), SetValueOptions::default());
    assert_eq!(array.value(), json!(["x", "y"]));

    array.set_value(json!(["only"]), SetValueOptions::default());
    assert_eq!(array.value(), json!(["only", "y"]));
}

#[test]
fn set_control_replaces_or_appends() {
    let array = tags(&["a"]);
    let old = array.at(0).unwrap();

    let replaced = array.set_control(0, FormControl::new("b").control());
    assert_eq!(replaced, Some(old.clone()));
    assert!(old.parent().is_none());

    assert!(array.set_control(10, FormControl::new("c").control()).is_none());
    assert_eq!(array.value(), json!(["b", "c"]));
}

#[test]
fn clear_detaches_everything() {
    let array = tags(&["a", "b"]);
    let a = array.at(0).unwrap();
    array.clear();
    assert!(array.is_empty());
    assert_eq!(array.value(), json!([]));
    assert!(a.parent().is_none());
}

#[test]
fn invalid_element_makes_array_invalid() {
    let array = FormArray::new([
        FormControl::with_options("", Validators::required()).control(),
        FormControl::new("ok").control(),
    ]);
    assert_eq!(array.status(), ValidateStatus::Invalid);

    array.remove_at(0);
    assert_eq!(array.status(), ValidateStatus::Valid);
}

#[test]
fn array_validators_revalidate_on_structural_change() {
    let array = FormArray::with_options(
        [FormControl::new("one").control()],
        Validators::min_length(2),
    );
    assert!(array.has_error("minLength"));

    array.push(FormControl::new("two").control());
    assert!(array.valid());
    assert!(!array.has_error("minLength"));
}

#[test]
fn arrays_nest_inside_groups() {
    let form = FormGroup::new([("tags", tags(&["a"]).control())]);
    let list = form.get("tags").and_then(|c| c.as_array()).unwrap();
    list.push(FormControl::new("b").control());

    assert_eq!(form.value(), json!({"tags": ["a", "b"]}));
    assert_eq!(form.get("tags.1").unwrap().value(), json!("b"));
}

#[test]
fn non_canonical_indices_do_not_resolve() {
    let form = FormGroup::new([("arr", tags(&["a", "b"]).control())]);
    assert_eq!(form.get("arr.1").unwrap().value(), json!("b"));
    assert!(form.get("arr.+1").is_none());
    assert!(form.get("arr.01").is_none());
    assert!(form.get("arr. 1").is_none());
}

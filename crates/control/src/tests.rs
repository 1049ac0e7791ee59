use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::sync::broadcast::error::TryRecvError;

use crate::validators::{min, required};
use crate::{Control, ControlKind, ControlStatus, UpdateOptions, set_validators};

fn profile() -> Control {
	Control::group([
		("name", Control::leaf(Value::Null)),
		("email", Control::leaf(Value::Null)),
		(
			"phone",
			Control::group([("number", Control::leaf(Value::Null)), ("prefix", Control::leaf(Value::Null))]),
		),
		("tags", Control::list([])),
	])
}

#[test]
fn group_value_aggregates_children() {
	let form = profile();
	assert_eq!(form.kind(), ControlKind::Group);
	assert_eq!(
		form.value(),
		json!({ "name": null, "email": null, "phone": { "number": null, "prefix": null }, "tags": [] })
	);
	assert!(form.valid());
	assert!(form.pristine());
	assert!(form.untouched());
	assert_eq!(form.errors(), None);
}

#[test]
fn patch_value_updates_nested_children_and_ignores_unknown_keys() {
	let form = profile();
	form.patch_value(json!({ "phone": { "number": 1, "prefix": 2 }, "unknown": true }), UpdateOptions::default());
	assert_eq!(form.get("phone.number").map(|c| c.value()), Some(json!(1)));
	assert_eq!(form.value()["phone"], json!({ "number": 1, "prefix": 2 }));
	assert!(form.value().get("unknown").is_none());
}

#[test]
fn leaf_has_no_raw_value_but_composites_include_disabled() {
	let form = profile();
	assert_eq!(form.get("name").and_then(|c| c.raw_value()), None);

	form.get("email").expect("email").disable(UpdateOptions::default());
	assert!(form.value().get("email").is_none());
	assert_eq!(form.raw_value().expect("group raw value")["email"], Value::Null);
}

#[test]
fn invalid_child_invalidates_ancestors() {
	let form = profile();
	let number = form.get("phone.number").expect("phone.number");
	set_validators(&number, [required()]);

	assert_eq!(number.errors(), Some([("required".to_string(), json!(true))].into()));
	assert_eq!(form.get("phone").map(|c| c.status()), Some(ControlStatus::Invalid));
	assert!(form.invalid());
	assert_eq!(form.errors(), None);

	number.patch_value(json!(12), UpdateOptions::default());
	assert!(form.valid());
}

#[test]
fn disabled_controls_skip_validation() {
	let control = Control::leaf("").with_validators([required()]);
	assert!(control.invalid());
	control.disable(UpdateOptions::default());
	assert!(control.disabled());
	assert_eq!(control.errors(), None);
	control.enable(UpdateOptions::default());
	assert!(control.invalid());
}

#[test]
fn group_with_every_child_disabled_is_disabled() {
	let form = Control::group([("a", Control::leaf(1)), ("b", Control::leaf(2))]);
	form.get("a").expect("a").disable(UpdateOptions::default());
	assert!(form.enabled());
	form.get("b").expect("b").disable(UpdateOptions::default());
	assert!(form.disabled());
	assert_eq!(form.value(), json!({ "a": 1, "b": 2 }));
}

#[test]
fn list_mutations_reindex_children() {
	let list = Control::list([]);
	list.push(Control::leaf("One"));
	list.push(Control::leaf("Two"));
	list.insert(1, Control::leaf("Between"), UpdateOptions::default());
	assert_eq!(list.value(), json!(["One", "Between", "Two"]));

	let names: Vec<String> = list.children().expect("list children").into_iter().map(|(name, _)| name).collect();
	assert_eq!(names, vec!["0", "1", "2"]);

	let removed = list.remove_at(0, UpdateOptions::default()).expect("removed");
	assert_eq!(removed.value(), json!("One"));
	assert!(removed.parent().is_none());
	assert_eq!(list.value(), json!(["Between", "Two"]));
	assert!(list.remove_at(9, UpdateOptions::default()).is_none());

	list.clear(UpdateOptions::default());
	assert!(list.is_empty());
	assert_eq!(list.value(), json!([]));
}

#[test]
fn insert_past_end_appends() {
	let list = Control::list([Control::leaf("a")]);
	list.insert(10, Control::leaf("b"), UpdateOptions::default());
	assert_eq!(list.value(), json!(["a", "b"]));
	assert_eq!(list.get("1").map(|c| c.value()), Some(json!("b")));
}

#[test]
fn group_membership_changes() {
	let form = profile();
	form.add_control("age", Control::leaf(30), UpdateOptions::default());
	assert_eq!(form.value()["age"], json!(30));
	let removed = form.remove_control("age", UpdateOptions::default());
	assert!(removed.is_some());
	assert!(form.value().get("age").is_none());
	assert!(form.child("age").is_none());
}

#[test]
fn dirty_and_touched_flow_through_the_tree() {
	let form = profile();
	let prefix = form.get("phone.prefix").expect("phone.prefix");
	prefix.mark_as_dirty(false);
	prefix.mark_as_touched(false);
	assert!(form.dirty());
	assert!(form.get("phone").expect("phone").touched());

	prefix.mark_as_pristine(false);
	assert!(form.pristine());
	form.mark_all_as_touched();
	assert!(form.get("name").expect("name").touched());
	form.mark_as_untouched(false);
	assert!(prefix.untouched());
}

#[test]
fn pending_resolves_through_set_errors() {
	let form = profile();
	let email = form.get("email").expect("email");
	email.mark_as_pending(UpdateOptions::default());
	assert!(email.pending());
	assert!(form.pending());

	email.set_errors(Some([("taken".to_string(), json!(true))].into()), true);
	assert!(email.invalid());
	assert!(form.invalid());

	email.set_errors(None, true);
	assert!(form.valid());
}

#[test]
fn child_changes_are_broadcast_at_the_root() {
	let form = profile();
	let mut values = form.value_changes();
	let mut statuses = form.status_changes();

	form.get("email").expect("email").patch_value(json!("m@m.com"), UpdateOptions::default());
	assert_eq!(values.try_recv().ok().map(|v| v["email"].clone()), Some(json!("m@m.com")));
	assert_eq!(statuses.try_recv().ok(), Some(ControlStatus::Valid));
	assert!(matches!(values.try_recv(), Err(TryRecvError::Empty)));
}

#[test]
fn silent_updates_are_not_broadcast() {
	let control = Control::leaf(1).with_validators([min(5.0)]);
	let mut values = control.value_changes();
	control.patch_value(json!(6), UpdateOptions::silent());
	assert_eq!(control.value(), json!(6));
	assert!(control.valid());
	assert!(matches!(values.try_recv(), Err(TryRecvError::Empty)));
}

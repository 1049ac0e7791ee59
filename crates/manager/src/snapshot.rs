//! Immutable control snapshots.

use formsync_control::{Control, ValidationErrors};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Point-in-time state of one control.
///
/// Groups and lists additionally carry `controls`, keyed by child name (lists
/// use decimal indices). Serializes to the camelCase shape used by the store:
/// `rawValue` and `controls` are omitted when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlSnapshot {
	pub value: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub raw_value: Option<Value>,
	pub valid: bool,
	pub invalid: bool,
	pub disabled: bool,
	pub dirty: bool,
	pub pristine: bool,
	pub touched: bool,
	pub pending: bool,
	pub errors: Option<ValidationErrors>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub controls: Option<IndexMap<String, ControlSnapshot>>,
}

impl ControlSnapshot {
	/// Captures `control` and, recursively, all of its descendants.
	///
	/// Values are owned copies; later mutation of the live tree never reaches
	/// a captured snapshot.
	pub fn capture(control: &Control) -> Self {
		let controls = control
			.children()
			.map(|children| children.iter().map(|(name, child)| (name.clone(), Self::capture(child))).collect());

		Self {
			value: control.value(),
			raw_value: control.raw_value(),
			valid: control.valid(),
			invalid: control.invalid(),
			disabled: control.disabled(),
			dirty: control.dirty(),
			pristine: control.pristine(),
			touched: control.touched(),
			pending: control.pending(),
			errors: control.errors(),
			controls,
		}
	}

	/// True for group and list snapshots.
	pub fn is_group(&self) -> bool {
		self.controls.is_some()
	}

	/// Direct child snapshot.
	pub fn control(&self, name: &str) -> Option<&ControlSnapshot> {
		self.controls.as_ref()?.get(name)
	}
}

#[cfg(test)]
mod tests {
	use formsync_control::validators::required;
	use formsync_control::{Control, UpdateOptions};
	use pretty_assertions::assert_eq;
	use proptest::prelude::*;
	use serde_json::json;

	use super::*;

	#[test]
	fn leaf_serializes_without_raw_value_or_controls() {
		let control = Control::leaf("").with_validators([required()]);
		let snapshot = serde_json::to_value(ControlSnapshot::capture(&control)).expect("serializable");
		assert_eq!(
			snapshot,
			json!({
				"value": "",
				"valid": false,
				"invalid": true,
				"disabled": false,
				"dirty": false,
				"pristine": true,
				"touched": false,
				"pending": false,
				"errors": { "required": true },
			})
		);
	}

	#[test]
	fn nested_lists_are_captured_as_groups() {
		let form = Control::group([("tags", Control::list([Control::leaf("a")]))]);
		let snapshot = ControlSnapshot::capture(&form);
		let tags = snapshot.control("tags").expect("tags");
		assert!(tags.is_group());
		assert_eq!(tags.control("0").map(|c| c.value.clone()), Some(json!("a")));
		assert_eq!(snapshot.raw_value, Some(json!({ "tags": ["a"] })));
	}

	#[test]
	fn captured_value_is_detached_from_the_live_tree() {
		let form = Control::group([("name", Control::leaf("before"))]);
		let snapshot = ControlSnapshot::capture(&form);
		form.patch_value(json!({ "name": "after" }), UpdateOptions::default());
		assert_eq!(snapshot.value, json!({ "name": "before" }));
		assert_eq!(form.value(), json!({ "name": "after" }));
	}

	#[derive(Debug, Clone)]
	enum Shape {
		Leaf(i64),
		Group(Vec<Shape>),
		List(Vec<Shape>),
	}

	fn shape() -> impl Strategy<Value = Shape> {
		any::<i64>().prop_map(Shape::Leaf).prop_recursive(4, 32, 4, |inner| {
			prop_oneof![
				prop::collection::vec(inner.clone(), 0..4).prop_map(Shape::Group),
				prop::collection::vec(inner, 0..4).prop_map(Shape::List),
			]
		})
	}

	fn build(shape: &Shape) -> Control {
		match shape {
			Shape::Leaf(v) => Control::leaf(*v),
			Shape::Group(children) => Control::group(children.iter().enumerate().map(|(i, s)| (format!("f{i}"), build(s)))),
			Shape::List(children) => Control::list(children.iter().map(build)),
		}
	}

	fn assert_mirrors(control: &Control, snapshot: &ControlSnapshot) {
		assert_eq!(snapshot.value, control.value());
		match (control.children(), &snapshot.controls) {
			(None, None) => {}
			(Some(children), Some(controls)) => {
				let live: Vec<&str> = children.iter().map(|(name, _)| name.as_str()).collect();
				let captured: Vec<&str> = controls.keys().map(String::as_str).collect();
				assert_eq!(live, captured);
				for (name, child) in &children {
					assert_mirrors(child, &controls[name.as_str()]);
				}
			}
			(live, captured) => panic!("shape mismatch: live {:?} vs captured {:?}", live.is_some(), captured.is_some()),
		}
	}

	proptest! {
		#[test]
		fn snapshot_mirrors_live_tree(shape in shape()) {
			let control = build(&shape);
			assert_mirrors(&control, &ControlSnapshot::capture(&control));
		}
	}
}

//! Dotted-path lookup inside a snapshot tree.

use crate::snapshot::ControlSnapshot;

/// Resolves `path` (e.g. `"phone.number"`, `"skills.0"`) against the children
/// of `root`.
///
/// Returns `None` as soon as a segment is missing or a leaf is reached before
/// the path is exhausted. The root itself is never returned.
pub fn resolve<'a>(root: &'a ControlSnapshot, path: &str) -> Option<&'a ControlSnapshot> {
	path.split('.').try_fold(root, |current, segment| current.control(segment))
}

#[cfg(test)]
mod tests {
	use formsync_control::Control;
	use proptest::prelude::*;
	use serde_json::{Value, json};

	use super::*;

	fn form() -> ControlSnapshot {
		ControlSnapshot::capture(&Control::group([
			("email", Control::leaf(Value::Null)),
			(
				"phone",
				Control::group([("number", Control::leaf(Value::Null)), ("prefix", Control::leaf("054"))]),
			),
			("skills", Control::list([Control::leaf("rust")])),
		]))
	}

	#[test]
	fn single_segment_reads_root_children() {
		let form = form();
		assert_eq!(resolve(&form, "email").map(|c| c.value.clone()), Some(Value::Null));
		assert!(resolve(&form, "missing").is_none());
	}

	#[test]
	fn nested_segments_walk_groups_and_lists() {
		let form = form();
		assert_eq!(resolve(&form, "phone.prefix").map(|c| c.value.clone()), Some(json!("054")));
		assert_eq!(resolve(&form, "skills.0").map(|c| c.value.clone()), Some(json!("rust")));
		assert!(resolve(&form, "skills.1").is_none());
	}

	#[test]
	fn missing_or_leaf_segments_short_circuit() {
		let form = form();
		assert!(resolve(&form, "phone.area.code").is_none());
		assert!(resolve(&form, "email.local").is_none());
		assert!(resolve(&form, "").is_none());
	}

	#[test]
	fn null_value_is_distinct_from_not_found() {
		let form = form();
		let number = resolve(&form, "phone.number").expect("phone.number exists");
		assert_eq!(number.value, Value::Null);
	}

	proptest! {
		#[test]
		fn unknown_paths_never_resolve(segments in prop::collection::vec("[a-z]{1,6}", 1..4)) {
			let path = format!("zz{}", segments.join("."));
			prop_assert!(resolve(&form(), &path).is_none());
		}
	}
}

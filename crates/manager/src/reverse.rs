//! Pushing stored values back onto a freshly registered tree.
//!
//! Groups keep their membership and are walked key by key. Every list met on
//! the way that has a stored array is cleared and rebuilt element by element
//! with the caller's factory, whatever its current length. Elements built by a
//! factory are taken as is.

use formsync_control::{Control, ControlKind, UpdateOptions};
use serde_json::Value;

use crate::config::{ArrayControlFactory, ArrayFactories};
use crate::error::{FormsError, Result};
use crate::snapshot::ControlSnapshot;

/// Rebuilds the lists under `control` from `stored` and returns the value to
/// patch onto it.
///
/// Fails before touching `control` when any list lacks a factory.
pub(crate) fn resolve_store_to_form(stored: &ControlSnapshot, control: &Control, factories: &ArrayFactories, emit_event: bool) -> Result<Value> {
	let value = stored.value.clone();
	if !stored.is_group() {
		return Ok(value);
	}
	check_factories(&value, control, None, factories)?;
	let opts = UpdateOptions::default().emit_event(emit_event);
	reconcile(&value, control, None, factories, opts)?;
	Ok(value)
}

fn factory_for<'a>(factories: &'a ArrayFactories, path: Option<&str>) -> Result<&'a ArrayControlFactory> {
	match path {
		None => factories.root().ok_or(FormsError::MissingArrayFactory),
		Some(member) => factories.member(member).ok_or_else(|| FormsError::MissingArrayFactoryFor {
			member: member.to_owned(),
		}),
	}
}

/// Visits every `(list, stored items, path)` pair that reconciliation rebuilds.
fn walk_lists(value: &Value, control: &Control, path: Option<&str>, visit: &mut dyn FnMut(&Control, &[Value], Option<&str>) -> Result<()>) -> Result<()> {
	match (control.kind(), value) {
		(ControlKind::Group, Value::Object(entries)) => {
			for (name, child_value) in entries {
				if let Some(child) = control.child(name) {
					walk_lists(child_value, &child, Some(&join(path, name)), visit)?;
				}
			}
			Ok(())
		}
		(ControlKind::List, Value::Array(items)) => visit(control, items, path),
		_ => Ok(()),
	}
}

fn check_factories(value: &Value, control: &Control, path: Option<&str>, factories: &ArrayFactories) -> Result<()> {
	walk_lists(value, control, path, &mut |_, _, path| factory_for(factories, path).map(drop))
}

fn reconcile(value: &Value, control: &Control, path: Option<&str>, factories: &ArrayFactories, opts: UpdateOptions) -> Result<()> {
	walk_lists(value, control, path, &mut |list, items, path| {
		let factory = factory_for(factories, path)?;
		tracing::debug!(member = path.unwrap_or("<root>"), from = list.len(), to = items.len(), "forms.rebuild_list");
		list.clear(opts);
		for (index, item) in items.iter().enumerate() {
			list.insert(index, factory(item), opts);
		}
		Ok(())
	})
}

fn join(path: Option<&str>, segment: &str) -> String {
	match path {
		Some(path) => format!("{path}.{segment}"),
		None => segment.to_owned(),
	}
}

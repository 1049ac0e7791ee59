//! Shared control handle and its tree operations.
//!
//! # Invariants
//!
//! - A control's lock is never held while a child's, parent's or validator's
//!   code runs. Child state is read through cloned handles.
//! - Value and validity flow upward: a mutation refreshes the mutated node,
//!   then every ancestor unless `only_self` is set.
//! - Status is broadcast on every refresh, including when it did not change.

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::status::{ControlKind, ControlStatus, UpdateOptions, ValidationErrors};
use crate::validators::Validator;

/// Per-control buffer for each change stream.
const EVENT_BUFFER: usize = 64;

enum Node {
	Leaf,
	Composite(Composite),
}

enum Composite {
	Group(IndexMap<String, Control>),
	List(Vec<Control>),
}

struct State {
	node: Node,
	value: Value,
	validators: Vec<Validator>,
	errors: Option<ValidationErrors>,
	status: ControlStatus,
	disabled: bool,
	dirty: bool,
	touched: bool,
}

struct Inner {
	state: RwLock<State>,
	parent: Mutex<Weak<Inner>>,
	value_tx: broadcast::Sender<Value>,
	status_tx: broadcast::Sender<ControlStatus>,
}

/// Handle to one node of a live control tree.
///
/// Cloning is cheap and yields another handle to the same node.
#[derive(Clone)]
pub struct Control {
	inner: Arc<Inner>,
}

impl Default for Control {
	fn default() -> Self {
		Self::leaf(Value::Null)
	}
}

impl fmt::Debug for Control {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Control")
			.field("kind", &self.kind())
			.field("value", &self.value())
			.field("status", &self.status())
			.finish()
	}
}

impl Control {
	/// Creates a leaf control holding `value`.
	pub fn leaf(value: impl Into<Value>) -> Self {
		Self::from_node(Node::Leaf, value.into())
	}

	/// Creates a group control from named children.
	pub fn group<I, K>(controls: I) -> Self
	where
		I: IntoIterator<Item = (K, Control)>,
		K: Into<String>,
	{
		let children: IndexMap<String, Control> = controls.into_iter().map(|(name, control)| (name.into(), control)).collect();
		Self::from_node(Node::Composite(Composite::Group(children)), Value::Null)
	}

	/// Creates a list control from ordered children.
	pub fn list(controls: impl IntoIterator<Item = Control>) -> Self {
		let children: Vec<Control> = controls.into_iter().collect();
		Self::from_node(Node::Composite(Composite::List(children)), Value::Null)
	}

	fn from_node(node: Node, value: Value) -> Self {
		let (value_tx, _) = broadcast::channel(EVENT_BUFFER);
		let (status_tx, _) = broadcast::channel(EVENT_BUFFER);
		let control = Self {
			inner: Arc::new(Inner {
				state: RwLock::new(State {
					node,
					value,
					validators: Vec::new(),
					errors: None,
					status: ControlStatus::Valid,
					disabled: false,
					dirty: false,
					touched: false,
				}),
				parent: Mutex::new(Weak::new()),
				value_tx,
				status_tx,
			}),
		};
		for child in control.child_controls() {
			child.set_parent(&control);
		}
		control.refresh(false);
		control
	}

	/// Replaces the validators and revalidates silently.
	#[must_use]
	pub fn with_validators(self, validators: impl IntoIterator<Item = Validator>) -> Self {
		self.set_validators(validators);
		self.update_value_and_validity(UpdateOptions::silent().only_self());
		self
	}

	/// Adds one validator and revalidates silently.
	#[must_use]
	pub fn with_validator(self, validator: Validator) -> Self {
		self.inner.state.write().validators.push(validator);
		self.update_value_and_validity(UpdateOptions::silent().only_self());
		self
	}

	/// Returns true when both handles point at the same node.
	pub fn ptr_eq(&self, other: &Control) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}

	pub fn kind(&self) -> ControlKind {
		match &self.inner.state.read().node {
			Node::Leaf => ControlKind::Leaf,
			Node::Composite(Composite::Group(_)) => ControlKind::Group,
			Node::Composite(Composite::List(_)) => ControlKind::List,
		}
	}

	/// Current value. Disabled children are left out of composite values.
	pub fn value(&self) -> Value {
		self.inner.state.read().value.clone()
	}

	/// Value including disabled children. `None` for leaves.
	pub fn raw_value(&self) -> Option<Value> {
		let kind = self.kind();
		if !kind.is_composite() {
			return None;
		}
		let children = self.children().unwrap_or_default();
		Some(aggregate(kind, &children, true, |c| c.raw_value().unwrap_or_else(|| c.value())))
	}

	pub fn status(&self) -> ControlStatus {
		self.inner.state.read().status
	}

	pub fn valid(&self) -> bool {
		self.status() == ControlStatus::Valid
	}

	pub fn invalid(&self) -> bool {
		self.status() == ControlStatus::Invalid
	}

	pub fn pending(&self) -> bool {
		self.status() == ControlStatus::Pending
	}

	pub fn disabled(&self) -> bool {
		self.status() == ControlStatus::Disabled
	}

	pub fn enabled(&self) -> bool {
		!self.disabled()
	}

	pub fn dirty(&self) -> bool {
		self.inner.state.read().dirty
	}

	pub fn pristine(&self) -> bool {
		!self.dirty()
	}

	pub fn touched(&self) -> bool {
		self.inner.state.read().touched
	}

	pub fn untouched(&self) -> bool {
		!self.touched()
	}

	pub fn errors(&self) -> Option<ValidationErrors> {
		self.inner.state.read().errors.clone()
	}

	/// Named children: field names for groups, decimal indices for lists.
	///
	/// Returns `None` for leaves.
	pub fn children(&self) -> Option<Vec<(String, Control)>> {
		match &self.inner.state.read().node {
			Node::Leaf => None,
			Node::Composite(Composite::Group(map)) => Some(map.iter().map(|(name, c)| (name.clone(), c.clone())).collect()),
			Node::Composite(Composite::List(items)) => Some(items.iter().enumerate().map(|(i, c)| (i.to_string(), c.clone())).collect()),
		}
	}

	fn child_controls(&self) -> Vec<Control> {
		match &self.inner.state.read().node {
			Node::Leaf => Vec::new(),
			Node::Composite(Composite::Group(map)) => map.values().cloned().collect(),
			Node::Composite(Composite::List(items)) => items.clone(),
		}
	}

	/// Number of direct children. Zero for leaves.
	pub fn len(&self) -> usize {
		match &self.inner.state.read().node {
			Node::Leaf => 0,
			Node::Composite(Composite::Group(map)) => map.len(),
			Node::Composite(Composite::List(items)) => items.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Direct child by name (groups) or decimal index (lists).
	pub fn child(&self, name: &str) -> Option<Control> {
		match &self.inner.state.read().node {
			Node::Leaf => None,
			Node::Composite(Composite::Group(map)) => map.get(name).cloned(),
			Node::Composite(Composite::List(items)) => name.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
		}
	}

	/// List element at `index`.
	pub fn at(&self, index: usize) -> Option<Control> {
		match &self.inner.state.read().node {
			Node::Composite(Composite::List(items)) => items.get(index).cloned(),
			_ => None,
		}
	}

	/// Descendant at a dot-separated path, e.g. `"phone.number"` or `"skills.0"`.
	pub fn get(&self, path: &str) -> Option<Control> {
		path.split('.').try_fold(self.clone(), |current, segment| current.child(segment))
	}

	pub fn parent(&self) -> Option<Control> {
		self.inner.parent.lock().upgrade().map(|inner| Control { inner })
	}

	fn set_parent(&self, parent: &Control) {
		*self.inner.parent.lock() = Arc::downgrade(&parent.inner);
	}

	fn clear_parent(&self) {
		*self.inner.parent.lock() = Weak::new();
	}

	/// Receiver for value broadcasts. Subscribe before mutating to observe the change.
	pub fn value_changes(&self) -> broadcast::Receiver<Value> {
		self.inner.value_tx.subscribe()
	}

	/// Receiver for status broadcasts, sent on every recalculation.
	pub fn status_changes(&self) -> broadcast::Receiver<ControlStatus> {
		self.inner.status_tx.subscribe()
	}

	/// Replaces the validators without revalidating.
	pub fn set_validators(&self, validators: impl IntoIterator<Item = Validator>) {
		self.inner.state.write().validators = validators.into_iter().collect();
	}

	/// Removes every validator without revalidating.
	pub fn clear_validators(&self) {
		self.inner.state.write().validators.clear();
	}

	/// Patches the value.
	///
	/// Leaves take `value` as is. Groups patch the children named by the keys of
	/// an object and ignore unknown keys; lists patch existing elements by
	/// position and ignore surplus entries. Non-matching shapes are ignored.
	pub fn patch_value(&self, value: Value, opts: UpdateOptions) {
		let child_opts = opts.only_self();
		match self.kind() {
			ControlKind::Leaf => {
				self.inner.state.write().value = value;
			}
			ControlKind::Group => {
				let Value::Object(entries) = value else {
					return;
				};
				for (name, child_value) in entries {
					if let Some(child) = self.child(&name) {
						child.patch_value(child_value, child_opts);
					}
				}
			}
			ControlKind::List => {
				let Value::Array(items) = value else {
					return;
				};
				for (index, item) in items.into_iter().enumerate() {
					if let Some(child) = self.at(index) {
						child.patch_value(item, child_opts);
					}
				}
			}
		}
		self.update_value_and_validity(opts);
	}

	/// Recomputes value, errors and status, then does the same for each ancestor.
	pub fn update_value_and_validity(&self, opts: UpdateOptions) {
		self.refresh(opts.emit_event);
		if !opts.only_self
			&& let Some(parent) = self.parent()
		{
			parent.update_value_and_validity(opts);
		}
	}

	fn refresh(&self, emit_event: bool) {
		let kind = self.kind();
		let children = self.children().unwrap_or_default();
		let all_children_disabled = !children.is_empty() && children.iter().all(|(_, c)| c.disabled());
		let disabled = self.inner.state.read().disabled || all_children_disabled;

		if kind.is_composite() {
			let value = aggregate(kind, &children, disabled, Control::value);
			self.inner.state.write().value = value;
		}

		let errors = if disabled { None } else { self.run_validators() };
		let status = calculate_status(disabled, errors.as_ref(), &children);
		let value = {
			let mut state = self.inner.state.write();
			state.errors = errors;
			state.status = status;
			state.value.clone()
		};

		if emit_event {
			let _ = self.inner.value_tx.send(value);
			let _ = self.inner.status_tx.send(status);
		}
	}

	fn run_validators(&self) -> Option<ValidationErrors> {
		let validators = self.inner.state.read().validators.clone();
		let mut merged = ValidationErrors::new();
		for validator in &validators {
			if let Some(errors) = validator(self) {
				merged.extend(errors);
			}
		}
		(!merged.is_empty()).then_some(merged)
	}

	/// Sets errors computed outside the validator pipeline and recalculates
	/// status here and in every ancestor.
	pub fn set_errors(&self, errors: Option<ValidationErrors>, emit_event: bool) {
		let children = self.children().unwrap_or_default();
		let status = {
			let mut state = self.inner.state.write();
			state.errors = errors;
			let status = calculate_status(state.status == ControlStatus::Disabled, state.errors.as_ref(), &children);
			state.status = status;
			status
		};
		if emit_event {
			let _ = self.inner.status_tx.send(status);
		}
		if let Some(parent) = self.parent() {
			parent.recalculate_status(emit_event);
		}
	}

	fn recalculate_status(&self, emit_event: bool) {
		let children = self.children().unwrap_or_default();
		let status = {
			let mut state = self.inner.state.write();
			let status = calculate_status(state.status == ControlStatus::Disabled, state.errors.as_ref(), &children);
			state.status = status;
			status
		};
		if emit_event {
			let _ = self.inner.status_tx.send(status);
		}
		if let Some(parent) = self.parent() {
			parent.recalculate_status(emit_event);
		}
	}

	/// Marks the control pending until the next recalculation or [`Self::set_errors`].
	pub fn mark_as_pending(&self, opts: UpdateOptions) {
		self.inner.state.write().status = ControlStatus::Pending;
		if opts.emit_event {
			let _ = self.inner.status_tx.send(ControlStatus::Pending);
		}
		if !opts.only_self
			&& let Some(parent) = self.parent()
		{
			parent.mark_as_pending(opts);
		}
	}

	/// Disables this control and its descendants.
	pub fn disable(&self, opts: UpdateOptions) {
		self.inner.state.write().disabled = true;
		let child_opts = opts.only_self();
		for child in self.child_controls() {
			child.disable(child_opts);
		}
		self.refresh(opts.emit_event);
		self.update_ancestors(opts);
	}

	/// Enables this control and its descendants.
	pub fn enable(&self, opts: UpdateOptions) {
		self.inner.state.write().disabled = false;
		let child_opts = opts.only_self();
		for child in self.child_controls() {
			child.enable(child_opts);
		}
		self.refresh(opts.emit_event);
		self.update_ancestors(opts);
	}

	fn update_ancestors(&self, opts: UpdateOptions) {
		if opts.only_self {
			return;
		}
		if let Some(parent) = self.parent() {
			parent.update_value_and_validity(opts);
			parent.update_pristine();
			parent.update_touched();
		}
	}

	/// Marks this control dirty, and its ancestors unless `only_self`.
	pub fn mark_as_dirty(&self, only_self: bool) {
		self.inner.state.write().dirty = true;
		if !only_self && let Some(parent) = self.parent() {
			parent.mark_as_dirty(false);
		}
	}

	/// Marks this control and its descendants pristine; ancestors recompute.
	pub fn mark_as_pristine(&self, only_self: bool) {
		self.inner.state.write().dirty = false;
		for child in self.child_controls() {
			child.mark_as_pristine(true);
		}
		if !only_self && let Some(parent) = self.parent() {
			parent.update_pristine();
		}
	}

	fn update_pristine(&self) {
		let dirty = self.child_controls().iter().any(Control::dirty);
		self.inner.state.write().dirty = dirty;
		if let Some(parent) = self.parent() {
			parent.update_pristine();
		}
	}

	/// Marks this control touched, and its ancestors unless `only_self`.
	pub fn mark_as_touched(&self, only_self: bool) {
		self.inner.state.write().touched = true;
		if !only_self && let Some(parent) = self.parent() {
			parent.mark_as_touched(false);
		}
	}

	/// Marks this control and every descendant touched.
	pub fn mark_all_as_touched(&self) {
		self.mark_as_touched(true);
		for child in self.child_controls() {
			child.mark_all_as_touched();
		}
	}

	/// Marks this control and its descendants untouched; ancestors recompute.
	pub fn mark_as_untouched(&self, only_self: bool) {
		self.inner.state.write().touched = false;
		for child in self.child_controls() {
			child.mark_as_untouched(true);
		}
		if !only_self && let Some(parent) = self.parent() {
			parent.update_touched();
		}
	}

	fn update_touched(&self) {
		let touched = self.child_controls().iter().any(Control::touched);
		self.inner.state.write().touched = touched;
		if let Some(parent) = self.parent() {
			parent.update_touched();
		}
	}

	/// Appends an element to a list. No-op on other kinds.
	pub fn push(&self, control: Control) {
		let len = self.len();
		self.insert(len, control, UpdateOptions::default());
	}

	/// Inserts an element into a list. Indices past the end append.
	pub fn insert(&self, index: usize, control: Control, opts: UpdateOptions) {
		{
			let mut state = self.inner.state.write();
			let Node::Composite(Composite::List(items)) = &mut state.node else {
				tracing::debug!(index, "control.insert_on_non_list");
				return;
			};
			let index = index.min(items.len());
			items.insert(index, control.clone());
		}
		control.set_parent(self);
		self.update_value_and_validity(opts);
	}

	/// Removes the list element at `index`.
	pub fn remove_at(&self, index: usize, opts: UpdateOptions) -> Option<Control> {
		let removed = {
			let mut state = self.inner.state.write();
			let Node::Composite(Composite::List(items)) = &mut state.node else {
				return None;
			};
			if index >= items.len() {
				tracing::debug!(index, len = items.len(), "control.remove_out_of_range");
				return None;
			}
			items.remove(index)
		};
		removed.clear_parent();
		self.update_value_and_validity(opts);
		Some(removed)
	}

	/// Removes every list element.
	pub fn clear(&self, opts: UpdateOptions) {
		let removed = {
			let mut state = self.inner.state.write();
			let Node::Composite(Composite::List(items)) = &mut state.node else {
				return;
			};
			if items.is_empty() {
				return;
			}
			std::mem::take(items)
		};
		for control in &removed {
			control.clear_parent();
		}
		self.update_value_and_validity(opts);
	}

	/// Adds a named child to a group, keeping an existing child of the same name.
	pub fn add_control(&self, name: impl Into<String>, control: Control, opts: UpdateOptions) {
		{
			let mut state = self.inner.state.write();
			let Node::Composite(Composite::Group(map)) = &mut state.node else {
				return;
			};
			let name = name.into();
			if map.contains_key(&name) {
				return;
			}
			map.insert(name, control.clone());
		}
		control.set_parent(self);
		self.update_value_and_validity(opts);
	}

	/// Removes a named child from a group.
	pub fn remove_control(&self, name: &str, opts: UpdateOptions) -> Option<Control> {
		let removed = {
			let mut state = self.inner.state.write();
			let Node::Composite(Composite::Group(map)) = &mut state.node else {
				return None;
			};
			map.shift_remove(name)?
		};
		removed.clear_parent();
		self.update_value_and_validity(opts);
		Some(removed)
	}
}

fn aggregate(kind: ControlKind, children: &[(String, Control)], include_disabled: bool, project: impl Fn(&Control) -> Value) -> Value {
	let picked = children.iter().filter(|(_, c)| include_disabled || c.enabled());
	match kind {
		ControlKind::List => Value::Array(picked.map(|(_, c)| project(c)).collect()),
		_ => Value::Object(picked.map(|(name, c)| (name.clone(), project(c))).collect()),
	}
}

fn calculate_status(disabled: bool, errors: Option<&ValidationErrors>, children: &[(String, Control)]) -> ControlStatus {
	if disabled {
		ControlStatus::Disabled
	} else if errors.is_some() || children.iter().any(|(_, c)| c.invalid()) {
		ControlStatus::Invalid
	} else if children.iter().any(|(_, c)| c.pending()) {
		ControlStatus::Pending
	} else {
		ControlStatus::Valid
	}
}

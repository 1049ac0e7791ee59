use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error kind (e.g. `"required"`) mapped to its metadata.
pub type ValidationErrors = BTreeMap<String, Value>;

/// Validation status of a control, recomputed on every value/validity pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ControlStatus {
	#[default]
	Valid,
	Invalid,
	Pending,
	Disabled,
}

impl ControlStatus {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Valid => "VALID",
			Self::Invalid => "INVALID",
			Self::Pending => "PENDING",
			Self::Disabled => "DISABLED",
		}
	}
}

/// Shape of a control node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
	/// A single editable value.
	Leaf,
	/// Fixed, named membership.
	Group,
	/// Ordered, variable membership addressed by index.
	List,
}

impl ControlKind {
	/// Returns true for groups and lists.
	pub const fn is_composite(self) -> bool {
		!matches!(self, Self::Leaf)
	}
}

/// Options accepted by every mutating control operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
	/// Skip propagating the update to ancestors.
	pub only_self: bool,
	/// Broadcast value and status changes.
	pub emit_event: bool,
}

impl Default for UpdateOptions {
	fn default() -> Self {
		Self {
			only_self: false,
			emit_event: true,
		}
	}
}

impl UpdateOptions {
	/// Propagates to ancestors without broadcasting anything.
	pub const fn silent() -> Self {
		Self {
			only_self: false,
			emit_event: false,
		}
	}

	#[must_use]
	pub const fn only_self(mut self) -> Self {
		self.only_self = true;
		self
	}

	#[must_use]
	pub const fn emit_event(mut self, emit_event: bool) -> Self {
		self.emit_event = emit_event;
		self
	}
}

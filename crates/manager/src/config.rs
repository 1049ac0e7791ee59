//! Manager defaults and per-registration options.
//!
//! [`ManagerConfig`] holds process-wide defaults and can be loaded from TOML:
//!
//! ```toml
//! debounce-ms = 150
//! emit-event = false
//! ```
//!
//! [`UpsertOptions`] overrides those defaults for one registration and carries
//! the list factories used when stored values are pushed back onto a new tree.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use formsync_control::Control;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Default debounce window between a change and the store write.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(DEFAULT_DEBOUNCE_MS);

/// Process-wide manager defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ManagerConfig {
	/// Quiescence required after the last change before the store is written.
	pub debounce_ms: u64,
	/// Broadcast control changes caused by pushing stored values onto a new tree.
	pub emit_event: bool,
}

impl Default for ManagerConfig {
	fn default() -> Self {
		Self {
			debounce_ms: DEFAULT_DEBOUNCE_MS,
			emit_event: false,
		}
	}
}

impl ManagerConfig {
	/// Parses a TOML document. Missing keys keep their defaults.
	pub fn from_toml_str(input: &str) -> Result<Self> {
		Ok(toml::from_str(input)?)
	}

	pub fn debounce(&self) -> Duration {
		Duration::from_millis(self.debounce_ms)
	}
}

/// Builds a fresh list element from its stored value.
pub type ArrayControlFactory = Arc<dyn Fn(&Value) -> Control + Send + Sync>;

/// List element factories for one registration.
///
/// A registration may carry both kinds: `root` rebuilds a registered control
/// that is itself a list, `by_name` rebuilds list members of groups.
#[derive(Clone, Default)]
pub struct ArrayFactories {
	root: Option<ArrayControlFactory>,
	/// Keyed by list member name or dotted path.
	by_name: HashMap<String, ArrayControlFactory>,
}

impl ArrayFactories {
	pub(crate) fn root(&self) -> Option<&ArrayControlFactory> {
		self.root.as_ref()
	}

	/// Looks `path` up first, then its last segment.
	pub(crate) fn member(&self, path: &str) -> Option<&ArrayControlFactory> {
		self.by_name
			.get(path)
			.or_else(|| path.rsplit('.').next().and_then(|name| self.by_name.get(name)))
	}
}

impl fmt::Debug for ArrayFactories {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ArrayFactories")
			.field("root", &self.root.is_some())
			.field("by_name", &self.by_name.keys().collect::<Vec<_>>())
			.finish()
	}
}

/// Options for [`crate::FormsManager::upsert`]. Unset fields fall back to the
/// manager's [`ManagerConfig`].
#[derive(Debug, Clone, Default)]
pub struct UpsertOptions {
	pub(crate) debounce: Option<Duration>,
	pub(crate) emit_event: Option<bool>,
	pub(crate) factories: ArrayFactories,
}

impl UpsertOptions {
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn debounce(mut self, debounce: Duration) -> Self {
		self.debounce = Some(debounce);
		self
	}

	#[must_use]
	pub fn emit_event(mut self, emit_event: bool) -> Self {
		self.emit_event = Some(emit_event);
		self
	}

	/// Sets the factory for a registered control that is itself a list.
	#[must_use]
	pub fn array_factory(mut self, factory: impl Fn(&Value) -> Control + Send + Sync + 'static) -> Self {
		self.factories.root = Some(Arc::new(factory));
		self
	}

	/// Adds the factory for a list member of a group, by name or dotted path.
	#[must_use]
	pub fn array_factory_for(mut self, member: impl Into<String>, factory: impl Fn(&Value) -> Control + Send + Sync + 'static) -> Self {
		self.factories.by_name.insert(member.into(), Arc::new(factory));
		self
	}

	pub(crate) fn resolve(&self, config: &ManagerConfig) -> (Duration, bool) {
		(self.debounce.unwrap_or_else(|| config.debounce()), self.emit_event.unwrap_or(config.emit_event))
	}
}

//! The forms manager facade.
//!
//! # Role
//!
//! Binds live control trees to names, keeps one snapshot per name in a shared
//! [`Store`], and exposes synchronous reads plus change-filtered selections
//! over those snapshots.
//!
//! # Invariants
//!
//! - The store is written only here and by the per-form sync tasks, always one
//!   key at a time. Entries of other forms keep their previous allocation.
//! - At most one sync subscription is active per form name. Re-registering,
//!   removing or unsubscribing a name cancels its previous subscription.
//! - A removed form reads as `None` until it is registered again.

use std::sync::Arc;

use formsync_control::{Control, UpdateOptions, ValidationErrors};
use formsync_store::{Entries, Selection, Store, distinct_until_changed, filter_nil};
use futures::StreamExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_stream::wrappers::WatchStream;

use crate::config::{ManagerConfig, UpsertOptions};
use crate::error::Result;
use crate::path;
use crate::registry::Registry;
use crate::reverse::resolve_store_to_form;
use crate::snapshot::ControlSnapshot;
use crate::sync::spawn_sync;

/// One store entry. `None` once the form has been removed.
pub type FormEntry = Option<Arc<ControlSnapshot>>;

/// Whole manager state: form name to its latest snapshot.
pub type FormsState = Entries<FormEntry>;

pub(crate) type FormsStore = Store<FormEntry>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StoreAction {
	Create,
	Update,
}

impl StoreAction {
	pub(crate) fn label(self, form: &str) -> String {
		let mut chars = form.chars();
		let capitalized: String = match chars.next() {
			Some(first) => first.to_uppercase().chain(chars).collect(),
			None => String::new(),
		};
		match self {
			Self::Create => format!("Create {capitalized} Form"),
			Self::Update => format!("Update {capitalized} Form"),
		}
	}
}

/// Captures `control` and replaces the `form` entry of `store` with it.
pub(crate) fn write_form(store: &FormsStore, form: &str, control: &Control, action: StoreAction) {
	let snapshot = ControlSnapshot::capture(control);
	match action {
		StoreAction::Create => tracing::debug!(form, action = %action.label(form), "forms.create"),
		StoreAction::Update => tracing::trace!(form, action = %action.label(form), "forms.update"),
	}
	store.set(form, Some(Arc::new(snapshot)));
}

struct Shared {
	store: FormsStore,
	registry: Mutex<Registry>,
	config: ManagerConfig,
}

/// Mirrors live control trees into a shared snapshot store.
///
/// Cloning yields another handle to the same manager.
#[derive(Clone)]
pub struct FormsManager {
	shared: Arc<Shared>,
}

impl Default for FormsManager {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for FormsManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FormsManager")
			.field("store", &self.shared.store)
			.field("config", &self.shared.config)
			.finish()
	}
}

impl FormsManager {
	pub fn new() -> Self {
		Self::with_config(ManagerConfig::default())
	}

	pub fn with_config(config: ManagerConfig) -> Self {
		Self {
			shared: Arc::new(Shared {
				store: Store::new("forms"),
				registry: Mutex::new(Registry::default()),
				config,
			}),
		}
	}

	pub fn config(&self) -> &ManagerConfig {
		&self.shared.config
	}

	#[cfg(test)]
	pub(crate) fn store(&self) -> &FormsStore {
		&self.shared.store
	}

	/// Current state of every form ever registered.
	pub fn state(&self) -> Arc<FormsState> {
		self.shared.store.get_value()
	}

	/// Registers `control` under `name` and keeps its snapshot current.
	///
	/// When a snapshot for `name` already exists, its values are first pushed
	/// onto `control`, rebuilding every stored list with the factories from
	/// `options`. The store entry is then rewritten from `control` right
	/// away, and every later change is written after `options`' debounce.
	///
	/// # Errors
	///
	/// Fails when a list must be rebuilt and no factory covers it, leaving the
	/// previous registration under `name` in place. Also fails when called
	/// outside a tokio runtime and the background sync runtime cannot start.
	pub fn upsert(&self, name: &str, control: &Control, options: UpsertOptions) -> Result<&Self> {
		let (debounce, emit_event) = options.resolve(&self.shared.config);
		let store = &self.shared.store;

		let action = match store.get(name).flatten() {
			Some(stored) => {
				let value = resolve_store_to_form(&stored, control, &options.factories, emit_event)?;
				self.shared.registry.lock().release(name);
				control.patch_value(value, UpdateOptions::default().emit_event(emit_event));
				StoreAction::Update
			}
			None => StoreAction::Create,
		};
		self.shared.registry.lock().publish_form(name, control.clone());
		write_form(store, name, control, action);

		let handle = spawn_sync(name, control.clone(), store.clone(), debounce)?;
		let replaced = self.shared.registry.lock().install(handle);
		tracing::debug!(form = name, ?debounce, replaced, "forms.subscribe");
		Ok(self)
	}

	/// Clears the snapshot for `name` and cancels its subscription.
	///
	/// Unknown names are ignored.
	pub fn remove(&self, name: &str) {
		let released = self.shared.registry.lock().release(name);
		if released {
			tracing::debug!(form = name, "forms.unsubscribe");
		}
		if self.shared.store.contains_key(name) {
			tracing::debug!(form = name, action = %format!("Clear {name}"), "forms.clear");
			self.shared.store.set(name, None);
		}
	}

	/// Cancels the subscription for `name`, or every subscription when `None`.
	///
	/// Snapshots are kept; they just stop following their live trees.
	pub fn unsubscribe(&self, name: Option<&str>) {
		let mut registry = self.shared.registry.lock();
		match name {
			Some(name) => {
				if registry.release(name) {
					tracing::debug!(form = name, "forms.unsubscribe");
				}
			}
			None => {
				let released = registry.release_all();
				tracing::debug!(released, "forms.unsubscribe_all");
			}
		}
	}

	/// True while a sync subscription is active for `name`.
	pub fn is_subscribed(&self, name: &str) -> bool {
		self.shared.registry.lock().is_subscribed(name)
	}

	/// True when `name` currently holds a snapshot.
	pub fn has_form(&self, name: &str) -> bool {
		self.get_form(name).is_some()
	}

	pub fn get_form(&self, name: &str) -> FormEntry {
		self.shared.store.get(name).flatten()
	}

	/// Snapshot of the control at `path`, or of the whole form without one.
	pub fn get_control(&self, name: &str, path: Option<&str>) -> Option<ControlSnapshot> {
		let form = self.get_form(name)?;
		match path.filter(|p| !p.is_empty()) {
			None => Some(ControlSnapshot::clone(&form)),
			Some(path) => path::resolve(&form, path).cloned(),
		}
	}

	/// Decodes the stored value at `path` into `T`.
	pub fn get_value_as<T: DeserializeOwned>(&self, name: &str, path: Option<&str>) -> Option<T> {
		let control = self.get_control(name, path)?;
		serde_json::from_value(control.value)
			.inspect_err(|error| tracing::warn!(form = name, path, %error, "forms.decode_failed"))
			.ok()
	}

	/// The live tree last registered under `name`.
	pub fn get_ng_form(&self, name: &str) -> Option<Control> {
		self.shared.registry.lock().form(name)
	}

	/// Streams the entry for `name`, yielding `None` right away for names that
	/// were never registered and whenever the form is removed.
	pub fn select_form_entry(&self, name: &str) -> Selection<FormEntry> {
		let name = name.to_owned();
		self.shared.store.select(move |state: &FormsState| state.get(&name).cloned().flatten())
	}

	/// Streams the snapshot for `name`, skipping removed states.
	pub fn select_form(&self, name: &str) -> Selection<Arc<ControlSnapshot>> {
		filter_nil(self.select_form_entry(name)).boxed()
	}

	/// Streams the control at `path`, or the whole form without one.
	///
	/// Paths that do not resolve yield nothing.
	pub fn select_control(&self, name: &str, path: Option<&str>) -> Selection<ControlSnapshot> {
		let forms = self.select_form(name);
		let path = path.filter(|p| !p.is_empty()).map(str::to_owned);
		let controls = forms.filter_map(move |form| {
			let control = match &path {
				None => Some(ControlSnapshot::clone(&form)),
				Some(path) => path::resolve(&form, path).cloned(),
			};
			std::future::ready(control)
		});
		distinct_until_changed(controls).boxed()
	}

	fn select_field<T>(&self, name: &str, path: Option<&str>, field: fn(ControlSnapshot) -> T) -> Selection<T>
	where
		T: Clone + PartialEq + Send + 'static,
	{
		distinct_until_changed(self.select_control(name, path).map(field)).boxed()
	}

	pub fn select_valid(&self, name: &str, path: Option<&str>) -> Selection<bool> {
		self.select_field(name, path, |c| c.valid)
	}

	pub fn select_dirty(&self, name: &str, path: Option<&str>) -> Selection<bool> {
		self.select_field(name, path, |c| c.dirty)
	}

	pub fn select_disabled(&self, name: &str, path: Option<&str>) -> Selection<bool> {
		self.select_field(name, path, |c| c.disabled)
	}

	pub fn select_value(&self, name: &str, path: Option<&str>) -> Selection<Value> {
		self.select_field(name, path, |c| c.value)
	}

	pub fn select_errors(&self, name: &str, path: Option<&str>) -> Selection<Option<ValidationErrors>> {
		self.select_field(name, path, |c| c.errors)
	}

	/// Like [`Self::select_value`], decoded into `T`. Values that fail to
	/// decode are skipped.
	pub fn select_value_as<T>(&self, name: &str, path: Option<&str>) -> Selection<T>
	where
		T: DeserializeOwned + Send + 'static,
	{
		let form = name.to_owned();
		self.select_value(name, path)
			.filter_map(move |value| {
				let decoded = serde_json::from_value(value)
					.inspect_err(|error| tracing::warn!(form = %form, %error, "forms.decode_failed"))
					.ok();
				std::future::ready(decoded)
			})
			.boxed()
	}

	/// Streams the live tree bound to `name`, starting once a snapshot exists
	/// and again whenever the name is bound to a new tree.
	pub fn select_ng_form(&self, name: &str) -> Selection<Control> {
		let shared = Arc::clone(&self.shared);
		let form = name.to_owned();
		self.select_form(name)
			.take(1)
			.filter_map(move |_| std::future::ready(shared.registry.lock().watch_form(&form)))
			.flat_map(WatchStream::new)
			.boxed()
	}
}

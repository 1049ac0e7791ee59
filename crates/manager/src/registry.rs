use std::collections::HashMap;

use formsync_control::Control;
use tokio::sync::watch;

use crate::sync::SyncHandle;

/// Bookkeeping for one form name.
struct Registration {
	/// Broadcasts the live tree currently bound to the name.
	form: watch::Sender<Control>,
	sync: Option<SyncHandle>,
}

/// Per form-name live trees and sync subscriptions.
#[derive(Default)]
pub(crate) struct Registry {
	entries: HashMap<String, Registration>,
}

impl Registry {
	/// Binds `control` to `name`, notifying watchers when it replaces another tree.
	pub fn publish_form(&mut self, name: &str, control: Control) {
		match self.entries.get_mut(name) {
			Some(registration) => {
				registration.form.send_replace(control);
			}
			None => {
				let (form, _) = watch::channel(control);
				self.entries.insert(name.to_owned(), Registration { form, sync: None });
			}
		}
	}

	pub fn form(&self, name: &str) -> Option<Control> {
		self.entries.get(name).map(|r| r.form.borrow().clone())
	}

	pub fn watch_form(&self, name: &str) -> Option<watch::Receiver<Control>> {
		self.entries.get(name).map(|r| r.form.subscribe())
	}

	/// Installs `handle` for its form, cancelling the handle it replaces.
	///
	/// Returns true when a previous subscription was replaced.
	pub fn install(&mut self, handle: SyncHandle) -> bool {
		let Some(registration) = self.entries.get_mut(handle.form()) else {
			tracing::warn!(form = handle.form(), "forms.install_without_form");
			return false;
		};
		match registration.sync.replace(handle) {
			Some(previous) => {
				previous.cancel();
				true
			}
			None => false,
		}
	}

	/// Cancels the subscription for `name`. Returns true if one was active.
	pub fn release(&mut self, name: &str) -> bool {
		let Some(handle) = self.entries.get_mut(name).and_then(|r| r.sync.take()) else {
			return false;
		};
		handle.cancel();
		true
	}

	/// Cancels every subscription. Returns how many were active.
	pub fn release_all(&mut self) -> usize {
		self.entries
			.values_mut()
			.filter_map(|r| r.sync.take())
			.map(|handle| handle.cancel())
			.count()
	}

	pub fn is_subscribed(&self, name: &str) -> bool {
		self.entries
			.get(name)
			.and_then(|r| r.sync.as_ref())
			.is_some_and(|handle| !handle.is_finished())
	}
}

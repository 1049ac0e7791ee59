//! Debounced live-tree → store synchronization.
//!
//! # Role
//!
//! One task per registered form. It multiplexes the root control's value and
//! status broadcasts into a single trigger, and writes a fresh snapshot into
//! the store once the trigger has been quiet for the debounce window.
//!
//! # Invariants
//!
//! - Receivers are subscribed before the task is spawned, so no change made
//!   after `upsert` returns is missed.
//! - Consecutive identical statuses count as one trigger.
//! - Every trigger resets the timer (trailing edge); the write happens once per
//!   burst.
//! - Once the handle is cancelled or dropped, the task performs no further writes.
//! - Tasks run on the caller's tokio runtime. Registrations made outside one
//!   share a single background runtime, built on first use.

use std::sync::OnceLock;
use std::time::Duration;

use formsync_control::{Control, ControlStatus};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{FormsError, Result};
use crate::manager::{FormsStore, StoreAction, write_form};

/// Background runtime for registrations made outside any tokio context.
static DETACHED: OnceLock<Runtime> = OnceLock::new();

/// Deadline used when `now + debounce` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

fn sync_runtime() -> Result<Handle> {
	if let Ok(handle) = Handle::try_current() {
		return Ok(handle);
	}
	if let Some(runtime) = DETACHED.get() {
		return Ok(runtime.handle().clone());
	}
	let runtime = Builder::new_multi_thread()
		.worker_threads(1)
		.thread_name("formsync-sync")
		.enable_time()
		.build()
		.map_err(FormsError::Runtime)?;
	tracing::debug!("forms.detached_runtime");
	// A concurrent caller may have won the race; its runtime is kept and ours dropped.
	let _ = DETACHED.set(runtime);
	DETACHED.get().map(|runtime| runtime.handle().clone()).ok_or(FormsError::RuntimeUnavailable)
}

fn deadline(debounce: Duration) -> Instant {
	let now = Instant::now();
	now.checked_add(debounce).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Owner of one form's sync task. Dropping the handle cancels the task.
#[derive(Debug)]
pub(crate) struct SyncHandle {
	form: String,
	cancel: CancellationToken,
	task: JoinHandle<()>,
}

impl SyncHandle {
	/// Requests cancellation without waiting for the task to exit.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	pub fn is_finished(&self) -> bool {
		self.task.is_finished()
	}

	pub fn form(&self) -> &str {
		&self.form
	}
}

impl Drop for SyncHandle {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}

struct SyncTask {
	form: String,
	control: Control,
	store: FormsStore,
	debounce: Duration,
	values: broadcast::Receiver<Value>,
	statuses: broadcast::Receiver<ControlStatus>,
}

/// Subscribes to `control` and spawns its sync task.
pub(crate) fn spawn_sync(form: &str, control: Control, store: FormsStore, debounce: Duration) -> Result<SyncHandle> {
	let runtime = sync_runtime()?;
	let task = SyncTask {
		form: form.to_owned(),
		values: control.value_changes(),
		statuses: control.status_changes(),
		control,
		store,
		debounce,
	};
	let cancel = CancellationToken::new();
	tracing::trace!(form, "forms.spawn");
	let join = runtime.spawn(task.run(cancel.clone()));
	Ok(SyncHandle {
		form: form.to_owned(),
		cancel,
		task: join,
	})
}

impl SyncTask {
	async fn run(mut self, cancel: CancellationToken) {
		tracing::trace!(form = %self.form, debounce = ?self.debounce, "forms.sync.start");

		let timer = tokio::time::sleep_until(deadline(self.debounce));
		tokio::pin!(timer);
		let mut armed = false;
		let mut last_status = None;

		loop {
			tokio::select! {
				biased;
				() = cancel.cancelled() => break,
				changed = self.values.recv() => match changed {
					Ok(_) | Err(RecvError::Lagged(_)) => {
						timer.as_mut().reset(deadline(self.debounce));
						armed = true;
					}
					Err(RecvError::Closed) => break,
				},
				status = self.statuses.recv() => match status {
					Ok(status) if last_status == Some(status) => {}
					Ok(status) => {
						last_status = Some(status);
						timer.as_mut().reset(deadline(self.debounce));
						armed = true;
					}
					Err(RecvError::Lagged(_)) => {
						timer.as_mut().reset(deadline(self.debounce));
						armed = true;
					}
					Err(RecvError::Closed) => break,
				},
				() = &mut timer, if armed => {
					armed = false;
					write_form(&self.store, &self.form, &self.control, StoreAction::Update);
				}
			}
		}

		tracing::trace!(form = %self.form, "forms.sync.stop");
	}
}

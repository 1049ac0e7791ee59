//! Keyed snapshot store with atomic publication.
//!
//! # Role
//!
//! Holds one immutable map of named entries. Writers replace the whole map
//! through a CAS loop; readers load the current map without locking.
//!
//! # Invariants
//!
//! - A reader never observes a partially applied write.
//! - Entries untouched by a write keep their previous value (and, for `Arc`
//!   entries, their previous allocation).
//! - Every write bumps the revision exactly once and wakes every selection.

use std::sync::Arc;

use arc_swap::ArcSwap;
use futures::StreamExt;
use indexmap::IndexMap;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::select::{Selection, distinct_until_changed};

/// Whole-store state: entry key to entry value.
pub type Entries<V> = IndexMap<String, V>;

struct Inner<V> {
	label: &'static str,
	snap: ArcSwap<Entries<V>>,
	revision: watch::Sender<u64>,
}

/// Keyed snapshot store.
///
/// Cloning yields another handle to the same store.
pub struct Store<V> {
	inner: Arc<Inner<V>>,
}

impl<V> Clone for Store<V> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<V> std::fmt::Debug for Store<V> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Store")
			.field("label", &self.inner.label)
			.field("revision", &*self.inner.revision.borrow())
			.field("entries", &self.inner.snap.load().len())
			.finish()
	}
}

impl<V> Store<V>
where
	V: Clone + Send + Sync + 'static,
{
	/// Creates an empty store. `label` tags the store's trace events.
	pub fn new(label: &'static str) -> Self {
		let (revision, _) = watch::channel(0);
		Self {
			inner: Arc::new(Inner {
				label,
				snap: ArcSwap::from_pointee(Entries::new()),
				revision,
			}),
		}
	}

	/// Returns the whole current state.
	pub fn get_value(&self) -> Arc<Entries<V>> {
		self.inner.snap.load_full()
	}

	/// Returns one entry.
	pub fn get(&self, key: &str) -> Option<V> {
		self.inner.snap.load().get(key).cloned()
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.inner.snap.load().contains_key(key)
	}

	/// Number of writes published so far.
	pub fn revision(&self) -> u64 {
		*self.inner.revision.borrow()
	}

	/// Replaces (or inserts) a single entry, leaving every other entry untouched.
	pub fn set(&self, key: impl Into<String>, value: V) {
		let key = key.into();
		self.inner.snap.rcu(|current| {
			let mut next = Entries::clone(current);
			next.insert(key.clone(), value.clone());
			next
		});
		self.publish();
	}

	/// Replaces the whole state with the result of `f`.
	///
	/// `f` may run more than once under contention and must be pure.
	pub fn update(&self, f: impl Fn(&Entries<V>) -> Entries<V>) {
		self.inner.snap.rcu(|current| f(current));
		self.publish();
	}

	fn publish(&self) {
		self.inner.revision.send_modify(|revision| *revision = revision.wrapping_add(1));
		tracing::trace!(store = self.inner.label, revision = self.revision(), "store.publish");
	}

	/// Streams a projection of the state.
	///
	/// The current projection is yielded on first poll; afterwards a value is
	/// yielded only when a write changes the projection structurally. Writes
	/// landing between two polls coalesce into one.
	pub fn select<T, F>(&self, project: F) -> Selection<T>
	where
		F: Fn(&Entries<V>) -> T + Send + Sync + 'static,
		T: Clone + PartialEq + Send + 'static,
	{
		let inner = Arc::clone(&self.inner);
		let changes = WatchStream::new(self.inner.revision.subscribe());
		distinct_until_changed(changes.map(move |_| project(&inner.snap.load()))).boxed()
	}
}

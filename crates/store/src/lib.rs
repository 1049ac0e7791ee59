//! Keyed snapshot store for formsync.
//!
//! [`Store`] keeps a map of named, immutable entries. Writes replace one entry
//! or the whole map atomically; reads return the current map without locking;
//! [`Store::select`] streams a deduplicated projection of the map.

pub mod select;
mod store;

pub use select::{Selection, distinct_until_changed, filter_nil};
pub use store::{Entries, Store};

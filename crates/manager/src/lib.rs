//! Keeps named form control trees mirrored into a shared snapshot store.
//!
//! A [`FormsManager`] owns one [`formsync_store::Store`] whose entries are
//! immutable [`ControlSnapshot`]s, one per registered form name. Registering a
//! live [`formsync_control::Control`] tree with [`FormsManager::upsert`]
//! captures it right away and then follows its value and status changes,
//! rewriting the snapshot once changes have been quiet for the debounce
//! window. Registering a fresh tree under a name that already has a snapshot
//! pushes the stored values back onto it first, so form state survives the
//! tree being rebuilt.
//!
//! Snapshots are read synchronously ([`FormsManager::get_form`],
//! [`FormsManager::get_control`]) or streamed as deduplicated selections
//! ([`FormsManager::select_control`] and friends) addressed by dotted paths
//! such as `"phone.number"` or `"skills.0"`.

mod config;
mod error;
mod manager;
pub mod path;
mod registry;
mod reverse;
mod snapshot;
mod sync;

pub use config::{ArrayControlFactory, ArrayFactories, DEFAULT_DEBOUNCE, ManagerConfig, UpsertOptions};
pub use error::{FormsError, Result};
pub use manager::{FormEntry, FormsManager, FormsState};
pub use snapshot::ControlSnapshot;

#[cfg(test)]
mod tests;

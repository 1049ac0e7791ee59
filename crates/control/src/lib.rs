//! Live form controls.
//!
//! A control tree is built from three node kinds:
//!
//! - **Leaf**: one editable [`serde_json::Value`].
//! - **Group**: named children with fixed membership; its value is an object.
//! - **List**: ordered children with variable membership; its value is an array
//!   and its children are addressed by decimal index.
//!
//! Every node tracks validity (`valid`/`invalid`/`pending`/`disabled`),
//! interaction flags (`dirty`/`touched`) and validation errors, and broadcasts
//! value and status changes through [`Control::value_changes`] and
//! [`Control::status_changes`]. Mutations refresh the mutated node and bubble
//! up to the root, so subscribing at the root observes every change below it.

mod control;
mod status;
pub mod validators;

pub use control::Control;
pub use status::{ControlKind, ControlStatus, UpdateOptions, ValidationErrors};
pub use validators::{Validator, set_validators};

#[cfg(test)]
mod tests;

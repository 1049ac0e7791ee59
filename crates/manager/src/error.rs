//! Error types for form registration.

use thiserror::Error;

/// Errors surfaced by [`crate::FormsManager`].
#[derive(Debug, Error)]
pub enum FormsError {
	/// A root list had to be rebuilt from the store but no single factory was supplied.
	#[error("list control must be rebuilt but no array control factory was provided")]
	MissingArrayFactory,

	/// A list inside a group had to be rebuilt but no factory is registered for it.
	#[error("list member `{member}` must be rebuilt but no array control factory was provided for it")]
	MissingArrayFactoryFor {
		/// Dotted path of the list member.
		member: String,
	},

	/// No tokio runtime was current and the background sync runtime could not be built.
	#[error("failed to start the background sync runtime: {0}")]
	Runtime(#[source] std::io::Error),

	/// The background sync runtime was dropped while being installed.
	#[error("background sync runtime is unavailable")]
	RuntimeUnavailable,

	/// The manager configuration could not be parsed.
	#[error("invalid forms configuration: {0}")]
	Config(#[from] toml::de::Error),
}

/// Result type for form registration.
pub type Result<T> = std::result::Result<T, FormsError>;

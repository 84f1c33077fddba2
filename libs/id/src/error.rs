//! Error types for name validation.

use thiserror::Error;

/// Errors that can occur when validating a name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The name is empty or whitespace only.
    #[error("{kind} name cannot be empty")]
    Empty { kind: &'static str },

    /// The name contains a control character.
    #[error("{kind} name contains a control character: {name:?}")]
    ControlCharacter { kind: &'static str, name: String },
}

#![forbid(unsafe_code)]

//! Error type shared by the attribute store, cloner and reconciler.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Unknown field | `set`/`field` on an undeclared name | `UnknownField` |
//! | Unknown event | scoped accessor for an undeclared event | `UnknownEvent` |
//! | Malformed refill data | record or list expected | `NotAnObject` / `NotAList` |
//! | Clone of a plain class | class did not opt in | `NotCloneable` |
//! | Cyclic export | `unbuild` reaches an ancestor again | `Cycle` |
//!
//! Removing a handler that was never registered and failing to match an
//! identity during reconciliation are not errors.

use std::fmt;

/// Errors from model operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// The class does not declare a field with this name.
    UnknownField { class: String, field: String },
    /// No event with this name has been declared on the model.
    UnknownEvent { event: String },
    /// Data that must be a record was something else.
    NotAnObject { context: String },
    /// A collection field received data that is not a list.
    NotAList { field: String },
    /// `deep_clone` on a class that was not built with `cloneable()`.
    NotCloneable { class: String },
    /// A reference cycle was found while exporting to JSON.
    Cycle,
    /// A constructor or custom refill rejected its input.
    Invalid(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownField { class, field } => {
                write!(f, "model '{class}' has no field '{field}'")
            }
            Self::UnknownEvent { event } => write!(f, "event '{event}' is not declared"),
            Self::NotAnObject { context } => write!(f, "expected a record for {context}"),
            Self::NotAList { field } => write!(f, "expected a list for field '{field}'"),
            Self::NotCloneable { class } => write!(f, "model '{class}' is not cloneable"),
            Self::Cycle => write!(f, "cannot export a cyclic value"),
            Self::Invalid(msg) => write!(f, "invalid input: {msg}"),
        }
    }
}

impl std::error::Error for ModelError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_field() {
        let err = ModelError::UnknownField {
            class: "lunch".into(),
            field: "noms".into(),
        };
        assert_eq!(err.to_string(), "model 'lunch' has no field 'noms'");
    }

    #[test]
    fn display_cycle() {
        assert_eq!(ModelError::Cycle.to_string(), "cannot export a cyclic value");
    }
}

#![forbid(unsafe_code)]

//! Engine error types.
//!
//! | Error | Cause | Behavior |
//! |-------|-------|----------|
//! | [`SchemaError`] | Authoring bug: bad reference, frozen schema, faulting rule | Operation aborts, state unchanged |
//! | [`SubmissionError`] | Raised by the submit collaborator | Forwarded to the caller untouched |
//!
//! Per-field validation failures are data, not errors; see
//! [`ValidationError`](crate::constraint::ValidationError).

use std::fmt;

use crate::value::FieldName;

/// A programming error in a schema or one of its rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A name was used that the schema does not declare (or that no live
    /// derivation currently produces).
    UndeclaredFieldReference {
        /// The undeclared name.
        field: FieldName,
        /// What referenced it.
        context: String,
    },
    /// The same name was declared twice.
    DuplicateField(FieldName),
    /// The schema was frozen and can no longer be changed.
    FrozenSchema,
    /// A derivation produced a slot whose name is already taken.
    DerivedNameCollision {
        driving: FieldName,
        field: FieldName,
    },
    /// A derivation rule panicked.
    RuleFault {
        driving: FieldName,
        message: String,
    },
    /// A constraint panicked.
    ConstraintFault {
        field: FieldName,
        message: String,
    },
}

impl SchemaError {
    pub(crate) fn undeclared(field: impl Into<FieldName>, context: impl Into<String>) -> Self {
        Self::UndeclaredFieldReference {
            field: field.into(),
            context: context.into(),
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UndeclaredFieldReference { field, context } => {
                write!(f, "undeclared field `{field}` referenced by {context}")
            }
            Self::DuplicateField(name) => write!(f, "field `{name}` is declared twice"),
            Self::FrozenSchema => write!(f, "schema is frozen"),
            Self::DerivedNameCollision { driving, field } => write!(
                f,
                "derivation on `{driving}` produced `{field}`, which already exists"
            ),
            Self::RuleFault { driving, message } => {
                write!(f, "derivation rule on `{driving}` failed: {message}")
            }
            Self::ConstraintFault { field, message } => {
                write!(f, "constraint on `{field}` failed: {message}")
            }
        }
    }
}

impl std::error::Error for SchemaError {}

/// Error reported by the external submit collaborator.
///
/// The engine never interprets the collaborator's error; it only carries it.
#[derive(Debug)]
pub enum SubmissionError {
    /// The collaborator's own error, unchanged.
    Collaborator(Box<dyn std::error::Error + Send + Sync>),
    /// The collaborator dropped its reply handle without answering.
    Abandoned,
}

impl SubmissionError {
    /// Wrap any collaborator error.
    pub fn collaborator(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Collaborator(err.into())
    }
}

impl fmt::Display for SubmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collaborator(e) => write!(f, "{e}"),
            Self::Abandoned => write!(f, "submission abandoned without a reply"),
        }
    }
}

impl std::error::Error for SubmissionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Collaborator(e) => Some(e.as_ref()),
            Self::Abandoned => None,
        }
    }
}

/// Extract a printable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_display() {
        let err = SchemaError::undeclared("colors", "derivation");
        assert_eq!(
            err.to_string(),
            "undeclared field `colors` referenced by derivation"
        );
        assert_eq!(SchemaError::FrozenSchema.to_string(), "schema is frozen");
    }

    #[test]
    fn submission_error_keeps_source() {
        let io = std::io::Error::other("backend down");
        let err = SubmissionError::collaborator(io);
        assert_eq!(err.to_string(), "backend down");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn panic_message_extraction() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "panic with non-string payload");
    }
}

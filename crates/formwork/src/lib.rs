#![forbid(unsafe_code)]

//! formwork public facade crate.
//!
//! Re-exports the engine from `formwork-core`, the admin form schemas from
//! `formwork-admin` (feature `admin`), a top-level [`Error`], and a prelude
//! for day-to-day use.

use std::fmt;

pub mod logging;

// --- Engine re-exports -----------------------------------------------------

pub use formwork_core::config::{FormConfig, RevalidateMode, ValidationMode};
pub use formwork_core::constraint::{
    Constraint, ConstraintList, FieldLookup, Rules, ValidationError, ValidationErrorKind, Verdict,
};
pub use formwork_core::derivation::{DerivationRule, DerivedSlot, PerKey, Reconciliation};
pub use formwork_core::error::{SchemaError, SubmissionError};
pub use formwork_core::schema::{Derivation, PayloadShape, Schema};
pub use formwork_core::state::{FieldEntry, FieldOrigin, FormState};
pub use formwork_core::store::{FormStore, ListenerId, StoreEvent};
pub use formwork_core::submit::{
    FnSubmitter, Payload, SubmissionTicket, SubmissionToken, SubmitOutcome, SubmitReply,
    Submitter, fn_submitter,
};
pub use formwork_core::validator::{ValidationReport, validate, validate_field};
pub use formwork_core::value::{FieldName, FieldValue, KeyedMapping, Scalar, ScalarSet};

/// Built-in constraints.
pub mod constraints {
    pub use formwork_core::constraint::{
        Email, MatchesField, MaxLength, MinLength, OneOf, Optional, Pattern, Predicate, Range,
        Required,
    };
}

// --- Admin forms -----------------------------------------------------------

#[cfg(feature = "admin")]
pub use formwork_admin as admin;

// --- Errors ---------------------------------------------------------------

/// Top-level error type for formwork users.
#[derive(Debug)]
pub enum Error {
    /// A schema or rule authoring bug.
    Schema(SchemaError),
    /// The submit collaborator failed.
    Submission(SubmissionError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema(err) => write!(f, "{err}"),
            Self::Submission(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Schema(err) => Some(err),
            Self::Submission(err) => Some(err),
        }
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Self::Schema(err)
    }
}

impl From<SubmissionError> for Error {
    fn from(err: SubmissionError) -> Self {
        Self::Submission(err)
    }
}

/// Standard result type for formwork APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Derivation, Error, FieldValue, FormConfig, FormStore, Payload, Result, Rules, Schema,
        StoreEvent, SubmitOutcome, Submitter, ValidationErrorKind, fn_submitter,
    };
}

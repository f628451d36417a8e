#![forbid(unsafe_code)]

//! Schema-driven form state and validation.
//!
//! # Role in formwork
//! `formwork-core` is the engine. It declares schemas of named fields with
//! constraint lists, keeps one consistent state per form instance, derives
//! per-key fields from selection fields, validates, and gates submission.
//! It performs no I/O; rendering and transport are collaborators.
//!
//! # Pieces
//! - [`value`]: the closed value union every field holds.
//! - [`constraint`]: per-field rules and the [`Rules`](constraint::Rules) builder.
//! - [`schema`]: field and derivation declarations, frozen for sharing.
//! - [`derivation`]: reconciliation of derived fields.
//! - [`state`] / [`store`]: the form state and the store that mutates it.
//! - [`validator`]: pure whole-form and single-field validation.
//! - [`submit`]: the submission controller and collaborator contract.
//! - [`config`]: when the store re-validates.

pub mod config;
pub mod constraint;
pub mod derivation;
pub mod error;
pub mod schema;
pub mod state;
pub mod store;
pub mod submit;
pub mod validator;
pub mod value;

pub use config::{FormConfig, RevalidateMode, ValidationMode};
pub use constraint::{Constraint, Rules, ValidationError, ValidationErrorKind, Verdict};
pub use derivation::{DerivationRule, DerivedSlot, PerKey, Reconciliation};
pub use error::{SchemaError, SubmissionError};
pub use schema::{Derivation, PayloadShape, Schema};
pub use state::{FieldEntry, FormState};
pub use store::{FormStore, ListenerId, StoreEvent};
pub use submit::{
    Payload, SubmissionTicket, SubmissionToken, SubmitOutcome, SubmitReply, Submitter,
    fn_submitter,
};
pub use validator::{ValidationReport, validate, validate_field};
pub use value::{FieldName, FieldValue, KeyedMapping, Scalar, ScalarSet};

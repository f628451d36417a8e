#![forbid(unsafe_code)]

//! Field constraints.
//!
//! A constraint is a pure predicate over one field value. A field carries an
//! ordered list of them, evaluated until the first failure:
//!
//! ```rust
//! use formwork_core::constraint::{Rules, Verdict};
//! use formwork_core::state::FormState;
//! use formwork_core::value::FieldValue;
//!
//! let rules = Rules::new()
//!     .min_length(2)
//!     .with_message("Full name must be at least 2 characters long")
//!     .max_length(50)
//!     .build();
//!
//! let form = FormState::default();
//! let verdict = Verdict::first_failure(rules.iter().map(|c| c.check(&FieldValue::text("A"), &form)));
//! assert_eq!(
//!     verdict.into_error().map(|e| e.format_message()).as_deref(),
//!     Some("Full name must be at least 2 characters long")
//! );
//! ```

mod builtin;

use std::fmt;

use crate::value::{FieldName, FieldValue};

pub use builtin::{
    Email, MatchesField, MaxLength, MinLength, OneOf, Optional, Pattern, Predicate, Range,
    Required, Rules,
};

// ---------------------------------------------------------------------------
// ValidationErrorKind
// ---------------------------------------------------------------------------

/// Category of a per-field validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    Required,
    TooShort,
    TooLong,
    OutOfRange,
    InvalidFormat,
    NotInSet,
}

impl ValidationErrorKind {
    /// Stable identifier for programmatic handling.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::TooShort => "too_short",
            Self::TooLong => "too_long",
            Self::OutOfRange => "out_of_range",
            Self::InvalidFormat => "invalid_format",
            Self::NotInSet => "not_in_set",
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// What a failing constraint reports: a [`ValidationErrorKind`] plus a
/// message template whose `{name}` placeholders are filled from parameters
/// at render time.
///
/// ```rust
/// use formwork_core::constraint::{ValidationError, ValidationErrorKind};
///
/// let error = ValidationError::new(ValidationErrorKind::TooLong, "At most {max} characters")
///     .with_param("max", 60);
///
/// assert_eq!(error.format_message(), "At most 60 characters");
/// assert_eq!(error.param("max"), Some("60"));
/// assert_eq!(format!("{error:#}"), "too_long: At most 60 characters");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    template: String,
    /// Insertion order; a repeated name replaces the earlier value.
    params: Vec<(String, String)>,
}

impl ValidationError {
    #[must_use]
    pub fn new(kind: ValidationErrorKind, template: impl Into<String>) -> Self {
        Self {
            kind,
            template: template.into(),
            params: Vec::new(),
        }
    }

    /// The stock "field is required" error.
    #[must_use]
    pub fn required() -> Self {
        Self::new(ValidationErrorKind::Required, "This field is required")
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        let name = name.into();
        let value = value.to_string();
        match self.params.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.params.push((name, value)),
        }
        self
    }

    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Swap the template, keeping kind and parameters.
    pub(crate) fn retemplate(&mut self, template: &str) {
        self.template.clear();
        self.template.push_str(template);
    }

    /// Render the template. Placeholders without a parameter stay verbatim,
    /// and substituted values are never re-scanned.
    #[must_use]
    pub fn format_message(&self) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}').and_then(|close| {
                self.param(&after[..close]).map(|value| (close, value))
            }) {
                Some((close, value)) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// `{}` renders the message; `{:#}` prefixes the kind code.
impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{}: ", self.kind)?;
        }
        f.write_str(&self.format_message())
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Outcome of a single constraint check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Verdict {
    #[default]
    Valid,
    Invalid(ValidationError),
}

impl Verdict {
    /// `Valid` when `ok`, otherwise the error built by `fail`.
    pub fn require(ok: bool, fail: impl FnOnce() -> ValidationError) -> Self {
        if ok { Self::Valid } else { Self::Invalid(fail()) }
    }

    /// First failure of a constraint chain. Later verdicts are not pulled.
    pub fn first_failure(verdicts: impl IntoIterator<Item = Self>) -> Self {
        verdicts
            .into_iter()
            .find(Self::is_invalid)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    #[must_use]
    pub fn is_invalid(&self) -> bool {
        !self.is_valid()
    }

    #[must_use]
    pub fn kind(&self) -> Option<ValidationErrorKind> {
        self.error().map(|e| e.kind)
    }

    #[must_use]
    pub fn error(&self) -> Option<&ValidationError> {
        match self {
            Self::Valid => None,
            Self::Invalid(e) => Some(e),
        }
    }

    #[must_use]
    pub fn into_error(self) -> Option<ValidationError> {
        match self {
            Self::Valid => None,
            Self::Invalid(e) => Some(e),
        }
    }
}

impl From<Result<(), ValidationError>> for Verdict {
    fn from(result: Result<(), ValidationError>) -> Self {
        match result {
            Ok(()) => Self::Valid,
            Err(e) => Self::Invalid(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Constraint trait
// ---------------------------------------------------------------------------

/// Read access to sibling field values, for cross-field constraints.
pub trait FieldLookup {
    fn value(&self, name: &str) -> Option<&FieldValue>;
}

/// One validity rule for one field value.
///
/// Implementations must be pure: the same value and siblings always yield
/// the same verdict.
///
/// ```rust
/// use formwork_core::constraint::{Constraint, FieldLookup, ValidationError, ValidationErrorKind, Verdict};
/// use formwork_core::value::FieldValue;
///
/// struct NoSpaces;
///
/// impl Constraint for NoSpaces {
///     fn check(&self, value: &FieldValue, _form: &dyn FieldLookup) -> Verdict {
///         match value.as_text() {
///             Some(text) if text.contains(' ') => Verdict::Invalid(ValidationError::new(
///                 ValidationErrorKind::InvalidFormat,
///                 "Value must not contain spaces",
///             )),
///             _ => Verdict::Valid,
///         }
///     }
///
///     fn describe(&self) -> &str {
///         "no spaces"
///     }
/// }
/// ```
pub trait Constraint: Send + Sync {
    fn check(&self, value: &FieldValue, form: &dyn FieldLookup) -> Verdict;

    /// Short human-readable description, used in logs.
    fn describe(&self) -> &str;

    /// Other fields this constraint reads. Checked against the schema when
    /// the constraint is declared.
    fn references(&self) -> &[FieldName] {
        &[]
    }
}

/// An ordered constraint list for one field.
pub type ConstraintList = Vec<Box<dyn Constraint>>;

/// Error for a value whose shape the constraint cannot handle.
pub(crate) fn shape_mismatch(expected: &str, value: &FieldValue) -> ValidationError {
    ValidationError::new(
        ValidationErrorKind::InvalidFormat,
        "Expected {expected}, got {actual}",
    )
    .with_param("expected", expected)
    .with_param("actual", value.kind())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_are_stable() {
        assert_eq!(ValidationErrorKind::Required.code(), "required");
        assert_eq!(ValidationErrorKind::TooShort.code(), "too_short");
        assert_eq!(ValidationErrorKind::TooLong.code(), "too_long");
        assert_eq!(ValidationErrorKind::OutOfRange.code(), "out_of_range");
        assert_eq!(ValidationErrorKind::InvalidFormat.code(), "invalid_format");
        assert_eq!(ValidationErrorKind::NotInSet.code(), "not_in_set");
    }

    #[test]
    fn format_multiple_params() {
        let err = ValidationError::new(
            ValidationErrorKind::OutOfRange,
            "Must be between {min} and {max}",
        )
        .with_param("min", 1)
        .with_param("max", 10);
        assert_eq!(err.format_message(), "Must be between 1 and 10");
        assert_eq!(err.to_string(), "Must be between 1 and 10");
    }

    #[test]
    fn unknown_placeholder_left_alone() {
        let err = ValidationError::new(ValidationErrorKind::Required, "Missing {what} {")
            .with_param("who", "me");
        assert_eq!(err.format_message(), "Missing {what} {");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let err = ValidationError::new(ValidationErrorKind::NotInSet, "Invalid option: {value}")
            .with_param("value", "{value}")
            .with_param("value", "{min}")
            .with_param("min", 1);
        assert_eq!(err.format_message(), "Invalid option: {min}");
        assert_eq!(err.param("value"), Some("{min}"));
    }

    #[test]
    fn alternate_display_prefixes_kind() {
        let err = ValidationError::required();
        assert_eq!(err.to_string(), "This field is required");
        assert_eq!(format!("{err:#}"), "required: This field is required");
    }

    #[test]
    fn first_failure_stops_early() {
        let pulled = std::cell::Cell::new(0);
        let verdicts = [ValidationErrorKind::TooShort, ValidationErrorKind::TooLong]
            .into_iter()
            .map(|kind| {
                pulled.set(pulled.get() + 1);
                Verdict::Invalid(ValidationError::new(kind, "x"))
            });
        let verdict = Verdict::first_failure(verdicts);
        assert_eq!(verdict.kind(), Some(ValidationErrorKind::TooShort));
        assert_eq!(pulled.get(), 1);
        assert!(Verdict::first_failure([Verdict::Valid, Verdict::Valid]).is_valid());
    }

    #[test]
    fn require_builds_lazily() {
        assert!(Verdict::require(true, || unreachable!()).is_valid());
        let verdict = Verdict::require(false, ValidationError::required);
        assert_eq!(verdict.kind(), Some(ValidationErrorKind::Required));
        assert_eq!(Verdict::from(Err::<(), _>(ValidationError::required())), verdict);
        assert!(Verdict::from(Ok::<(), ValidationError>(())).is_valid());
    }

    #[test]
    fn shape_mismatch_mentions_kinds() {
        let err = shape_mismatch("text", &FieldValue::number(3.0));
        assert_eq!(err.kind, ValidationErrorKind::InvalidFormat);
        assert_eq!(err.format_message(), "Expected text, got number");
    }
}

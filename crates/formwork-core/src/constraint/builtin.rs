#![forbid(unsafe_code)]

//! Built-in constraints and the [`Rules`] builder.

use std::fmt;

use regex::Regex;

use super::{
    Constraint, ConstraintList, FieldLookup, ValidationError, ValidationErrorKind, Verdict,
    shape_mismatch,
};
use crate::value::{FieldName, FieldValue, KeyedMapping, Scalar, ScalarSet};

/// Number of units a length constraint measures: characters of text, members
/// of a set, entries of a mapping. Unset counts as zero.
fn measure(value: &FieldValue) -> Result<usize, ValidationError> {
    match value {
        FieldValue::Unset => Ok(0),
        FieldValue::Scalar(Scalar::Text(s)) => Ok(s.chars().count()),
        FieldValue::Set(set) => Ok(set.len()),
        FieldValue::Mapping(map) => Ok(map.len()),
        other => Err(shape_mismatch("text or collection", other)),
    }
}

fn unit_name(value: &FieldValue) -> &'static str {
    match value {
        FieldValue::Set(_) | FieldValue::Mapping(_) => "items",
        _ => "characters",
    }
}

// ---------------------------------------------------------------------------
// Required
// ---------------------------------------------------------------------------

/// Fails on Unset, empty text, and empty collections.
///
/// Whitespace-only text also fails unless [`allow_whitespace`](Self::allow_whitespace)
/// is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Required {
    pub allow_whitespace: bool,
}

impl Required {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn allow_whitespace(mut self) -> Self {
        self.allow_whitespace = true;
        self
    }
}

impl Constraint for Required {
    fn check(&self, value: &FieldValue, _form: &dyn FieldLookup) -> Verdict {
        let missing = match value {
            FieldValue::Scalar(Scalar::Text(s)) if !self.allow_whitespace => s.trim().is_empty(),
            other => other.is_empty(),
        };
        if missing {
            Verdict::Invalid(ValidationError::required())
        } else {
            Verdict::Valid
        }
    }

    fn describe(&self) -> &str {
        "required"
    }
}

// ---------------------------------------------------------------------------
// Length
// ---------------------------------------------------------------------------

/// At least `min` characters (text) or items (set, mapping).
#[derive(Debug, Clone, Copy)]
pub struct MinLength {
    pub min: usize,
}

impl MinLength {
    #[must_use]
    pub fn new(min: usize) -> Self {
        Self { min }
    }
}

impl Constraint for MinLength {
    fn check(&self, value: &FieldValue, _form: &dyn FieldLookup) -> Verdict {
        let len = match measure(value) {
            Ok(len) => len,
            Err(e) => return Verdict::Invalid(e),
        };
        if len < self.min {
            Verdict::Invalid(
                ValidationError::new(ValidationErrorKind::TooShort, "Must be at least {min} {unit}")
                    .with_param("min", self.min)
                    .with_param("actual", len)
                    .with_param("unit", unit_name(value)),
            )
        } else {
            Verdict::Valid
        }
    }

    fn describe(&self) -> &str {
        "min length"
    }
}

/// At most `max` characters (text) or items (set, mapping).
#[derive(Debug, Clone, Copy)]
pub struct MaxLength {
    pub max: usize,
}

impl MaxLength {
    #[must_use]
    pub fn new(max: usize) -> Self {
        Self { max }
    }
}

impl Constraint for MaxLength {
    fn check(&self, value: &FieldValue, _form: &dyn FieldLookup) -> Verdict {
        let len = match measure(value) {
            Ok(len) => len,
            Err(e) => return Verdict::Invalid(e),
        };
        if len > self.max {
            Verdict::Invalid(
                ValidationError::new(ValidationErrorKind::TooLong, "Must be at most {max} {unit}")
                    .with_param("max", self.max)
                    .with_param("actual", len)
                    .with_param("unit", unit_name(value)),
            )
        } else {
            Verdict::Valid
        }
    }

    fn describe(&self) -> &str {
        "max length"
    }
}

// ---------------------------------------------------------------------------
// Range
// ---------------------------------------------------------------------------

/// A numeric value within inclusive bounds. Either bound may be open.
#[derive(Debug, Clone, Copy)]
pub struct Range {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Range {
    #[must_use]
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    #[must_use]
    pub fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    #[must_use]
    pub fn at_most(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    fn out_of_range(&self, actual: f64) -> ValidationError {
        let template = match (self.min, self.max) {
            (Some(_), Some(_)) => "Must be between {min} and {max}",
            (Some(_), None) => "Must be at least {min}",
            _ => "Must be at most {max}",
        };
        let mut err = ValidationError::new(ValidationErrorKind::OutOfRange, template)
            .with_param("actual", Scalar::Number(actual));
        if let Some(min) = self.min {
            err = err.with_param("min", Scalar::Number(min));
        }
        if let Some(max) = self.max {
            err = err.with_param("max", Scalar::Number(max));
        }
        err
    }
}

impl Constraint for Range {
    fn check(&self, value: &FieldValue, _form: &dyn FieldLookup) -> Verdict {
        let n = match value {
            FieldValue::Unset => return Verdict::Invalid(ValidationError::required()),
            FieldValue::Scalar(Scalar::Number(n)) => *n,
            other => return Verdict::Invalid(shape_mismatch("number", other)),
        };
        let below = self.min.is_some_and(|min| n < min);
        let above = self.max.is_some_and(|max| n > max);
        if n.is_nan() || below || above {
            Verdict::Invalid(self.out_of_range(n))
        } else {
            Verdict::Valid
        }
    }

    fn describe(&self) -> &str {
        "range"
    }
}

// ---------------------------------------------------------------------------
// Format
// ---------------------------------------------------------------------------

/// Text matching a regular expression.
///
/// The expression is not anchored implicitly; use `^...$` for whole-value
/// matches.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub regex: Regex,
    pub message: String,
}

impl Pattern {
    /// Compile `pattern` into a constraint.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::from_regex(Regex::new(pattern)?))
    }

    #[must_use]
    pub fn from_regex(regex: Regex) -> Self {
        Self {
            regex,
            message: "Invalid format".to_string(),
        }
    }
}

impl Constraint for Pattern {
    fn check(&self, value: &FieldValue, _form: &dyn FieldLookup) -> Verdict {
        match value {
            FieldValue::Unset => Verdict::Invalid(ValidationError::required()),
            FieldValue::Scalar(Scalar::Text(s)) if self.regex.is_match(s) => Verdict::Valid,
            FieldValue::Scalar(Scalar::Text(_)) => Verdict::Invalid(
                ValidationError::new(ValidationErrorKind::InvalidFormat, &self.message)
                    .with_param("pattern", self.regex.as_str()),
            ),
            other => Verdict::Invalid(shape_mismatch("text", other)),
        }
    }

    fn describe(&self) -> &str {
        "pattern"
    }
}

/// A plausible email address: `local@domain.tld`, no whitespace, every domain
/// label non-empty, a top-level label of two or more characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Email;

impl Email {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn is_plausible(text: &str) -> bool {
        if text.chars().any(char::is_whitespace) {
            return false;
        }
        let Some((local, domain)) = text.split_once('@') else {
            return false;
        };
        if local.is_empty() || domain.contains('@') {
            return false;
        }
        let labels: Vec<&str> = domain.split('.').collect();
        labels.len() >= 2
            && labels.iter().all(|label| !label.is_empty())
            && labels.last().is_some_and(|tld| tld.chars().count() >= 2)
    }
}

impl Constraint for Email {
    fn check(&self, value: &FieldValue, _form: &dyn FieldLookup) -> Verdict {
        match value {
            FieldValue::Unset => Verdict::Invalid(ValidationError::required()),
            FieldValue::Scalar(Scalar::Text(s)) if Self::is_plausible(s) => Verdict::Valid,
            FieldValue::Scalar(Scalar::Text(_)) => Verdict::Invalid(ValidationError::new(
                ValidationErrorKind::InvalidFormat,
                "Invalid email address",
            )),
            other => Verdict::Invalid(shape_mismatch("text", other)),
        }
    }

    fn describe(&self) -> &str {
        "email"
    }
}

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

/// Membership in a fixed option list.
///
/// Applies to a scalar, to every member of a set, and to every key of a
/// mapping.
#[derive(Debug, Clone)]
pub struct OneOf {
    pub options: ScalarSet,
}

impl OneOf {
    pub fn new<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        Self {
            options: options.into_iter().collect(),
        }
    }

    fn outsider<'a>(&self, mut candidates: impl Iterator<Item = &'a Scalar>) -> Verdict {
        match candidates.find(|c| !self.options.contains(c)) {
            Some(bad) => Verdict::Invalid(
                ValidationError::new(ValidationErrorKind::NotInSet, "Invalid option: {value}")
                    .with_param("value", bad),
            ),
            None => Verdict::Valid,
        }
    }
}

impl Constraint for OneOf {
    fn check(&self, value: &FieldValue, _form: &dyn FieldLookup) -> Verdict {
        match value {
            FieldValue::Unset => Verdict::Invalid(ValidationError::required()),
            FieldValue::Scalar(s) => self.outsider(std::iter::once(s)),
            FieldValue::Set(set) => self.outsider(set.iter()),
            FieldValue::Mapping(map) => self.outsider(KeyedMapping::keys(map)),
        }
    }

    fn describe(&self) -> &str {
        "one of"
    }
}

// ---------------------------------------------------------------------------
// Cross-field
// ---------------------------------------------------------------------------

/// Equal to the current value of another field.
#[derive(Debug, Clone)]
pub struct MatchesField {
    other: Vec<FieldName>,
}

impl MatchesField {
    #[must_use]
    pub fn new(other: impl Into<FieldName>) -> Self {
        Self {
            other: vec![other.into()],
        }
    }

    #[must_use]
    pub fn other(&self) -> &str {
        &self.other[0]
    }
}

impl Constraint for MatchesField {
    fn check(&self, value: &FieldValue, form: &dyn FieldLookup) -> Verdict {
        let expected = form.value(self.other()).unwrap_or(&FieldValue::Unset);
        if expected == value {
            Verdict::Valid
        } else {
            Verdict::Invalid(
                ValidationError::new(ValidationErrorKind::InvalidFormat, "Must match {other}")
                    .with_param("other", self.other()),
            )
        }
    }

    fn describe(&self) -> &str {
        "matches field"
    }

    fn references(&self) -> &[FieldName] {
        &self.other
    }
}

// ---------------------------------------------------------------------------
// Adapters
// ---------------------------------------------------------------------------

/// A closure-backed constraint.
pub struct Predicate {
    kind: ValidationErrorKind,
    message: String,
    test: Box<dyn Fn(&FieldValue) -> bool + Send + Sync>,
}

impl Predicate {
    pub fn new(
        kind: ValidationErrorKind,
        message: impl Into<String>,
        test: impl Fn(&FieldValue) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            test: Box::new(test),
        }
    }
}

impl Constraint for Predicate {
    fn check(&self, value: &FieldValue, _form: &dyn FieldLookup) -> Verdict {
        Verdict::require((self.test)(value), || {
            ValidationError::new(self.kind, &self.message)
        })
    }

    fn describe(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .finish()
    }
}

/// Replaces the message of whatever error `inner` reports. Kind and
/// parameters are kept.
struct WithMessage {
    inner: Box<dyn Constraint>,
    message: String,
}

impl Constraint for WithMessage {
    fn check(&self, value: &FieldValue, form: &dyn FieldLookup) -> Verdict {
        match self.inner.check(value, form) {
            Verdict::Valid => Verdict::Valid,
            Verdict::Invalid(mut err) => {
                err.retemplate(&self.message);
                Verdict::Invalid(err)
            }
        }
    }

    fn describe(&self) -> &str {
        self.inner.describe()
    }

    fn references(&self) -> &[FieldName] {
        self.inner.references()
    }
}

/// Runs `inner` only when the value is non-empty. Empty values pass.
pub struct Optional {
    inner: ConstraintList,
    references: Vec<FieldName>,
}

impl Optional {
    #[must_use]
    pub fn new(inner: ConstraintList) -> Self {
        let references = inner
            .iter()
            .flat_map(|c| c.references().iter().cloned())
            .collect();
        Self { inner, references }
    }
}

impl Constraint for Optional {
    fn check(&self, value: &FieldValue, form: &dyn FieldLookup) -> Verdict {
        if value.is_empty() {
            return Verdict::Valid;
        }
        Verdict::first_failure(self.inner.iter().map(|c| c.check(value, form)))
    }

    fn describe(&self) -> &str {
        "optional"
    }

    fn references(&self) -> &[FieldName] {
        &self.references
    }
}

impl fmt::Debug for Optional {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Optional")
            .field("constraints", &format!("[{} constraints]", self.inner.len()))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Fluent builder for a field's constraint list.
///
/// ```rust
/// use formwork_core::constraint::Rules;
///
/// let rules = Rules::new()
///     .min_length(1)
///     .with_message("Short description is required!")
///     .max_length(60)
///     .build();
/// assert_eq!(rules.len(), 2);
/// ```
#[derive(Default)]
pub struct Rules {
    constraints: ConstraintList,
    optional: bool,
}

impl Rules {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn custom(mut self, constraint: impl Constraint + 'static) -> Self {
        self.constraints.push(Box::new(constraint));
        self
    }

    /// Override the message of the most recently added constraint.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        if let Some(inner) = self.constraints.pop() {
            self.constraints.push(Box::new(WithMessage {
                inner,
                message: message.into(),
            }));
        }
        self
    }

    #[must_use]
    pub fn required(self) -> Self {
        self.custom(Required::new())
    }

    #[must_use]
    pub fn min_length(self, min: usize) -> Self {
        self.custom(MinLength::new(min))
    }

    #[must_use]
    pub fn max_length(self, max: usize) -> Self {
        self.custom(MaxLength::new(max))
    }

    #[must_use]
    pub fn at_least(self, min: f64) -> Self {
        self.custom(Range::at_least(min))
    }

    #[must_use]
    pub fn at_most(self, max: f64) -> Self {
        self.custom(Range::at_most(max))
    }

    #[must_use]
    pub fn between(self, min: f64, max: f64) -> Self {
        self.custom(Range::between(min, max))
    }

    #[must_use]
    pub fn pattern(self, regex: Regex) -> Self {
        self.custom(Pattern::from_regex(regex))
    }

    #[must_use]
    pub fn email(self) -> Self {
        self.custom(Email::new())
    }

    #[must_use]
    pub fn one_of<I, S>(self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        self.custom(OneOf::new(options))
    }

    #[must_use]
    pub fn matches(self, other: impl Into<FieldName>) -> Self {
        self.custom(MatchesField::new(other))
    }

    /// Let empty values skip the whole list.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[must_use]
    pub fn build(self) -> ConstraintList {
        if self.optional {
            vec![Box::new(Optional::new(self.constraints))]
        } else {
            self.constraints
        }
    }
}

impl From<Rules> for ConstraintList {
    fn from(rules: Rules) -> Self {
        rules.build()
    }
}

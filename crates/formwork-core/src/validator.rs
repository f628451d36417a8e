#![forbid(unsafe_code)]

//! Whole-form and single-field validation.
//!
//! Validation is a pure function of a schema and a state snapshot. Besides
//! running each field's constraints it recomputes every derivation and checks
//! the snapshot against it: a required derived field that is missing or empty
//! fails even though no constraint was declared for it.

use std::panic::{AssertUnwindSafe, catch_unwind};

use indexmap::IndexMap;

use crate::constraint::{Constraint, ValidationError, ValidationErrorKind, shape_mismatch};
use crate::derivation::evaluate_rule;
use crate::error::{SchemaError, panic_message};
use crate::schema::{Derivation, PayloadShape, Schema};
use crate::state::{FieldEntry, FieldOrigin, FormState};
use crate::value::{FieldName, FieldValue};

/// Outcome of one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    errors: IndexMap<FieldName, ValidationError>,
}

impl ValidationReport {
    /// True iff no field produced an error.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn error(&self, name: &str) -> Option<&ValidationError> {
        self.errors.get(name)
    }

    /// Errors in field order.
    #[must_use]
    pub fn errors(&self) -> &IndexMap<FieldName, ValidationError> {
        &self.errors
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record an error; the first error for a field wins.
    pub(crate) fn insert(&mut self, name: impl Into<FieldName>, error: ValidationError) {
        self.errors.entry(name.into()).or_insert(error);
    }
}

/// Validate every present field, then check derived fields against their
/// rules.
pub fn validate(schema: &Schema, state: &FormState) -> Result<ValidationReport, SchemaError> {
    let mut report = ValidationReport::default();
    for (name, entry) in state.iter() {
        if let Some(error) = check_entry(schema, state, name, entry)? {
            report.insert(name, error);
        }
    }
    check_structure(schema, state, &mut report)?;
    tracing::debug!(
        schema = schema.name(),
        fields = state.len(),
        errors = report.len(),
        "validated form"
    );
    Ok(report)
}

/// Validate one present field.
///
/// Fails with [`SchemaError::UndeclaredFieldReference`] if `name` is not in
/// the state.
pub fn validate_field(
    schema: &Schema,
    state: &FormState,
    name: &str,
) -> Result<Option<ValidationError>, SchemaError> {
    let entry = state
        .entry(name)
        .ok_or_else(|| SchemaError::undeclared(name, "validate_field"))?;
    check_entry(schema, state, name, entry)
}

fn check_entry(
    schema: &Schema,
    state: &FormState,
    name: &str,
    entry: &FieldEntry,
) -> Result<Option<ValidationError>, SchemaError> {
    match entry.origin() {
        FieldOrigin::Static => {
            let def = schema
                .field(name)
                .ok_or_else(|| SchemaError::undeclared(name, "form state"))?;
            run_constraints(name, def.constraints(), &entry.value, state)
        }
        FieldOrigin::Derived { derivation, .. } => {
            let derivation = schema
                .derivation(*derivation)
                .ok_or_else(|| SchemaError::undeclared(name, "form state"))?;
            if let Some(error) = structural_error(derivation, &entry.value) {
                return Ok(Some(error));
            }
            run_constraints(name, derivation.constraint_list(), &entry.value, state)
        }
    }
}

/// Checks owned by the derivation itself rather than its constraints.
fn structural_error(derivation: &Derivation, value: &FieldValue) -> Option<ValidationError> {
    if derivation.is_required() && value.is_empty() {
        return Some(ValidationError::required());
    }
    if matches!(derivation.shape(), PayloadShape::Nested { .. })
        && !matches!(value, FieldValue::Unset | FieldValue::Scalar(_))
    {
        return Some(shape_mismatch("scalar", value));
    }
    None
}

fn run_constraints(
    name: &str,
    constraints: &[Box<dyn Constraint>],
    value: &FieldValue,
    state: &FormState,
) -> Result<Option<ValidationError>, SchemaError> {
    for constraint in constraints {
        let verdict = catch_unwind(AssertUnwindSafe(|| constraint.check(value, state)))
            .map_err(|payload| {
                let message = panic_message(payload.as_ref());
                tracing::warn!(
                    field = name,
                    constraint = constraint.describe(),
                    reason = %message,
                    "constraint panicked"
                );
                SchemaError::ConstraintFault {
                    field: name.to_string(),
                    message,
                }
            })?;
        if let Some(error) = verdict.into_error() {
            return Ok(Some(error));
        }
    }
    Ok(None)
}

/// Compare each derivation's live slots with what its rule expects now.
fn check_structure(
    schema: &Schema,
    state: &FormState,
    report: &mut ValidationReport,
) -> Result<(), SchemaError> {
    for (index, derivation) in schema.derivations().iter().enumerate() {
        let driving = state.get(derivation.driving()).cloned().unwrap_or_default();
        let expected = evaluate_rule(schema, index, &driving)?;
        for slot in &expected {
            if state.contains(&slot.name) {
                continue;
            }
            let error = if derivation.is_required() {
                ValidationError::required()
            } else {
                ValidationError::new(
                    ValidationErrorKind::InvalidFormat,
                    "Missing derived field for {key}",
                )
                .with_param("key", &slot.key)
            };
            report.insert(slot.name.clone(), error);
        }
        for slot in state.slots(index) {
            if !expected.iter().any(|e| e.name == slot.name) {
                report.insert(
                    slot.name.clone(),
                    ValidationError::new(
                        ValidationErrorKind::InvalidFormat,
                        "{key} is no longer selected",
                    )
                    .with_param("key", &slot.key),
                );
            }
        }
    }
    Ok(())
}

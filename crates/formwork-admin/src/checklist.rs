#![forbid(unsafe_code)]

//! The dashboard checklist: a picked date and a set of ticked items.

use std::sync::Arc;

use chrono::NaiveDate;
use formwork_core::constraint::{
    Constraint, FieldLookup, Rules, ValidationError, ValidationErrorKind, Verdict,
};
use formwork_core::{FieldValue, FormStore, Reconciliation, Schema, SchemaError};

pub const DATE: &str = "date";
pub const DONE: &str = "done";

/// Wire format of the date field.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const ITEMS: &[&str] = &[
    "item1", "item2", "item3", "item4", "item5", "item6", "item7", "item8",
];

/// Accepts empty values or a calendar date in [`DATE_FORMAT`].
#[derive(Debug, Clone, Copy, Default)]
pub struct IsoDate;

impl Constraint for IsoDate {
    fn check(&self, value: &FieldValue, _form: &dyn FieldLookup) -> Verdict {
        match value {
            FieldValue::Unset => Verdict::Valid,
            FieldValue::Scalar(_) => match value.as_text() {
                Some(text) if NaiveDate::parse_from_str(text, DATE_FORMAT).is_ok() => {
                    Verdict::Valid
                }
                _ => Verdict::Invalid(
                    ValidationError::new(ValidationErrorKind::InvalidFormat, "Pick a valid date")
                        .with_param("format", DATE_FORMAT),
                ),
            },
            other => Verdict::Invalid(
                ValidationError::new(
                    ValidationErrorKind::InvalidFormat,
                    "Expected a date, got {actual}",
                )
                .with_param("actual", other.kind()),
            ),
        }
    }

    fn describe(&self) -> &str {
        "iso date"
    }
}

pub fn schema() -> Result<Arc<Schema>, SchemaError> {
    let mut schema = Schema::new("checklist");
    schema
        .define_field(DATE, Rules::new().custom(IsoDate))?
        .define_field(DONE, Rules::new().one_of(ITEMS.iter().copied()).optional())?;
    Ok(schema.freeze())
}

/// Write `date` in the field's wire format.
pub fn set_date(store: &mut FormStore, date: NaiveDate) -> Result<Reconciliation, SchemaError> {
    store.set(DATE, date.format(DATE_FORMAT).to_string())
}

/// Read the date field back, if it holds a valid date.
#[must_use]
pub fn date(store: &FormStore) -> Option<NaiveDate> {
    store
        .get(DATE)
        .and_then(FieldValue::as_text)
        .and_then(|text| NaiveDate::parse_from_str(text, DATE_FORMAT).ok())
}

#![forbid(unsafe_code)]

//! Form state: one entry per present field, holding value, error, and
//! touched/dirty tracking.
//!
//! Errors and touched flags live inside the [`FieldEntry`], so they can only
//! exist for fields that have a value. Mutation goes through the store; this
//! module only exposes reads publicly.

use indexmap::IndexMap;

use crate::constraint::{FieldLookup, ValidationError};
use crate::derivation::{self, DerivedSlot};
use crate::error::SchemaError;
use crate::schema::Schema;
use crate::validator::ValidationReport;
use crate::value::{FieldName, FieldValue, Scalar};

/// Where a field entry came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOrigin {
    /// Declared with `define_field`.
    Static,
    /// Produced by the derivation at `derivation` for `key`.
    Derived { derivation: usize, key: Scalar },
}

/// Everything the render side needs to know about one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    pub value: FieldValue,
    /// Error from the latest validation pass, if any.
    pub error: Option<ValidationError>,
    /// Written, or surfaced by a rejected submit.
    pub touched: bool,
    /// Value differs from the initial value.
    pub dirty: bool,
    initial: FieldValue,
    origin: FieldOrigin,
}

impl FieldEntry {
    fn new(value: FieldValue, origin: FieldOrigin) -> Self {
        Self {
            initial: value.clone(),
            value,
            error: None,
            touched: false,
            dirty: false,
            origin,
        }
    }

    #[must_use]
    pub fn origin(&self) -> &FieldOrigin {
        &self.origin
    }

    #[must_use]
    pub fn is_derived(&self) -> bool {
        matches!(self.origin, FieldOrigin::Derived { .. })
    }

    /// Value the field started from.
    #[must_use]
    pub fn initial(&self) -> &FieldValue {
        &self.initial
    }
}

/// Point-in-time state of one form instance.
#[derive(Debug, Clone, Default)]
pub struct FormState {
    entries: IndexMap<FieldName, FieldEntry>,
    /// Live slots per derivation index, in rule output order.
    slots: Vec<Vec<DerivedSlot>>,
    submit_count: u32,
}

impl FormState {
    /// Fresh state for `schema`: every static field Unset, derivations
    /// reconciled against those Unset values.
    pub fn initial(schema: &Schema) -> Result<Self, SchemaError> {
        let mut state = Self::default();
        for name in schema.field_names() {
            state.insert_static(name, FieldValue::Unset);
        }
        state.slots = vec![Vec::new(); schema.derivations().len()];
        derivation::reconcile_all(schema, &mut state)?;
        Ok(state)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries.get(name).map(|e| &e.value)
    }

    /// Same as [`get`](Self::get); kept as the [`FieldLookup`] spelling.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.get(name)
    }

    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&FieldEntry> {
        self.entries.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    #[must_use]
    pub fn error(&self, name: &str) -> Option<&ValidationError> {
        self.entries.get(name).and_then(|e| e.error.as_ref())
    }

    #[must_use]
    pub fn is_touched(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|e| e.touched)
    }

    #[must_use]
    pub fn is_dirty(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|e| e.dirty)
    }

    #[must_use]
    pub fn any_touched(&self) -> bool {
        self.entries.values().any(|e| e.touched)
    }

    #[must_use]
    pub fn any_dirty(&self) -> bool {
        self.entries.values().any(|e| e.dirty)
    }

    /// No field touched or dirty.
    #[must_use]
    pub fn is_pristine(&self) -> bool {
        !self.any_touched() && !self.any_dirty()
    }

    #[must_use]
    pub fn touched_fields(&self) -> Vec<&str> {
        self.names_where(|e| e.touched)
    }

    #[must_use]
    pub fn dirty_fields(&self) -> Vec<&str> {
        self.names_where(|e| e.dirty)
    }

    /// Fields that currently show an error.
    #[must_use]
    pub fn error_fields(&self) -> Vec<&str> {
        self.names_where(|e| e.error.is_some())
    }

    /// Present field names: static fields in declaration order, then derived
    /// fields in creation order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live slots of the derivation at `derivation`.
    #[must_use]
    pub fn slots(&self, derivation: usize) -> &[DerivedSlot] {
        self.slots.get(derivation).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of submit attempts, valid or not.
    #[must_use]
    pub fn submit_count(&self) -> u32 {
        self.submit_count
    }

    #[must_use]
    pub fn has_submitted(&self) -> bool {
        self.submit_count > 0
    }

    fn names_where(&self, pred: impl Fn(&FieldEntry) -> bool) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, e)| pred(e))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    // -- crate-internal mutation --------------------------------------------

    pub(crate) fn insert_static(&mut self, name: impl Into<FieldName>, value: FieldValue) {
        self.entries
            .insert(name.into(), FieldEntry::new(value, FieldOrigin::Static));
    }

    pub(crate) fn insert_derived(&mut self, derivation: usize, slot: &DerivedSlot, value: FieldValue) {
        let origin = FieldOrigin::Derived {
            derivation,
            key: slot.key.clone(),
        };
        self.entries
            .insert(slot.name.clone(), FieldEntry::new(value, origin));
    }

    pub(crate) fn remove_derived(&mut self, name: &str) -> Option<FieldEntry> {
        self.entries.shift_remove(name)
    }

    pub(crate) fn set_slots(&mut self, derivation: usize, slots: Vec<DerivedSlot>) {
        if self.slots.len() <= derivation {
            self.slots.resize_with(derivation + 1, Vec::new);
        }
        self.slots[derivation] = slots;
    }

    /// Store a user write. Returns `false` if the field is not present.
    pub(crate) fn write(&mut self, name: &str, value: FieldValue) -> bool {
        let Some(entry) = self.entries.get_mut(name) else {
            return false;
        };
        entry.dirty = value != entry.initial;
        entry.value = value;
        entry.touched = true;
        true
    }

    pub(crate) fn mark_touched(&mut self, name: &str) {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.touched = true;
        }
    }

    /// Replace every field's error with the report's verdict.
    pub(crate) fn apply_report(&mut self, report: &ValidationReport) {
        for (name, entry) in &mut self.entries {
            entry.error = report.error(name).cloned();
        }
    }

    pub(crate) fn record_submit(&mut self) {
        self.submit_count = self.submit_count.saturating_add(1);
    }
}

impl FieldLookup for FormState {
    fn value(&self, name: &str) -> Option<&FieldValue> {
        self.get(name)
    }
}

#![forbid(unsafe_code)]

//! The form state store.
//!
//! A [`FormStore`] owns the state of one form instance. Every write goes
//! through [`FormStore::set`], which runs on a private copy of the state,
//! reconciles derived fields, optionally re-validates, and only then commits
//! and notifies listeners once. Snapshots are `Arc`s of committed states, so
//! later writes never alter a snapshot already handed out.
//!
//! ```rust
//! use formwork_core::constraint::ConstraintList;
//! use formwork_core::schema::{Derivation, Schema};
//! use formwork_core::store::FormStore;
//! use formwork_core::value::FieldValue;
//!
//! # fn main() -> Result<(), formwork_core::SchemaError> {
//! let mut schema = Schema::new("product");
//! schema
//!     .define_field("colors", ConstraintList::new())?
//!     .define_derivation(Derivation::per_key("colors", "image_").required())?;
//! let mut store = FormStore::new(schema.freeze())?;
//!
//! store.set("colors", FieldValue::set(["red"]))?;
//! assert_eq!(store.get("image_red"), Some(&FieldValue::Unset));
//!
//! store.set("colors", FieldValue::set(Vec::<&str>::new()))?;
//! assert_eq!(store.get("image_red"), None);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use crate::config::FormConfig;
use crate::constraint::ValidationError;
use crate::derivation::{self, DerivedSlot, Reconciliation};
use crate::error::SchemaError;
use crate::schema::Schema;
use crate::state::{FieldEntry, FormState};
use crate::submit::SubmissionToken;
use crate::validator::{self, ValidationReport};
use crate::value::{FieldName, FieldValue};

/// Handle returned by [`FormStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// What caused a listener notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A `set` completed, including its derivation side effects.
    FieldWritten {
        name: FieldName,
        reconciled: Reconciliation,
    },
    /// A submit attempt failed validation; error fields are now touched.
    SubmitRejected { error_count: usize },
    /// A valid payload was handed to the submit collaborator.
    SubmitDispatched { token: SubmissionToken },
    /// The store was reset to its initial state.
    Reset,
}

type Listener = Box<dyn FnMut(&StoreEvent, &FormState)>;

/// State store for one form instance.
pub struct FormStore {
    schema: Arc<Schema>,
    state: Arc<FormState>,
    config: FormConfig,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
    submissions: u64,
}

impl FormStore {
    /// A store with the default [`FormConfig`].
    pub fn new(schema: Arc<Schema>) -> Result<Self, SchemaError> {
        Self::with_config(schema, FormConfig::default())
    }

    pub fn with_config(schema: Arc<Schema>, config: FormConfig) -> Result<Self, SchemaError> {
        if !schema.is_frozen() {
            tracing::debug!(schema = schema.name(), "store created from an unfrozen schema");
        }
        let state = FormState::initial(&schema)?;
        Ok(Self {
            schema,
            state: Arc::new(state),
            config,
            listeners: Vec::new(),
            next_listener: 0,
            submissions: 0,
        })
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[must_use]
    pub fn config(&self) -> FormConfig {
        self.config
    }

    /// Borrow the committed state.
    #[must_use]
    pub fn state(&self) -> &FormState {
        &self.state
    }

    /// Immutable handle on the committed state.
    #[must_use]
    pub fn snapshot(&self) -> Arc<FormState> {
        Arc::clone(&self.state)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.state.get(name)
    }

    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&FieldEntry> {
        self.state.entry(name)
    }

    /// Live derived slots for `driving`, across all of its derivations.
    #[must_use]
    pub fn derived_slots(&self, driving: &str) -> Vec<&DerivedSlot> {
        let state = &self.state;
        self.schema
            .derivations_for(driving)
            .flat_map(|(index, _)| state.slots(index).iter())
            .collect()
    }

    /// Write a field, reconcile its derivations, and notify listeners once.
    ///
    /// On error nothing is committed and nobody is notified.
    pub fn set(
        &mut self,
        name: &str,
        value: impl Into<FieldValue>,
    ) -> Result<Reconciliation, SchemaError> {
        if !self.state.contains(name) {
            return Err(SchemaError::undeclared(name, "set"));
        }
        let mut next = FormState::clone(&self.state);
        next.write(name, value.into());
        let reconciled = derivation::reconcile(&self.schema, &mut next, name)?;
        if self.config.validates_on_write(next.submit_count()) {
            let report = validator::validate(&self.schema, &next)?;
            next.apply_report(&report);
        }
        self.commit(
            next,
            StoreEvent::FieldWritten {
                name: name.to_string(),
                reconciled: reconciled.clone(),
            },
        );
        Ok(reconciled)
    }

    /// Validate the committed state without changing it.
    pub fn validate(&self) -> Result<ValidationReport, SchemaError> {
        validator::validate(&self.schema, &self.state)
    }

    pub fn validate_field(&self, name: &str) -> Result<Option<ValidationError>, SchemaError> {
        validator::validate_field(&self.schema, &self.state, name)
    }

    /// Register a listener, called after every committed change.
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&StoreEvent, &FormState) + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Throw away all values, errors, and tracking.
    pub fn reset(&mut self) -> Result<(), SchemaError> {
        let fresh = FormState::initial(&self.schema)?;
        tracing::debug!(schema = self.schema.name(), "form reset");
        self.commit(fresh, StoreEvent::Reset);
        Ok(())
    }

    /// Raw value of the next submission token. Starts at 1.
    pub(crate) fn next_submission(&mut self) -> u64 {
        self.submissions += 1;
        self.submissions
    }

    /// Replace the committed state and notify every listener once.
    pub(crate) fn commit(&mut self, state: FormState, event: StoreEvent) {
        self.state = Arc::new(state);
        let state = &self.state;
        for (_, listener) in &mut self.listeners {
            listener(&event, state);
        }
    }
}

impl fmt::Debug for FormStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormStore")
            .field("schema", &self.schema.name())
            .field("fields", &self.state.len())
            .field("config", &self.config)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

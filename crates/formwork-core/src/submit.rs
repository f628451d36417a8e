#![forbid(unsafe_code)]

//! Submission: validate everything, then either surface the errors or hand
//! the assembled payload to an external collaborator.
//!
//! The engine never waits for the collaborator. [`FormStore::submit`] finishes
//! its own bookkeeping synchronously and returns a [`SubmissionTicket`] that
//! the caller can poll or block on. The collaborator answers through a
//! one-shot [`SubmitReply`] from wherever it likes: the same call, another
//! thread, or later.
//!
//! Duplicate submissions are not guarded; every valid call dispatches.
//!
//! ```rust
//! use formwork_core::constraint::Rules;
//! use formwork_core::schema::Schema;
//! use formwork_core::store::FormStore;
//! use formwork_core::submit::{SubmitOutcome, fn_submitter};
//!
//! # fn main() -> Result<(), formwork_core::SchemaError> {
//! let mut schema = Schema::new("category");
//! schema.define_field("name", Rules::new().min_length(1))?;
//! let mut store = FormStore::new(schema.freeze())?;
//! let mut backend = fn_submitter(|payload| Ok(payload.to_json().to_string()));
//!
//! assert!(matches!(store.submit(&mut backend)?, SubmitOutcome::Rejected(_)));
//!
//! store.set("name", "Bags")?;
//! let SubmitOutcome::Dispatched(ticket) = store.submit(&mut backend)? else {
//!     unreachable!()
//! };
//! assert_eq!(ticket.wait().ok().as_deref(), Some(r#"{"name":"Bags"}"#));
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{SchemaError, SubmissionError};
use crate::schema::{PayloadShape, Schema};
use crate::state::FormState;
use crate::store::{FormStore, StoreEvent};
use crate::validator::{self, ValidationReport};
use crate::value::{FieldName, FieldValue, KeyedMapping};

// ---------------------------------------------------------------------------
// SubmissionToken
// ---------------------------------------------------------------------------

/// Identifies one dispatched submission.
///
/// Tokens issued by one store are strictly increasing, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubmissionToken(u64);

impl SubmissionToken {
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubmissionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Submission({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// The values handed to the collaborator, keyed by payload name.
///
/// Static fields appear in declaration order with their current value.
/// Flat derivations add one entry per live slot. Nested derivations add a
/// single mapping from slot key to value under their `into` name, skipping
/// Unset slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Payload(IndexMap<FieldName, FieldValue>);

impl Payload {
    /// Build the payload for `state` according to `schema`.
    #[must_use]
    pub fn assemble(schema: &Schema, state: &FormState) -> Self {
        let mut values = IndexMap::new();
        for name in schema.field_names() {
            let value = state.get(name).cloned().unwrap_or_default();
            values.insert(name.to_string(), value);
        }
        for (index, derivation) in schema.derivations().iter().enumerate() {
            let slots = state.slots(index);
            match derivation.shape() {
                PayloadShape::Flat => {
                    for slot in slots {
                        let value = state.get(&slot.name).cloned().unwrap_or_default();
                        values.insert(slot.name.clone(), value);
                    }
                }
                PayloadShape::Nested { into } => {
                    let mut nested = KeyedMapping::new();
                    for slot in slots {
                        if let Some(scalar) = state.get(&slot.name).and_then(FieldValue::as_scalar) {
                            nested.insert(slot.key.clone(), scalar.clone());
                        }
                    }
                    values.insert(into.clone(), FieldValue::Mapping(nested));
                }
            }
        }
        Self(values)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The payload as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    #[must_use]
    pub fn into_inner(self) -> IndexMap<FieldName, FieldValue> {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Submitter
// ---------------------------------------------------------------------------

/// The external submit collaborator.
pub trait Submitter {
    /// What the collaborator reports on success.
    type Receipt: Send + 'static;

    /// Take the payload. The outcome goes through `reply`, now or later.
    fn submit(&mut self, payload: Payload, reply: SubmitReply<Self::Receipt>);
}

/// One-shot channel back to the [`SubmissionTicket`].
///
/// Dropping it unanswered resolves the ticket with
/// [`SubmissionError::Abandoned`].
#[derive(Debug)]
pub struct SubmitReply<R> {
    token: SubmissionToken,
    tx: Sender<Result<R, SubmissionError>>,
}

impl<R> SubmitReply<R> {
    #[must_use]
    pub fn token(&self) -> SubmissionToken {
        self.token
    }

    pub fn resolve(self, result: Result<R, SubmissionError>) {
        if self.tx.send(result).is_err() {
            tracing::debug!(token = %self.token, "submission ticket dropped before reply");
        }
    }

    pub fn succeed(self, receipt: R) {
        self.resolve(Ok(receipt));
    }

    pub fn fail(self, err: impl Into<Box<dyn std::error::Error + Send + Sync>>) {
        self.resolve(Err(SubmissionError::collaborator(err)));
    }
}

/// Handle on an in-flight submission.
#[derive(Debug)]
pub struct SubmissionTicket<R> {
    token: SubmissionToken,
    rx: Receiver<Result<R, SubmissionError>>,
    done: bool,
}

impl<R> SubmissionTicket<R> {
    #[must_use]
    pub fn token(&self) -> SubmissionToken {
        self.token
    }

    /// Whether the result has already been taken.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Take the result if the collaborator has answered. Returns `None` while
    /// pending and after the result was taken.
    pub fn try_result(&mut self) -> Option<Result<R, SubmissionError>> {
        if self.done {
            return None;
        }
        match self.rx.try_recv() {
            Ok(result) => {
                self.done = true;
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.done = true;
                Some(Err(SubmissionError::Abandoned))
            }
        }
    }

    /// Block until the collaborator answers.
    pub fn wait(self) -> Result<R, SubmissionError> {
        if self.done {
            return Err(SubmissionError::Abandoned);
        }
        self.rx.recv().unwrap_or(Err(SubmissionError::Abandoned))
    }

    /// Block for at most `timeout`. Returns `None` on timeout.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Result<R, SubmissionError>> {
        if self.done {
            return None;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(result) => {
                self.done = true;
                Some(result)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.done = true;
                Some(Err(SubmissionError::Abandoned))
            }
        }
    }
}

/// Result of [`FormStore::submit`].
#[derive(Debug)]
pub enum SubmitOutcome<R> {
    /// Validation failed; the collaborator was not called.
    Rejected(ValidationReport),
    /// The payload was handed to the collaborator.
    Dispatched(SubmissionTicket<R>),
}

impl<R> SubmitOutcome<R> {
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    #[must_use]
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            Self::Rejected(report) => Some(report),
            Self::Dispatched(_) => None,
        }
    }

    #[must_use]
    pub fn into_ticket(self) -> Option<SubmissionTicket<R>> {
        match self {
            Self::Rejected(_) => None,
            Self::Dispatched(ticket) => Some(ticket),
        }
    }
}

// ---------------------------------------------------------------------------
// Closure adapter
// ---------------------------------------------------------------------------

/// A [`Submitter`] backed by a synchronous closure.
pub struct FnSubmitter<F, R> {
    f: F,
    _receipt: PhantomData<fn() -> R>,
}

impl<F, R> Submitter for FnSubmitter<F, R>
where
    F: FnMut(Payload) -> Result<R, SubmissionError>,
    R: Send + 'static,
{
    type Receipt = R;

    fn submit(&mut self, payload: Payload, reply: SubmitReply<R>) {
        reply.resolve((self.f)(payload));
    }
}

/// Adapt a closure into a [`Submitter`] that answers immediately.
pub fn fn_submitter<F, R>(f: F) -> FnSubmitter<F, R>
where
    F: FnMut(Payload) -> Result<R, SubmissionError>,
    R: Send + 'static,
{
    FnSubmitter {
        f,
        _receipt: PhantomData,
    }
}

// ---------------------------------------------------------------------------
// FormStore::submit
// ---------------------------------------------------------------------------

impl FormStore {
    /// Validate the whole form and either reject or dispatch.
    ///
    /// On rejection every field with an error is marked touched and
    /// listeners are notified; `submitter` is not called. On success
    /// `submitter` is called exactly once with the assembled payload.
    pub fn submit<S: Submitter>(
        &mut self,
        submitter: &mut S,
    ) -> Result<SubmitOutcome<S::Receipt>, SchemaError> {
        let snapshot = self.snapshot();
        let report = validator::validate(self.schema(), &snapshot)?;

        let mut next = FormState::clone(&snapshot);
        next.record_submit();
        next.apply_report(&report);

        if !report.is_valid() {
            for name in report.fields() {
                next.mark_touched(name);
            }
            let error_count = report.len();
            tracing::debug!(
                schema = self.schema().name(),
                errors = error_count,
                attempt = next.submit_count(),
                "submit rejected"
            );
            self.commit(next, StoreEvent::SubmitRejected { error_count });
            return Ok(SubmitOutcome::Rejected(report));
        }

        let payload = Payload::assemble(self.schema(), &snapshot);
        let token = SubmissionToken(self.next_submission());
        tracing::debug!(
            schema = self.schema().name(),
            %token,
            entries = payload.len(),
            "submit dispatched"
        );
        self.commit(next, StoreEvent::SubmitDispatched { token });

        let (tx, rx) = mpsc::channel();
        submitter.submit(payload, SubmitReply { token, tx });
        Ok(SubmitOutcome::Dispatched(SubmissionTicket {
            token,
            rx,
            done: false,
        }))
    }
}

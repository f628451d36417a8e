#![forbid(unsafe_code)]

//! Structured log events emitted by the engine.
//!
//! A capturing layer is installed per test with `with_default`, so the
//! events seen belong to that test's thread only.
//!
//! Run: `cargo test -p formwork-core --test tracing_events`

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use formwork_core::config::FormConfig;
use formwork_core::constraint::{ConstraintList, Predicate, Rules, ValidationErrorKind};
use formwork_core::error::SchemaError;
use formwork_core::schema::{Derivation, Schema};
use formwork_core::store::FormStore;
use formwork_core::submit::{Payload, fn_submitter};
use formwork_core::value::FieldValue;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

// ============================================================================
// Test Infrastructure
// ============================================================================

#[derive(Debug, Clone)]
struct CapturedEvent {
    level: Level,
    fields: HashMap<String, String>,
}

impl CapturedEvent {
    fn message(&self) -> &str {
        self.fields.get("message").map_or("", String::as_str)
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

struct FieldVisitor(HashMap<String, String>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{value:?}"));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventCapture {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(HashMap::new());
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            fields: visitor.0,
        });
    }
}

fn with_captured_events<F: FnOnce()>(f: F) -> Vec<CapturedEvent> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let layer = EventCapture {
        events: Arc::clone(&events),
    };
    let subscriber = tracing_subscriber::registry().with(layer);
    tracing::subscriber::with_default(subscriber, f);
    let captured = events.lock().unwrap().clone();
    captured
}

fn find<'a>(events: &'a [CapturedEvent], message: &str) -> Option<&'a CapturedEvent> {
    events.iter().find(|e| e.message() == message)
}

fn colors_schema() -> Arc<Schema> {
    let mut schema = Schema::new("product");
    schema
        .define_field("colors", ConstraintList::new())
        .unwrap()
        .define_derivation(Derivation::per_key("colors", "image_").required())
        .unwrap();
    schema.freeze()
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn reconciliation_is_logged_with_changes() {
    let events = with_captured_events(|| {
        let mut store = FormStore::new(colors_schema()).unwrap();
        store.set("colors", FieldValue::set(["red"])).unwrap();
    });
    let event = find(&events, "reconciled derived fields").expect("reconcile event");
    assert_eq!(event.level, Level::DEBUG);
    assert_eq!(event.field("schema"), Some("product"));
    assert_eq!(event.field("driving"), Some("colors"));
    assert_eq!(event.field("added"), Some(r#"["image_red"]"#));
}

#[test]
fn unchanged_selection_logs_no_reconciliation() {
    let events = with_captured_events(|| {
        let mut store = FormStore::new(colors_schema()).unwrap();
        store.set("colors", FieldValue::Unset).unwrap();
    });
    assert!(find(&events, "reconciled derived fields").is_none());
}

#[test]
fn rule_panic_is_a_warning() {
    let mut schema = Schema::new("fault");
    schema
        .define_field("pick", ConstraintList::new())
        .unwrap()
        .define_derivation(Derivation::new("pick", |v: &FieldValue| {
            if v.as_text() == Some("boom") {
                panic!("bad key")
            }
            Vec::new()
        }))
        .unwrap();
    let mut store = FormStore::new(schema.freeze()).unwrap();

    let events = with_captured_events(|| {
        assert!(matches!(
            store.set("pick", "boom"),
            Err(SchemaError::RuleFault { .. })
        ));
    });
    let event = find(&events, "derivation rule panicked").expect("fault event");
    assert_eq!(event.level, Level::WARN);
    assert_eq!(event.field("driving"), Some("pick"));
    assert_eq!(event.field("reason"), Some("bad key"));
}

#[test]
fn constraint_panic_is_a_warning() {
    let mut schema = Schema::new("fault");
    schema
        .define_field(
            "name",
            Rules::new().custom(Predicate::new(
                ValidationErrorKind::InvalidFormat,
                "explodes",
                |_: &FieldValue| panic!("constraint hit"),
            )),
        )
        .unwrap();
    let store = FormStore::new(schema.freeze()).unwrap();

    let events = with_captured_events(|| {
        assert!(matches!(
            store.validate(),
            Err(SchemaError::ConstraintFault { .. })
        ));
    });
    let event = find(&events, "constraint panicked").expect("fault event");
    assert_eq!(event.level, Level::WARN);
    assert_eq!(event.field("field"), Some("name"));
    assert_eq!(event.field("reason"), Some("constraint hit"));
}

#[test]
fn submit_outcomes_are_logged() {
    let events = with_captured_events(|| {
        let mut store = FormStore::new(colors_schema()).unwrap();
        let mut backend = fn_submitter(|p: Payload| Ok(p.len()));
        store.set("colors", FieldValue::set(["red"])).unwrap();
        assert!(store.submit(&mut backend).unwrap().is_rejected());
        store.set("image_red", "red.png").unwrap();
        assert!(!store.submit(&mut backend).unwrap().is_rejected());
    });

    let rejected = find(&events, "submit rejected").expect("rejection event");
    assert_eq!(rejected.field("errors"), Some("1"));
    assert_eq!(rejected.field("attempt"), Some("1"));

    let dispatched = find(&events, "submit dispatched").expect("dispatch event");
    assert_eq!(dispatched.level, Level::DEBUG);
    assert_eq!(dispatched.field("token"), Some("Submission(1)"));
}

#[test]
fn unknown_config_value_is_a_warning() {
    let events = with_captured_events(|| {
        let config = FormConfig::from_env_with(|key| {
            (key == "FORMWORK_VALIDATION_MODE").then(|| "sometimes".to_string())
        });
        assert_eq!(config, FormConfig::default());
    });
    let event = find(&events, "ignoring unknown mode").expect("config warning");
    assert_eq!(event.level, Level::WARN);
    assert_eq!(event.field("var"), Some("FORMWORK_VALIDATION_MODE"));
    assert_eq!(event.field("value"), Some("sometimes"));
}

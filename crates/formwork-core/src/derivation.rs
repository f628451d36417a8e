#![forbid(unsafe_code)]

//! Derived fields and the reconciliation pass that keeps them in step with
//! their driving fields.
//!
//! # Invariants
//!
//! 1. After reconciliation the derived fields of a rule are exactly the
//!    image of the driving value under that rule.
//! 2. Slots that stay selected keep their value; slots that disappear lose
//!    it, and a reselected slot starts again from the rule's default.
//! 3. Slot order follows the rule's output order (selection order for
//!    [`PerKey`]).
//! 4. A faulting rule aborts the pass with a [`SchemaError`]; callers run it
//!    on a scratch copy so the committed state is never half-reconciled.

use std::panic::{AssertUnwindSafe, catch_unwind};

use indexmap::{IndexMap, IndexSet};

use crate::error::{SchemaError, panic_message};
use crate::schema::Schema;
use crate::state::{FieldOrigin, FormState};
use crate::value::{FieldName, FieldValue, Scalar};

/// One derived field produced by a rule: the key it belongs to and the field
/// name it is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivedSlot {
    pub key: Scalar,
    pub name: FieldName,
}

impl DerivedSlot {
    #[must_use]
    pub fn new(key: impl Into<Scalar>, name: impl Into<FieldName>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
        }
    }
}

/// Maps a driving value to the derived slots that should exist for it.
pub trait DerivationRule: Send + Sync {
    fn derive(&self, driving: &FieldValue) -> Vec<DerivedSlot>;
}

impl<F> DerivationRule for F
where
    F: Fn(&FieldValue) -> Vec<DerivedSlot> + Send + Sync,
{
    fn derive(&self, driving: &FieldValue) -> Vec<DerivedSlot> {
        self(driving)
    }
}

/// One slot per key: every member of a set, every key of a mapping, or the
/// single scalar. Unset produces nothing. Slot names are `"{prefix}{key}"`.
#[derive(Debug, Clone)]
pub struct PerKey {
    prefix: String,
}

impl PerKey {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn slot(&self, key: &Scalar) -> DerivedSlot {
        DerivedSlot::new(key.clone(), format!("{}{key}", self.prefix))
    }
}

impl DerivationRule for PerKey {
    fn derive(&self, driving: &FieldValue) -> Vec<DerivedSlot> {
        match driving {
            FieldValue::Unset => Vec::new(),
            FieldValue::Scalar(s) => vec![self.slot(s)],
            FieldValue::Set(set) => set.iter().map(|k| self.slot(k)).collect(),
            FieldValue::Mapping(map) => map.keys().map(|k| self.slot(k)).collect(),
        }
    }
}

/// What one reconciliation pass changed, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub added: Vec<FieldName>,
    pub removed: Vec<FieldName>,
}

impl Reconciliation {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    fn absorb(&mut self, other: Self) {
        self.added.extend(other.added);
        self.removed.extend(other.removed);
    }
}

/// Run a rule, turning a panic into [`SchemaError::RuleFault`].
///
/// Repeats of the same slot collapse to the first occurrence. Two different
/// keys landing on one name (`Text("1")` and `Number(1)`) are a
/// [`SchemaError::DerivedNameCollision`].
pub(crate) fn evaluate_rule(
    schema: &Schema,
    index: usize,
    driving_value: &FieldValue,
) -> Result<Vec<DerivedSlot>, SchemaError> {
    let Some(derivation) = schema.derivation(index) else {
        return Ok(Vec::new());
    };
    let produced = catch_unwind(AssertUnwindSafe(|| derivation.rule().derive(driving_value)))
        .map_err(|payload| {
            let message = panic_message(payload.as_ref());
            tracing::warn!(
                schema = schema.name(),
                driving = derivation.driving(),
                reason = %message,
                "derivation rule panicked"
            );
            SchemaError::RuleFault {
                driving: derivation.driving().to_string(),
                message,
            }
        })?;
    let mut seen: IndexMap<FieldName, Scalar> = IndexMap::with_capacity(produced.len());
    let mut slots = Vec::with_capacity(produced.len());
    for slot in produced {
        match seen.get(&slot.name) {
            Some(key) if *key == slot.key => {}
            Some(_) => {
                return Err(SchemaError::DerivedNameCollision {
                    driving: derivation.driving().to_string(),
                    field: slot.name,
                });
            }
            None => {
                seen.insert(slot.name.clone(), slot.key.clone());
                slots.push(slot);
            }
        }
    }
    Ok(slots)
}

/// Reconcile every derivation driven by `written`.
pub fn reconcile(
    schema: &Schema,
    state: &mut FormState,
    written: &str,
) -> Result<Reconciliation, SchemaError> {
    let mut total = Reconciliation::default();
    let indices: Vec<usize> = schema.derivations_for(written).map(|(i, _)| i).collect();
    for index in indices {
        total.absorb(reconcile_one(schema, state, index)?);
    }
    if !total.is_empty() {
        tracing::debug!(
            schema = schema.name(),
            driving = written,
            added = ?total.added,
            removed = ?total.removed,
            "reconciled derived fields"
        );
    }
    Ok(total)
}

/// Reconcile every derivation of the schema, in declaration order.
pub fn reconcile_all(schema: &Schema, state: &mut FormState) -> Result<Reconciliation, SchemaError> {
    let mut total = Reconciliation::default();
    for index in 0..schema.derivations().len() {
        total.absorb(reconcile_one(schema, state, index)?);
    }
    Ok(total)
}

fn reconcile_one(
    schema: &Schema,
    state: &mut FormState,
    index: usize,
) -> Result<Reconciliation, SchemaError> {
    let Some(derivation) = schema.derivation(index) else {
        return Ok(Reconciliation::default());
    };
    let driving_value = state
        .value(derivation.driving())
        .cloned()
        .unwrap_or_default();
    let new_slots = evaluate_rule(schema, index, &driving_value)?;

    for slot in &new_slots {
        let taken_by_other = match state.entry(&slot.name).map(|e| e.origin()) {
            Some(FieldOrigin::Derived { derivation: owner, .. }) => *owner != index,
            Some(FieldOrigin::Static) => true,
            // Nested payload names count as taken though no entry holds them.
            None => schema.name_taken(&slot.name),
        };
        if taken_by_other {
            return Err(SchemaError::DerivedNameCollision {
                driving: derivation.driving().to_string(),
                field: slot.name.clone(),
            });
        }
    }

    let old_slots = state.slots(index).to_vec();
    let new_names: IndexSet<&str> = new_slots.iter().map(|s| s.name.as_str()).collect();
    let old_names: IndexSet<&str> = old_slots.iter().map(|s| s.name.as_str()).collect();

    let mut change = Reconciliation::default();
    for slot in &old_slots {
        if !new_names.contains(slot.name.as_str()) {
            state.remove_derived(&slot.name);
            change.removed.push(slot.name.clone());
        }
    }
    for slot in &new_slots {
        if !old_names.contains(slot.name.as_str()) {
            state.insert_derived(index, slot, derivation.initial().clone());
            change.added.push(slot.name.clone());
        }
    }
    state.set_slots(index, new_slots);
    Ok(change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::ConstraintList;
    use crate::schema::Derivation;
    use crate::value::ScalarSet;

    fn colors_schema() -> Schema {
        let mut schema = Schema::new("product");
        schema
            .define_field("colors", ConstraintList::new())
            .unwrap()
            .define_derivation(Derivation::per_key("colors", "image_").required())
            .unwrap();
        schema
    }

    fn select(state: &mut FormState, schema: &Schema, colors: &[&str]) -> Reconciliation {
        state.write("colors", FieldValue::set(colors.iter().copied()));
        reconcile(schema, state, "colors").unwrap()
    }

    fn derived_names(state: &FormState) -> Vec<String> {
        state.slots(0).iter().map(|s| s.name.clone()).collect()
    }

    #[test]
    fn per_key_shapes() {
        let rule = PerKey::new("image_");
        assert!(rule.derive(&FieldValue::Unset).is_empty());
        assert_eq!(
            rule.derive(&FieldValue::text("red")),
            vec![DerivedSlot::new("red", "image_red")]
        );
        let set: ScalarSet = ["red", "blue"].into_iter().collect();
        let names: Vec<String> = rule
            .derive(&FieldValue::Set(set))
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, ["image_red", "image_blue"]);
    }

    #[test]
    fn per_key_numeric_keys() {
        let rule = PerKey::new("stock_");
        let slots = rule.derive(&FieldValue::set([Scalar::from(42i64)]));
        assert_eq!(slots[0].name, "stock_42");
    }

    #[test]
    fn added_and_removed_follow_selection() {
        let schema = colors_schema();
        let mut state = FormState::initial(&schema).unwrap();

        let change = select(&mut state, &schema, &["red", "blue"]);
        assert_eq!(change.added, ["image_red", "image_blue"]);
        assert!(change.removed.is_empty());
        assert_eq!(derived_names(&state), ["image_red", "image_blue"]);

        let change = select(&mut state, &schema, &["blue", "green"]);
        assert_eq!(change.added, ["image_green"]);
        assert_eq!(change.removed, ["image_red"]);
        assert_eq!(derived_names(&state), ["image_blue", "image_green"]);
        assert!(state.value("image_red").is_none());
    }

    #[test]
    fn kept_slots_preserve_value() {
        let schema = colors_schema();
        let mut state = FormState::initial(&schema).unwrap();
        select(&mut state, &schema, &["red"]);
        state.write("image_red", FieldValue::text("ref123"));
        select(&mut state, &schema, &["red", "blue"]);
        assert_eq!(state.value("image_red"), Some(&FieldValue::text("ref123")));
        assert_eq!(state.value("image_blue"), Some(&FieldValue::Unset));
    }

    #[test]
    fn deselect_then_reselect_drops_value() {
        let schema = colors_schema();
        let mut state = FormState::initial(&schema).unwrap();
        select(&mut state, &schema, &["red", "blue"]);
        state.write("image_red", FieldValue::text("ref123"));
        select(&mut state, &schema, &["blue"]);
        select(&mut state, &schema, &["blue", "red"]);
        assert_eq!(state.value("image_red"), Some(&FieldValue::Unset));
        assert_eq!(derived_names(&state), ["image_blue", "image_red"]);
    }

    #[test]
    fn custom_default_applies_to_new_slots() {
        let mut schema = Schema::new("stock");
        schema
            .define_field("sizes", ConstraintList::new())
            .unwrap()
            .define_derivation(Derivation::per_key("sizes", "qty_").default_value(0.0))
            .unwrap();
        let mut state = FormState::initial(&schema).unwrap();
        state.write("sizes", FieldValue::set(["m"]));
        reconcile(&schema, &mut state, "sizes").unwrap();
        assert_eq!(state.value("qty_m"), Some(&FieldValue::number(0.0)));
    }

    #[test]
    fn repeated_slots_collapse() {
        let mut schema = Schema::new("dup");
        schema
            .define_field("pick", ConstraintList::new())
            .unwrap()
            .define_derivation(Derivation::new("pick", |_: &FieldValue| {
                vec![DerivedSlot::new("a", "slot"), DerivedSlot::new("a", "slot")]
            }))
            .unwrap();
        let mut state = FormState::initial(&schema).unwrap();
        assert_eq!(state.slots(0).len(), 1);
        assert_eq!(state.slots(0)[0].key, Scalar::from("a"));
        assert!(reconcile(&schema, &mut state, "pick").unwrap().is_empty());
    }

    #[test]
    fn keys_sharing_a_name_collide() {
        let mut schema = Schema::new("keys");
        schema
            .define_field("keys", ConstraintList::new())
            .unwrap()
            .define_derivation(Derivation::per_key("keys", "slot_").required())
            .unwrap();
        let mut state = FormState::initial(&schema).unwrap();
        state.write(
            "keys",
            FieldValue::set([Scalar::from("1"), Scalar::from(1i64)]),
        );
        let err = reconcile(&schema, &mut state, "keys").unwrap_err();
        assert_eq!(
            err,
            SchemaError::DerivedNameCollision {
                driving: "keys".into(),
                field: "slot_1".into(),
            }
        );
    }

    #[test]
    fn nested_payload_name_is_taken() {
        let mut schema = Schema::new("product");
        schema
            .define_field("colors", ConstraintList::new())
            .unwrap()
            .define_field("extra", ConstraintList::new())
            .unwrap()
            .define_derivation(Derivation::per_key("colors", "image_").nest_into("images"))
            .unwrap()
            .define_derivation(Derivation::new("extra", |v: &FieldValue| {
                if v.is_unset() {
                    Vec::new()
                } else {
                    vec![DerivedSlot::new("flat", "images")]
                }
            }))
            .unwrap();
        let mut state = FormState::initial(&schema).unwrap();
        state.write("extra", FieldValue::text("on"));
        let err = reconcile(&schema, &mut state, "extra").unwrap_err();
        assert_eq!(
            err,
            SchemaError::DerivedNameCollision {
                driving: "extra".into(),
                field: "images".into(),
            }
        );
        assert!(state.entry("images").is_none());
    }

    #[test]
    fn collision_with_static_field_is_error() {
        let mut schema = Schema::new("clash");
        schema
            .define_field("colors", ConstraintList::new())
            .unwrap()
            .define_field("image_red", ConstraintList::new())
            .unwrap()
            .define_derivation(Derivation::per_key("colors", "image_"))
            .unwrap();
        let mut state = FormState::initial(&schema).unwrap();
        state.write("colors", FieldValue::set(["red"]));
        let err = reconcile(&schema, &mut state, "colors").unwrap_err();
        assert_eq!(
            err,
            SchemaError::DerivedNameCollision {
                driving: "colors".into(),
                field: "image_red".into(),
            }
        );
    }

    #[test]
    fn collision_between_rules_is_error() {
        let mut schema = Schema::new("clash");
        schema
            .define_field("a", ConstraintList::new())
            .unwrap()
            .define_field("b", ConstraintList::new())
            .unwrap()
            .define_derivation(Derivation::per_key("a", "x_"))
            .unwrap()
            .define_derivation(Derivation::per_key("b", "x_"))
            .unwrap();
        let mut state = FormState::initial(&schema).unwrap();
        state.write("a", FieldValue::text("k"));
        reconcile(&schema, &mut state, "a").unwrap();
        state.write("b", FieldValue::text("k"));
        assert!(matches!(
            reconcile(&schema, &mut state, "b"),
            Err(SchemaError::DerivedNameCollision { .. })
        ));
    }

    #[test]
    fn panicking_rule_becomes_rule_fault() {
        let mut schema = Schema::new("fault");
        schema
            .define_field("pick", ConstraintList::new())
            .unwrap()
            .define_derivation(Derivation::new("pick", |v: &FieldValue| {
                if v.is_unset() {
                    Vec::new()
                } else {
                    panic!("rule exploded")
                }
            }))
            .unwrap();
        let mut state = FormState::initial(&schema).unwrap();
        state.write("pick", FieldValue::text("x"));
        let err = reconcile(&schema, &mut state, "pick").unwrap_err();
        assert_eq!(
            err,
            SchemaError::RuleFault {
                driving: "pick".into(),
                message: "rule exploded".into(),
            }
        );
    }

    #[test]
    fn rules_run_in_declaration_order() {
        let mut schema = Schema::new("order");
        schema
            .define_field("colors", ConstraintList::new())
            .unwrap()
            .define_derivation(Derivation::per_key("colors", "image_"))
            .unwrap()
            .define_derivation(Derivation::per_key("colors", "alt_"))
            .unwrap();
        let mut state = FormState::initial(&schema).unwrap();
        state.write("colors", FieldValue::set(["red"]));
        let change = reconcile(&schema, &mut state, "colors").unwrap();
        assert_eq!(change.added, ["image_red", "alt_red"]);
    }
}

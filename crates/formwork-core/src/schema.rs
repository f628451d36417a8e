#![forbid(unsafe_code)]

//! Form schemas.
//!
//! A [`Schema`] is an ordered list of static fields, each with its constraint
//! list, plus [`Derivation`]s: rules that grow or shrink a set of derived
//! fields from the current value of a driving field.
//!
//! Schemas are built once, frozen into an `Arc`, and shared read-only by
//! every store of that form type.
//!
//! ```rust
//! use formwork_core::constraint::Rules;
//! use formwork_core::schema::{Derivation, Schema};
//!
//! # fn main() -> Result<(), formwork_core::SchemaError> {
//! let mut schema = Schema::new("product");
//! schema
//!     .define_field("colors", Rules::new().one_of(["red", "blue"]))?
//!     .define_derivation(Derivation::per_key("colors", "image_").required())?;
//! let schema = schema.freeze();
//! assert!(schema.is_frozen());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::constraint::{Constraint, ConstraintList};
use crate::derivation::{DerivationRule, PerKey};
use crate::error::SchemaError;
use crate::value::{FieldName, FieldValue};

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// How a derivation's fields appear in the submitted payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PayloadShape {
    /// Each derived field is its own payload entry.
    #[default]
    Flat,
    /// All derived values are gathered into one mapping, keyed by slot key,
    /// under the given payload name.
    Nested { into: FieldName },
}

/// Declaration of a family of derived fields.
pub struct Derivation {
    driving: FieldName,
    rule: Box<dyn DerivationRule>,
    default: FieldValue,
    required: bool,
    constraints: ConstraintList,
    shape: PayloadShape,
}

impl Derivation {
    /// A derivation on `driving` using a custom rule.
    pub fn new(driving: impl Into<FieldName>, rule: impl DerivationRule + 'static) -> Self {
        Self {
            driving: driving.into(),
            rule: Box::new(rule),
            default: FieldValue::Unset,
            required: false,
            constraints: Vec::new(),
            shape: PayloadShape::Flat,
        }
    }

    /// One field `"{prefix}{key}"` per key of the driving value.
    pub fn per_key(driving: impl Into<FieldName>, prefix: impl Into<String>) -> Self {
        Self::new(driving, PerKey::new(prefix))
    }

    /// Every derived field must hold a non-empty value.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Value given to newly created derived fields. Defaults to Unset.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = value.into();
        self
    }

    /// Constraints run against every derived field.
    #[must_use]
    pub fn constraints(mut self, constraints: impl Into<ConstraintList>) -> Self {
        self.constraints = constraints.into();
        self
    }

    /// Gather derived values into one payload mapping named `into`.
    #[must_use]
    pub fn nest_into(mut self, into: impl Into<FieldName>) -> Self {
        self.shape = PayloadShape::Nested { into: into.into() };
        self
    }

    #[must_use]
    pub fn driving(&self) -> &str {
        &self.driving
    }

    #[must_use]
    pub fn rule(&self) -> &dyn DerivationRule {
        self.rule.as_ref()
    }

    /// Value of a freshly created derived field.
    #[must_use]
    pub fn initial(&self) -> &FieldValue {
        &self.default
    }

    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    #[must_use]
    pub fn constraint_list(&self) -> &[Box<dyn Constraint>] {
        &self.constraints
    }

    #[must_use]
    pub fn shape(&self) -> &PayloadShape {
        &self.shape
    }
}

impl fmt::Debug for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derivation")
            .field("driving", &self.driving)
            .field("default", &self.default)
            .field("required", &self.required)
            .field("constraints", &self.constraints.len())
            .field("shape", &self.shape)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// A declared static field.
pub struct FieldDef {
    constraints: ConstraintList,
}

impl FieldDef {
    #[must_use]
    pub fn constraints(&self) -> &[Box<dyn Constraint>] {
        &self.constraints
    }
}

/// The declaration of one form type.
pub struct Schema {
    name: String,
    fields: IndexMap<FieldName, FieldDef>,
    derivations: Vec<Derivation>,
    frozen: bool,
}

impl Schema {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            derivations: Vec::new(),
            frozen: false,
        }
    }

    /// Declare a static field.
    ///
    /// Every field a constraint [references](Constraint::references) must
    /// already be declared (or be the field itself).
    pub fn define_field(
        &mut self,
        name: impl Into<FieldName>,
        constraints: impl Into<ConstraintList>,
    ) -> Result<&mut Self, SchemaError> {
        self.ensure_mutable()?;
        let name = name.into();
        if self.name_taken(&name) {
            return Err(SchemaError::DuplicateField(name));
        }
        let constraints = constraints.into();
        self.check_references(&constraints, Some(&name), &name)?;
        self.fields.insert(name, FieldDef { constraints });
        Ok(self)
    }

    /// Declare a derivation. Its driving field must already be declared.
    pub fn define_derivation(&mut self, derivation: Derivation) -> Result<&mut Self, SchemaError> {
        self.ensure_mutable()?;
        if !self.fields.contains_key(derivation.driving()) {
            return Err(SchemaError::undeclared(
                derivation.driving(),
                "derivation driving field",
            ));
        }
        let context = format!("constraints derived from `{}`", derivation.driving());
        self.check_references(&derivation.constraints, None, &context)?;
        if let PayloadShape::Nested { into } = derivation.shape()
            && self.name_taken(into)
        {
            return Err(SchemaError::DuplicateField(into.clone()));
        }
        self.derivations.push(derivation);
        Ok(self)
    }

    /// Freeze the schema for sharing. Later `define_*` calls fail with
    /// [`SchemaError::FrozenSchema`].
    #[must_use]
    pub fn freeze(mut self) -> Arc<Self> {
        self.frozen = true;
        tracing::debug!(
            schema = %self.name,
            fields = self.fields.len(),
            derivations = self.derivations.len(),
            "schema frozen"
        );
        Arc::new(self)
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Static field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    #[must_use]
    pub fn contains_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    #[must_use]
    pub fn derivations(&self) -> &[Derivation] {
        &self.derivations
    }

    #[must_use]
    pub fn derivation(&self, index: usize) -> Option<&Derivation> {
        self.derivations.get(index)
    }

    /// Derivations driven by `driving`, with their indices, in declaration order.
    pub fn derivations_for<'a>(
        &'a self,
        driving: &'a str,
    ) -> impl Iterator<Item = (usize, &'a Derivation)> + 'a {
        self.derivations
            .iter()
            .enumerate()
            .filter(move |(_, d)| d.driving() == driving)
    }

    fn ensure_mutable(&self) -> Result<(), SchemaError> {
        if self.frozen {
            Err(SchemaError::FrozenSchema)
        } else {
            Ok(())
        }
    }

    /// Declared as a field, or used as a nested payload name.
    pub(crate) fn name_taken(&self, name: &str) -> bool {
        self.fields.contains_key(name) || self.is_nested_target(name)
    }

    fn is_nested_target(&self, name: &str) -> bool {
        self.derivations
            .iter()
            .any(|d| matches!(d.shape(), PayloadShape::Nested { into } if into == name))
    }

    fn check_references(
        &self,
        constraints: &[Box<dyn Constraint>],
        itself: Option<&str>,
        context: &str,
    ) -> Result<(), SchemaError> {
        for constraint in constraints {
            for referenced in constraint.references() {
                if itself != Some(referenced.as_str()) && !self.fields.contains_key(referenced) {
                    return Err(SchemaError::undeclared(
                        referenced.clone(),
                        format!("{} constraint on {context}", constraint.describe()),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("derivations", &self.derivations)
            .field("frozen", &self.frozen)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::Rules;

    #[test]
    fn fields_keep_declaration_order() {
        let mut schema = Schema::new("user");
        schema
            .define_field("fullname", Rules::new().min_length(2))
            .unwrap()
            .define_field("email", Rules::new().email())
            .unwrap()
            .define_field("city", ConstraintList::new())
            .unwrap();
        let names: Vec<&str> = schema.field_names().collect();
        assert_eq!(names, ["fullname", "email", "city"]);
    }

    #[test]
    fn duplicate_field_rejected() {
        let mut schema = Schema::new("category");
        schema.define_field("name", ConstraintList::new()).unwrap();
        let err = schema.define_field("name", ConstraintList::new()).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateField("name".into()));
    }

    #[test]
    fn derivation_needs_declared_driving_field() {
        let mut schema = Schema::new("product");
        let err = schema
            .define_derivation(Derivation::per_key("colors", "image_"))
            .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::UndeclaredFieldReference { ref field, .. } if field == "colors"
        ));
    }

    #[test]
    fn constraint_reference_must_be_declared() {
        let mut schema = Schema::new("signup");
        let err = schema
            .define_field("confirm", Rules::new().matches("password"))
            .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::UndeclaredFieldReference { ref field, .. } if field == "password"
        ));

        schema.define_field("password", Rules::new().min_length(8)).unwrap();
        assert!(schema
            .define_field("confirm", Rules::new().matches("password"))
            .is_ok());
    }

    #[test]
    fn derived_constraints_references_checked() {
        let mut schema = Schema::new("product");
        schema.define_field("colors", ConstraintList::new()).unwrap();
        let err = schema
            .define_derivation(
                Derivation::per_key("colors", "image_").constraints(Rules::new().matches("nope")),
            )
            .unwrap_err();
        assert!(matches!(err, SchemaError::UndeclaredFieldReference { .. }));
    }

    #[test]
    fn nested_payload_name_cannot_shadow_field() {
        let mut schema = Schema::new("product");
        schema
            .define_field("colors", ConstraintList::new())
            .unwrap()
            .define_field("images", ConstraintList::new())
            .unwrap();
        let err = schema
            .define_derivation(Derivation::per_key("colors", "image_").nest_into("images"))
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateField("images".into()));
    }

    #[test]
    fn frozen_schema_rejects_changes() {
        let mut schema = Schema::new("category");
        schema.define_field("name", ConstraintList::new()).unwrap();
        let mut shared = schema.freeze();
        let schema = Arc::get_mut(&mut shared).unwrap();
        assert_eq!(
            schema.define_field("slug", ConstraintList::new()).unwrap_err(),
            SchemaError::FrozenSchema
        );
        assert_eq!(
            schema
                .define_derivation(Derivation::per_key("name", "x_"))
                .unwrap_err(),
            SchemaError::FrozenSchema
        );
    }

    #[test]
    fn derivations_for_filters_by_driver() {
        let mut schema = Schema::new("product");
        schema
            .define_field("colors", ConstraintList::new())
            .unwrap()
            .define_field("sizes", ConstraintList::new())
            .unwrap()
            .define_derivation(Derivation::per_key("colors", "image_"))
            .unwrap()
            .define_derivation(Derivation::per_key("sizes", "stock_"))
            .unwrap()
            .define_derivation(Derivation::per_key("colors", "alt_"))
            .unwrap();
        let indices: Vec<usize> = schema.derivations_for("colors").map(|(i, _)| i).collect();
        assert_eq!(indices, [0, 2]);
    }
}

#![forbid(unsafe_code)]

//! The "Add Category" form.

use std::sync::Arc;

use formwork_core::constraint::Rules;
use formwork_core::{Schema, SchemaError};

pub const NAME: &str = "name";

/// One required text field.
pub fn schema() -> Result<Arc<Schema>, SchemaError> {
    let mut schema = Schema::new("category");
    schema.define_field(
        NAME,
        Rules::new()
            .min_length(1)
            .with_message("Category name is required"),
    )?;
    Ok(schema.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use formwork_core::FormStore;

    #[test]
    fn name_is_required() {
        let mut store = FormStore::new(schema().unwrap()).unwrap();
        let report = store.validate().unwrap();
        assert_eq!(
            report.error(NAME).map(|e| e.format_message()),
            Some("Category name is required".to_string())
        );

        store.set(NAME, "").unwrap();
        assert!(!store.validate().unwrap().is_valid());

        store.set(NAME, "Bags").unwrap();
        assert!(store.validate().unwrap().is_valid());
    }
}

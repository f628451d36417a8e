#![forbid(unsafe_code)]

//! The "Add User" form.

use std::sync::Arc;

use formwork_core::constraint::Rules;
use formwork_core::{Schema, SchemaError};

pub const FULLNAME: &str = "fullname";
pub const EMAIL: &str = "email";
pub const PHONE: &str = "phone";
pub const ADDRESS: &str = "address";
pub const CITY: &str = "city";

fn bounded(min: usize, max: usize, too_short: &str) -> Rules {
    Rules::new()
        .min_length(min)
        .with_message(too_short)
        .max_length(max)
}

pub fn schema() -> Result<Arc<Schema>, SchemaError> {
    let mut schema = Schema::new("user");
    schema
        .define_field(
            FULLNAME,
            bounded(2, 50, "Full name must be at least 2 characters long"),
        )?
        .define_field(EMAIL, Rules::new().email().with_message("Invalid email address"))?
        .define_field(
            PHONE,
            bounded(10, 15, "Phone number must be at least 10 characters long"),
        )?
        .define_field(
            ADDRESS,
            bounded(2, 100, "Address must be at least 2 characters long"),
        )?
        .define_field(CITY, bounded(2, 100, "City must be at least 2 characters long"))?;
    Ok(schema.freeze())
}

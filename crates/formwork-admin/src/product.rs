#![forbid(unsafe_code)]

//! The "Add Product" form.
//!
//! Every selected color needs an image. The image fields are derived from
//! `colors` (`image_<color>`) and are submitted together as one `images`
//! mapping from color to image reference.

use std::sync::Arc;

use formwork_core::constraint::Rules;
use formwork_core::{Derivation, Schema, SchemaError};

pub const NAME: &str = "name";
pub const SHORT_DESCRIPTION: &str = "short_description";
pub const DESCRIPTION: &str = "description";
pub const PRICE: &str = "price";
pub const CATEGORY: &str = "category";
pub const SIZES: &str = "sizes";
pub const COLORS: &str = "colors";
/// Payload name of the color-to-image mapping.
pub const IMAGES: &str = "images";
/// Prefix of the per-color image fields.
pub const IMAGE_PREFIX: &str = "image_";

pub const CATEGORIES: &[&str] = &[
    "T-shirts",
    "Shoes",
    "Accessories",
    "Bags",
    "Dresses",
    "Jackets",
    "Gloves",
];

pub const COLOR_OPTIONS: &[&str] = &[
    "blue", "green", "red", "yellow", "purple", "orange", "pink", "brown", "gray", "black",
    "white",
];

pub const SIZE_OPTIONS: &[&str] = &[
    "xs", "s", "m", "l", "xl", "xxl", "34", "35", "36", "37", "38", "39", "40", "41", "42", "43",
    "44", "45", "46", "47", "48",
];

/// Longest accepted short description, in characters.
pub const SHORT_DESCRIPTION_MAX: usize = 60;

/// Name of the image field for `color`.
#[must_use]
pub fn image_field(color: &str) -> String {
    format!("{IMAGE_PREFIX}{color}")
}

pub fn schema() -> Result<Arc<Schema>, SchemaError> {
    let mut schema = Schema::new("product");
    schema
        .define_field(
            NAME,
            Rules::new()
                .min_length(1)
                .with_message("Product name is required!"),
        )?
        .define_field(
            SHORT_DESCRIPTION,
            Rules::new()
                .min_length(1)
                .with_message("Short description is required!")
                .max_length(SHORT_DESCRIPTION_MAX),
        )?
        .define_field(
            DESCRIPTION,
            Rules::new()
                .min_length(1)
                .with_message("Description is required!"),
        )?
        .define_field(
            PRICE,
            Rules::new().at_least(1.0).with_message("Price is required!"),
        )?
        .define_field(CATEGORY, Rules::new().one_of(CATEGORIES.iter().copied()))?
        .define_field(SIZES, Rules::new().one_of(SIZE_OPTIONS.iter().copied()))?
        .define_field(COLORS, Rules::new().one_of(COLOR_OPTIONS.iter().copied()))?
        .define_derivation(
            Derivation::per_key(COLORS, IMAGE_PREFIX)
                .required()
                .nest_into(IMAGES),
        )?;
    Ok(schema.freeze())
}

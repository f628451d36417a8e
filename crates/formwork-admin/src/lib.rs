#![forbid(unsafe_code)]

//! Form schemas for the admin screens.
//!
//! Each screen is a module behind a feature of the same name (all on by
//! default). A module exposes its field names and option lists as constants
//! and a `schema()` constructor returning a frozen [`Schema`](formwork_core::Schema).

#[cfg(feature = "category")]
pub mod category;
#[cfg(feature = "checklist")]
pub mod checklist;
#[cfg(feature = "product")]
pub mod product;
#[cfg(feature = "user")]
pub mod user;

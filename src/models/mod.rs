//! Data models for the blog admin.
//!
//! JSON field names are camelCase so the wire format matches the admin frontend contract.

mod blog;
mod query;

pub use blog::*;
pub use query::*;

//! Built-in entity key schemes, grouped by the part of the product they serve.

pub mod account;
pub mod activity;
pub mod content;

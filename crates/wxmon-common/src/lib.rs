//! Shared domain types for the wxmon weather alert pipeline.

pub mod envelope;
pub mod types;

//! Weather alert consumer service.
//!
//! Reads weather envelopes from a [`source::MessageSource`], publishes
//! observations and alerts through a `MetricsSink`, and serves a small HTTP
//! API for health, status, rules and test temperature injection.

pub mod api;
pub mod app;
pub mod config;
pub mod dispatcher;
pub mod logging;
pub mod openapi;
pub mod rule_seed;
pub mod source;
pub mod state;

//! Observability setup for Onramp.

pub mod tracing_setup;

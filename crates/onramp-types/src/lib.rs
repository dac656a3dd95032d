//! Shared domain types for Onramp.
//!
//! This crate contains the core domain types used across the Onramp
//! onboarding platform: Employee, the step-status record, document/quiz
//! kinds, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod employee;
pub mod error;
pub mod onboarding;

//! Workflow engine and repository trait definitions for Onramp.
//!
//! This crate defines the "ports" (repository and delivery-client traits)
//! that the infrastructure layer implements. It depends only on
//! `onramp-types` -- never on `onramp-infra` or any database/IO crate.

pub mod repository;
pub mod service;
pub mod workflow;

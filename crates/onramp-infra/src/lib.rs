//! Infrastructure layer for Onramp.
//!
//! Contains implementations of the ports defined in `onramp-core`:
//! SQLite storage for employee records, the e-signature service client,
//! and the outbound email webhook client.

pub mod config;
pub mod email;
pub mod esign;
mod retry;
pub mod sqlite;

//! Employee repository trait definition.
//!
//! Defines the storage interface for employee records and their onboarding
//! state. The infrastructure layer (onramp-infra) implements this trait
//! with SQLite persistence.
//!
//! Mutations are deliberately fine-grained: each one must be atomic per
//! subject so that a webhook delivery and a stale resume trigger racing on
//! the same employee cannot lose updates. In particular,
//! `update_step_status` must enforce the completed-is-terminal invariant
//! at the storage layer, not just in memory.

use chrono::{DateTime, Utc};
use onramp_types::employee::Employee;
use onramp_types::error::RepositoryError;
use onramp_types::onboarding::{
    DocumentDispatch, DocumentKind, EmailLogEntry, QuizAttempt, StepName, StepStatus,
};
use uuid::Uuid;

/// Repository trait for employee persistence.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait EmployeeRepository: Send + Sync {
    // -----------------------------------------------------------------------
    // Records
    // -----------------------------------------------------------------------

    /// Insert a new employee record.
    fn create(
        &self,
        employee: &Employee,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get an employee by ID.
    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Employee>, RepositoryError>> + Send;

    /// Get an employee by email (used for duplicate detection).
    fn get_by_email(
        &self,
        email: &str,
    ) -> impl std::future::Future<Output = Result<Option<Employee>, RepositoryError>> + Send;

    /// Get an employee by workflow-instance token.
    fn get_by_token(
        &self,
        token: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Employee>, RepositoryError>> + Send;

    /// List all employees, ordered by creation time.
    fn list(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Employee>, RepositoryError>> + Send;

    /// List employees whose onboarding started but has not reached a
    /// terminal state (restart recovery).
    fn list_in_flight(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Employee>, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Onboarding state
    // -----------------------------------------------------------------------

    /// Transition a step's status.
    ///
    /// Returns `Ok(true)` when the transition was applied and `Ok(false)`
    /// when it was refused because the step is already `completed`.
    fn update_step_status(
        &self,
        id: &Uuid,
        step: StepName,
        status: StepStatus,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Record one more execution attempt for a step, returning the new count.
    fn record_step_attempt(
        &self,
        id: &Uuid,
        step: StepName,
    ) -> impl std::future::Future<Output = Result<u32, RepositoryError>> + Send;

    /// Persist the result of a document dispatch.
    fn record_document_dispatch(
        &self,
        id: &Uuid,
        document: DocumentKind,
        dispatch: &DocumentDispatch,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Append a quiz attempt to the employee's history.
    fn append_quiz_attempt(
        &self,
        id: &Uuid,
        attempt: &QuizAttempt,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Append an entry to the employee's email audit log.
    fn append_email_log(
        &self,
        id: &Uuid,
        entry: &EmailLogEntry,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Assign a workflow-instance token and stamp `started_at`.
    fn begin_onboarding(
        &self,
        id: &Uuid,
        token: Uuid,
        started_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Stamp `completed_at` if not already set.
    fn mark_onboarding_complete(
        &self,
        id: &Uuid,
        completed_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}

//! Side-effecting step execution: document dispatch and notification email.
//!
//! `StepExecutor` performs the one side-effecting pipeline action (sending
//! a document for signature, plus its best-effort notification email)
//! behind the `DocumentClient` / `EmailClient` port traits that the
//! infrastructure layer implements.
//!
//! The at-most-once discipline: the step is marked `in_progress` before the
//! send, and the dispatch record is persisted immediately after the send
//! succeeds. On re-entry, an `in_progress` step with a dispatch record is
//! completed without re-sending.

use std::sync::Arc;

use chrono::Utc;
use onramp_types::employee::Employee;
use onramp_types::error::RepositoryError;
use onramp_types::onboarding::{DocumentDispatch, DocumentKind, EmailLogEntry, EmailOutcome, StepStatus};

use crate::repository::employee::EmployeeRepository;

use super::templates;

// ---------------------------------------------------------------------------
// Delivery ports
// ---------------------------------------------------------------------------

/// Errors from external delivery services (e-sign, email).
///
/// These are transport-level failures; business-rule rejections are not
/// modeled here because the services involved have none worth retrying.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("service returned HTTP {status}")]
    Status { status: u16 },

    /// Connection-level failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Client for the document e-signature service.
///
/// Implementations retry transient failures with bounded backoff and fall
/// back to a deterministic simulated dispatch when the service stays
/// unreachable, so the returned dispatch is the record of what actually
/// happened.
pub trait DocumentClient: Send + Sync {
    fn send_document(
        &self,
        employee: &Employee,
        document: DocumentKind,
    ) -> impl std::future::Future<Output = Result<DocumentDispatch, DeliveryError>> + Send;
}

/// Client for the outbound email service.
pub trait EmailClient: Send + Sync {
    fn send_email(
        &self,
        to: &str,
        subject: &str,
        content: &str,
        template: &str,
    ) -> impl std::future::Future<Output = Result<(), DeliveryError>> + Send;
}

// ---------------------------------------------------------------------------
// StepError
// ---------------------------------------------------------------------------

/// Errors from executing a side-effecting step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// Persistence failed mid-step.
    #[error("repository error: {0}")]
    Repository(String),

    /// Document delivery failed after client-level retries.
    #[error("document delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}

impl From<RepositoryError> for StepError {
    fn from(e: RepositoryError) -> Self {
        StepError::Repository(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// StepExecutor
// ---------------------------------------------------------------------------

/// Executes the document-dispatch side effect for one pipeline step.
pub struct StepExecutor<R, D, E> {
    repo: Arc<R>,
    documents: Arc<D>,
    email: Arc<E>,
}

impl<R, D, E> StepExecutor<R, D, E>
where
    R: EmployeeRepository,
    D: DocumentClient,
    E: EmailClient,
{
    pub fn new(repo: Arc<R>, documents: Arc<D>, email: Arc<E>) -> Self {
        Self {
            repo,
            documents,
            email,
        }
    }

    /// Dispatch a document to the employee and record the outcome.
    ///
    /// Sequence: mark `in_progress`, record the attempt, send, persist the
    /// dispatch record, notify by email (best-effort), mark `completed`.
    /// If a dispatch record already exists the send is skipped entirely --
    /// the side effect fired in a previous life of the process.
    pub async fn dispatch_document(
        &self,
        employee: &Employee,
        document: DocumentKind,
    ) -> Result<(), StepError> {
        let step = document.sent_step();

        if let Some(existing) = employee.documents.get(&document) {
            tracing::info!(
                employee_id = %employee.id,
                document = %document,
                tracking_id = existing.tracking_id.as_str(),
                "dispatch record found, completing step without re-sending"
            );
            self.repo
                .update_step_status(&employee.id, step, StepStatus::Completed)
                .await?;
            return Ok(());
        }

        self.repo
            .update_step_status(&employee.id, step, StepStatus::InProgress)
            .await?;
        let attempt = self.repo.record_step_attempt(&employee.id, step).await?;

        tracing::info!(
            employee_id = %employee.id,
            document = %document,
            recipient = employee.email.as_str(),
            attempt,
            "dispatching document for signature"
        );

        let dispatch = self.documents.send_document(employee, document).await?;

        // The dispatch record is the durable proof that the send fired;
        // persist it before anything else can go wrong.
        self.repo
            .record_document_dispatch(&employee.id, document, &dispatch)
            .await?;

        tracing::info!(
            employee_id = %employee.id,
            document = %document,
            tracking_id = dispatch.tracking_id.as_str(),
            simulated = dispatch.simulated,
            "document dispatched"
        );

        // Notification is best-effort: a failed email is logged on the
        // employee record but never blocks gate progression.
        let subject = format!("{} Ready for Review", document.title());
        let content = templates::document_ready(&employee.name, document);
        let _ = send_and_log(
            self.repo.as_ref(),
            self.email.as_ref(),
            employee,
            "document_ready",
            &subject,
            &content,
        )
        .await;

        self.repo
            .update_step_status(&employee.id, step, StepStatus::Completed)
            .await?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Shared email helper
// ---------------------------------------------------------------------------

/// Send an email and append the outcome to the employee's audit log.
///
/// The log entry is written for both outcomes; the delivery result is
/// returned so callers can decide whether failure matters (it does for
/// final provisioning tasks, it does not for notifications).
pub(crate) async fn send_and_log<R, E>(
    repo: &R,
    email: &E,
    employee: &Employee,
    template: &str,
    subject: &str,
    content: &str,
) -> Result<(), DeliveryError>
where
    R: EmployeeRepository,
    E: EmailClient,
{
    let result = email
        .send_email(&employee.email, subject, content, template)
        .await;

    let outcome = match &result {
        Ok(()) => {
            tracing::info!(
                employee_id = %employee.id,
                to = employee.email.as_str(),
                subject,
                "email sent"
            );
            EmailOutcome::Sent
        }
        Err(e) => {
            tracing::warn!(
                employee_id = %employee.id,
                to = employee.email.as_str(),
                subject,
                error = %e,
                "email delivery failed"
            );
            EmailOutcome::Failed {
                error: e.to_string(),
            }
        }
    };

    let entry = EmailLogEntry {
        template: template.to_string(),
        subject: subject.to_string(),
        outcome,
        recorded_at: Utc::now(),
    };
    if let Err(e) = repo.append_email_log(&employee.id, &entry).await {
        tracing::warn!(employee_id = %employee.id, error = %e, "failed to append email log entry");
    }

    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::testing::{
        seed_employee, InMemoryEmployeeRepository, MockDocumentClient, MockEmailClient,
    };
    use onramp_types::onboarding::StepName;

    fn executor() -> (
        Arc<InMemoryEmployeeRepository>,
        Arc<MockDocumentClient>,
        Arc<MockEmailClient>,
        StepExecutor<InMemoryEmployeeRepository, MockDocumentClient, MockEmailClient>,
    ) {
        let repo = Arc::new(InMemoryEmployeeRepository::new());
        let documents = Arc::new(MockDocumentClient::new());
        let email = Arc::new(MockEmailClient::new());
        let executor = StepExecutor::new(
            Arc::clone(&repo),
            Arc::clone(&documents),
            Arc::clone(&email),
        );
        (repo, documents, email, executor)
    }

    #[tokio::test]
    async fn dispatch_sends_once_and_completes() {
        let (repo, documents, email, executor) = executor();
        let id = seed_employee(&repo).await;
        let employee = repo.get(&id).await.unwrap().unwrap();

        executor
            .dispatch_document(&employee, DocumentKind::Policy)
            .await
            .unwrap();

        assert_eq!(documents.sent_count(), 1);
        let updated = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(
            updated.onboarding.status(StepName::PolicySent),
            StepStatus::Completed
        );
        assert_eq!(updated.onboarding.attempt_count(StepName::PolicySent), 1);
        assert!(updated.documents.contains_key(&DocumentKind::Policy));
        // Notification email logged as sent.
        assert_eq!(email.sent_count(), 1);
        assert_eq!(updated.email_log.len(), 1);
        assert_eq!(updated.email_log[0].template, "document_ready");
    }

    #[tokio::test]
    async fn dispatch_with_existing_record_does_not_resend() {
        let (repo, documents, _email, executor) = executor();
        let id = seed_employee(&repo).await;

        let employee = repo.get(&id).await.unwrap().unwrap();
        executor
            .dispatch_document(&employee, DocumentKind::Policy)
            .await
            .unwrap();
        assert_eq!(documents.sent_count(), 1);

        // Re-entry with the dispatch record present (e.g. crash between
        // dispatch persistence and the completed write).
        let employee = repo.get(&id).await.unwrap().unwrap();
        executor
            .dispatch_document(&employee, DocumentKind::Policy)
            .await
            .unwrap();
        assert_eq!(documents.sent_count(), 1, "side effect must not re-fire");
    }

    #[tokio::test]
    async fn failed_notification_email_does_not_fail_the_step() {
        let (repo, documents, email, executor) = executor();
        email.fail_template("document_ready");
        let id = seed_employee(&repo).await;
        let employee = repo.get(&id).await.unwrap().unwrap();

        executor
            .dispatch_document(&employee, DocumentKind::Nda)
            .await
            .unwrap();

        assert_eq!(documents.sent_count(), 1);
        let updated = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(
            updated.onboarding.status(StepName::NdaSent),
            StepStatus::Completed
        );
        // The failure is recorded in the audit log.
        assert_eq!(updated.email_log.len(), 1);
        assert!(matches!(
            updated.email_log[0].outcome,
            EmailOutcome::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn delivery_error_propagates_after_attempt_recorded() {
        let (repo, documents, _email, executor) = executor();
        documents.fail_next(1);
        let id = seed_employee(&repo).await;
        let employee = repo.get(&id).await.unwrap().unwrap();

        let err = executor
            .dispatch_document(&employee, DocumentKind::Policy)
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Delivery(_)));

        let updated = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(updated.onboarding.attempt_count(StepName::PolicySent), 1);
        assert_eq!(
            updated.onboarding.status(StepName::PolicySent),
            StepStatus::InProgress
        );
        assert!(!updated.documents.contains_key(&DocumentKind::Policy));
    }
}

//! Resume dispatcher: external event intake.
//!
//! Maps an inbound webhook event to the employee it concerns, updates the
//! status store, and re-invokes the workflow engine for that subject.
//! Delivery acknowledgment is decoupled from processing outcome: advance
//! failures are logged and swallowed, and events for unknown employees are
//! ignored -- but the disposition is surfaced so callers and monitoring
//! can tell "processed" from "ignored".

use std::sync::Arc;

use chrono::Utc;
use onramp_types::employee::Employee;
use onramp_types::onboarding::{DocumentKind, QuizAttempt, QuizKind, StepStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::repository::employee::EmployeeRepository;

use super::engine::{Advance, EngineError, WorkflowEngine};
use super::executor::{DocumentClient, EmailClient};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Document lifecycle states reported by the e-signature service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentEventStatus {
    Sent,
    Signed,
}

/// Webhook assertion about a document's status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStatusEvent {
    pub employee_id: Uuid,
    pub document: DocumentKind,
    pub status: DocumentEventStatus,
}

/// Webhook assertion about a quiz result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResultEvent {
    pub employee_id: Uuid,
    pub quiz: QuizKind,
    pub score: u32,
    pub passed: bool,
}

// ---------------------------------------------------------------------------
// Disposition
// ---------------------------------------------------------------------------

/// Why an event was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No employee record exists for the asserted subject id.
    UnknownEmployee,
}

/// What the dispatcher did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    /// The event was applied to the status store. `resumed` is true when
    /// the subsequent `advance` pass ran without an engine error.
    Applied { resumed: bool },
    /// The event was dropped without mutating any state.
    Ignored { reason: IgnoreReason },
}

impl EventDisposition {
    /// True when the event mutated state (the webhook response's
    /// `processed` flag).
    pub fn processed(&self) -> bool {
        matches!(self, EventDisposition::Applied { .. })
    }
}

// ---------------------------------------------------------------------------
// ResumeDispatcher
// ---------------------------------------------------------------------------

/// Routes external events into the status store and the engine.
pub struct ResumeDispatcher<R, D, E> {
    repo: Arc<R>,
    engine: Arc<WorkflowEngine<R, D, E>>,
}

impl<R, D, E> ResumeDispatcher<R, D, E>
where
    R: EmployeeRepository,
    D: DocumentClient,
    E: EmailClient,
{
    pub fn new(repo: Arc<R>, engine: Arc<WorkflowEngine<R, D, E>>) -> Self {
        Self { repo, engine }
    }

    /// Handle a document-status webhook.
    ///
    /// Idempotent: the status write goes through the repository's
    /// completed-is-terminal guard, and `advance` is itself idempotent, so
    /// duplicate deliveries change nothing.
    pub async fn on_document_status(
        &self,
        event: DocumentStatusEvent,
    ) -> Result<EventDisposition, EngineError> {
        let Some(employee) = self
            .repo
            .get(&event.employee_id)
            .await
            .map_err(|e| EngineError::Repository(e.to_string()))?
        else {
            tracing::warn!(
                employee_id = %event.employee_id,
                document = %event.document,
                status = ?event.status,
                "document status event for unknown employee, ignoring"
            );
            return Ok(EventDisposition::Ignored {
                reason: IgnoreReason::UnknownEmployee,
            });
        };

        let step = match event.status {
            DocumentEventStatus::Sent => event.document.sent_step(),
            DocumentEventStatus::Signed => event.document.signed_step(),
        };

        let applied = self
            .repo
            .update_step_status(&employee.id, step, StepStatus::Completed)
            .await
            .map_err(|e| EngineError::Repository(e.to_string()))?;

        tracing::info!(
            employee_id = %employee.id,
            document = %event.document,
            status = ?event.status,
            duplicate = !applied,
            "document status event received"
        );

        let resumed = self.resume_if_started(&employee).await;
        Ok(EventDisposition::Applied { resumed })
    }

    /// Handle a quiz-result webhook.
    ///
    /// The attempt is appended regardless of pass/fail; only a passing
    /// result satisfies the gate. An exact duplicate of an attempt already
    /// recorded for an already-completed gate is treated as webhook
    /// re-delivery and not appended again.
    pub async fn on_quiz_result(
        &self,
        event: QuizResultEvent,
    ) -> Result<EventDisposition, EngineError> {
        let Some(employee) = self
            .repo
            .get(&event.employee_id)
            .await
            .map_err(|e| EngineError::Repository(e.to_string()))?
        else {
            tracing::warn!(
                employee_id = %event.employee_id,
                quiz = %event.quiz,
                "quiz result event for unknown employee, ignoring"
            );
            return Ok(EventDisposition::Ignored {
                reason: IgnoreReason::UnknownEmployee,
            });
        };

        let step = event.quiz.passed_step();

        let redelivery = employee.onboarding.status(step) == StepStatus::Completed
            && employee.quiz_attempts.iter().any(|a| {
                a.quiz == event.quiz && a.score == event.score && a.passed == event.passed
            });

        if redelivery {
            tracing::debug!(
                employee_id = %employee.id,
                quiz = %event.quiz,
                "duplicate quiz result delivery, attempt not re-appended"
            );
        } else {
            let attempt = QuizAttempt {
                quiz: event.quiz,
                score: event.score,
                passed: event.passed,
                recorded_at: Utc::now(),
            };
            self.repo
                .append_quiz_attempt(&employee.id, &attempt)
                .await
                .map_err(|e| EngineError::Repository(e.to_string()))?;
        }

        tracing::info!(
            employee_id = %employee.id,
            quiz = %event.quiz,
            score = event.score,
            passed = event.passed,
            "quiz result event received"
        );

        if !event.passed {
            // Failing attempts are history only; the gate stays unsatisfied.
            return Ok(EventDisposition::Applied { resumed: false });
        }

        self.repo
            .update_step_status(&employee.id, step, StepStatus::Completed)
            .await
            .map_err(|e| EngineError::Repository(e.to_string()))?;

        let resumed = self.resume_if_started(&employee).await;
        Ok(EventDisposition::Applied { resumed })
    }

    /// Re-enter the engine if the employee has a workflow instance. An
    /// event arriving before enrollment is recorded in the status store
    /// but resumes nothing -- the later `start` picks the state up.
    async fn resume_if_started(&self, employee: &Employee) -> bool {
        if employee.workflow_token.is_none() {
            tracing::warn!(
                employee_id = %employee.id,
                "event recorded but employee has no workflow instance, not resuming"
            );
            return false;
        }
        self.run_advance(employee.id).await
    }

    /// Invoke `advance`, logging (not propagating) engine failures -- the
    /// webhook caller's acknowledgment never depends on processing outcome.
    async fn run_advance(&self, employee_id: Uuid) -> bool {
        match self.engine.advance(employee_id).await {
            Ok(Advance::Completed { .. }) => {
                tracing::info!(employee_id = %employee_id, "workflow completed after external event");
                true
            }
            Ok(Advance::Suspended { gate }) => {
                tracing::info!(
                    employee_id = %employee_id,
                    gate = %gate,
                    "workflow re-suspended after external event"
                );
                true
            }
            Ok(Advance::Failed { step, error }) => {
                tracing::warn!(
                    employee_id = %employee_id,
                    step = %step,
                    error = error.as_str(),
                    "workflow step failed after external event"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    employee_id = %employee_id,
                    error = %e,
                    "advance after external event failed"
                );
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! The workflow engine: durable, resumable advancement through the
//! onboarding pipeline.
//!
//! `advance` walks the fixed stage table and executes as many consecutive
//! ready steps as possible until it completes the pipeline, reaches a gate
//! whose external event has not arrived (suspends), or hits an
//! unrecoverable failure. Its position is derived entirely from the
//! persisted step-status record -- there is no in-memory cursor, which is
//! what makes resume-after-restart safe.
//!
//! # Execution flow
//!
//! 1. Serialize on the per-employee advance lock.
//! 2. Short-circuit if the pipeline already reached terminal state.
//! 3. For each stage in order: dispatch steps fire their side effect at
//!    most once; gate steps either pass or suspend the walk.
//! 4. After all nine ordered steps, run the final-task fan-out and stamp
//!    the terminal state.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use onramp_types::employee::Employee;
use onramp_types::onboarding::{StepName, StepStatus};
use uuid::Uuid;

use crate::repository::employee::EmployeeRepository;

use super::executor::{DocumentClient, EmailClient, StepExecutor};
use super::final_tasks::{FinalTaskReport, FinalTaskRunner};
use super::gate::GateEvaluator;
use super::pipeline::{self, StageKind};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum execution attempts for a side-effecting step before it is
/// marked `failed` and requires manual intervention.
pub const MAX_STEP_ATTEMPTS: u32 = 3;

// ---------------------------------------------------------------------------
// Advance outcome
// ---------------------------------------------------------------------------

/// Result of one `advance` pass.
///
/// Suspension is an expected outcome, not an error: it is how the engine
/// hands control back while a gate waits for its external event.
#[derive(Debug, Clone)]
pub enum Advance {
    /// Every step completed; the final fan-out has run (or had already run).
    Completed { final_tasks: FinalTaskReport },
    /// Execution is parked at a gate whose event has not arrived.
    Suspended { gate: StepName },
    /// A step failed; the employee is left in `retry` or `failed` state.
    Failed { step: StepName, error: String },
}

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Errors that can occur while advancing a workflow.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Persistence failure.
    #[error("repository error: {0}")]
    Repository(String),

    /// The employee does not exist.
    #[error("employee not found: {0}")]
    EmployeeNotFound(Uuid),

    /// The employee has no workflow instance yet.
    #[error("onboarding has not been started for employee {0}")]
    NotStarted(Uuid),

    /// A step was about to fire with incomplete predecessors. This is a
    /// programming-invariant breach, not an expected runtime condition.
    #[error("prerequisites not completed for {stage}: {missing:?}")]
    PreconditionViolation {
        stage: String,
        missing: Vec<StepName>,
    },
}

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

/// Orchestrates the onboarding pipeline for all employees.
///
/// Generic over the repository and the two delivery clients so that core
/// tests run against in-memory fakes while production wires SQLite and
/// reqwest implementations.
pub struct WorkflowEngine<R, D, E> {
    repo: Arc<R>,
    gates: GateEvaluator<R>,
    executor: StepExecutor<R, D, E>,
    final_tasks: FinalTaskRunner<R, E>,
    /// Per-employee advance locks: at most one in-flight `advance` per
    /// subject; concurrent triggers serialize and the later pass is a
    /// no-op by idempotence.
    advance_locks: DashMap<Uuid, Arc<tokio::sync::Mutex<()>>>,
}

impl<R, D, E> WorkflowEngine<R, D, E>
where
    R: EmployeeRepository,
    D: DocumentClient,
    E: EmailClient,
{
    pub fn new(repo: Arc<R>, documents: Arc<D>, email: Arc<E>, scheduling_link: String) -> Self {
        Self {
            gates: GateEvaluator::new(Arc::clone(&repo)),
            executor: StepExecutor::new(Arc::clone(&repo), documents, Arc::clone(&email)),
            final_tasks: FinalTaskRunner::new(Arc::clone(&repo), email, scheduling_link),
            repo,
            advance_locks: DashMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Enrollment
    // -----------------------------------------------------------------------

    /// Start onboarding for an employee: assign a fresh workflow-instance
    /// token and stamp `started_at`.
    ///
    /// Returns the token immediately; the caller launches `advance`
    /// asynchronously so enrollment never blocks on pipeline execution.
    pub async fn start(&self, employee_id: &Uuid) -> Result<Uuid, EngineError> {
        // Verify the employee exists before assigning a token.
        self.fetch(employee_id).await?;

        let token = Uuid::now_v7();
        self.repo
            .begin_onboarding(employee_id, token, Utc::now())
            .await
            .map_err(|e| EngineError::Repository(e.to_string()))?;

        tracing::info!(
            employee_id = %employee_id,
            token = %token,
            "onboarding started"
        );
        Ok(token)
    }

    // -----------------------------------------------------------------------
    // Advancement
    // -----------------------------------------------------------------------

    /// Advance the employee's workflow as far as it can go.
    ///
    /// Idempotent: with no new external event between calls, a second call
    /// reaches the same suspended/terminal state with zero new side
    /// effects.
    pub async fn advance(&self, employee_id: Uuid) -> Result<Advance, EngineError> {
        let lock = {
            let entry = self
                .advance_locks
                .entry(employee_id)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())));
            Arc::clone(entry.value())
        };
        let _guard = lock.lock().await;
        self.advance_locked(employee_id).await
    }

    async fn advance_locked(&self, employee_id: Uuid) -> Result<Advance, EngineError> {
        let employee = self.fetch(&employee_id).await?;
        if employee.workflow_token.is_none() {
            return Err(EngineError::NotStarted(employee_id));
        }
        if employee.onboarding.completed_at.is_some() {
            // Terminal: rebuild the report from persisted statuses and do
            // nothing else (final provisioning is never re-fired).
            return Ok(Advance::Completed {
                final_tasks: FinalTaskReport::from_record(&employee.onboarding),
            });
        }

        for stage in pipeline::STAGES {
            // Fetch fresh at every stage: the execution pointer is a pure
            // function of persisted statuses.
            let employee = self.fetch(&employee_id).await?;

            match stage.kind {
                StageKind::Dispatch(document) => {
                    match employee.onboarding.status(stage.step) {
                        StepStatus::Completed => continue,
                        StepStatus::Failed => {
                            return Ok(Advance::Failed {
                                step: stage.step,
                                error: "retry budget exhausted, manual intervention required"
                                    .to_string(),
                            });
                        }
                        // NotStarted, Retry, and crash-interrupted
                        // InProgress all fall through to the executor,
                        // which decides whether the side effect may fire.
                        _ => {}
                    }

                    // Defensive ordering check at the step boundary: the
                    // walk order makes this impossible, but duplicate or
                    // out-of-order resume triggers must never be able to
                    // fire a step early.
                    let missing = employee
                        .onboarding
                        .missing(pipeline::prerequisites(stage.step));
                    if !missing.is_empty() {
                        tracing::error!(
                            employee_id = %employee_id,
                            step = %stage.step,
                            ?missing,
                            "step reached with incomplete predecessors"
                        );
                        return Err(EngineError::PreconditionViolation {
                            stage: stage.step.to_string(),
                            missing,
                        });
                    }

                    if let Err(err) = self.executor.dispatch_document(&employee, document).await {
                        return self
                            .record_dispatch_failure(&employee_id, stage.step, err.to_string())
                            .await;
                    }
                }

                StageKind::SignatureGate(_) | StageKind::QuizGate(_) => {
                    if self.gates.is_satisfied(&employee_id, stage.step).await? {
                        continue;
                    }

                    // Persist the suspension point and hand control back.
                    // No polling, no blocked task: the resume dispatcher
                    // re-enters when the event arrives.
                    if employee.onboarding.status(stage.step) != StepStatus::Waiting {
                        self.repo
                            .update_step_status(&employee_id, stage.step, StepStatus::Waiting)
                            .await
                            .map_err(|e| EngineError::Repository(e.to_string()))?;
                    }
                    tracing::info!(
                        employee_id = %employee_id,
                        gate = %stage.step,
                        "gate unsatisfied, suspending workflow"
                    );
                    return Ok(Advance::Suspended { gate: stage.step });
                }
            }
        }

        // All nine ordered steps completed: run the terminal fan-out.
        let report = self.final_tasks.run(&employee_id).await?;
        Ok(Advance::Completed {
            final_tasks: report,
        })
    }

    async fn record_dispatch_failure(
        &self,
        employee_id: &Uuid,
        step: StepName,
        error: String,
    ) -> Result<Advance, EngineError> {
        let employee = self.fetch(employee_id).await?;
        let attempts = employee.onboarding.attempt_count(step);

        let status = if attempts >= MAX_STEP_ATTEMPTS {
            StepStatus::Failed
        } else {
            StepStatus::Retry
        };
        self.repo
            .update_step_status(employee_id, step, status)
            .await
            .map_err(|e| EngineError::Repository(e.to_string()))?;

        tracing::warn!(
            employee_id = %employee_id,
            step = %step,
            attempts,
            status = %status,
            error = error.as_str(),
            "step dispatch failed"
        );

        Ok(Advance::Failed { step, error })
    }

    // -----------------------------------------------------------------------
    // Restart recovery
    // -----------------------------------------------------------------------

    /// Re-enter every workflow that was in flight when the process last
    /// stopped. Called once at server startup.
    pub async fn resume_in_flight(&self) -> Result<Vec<(Uuid, Advance)>, EngineError> {
        let in_flight = self
            .repo
            .list_in_flight()
            .await
            .map_err(|e| EngineError::Repository(e.to_string()))?;

        let mut outcomes = Vec::with_capacity(in_flight.len());
        for employee in in_flight {
            match self.advance(employee.id).await {
                Ok(outcome) => {
                    tracing::info!(
                        employee_id = %employee.id,
                        outcome = outcome_label(&outcome),
                        "resumed in-flight workflow after restart"
                    );
                    outcomes.push((employee.id, outcome));
                }
                Err(e) => {
                    tracing::error!(
                        employee_id = %employee.id,
                        error = %e,
                        "failed to resume in-flight workflow"
                    );
                }
            }
        }
        Ok(outcomes)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn fetch(&self, employee_id: &Uuid) -> Result<Employee, EngineError> {
        self.repo
            .get(employee_id)
            .await
            .map_err(|e| EngineError::Repository(e.to_string()))?
            .ok_or(EngineError::EmployeeNotFound(*employee_id))
    }
}

fn outcome_label(outcome: &Advance) -> &'static str {
    match outcome {
        Advance::Completed { .. } => "completed",
        Advance::Suspended { .. } => "suspended",
        Advance::Failed { .. } => "failed",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::testing::{build_engine, seed_employee, TestEngine};
    use onramp_types::onboarding::{DocumentKind, StepName, StepStatus};

    async fn started(env: &TestEngine) -> Uuid {
        let id = seed_employee(&env.repo).await;
        env.engine.start(&id).await.unwrap();
        id
    }

    #[tokio::test]
    async fn start_assigns_token_and_started_at() {
        let env = build_engine();
        let id = seed_employee(&env.repo).await;

        let token = env.engine.start(&id).await.unwrap();

        let employee = env.repo.get(&id).await.unwrap().unwrap();
        assert_eq!(employee.workflow_token, Some(token));
        assert!(employee.onboarding.started_at.is_some());
    }

    #[tokio::test]
    async fn start_unknown_employee_fails() {
        let env = build_engine();
        let err = env.engine.start(&Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, EngineError::EmployeeNotFound(_)));
    }

    #[tokio::test]
    async fn advance_before_start_is_rejected() {
        let env = build_engine();
        let id = seed_employee(&env.repo).await;

        let err = env.engine.advance(id).await.unwrap_err();
        assert!(matches!(err, EngineError::NotStarted(_)));
        assert_eq!(env.documents.sent_count(), 0);
    }

    #[tokio::test]
    async fn advance_dispatches_policy_then_suspends_at_signature() {
        let env = build_engine();
        let id = started(&env).await;

        let outcome = env.engine.advance(id).await.unwrap();
        assert!(matches!(
            outcome,
            Advance::Suspended {
                gate: StepName::PolicySigned
            }
        ));

        assert_eq!(env.documents.sent_count(), 1);
        let employee = env.repo.get(&id).await.unwrap().unwrap();
        assert_eq!(
            employee.onboarding.status(StepName::PolicySent),
            StepStatus::Completed
        );
        assert_eq!(
            employee.onboarding.status(StepName::PolicySigned),
            StepStatus::Waiting
        );
        assert_eq!(
            employee.onboarding.status(StepName::NdaSent),
            StepStatus::NotStarted
        );
    }

    #[tokio::test]
    async fn advance_is_idempotent_without_new_events() {
        let env = build_engine();
        let id = started(&env).await;

        let first = env.engine.advance(id).await.unwrap();
        let record_after_first = env.repo.get(&id).await.unwrap().unwrap().onboarding;
        let second = env.engine.advance(id).await.unwrap();

        assert!(matches!(first, Advance::Suspended { gate } if gate == StepName::PolicySigned));
        assert!(matches!(second, Advance::Suspended { gate } if gate == StepName::PolicySigned));
        // No new side effects, no status changes.
        assert_eq!(env.documents.sent_count(), 1);
        assert_eq!(env.email.sent_count(), 1);
        let record_after_second = env.repo.get(&id).await.unwrap().unwrap().onboarding;
        assert_eq!(record_after_first.statuses, record_after_second.statuses);
    }

    #[tokio::test]
    async fn gates_advance_only_on_completed_status() {
        let env = build_engine();
        let id = started(&env).await;
        env.engine.advance(id).await.unwrap();

        // Mark the signature gate satisfied directly (as the resume
        // dispatcher would) and advance again.
        env.repo
            .update_step_status(&id, StepName::PolicySigned, StepStatus::Completed)
            .await
            .unwrap();

        let outcome = env.engine.advance(id).await.unwrap();
        assert!(matches!(
            outcome,
            Advance::Suspended {
                gate: StepName::PolicyQuizPassed
            }
        ));
        // Still only the policy document was sent.
        assert_eq!(env.documents.sent_count(), 1);
    }

    #[tokio::test]
    async fn nda_dispatch_waits_for_policy_quiz() {
        let env = build_engine();
        let id = started(&env).await;
        env.engine.advance(id).await.unwrap();

        env.repo
            .update_step_status(&id, StepName::PolicySigned, StepStatus::Completed)
            .await
            .unwrap();
        env.engine.advance(id).await.unwrap();
        assert_eq!(
            env.documents.sent_count(),
            1,
            "NDA must not be dispatched before the policy quiz gate"
        );

        env.repo
            .update_step_status(&id, StepName::PolicyQuizPassed, StepStatus::Completed)
            .await
            .unwrap();
        let outcome = env.engine.advance(id).await.unwrap();

        assert!(matches!(
            outcome,
            Advance::Suspended {
                gate: StepName::NdaSigned
            }
        ));
        assert_eq!(env.documents.sent_count(), 2);
        assert_eq!(
            env.documents.sent_documents(),
            vec![DocumentKind::Policy, DocumentKind::Nda]
        );
    }

    #[tokio::test]
    async fn full_pipeline_completes_with_fanout() {
        let env = build_engine();
        let id = started(&env).await;

        let mut outcome = env.engine.advance(id).await.unwrap();
        let mut last_progress = 0.0;
        // Satisfy each gate as the engine suspends on it.
        while let Advance::Suspended { gate } = outcome {
            env.repo
                .update_step_status(&id, gate, StepStatus::Completed)
                .await
                .unwrap();

            // Progress is monotonically non-decreasing over time.
            let progress = env.repo.get(&id).await.unwrap().unwrap().onboarding.progress();
            assert!(progress >= last_progress);
            last_progress = progress;

            outcome = env.engine.advance(id).await.unwrap();
        }

        let Advance::Completed { final_tasks } = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert!(final_tasks.slack && final_tasks.jira && final_tasks.call);

        let employee = env.repo.get(&id).await.unwrap().unwrap();
        assert_eq!(employee.onboarding.progress(), 100.0);
        assert!(employee.onboarding.completed_at.is_some());
        assert_eq!(env.documents.sent_count(), 3);
        // Three document notifications plus three final-task emails.
        assert_eq!(env.email.sent_count(), 6);
    }

    #[tokio::test]
    async fn advance_after_completion_is_a_noop() {
        let env = build_engine();
        let id = started(&env).await;

        let mut outcome = env.engine.advance(id).await.unwrap();
        while let Advance::Suspended { gate } = outcome {
            env.repo
                .update_step_status(&id, gate, StepStatus::Completed)
                .await
                .unwrap();
            outcome = env.engine.advance(id).await.unwrap();
        }

        let emails = env.email.sent_count();
        let documents = env.documents.sent_count();

        let again = env.engine.advance(id).await.unwrap();
        let Advance::Completed { final_tasks } = again else {
            panic!("expected completion, got {again:?}");
        };
        assert!(final_tasks.slack && final_tasks.jira && final_tasks.call);
        assert_eq!(env.email.sent_count(), emails, "no new emails");
        assert_eq!(env.documents.sent_count(), documents, "no new dispatches");
    }

    #[tokio::test]
    async fn in_progress_with_dispatch_record_is_not_resent() {
        let env = build_engine();
        let id = started(&env).await;
        env.engine.advance(id).await.unwrap();
        assert_eq!(env.documents.sent_count(), 1);

        // Simulate a crash after the dispatch record was persisted but
        // before the step was marked completed.
        env.repo
            .force_step_status(&id, StepName::PolicySent, StepStatus::InProgress)
            .await;

        let outcome = env.engine.advance(id).await.unwrap();
        assert!(matches!(outcome, Advance::Suspended { .. }));
        assert_eq!(env.documents.sent_count(), 1, "send must not re-fire");
        let employee = env.repo.get(&id).await.unwrap().unwrap();
        assert_eq!(
            employee.onboarding.status(StepName::PolicySent),
            StepStatus::Completed
        );
    }

    #[tokio::test]
    async fn in_progress_without_dispatch_record_is_resent_once() {
        let env = build_engine();
        let id = started(&env).await;

        // Simulate a crash after the in_progress write but before the send.
        env.repo
            .force_step_status(&id, StepName::PolicySent, StepStatus::InProgress)
            .await;

        let outcome = env.engine.advance(id).await.unwrap();
        assert!(matches!(outcome, Advance::Suspended { .. }));
        assert_eq!(env.documents.sent_count(), 1);
    }

    #[tokio::test]
    async fn dispatch_failure_leaves_step_in_retry() {
        let env = build_engine();
        env.documents.fail_next(1);
        let id = started(&env).await;

        let outcome = env.engine.advance(id).await.unwrap();
        let Advance::Failed { step, .. } = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert_eq!(step, StepName::PolicySent);

        let employee = env.repo.get(&id).await.unwrap().unwrap();
        assert_eq!(
            employee.onboarding.status(StepName::PolicySent),
            StepStatus::Retry
        );
        assert_eq!(employee.onboarding.attempt_count(StepName::PolicySent), 1);

        // The next advance retries and succeeds.
        let outcome = env.engine.advance(id).await.unwrap();
        assert!(matches!(outcome, Advance::Suspended { .. }));
        assert_eq!(env.documents.sent_count(), 1);
    }

    #[tokio::test]
    async fn retry_budget_exhaustion_marks_failed() {
        let env = build_engine();
        env.documents.fail_next(MAX_STEP_ATTEMPTS);
        let id = started(&env).await;

        for _ in 0..MAX_STEP_ATTEMPTS {
            let outcome = env.engine.advance(id).await.unwrap();
            assert!(matches!(outcome, Advance::Failed { .. }));
        }

        let employee = env.repo.get(&id).await.unwrap().unwrap();
        assert_eq!(
            employee.onboarding.status(StepName::PolicySent),
            StepStatus::Failed
        );
        assert_eq!(
            employee.onboarding.attempt_count(StepName::PolicySent),
            MAX_STEP_ATTEMPTS
        );

        // Further advances halt without new attempts.
        let outcome = env.engine.advance(id).await.unwrap();
        assert!(matches!(outcome, Advance::Failed { .. }));
        assert_eq!(
            env.repo
                .get(&id)
                .await
                .unwrap()
                .unwrap()
                .onboarding
                .attempt_count(StepName::PolicySent),
            MAX_STEP_ATTEMPTS
        );
    }

    #[tokio::test]
    async fn resume_in_flight_advances_started_workflows() {
        let env = build_engine();
        let id = started(&env).await;
        // Not yet advanced: simulates a crash right after start().

        let outcomes = env.engine.resume_in_flight().await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0, id);
        assert!(matches!(outcomes[0].1, Advance::Suspended { .. }));
        assert_eq!(env.documents.sent_count(), 1);
    }
}

//! Final-task fan-out: workspace invite, access grant, onboarding call.
//!
//! Runs after every compliance gate is satisfied. The three tasks are
//! independent and best-effort: they execute concurrently, a failure in one
//! neither cancels nor rolls back the others, and the pipeline reaches its
//! terminal state regardless of individual task failures.

use std::sync::Arc;

use chrono::Utc;
use onramp_types::employee::Employee;
use onramp_types::onboarding::{StepName, StepStatus, StepStatusRecord};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::repository::employee::EmployeeRepository;

use super::engine::EngineError;
use super::executor::{send_and_log, EmailClient};
use super::{pipeline, templates};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Per-task outcome map for the final fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalTaskReport {
    pub slack: bool,
    pub jira: bool,
    pub call: bool,
    /// Errors recorded for failed tasks. Never pipeline-blocking.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl FinalTaskReport {
    /// Rebuild a report from persisted step statuses (used when `advance`
    /// is called again after the pipeline already reached terminal state).
    pub fn from_record(record: &StepStatusRecord) -> Self {
        Self {
            slack: record.status(StepName::SlackInviteSent) == StepStatus::Completed,
            jira: record.status(StepName::JiraAccessGranted) == StepStatus::Completed,
            call: record.status(StepName::OnboardingCallScheduled) == StepStatus::Completed,
            errors: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum FinalTask {
    SlackInvite,
    JiraAccess,
    OnboardingCall,
}

impl FinalTask {
    fn step(self) -> StepName {
        match self {
            FinalTask::SlackInvite => StepName::SlackInviteSent,
            FinalTask::JiraAccess => StepName::JiraAccessGranted,
            FinalTask::OnboardingCall => StepName::OnboardingCallScheduled,
        }
    }

    fn template(self) -> &'static str {
        match self {
            FinalTask::SlackInvite => "slack_invite",
            FinalTask::JiraAccess => "jira_access",
            FinalTask::OnboardingCall => "onboarding_call",
        }
    }

    fn subject(self) -> &'static str {
        match self {
            FinalTask::SlackInvite => "Join Our Slack Workspace",
            FinalTask::JiraAccess => "Jira Access Granted",
            FinalTask::OnboardingCall => "Schedule Your Onboarding Call",
        }
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Runs the three final provisioning tasks concurrently.
pub struct FinalTaskRunner<R, E> {
    repo: Arc<R>,
    email: Arc<E>,
    scheduling_link: String,
}

impl<R, E> FinalTaskRunner<R, E>
where
    R: EmployeeRepository,
    E: EmailClient,
{
    pub fn new(repo: Arc<R>, email: Arc<E>, scheduling_link: String) -> Self {
        Self {
            repo,
            email,
            scheduling_link,
        }
    }

    /// Execute the fan-out for an employee.
    ///
    /// Re-verifies all six prerequisite gates before doing anything -- the
    /// caller's own ordering check is not trusted. Individual task failures
    /// are recorded and reported, and the terminal `completed_at` stamp is
    /// written regardless.
    pub async fn run(&self, employee_id: &Uuid) -> Result<FinalTaskReport, EngineError> {
        let employee = self
            .repo
            .get(employee_id)
            .await
            .map_err(|e| EngineError::Repository(e.to_string()))?
            .ok_or(EngineError::EmployeeNotFound(*employee_id))?;

        let missing = employee.onboarding.missing(&pipeline::FINAL_GATES);
        if !missing.is_empty() {
            tracing::error!(
                employee_id = %employee.id,
                ?missing,
                "final fan-out invoked with unsatisfied gates"
            );
            return Err(EngineError::PreconditionViolation {
                stage: "final_tasks".to_string(),
                missing,
            });
        }

        tracing::info!(
            employee_id = %employee.id,
            "all prerequisite gates verified, running final provisioning tasks"
        );

        let (slack, jira, call) = tokio::join!(
            self.run_task(&employee, FinalTask::SlackInvite),
            self.run_task(&employee, FinalTask::JiraAccess),
            self.run_task(&employee, FinalTask::OnboardingCall),
        );

        let mut errors = Vec::new();
        for result in [&slack, &jira, &call] {
            if let Err(e) = result {
                errors.push(e.clone());
            }
        }

        // Terminal state is reached regardless of task failures: final
        // provisioning is best-effort once the compliance gates are met.
        self.repo
            .mark_onboarding_complete(&employee.id, Utc::now())
            .await
            .map_err(|e| EngineError::Repository(e.to_string()))?;

        let report = FinalTaskReport {
            slack: slack.is_ok(),
            jira: jira.is_ok(),
            call: call.is_ok(),
            errors,
        };

        tracing::info!(
            employee_id = %employee.id,
            slack = report.slack,
            jira = report.jira,
            call = report.call,
            "onboarding pipeline completed"
        );

        Ok(report)
    }

    async fn run_task(&self, employee: &Employee, task: FinalTask) -> Result<(), String> {
        let step = task.step();

        // Duplicate invocation: an already-provisioned task is not redone.
        if employee.onboarding.status(step) == StepStatus::Completed {
            return Ok(());
        }

        let content = match task {
            FinalTask::SlackInvite => templates::slack_invite(&employee.name),
            FinalTask::JiraAccess => templates::jira_access(&employee.name),
            FinalTask::OnboardingCall => {
                templates::onboarding_call(&employee.name, &self.scheduling_link)
            }
        };

        match send_and_log(
            self.repo.as_ref(),
            self.email.as_ref(),
            employee,
            task.template(),
            task.subject(),
            &content,
        )
        .await
        {
            Ok(()) => {
                self.repo
                    .update_step_status(&employee.id, step, StepStatus::Completed)
                    .await
                    .map_err(|e| format!("{step}: {e}"))?;
                Ok(())
            }
            Err(e) => {
                let _ = self
                    .repo
                    .update_step_status(&employee.id, step, StepStatus::Failed)
                    .await;
                Err(format!("{step}: {e}"))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::testing::{
        seed_employee, InMemoryEmployeeRepository, MockEmailClient,
    };

    fn runner(
        repo: Arc<InMemoryEmployeeRepository>,
        email: Arc<MockEmailClient>,
    ) -> FinalTaskRunner<InMemoryEmployeeRepository, MockEmailClient> {
        FinalTaskRunner::new(repo, email, "https://calendly.example.com/hr".to_string())
    }

    async fn satisfy_all_gates(repo: &InMemoryEmployeeRepository, id: &Uuid) {
        for step in pipeline::ORDERED_STEPS {
            repo.update_step_status(id, step, StepStatus::Completed)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn refuses_to_run_with_unsatisfied_gates() {
        let repo = Arc::new(InMemoryEmployeeRepository::new());
        let email = Arc::new(MockEmailClient::new());
        let id = seed_employee(&repo).await;

        let err = runner(Arc::clone(&repo), email)
            .run(&id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PreconditionViolation { .. }));

        // Nothing was provisioned and no terminal stamp was written.
        let employee = repo.get(&id).await.unwrap().unwrap();
        assert!(employee.onboarding.completed_at.is_none());
        assert_eq!(
            employee.onboarding.status(StepName::SlackInviteSent),
            StepStatus::NotStarted
        );
    }

    #[tokio::test]
    async fn all_tasks_succeed() {
        let repo = Arc::new(InMemoryEmployeeRepository::new());
        let email = Arc::new(MockEmailClient::new());
        let id = seed_employee(&repo).await;
        satisfy_all_gates(&repo, &id).await;

        let report = runner(Arc::clone(&repo), Arc::clone(&email))
            .run(&id)
            .await
            .unwrap();

        assert_eq!(
            report,
            FinalTaskReport {
                slack: true,
                jira: true,
                call: true,
                errors: vec![]
            }
        );
        assert_eq!(email.sent_count(), 3);

        let employee = repo.get(&id).await.unwrap().unwrap();
        assert!(employee.onboarding.completed_at.is_some());
        for step in pipeline::FINAL_TASK_STEPS {
            assert_eq!(employee.onboarding.status(step), StepStatus::Completed);
        }
    }

    #[tokio::test]
    async fn one_failure_is_isolated() {
        let repo = Arc::new(InMemoryEmployeeRepository::new());
        let email = Arc::new(MockEmailClient::new());
        email.fail_template("jira_access");
        let id = seed_employee(&repo).await;
        satisfy_all_gates(&repo, &id).await;

        let report = runner(Arc::clone(&repo), Arc::clone(&email))
            .run(&id)
            .await
            .unwrap();

        assert!(report.slack);
        assert!(!report.jira);
        assert!(report.call);
        assert_eq!(report.errors.len(), 1);

        let employee = repo.get(&id).await.unwrap().unwrap();
        // Terminal state is still reached.
        assert!(employee.onboarding.completed_at.is_some());
        assert_eq!(
            employee.onboarding.status(StepName::JiraAccessGranted),
            StepStatus::Failed
        );
        assert_eq!(
            employee.onboarding.status(StepName::SlackInviteSent),
            StepStatus::Completed
        );
    }

    #[tokio::test]
    async fn completed_tasks_are_not_redone() {
        let repo = Arc::new(InMemoryEmployeeRepository::new());
        let email = Arc::new(MockEmailClient::new());
        let id = seed_employee(&repo).await;
        satisfy_all_gates(&repo, &id).await;
        repo.update_step_status(&id, StepName::SlackInviteSent, StepStatus::Completed)
            .await
            .unwrap();

        let report = runner(Arc::clone(&repo), Arc::clone(&email))
            .run(&id)
            .await
            .unwrap();

        assert!(report.slack);
        // Only the two remaining tasks sent email.
        assert_eq!(email.sent_count(), 2);
    }

    #[test]
    fn report_from_record_reflects_statuses() {
        let mut record = StepStatusRecord::new();
        record.set_status(StepName::SlackInviteSent, StepStatus::Completed);
        record.set_status(StepName::JiraAccessGranted, StepStatus::Failed);
        record.set_status(StepName::OnboardingCallScheduled, StepStatus::Completed);

        let report = FinalTaskReport::from_record(&record);
        assert!(report.slack);
        assert!(!report.jira);
        assert!(report.call);
    }
}

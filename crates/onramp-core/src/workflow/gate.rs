//! Gate evaluation: has the external confirming event arrived?
//!
//! A gate corresponds 1:1 to a `*_signed` or `*_quiz_passed` step. The
//! evaluator is a pure read against the status store -- it never triggers
//! side effects and enforces no timeout; a subject may remain suspended at
//! a gate indefinitely.

use std::sync::Arc;

use onramp_types::onboarding::{StepName, StepStatus};
use uuid::Uuid;

use crate::repository::employee::EmployeeRepository;

use super::engine::EngineError;

/// Decides whether a gate has been satisfied by an external event.
pub struct GateEvaluator<R> {
    repo: Arc<R>,
}

impl<R: EmployeeRepository> GateEvaluator<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// True when the gate step has been recorded `completed`.
    ///
    /// Reads the persisted record fresh on every call so that the answer
    /// reflects webhook deliveries that happened out of band.
    pub async fn is_satisfied(
        &self,
        employee_id: &Uuid,
        gate: StepName,
    ) -> Result<bool, EngineError> {
        let employee = self
            .repo
            .get(employee_id)
            .await
            .map_err(|e| EngineError::Repository(e.to_string()))?
            .ok_or(EngineError::EmployeeNotFound(*employee_id))?;

        Ok(employee.onboarding.status(gate) == StepStatus::Completed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::testing::{seed_employee, InMemoryEmployeeRepository};
    use onramp_types::onboarding::StepStatus;

    #[tokio::test]
    async fn unsatisfied_until_completed() {
        let repo = Arc::new(InMemoryEmployeeRepository::new());
        let id = seed_employee(&repo).await;
        let gates = GateEvaluator::new(Arc::clone(&repo));

        assert!(!gates
            .is_satisfied(&id, StepName::PolicySigned)
            .await
            .unwrap());

        // Waiting is not satisfied either.
        repo.update_step_status(&id, StepName::PolicySigned, StepStatus::Waiting)
            .await
            .unwrap();
        assert!(!gates
            .is_satisfied(&id, StepName::PolicySigned)
            .await
            .unwrap());

        repo.update_step_status(&id, StepName::PolicySigned, StepStatus::Completed)
            .await
            .unwrap();
        assert!(gates
            .is_satisfied(&id, StepName::PolicySigned)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unknown_employee_is_an_error() {
        let repo = Arc::new(InMemoryEmployeeRepository::new());
        let gates = GateEvaluator::new(repo);
        let err = gates
            .is_satisfied(&Uuid::now_v7(), StepName::PolicySigned)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::EmployeeNotFound(_)));
    }
}

//! Employee domain model.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EmployeeError;
use crate::onboarding::{
    DocumentDispatch, DocumentKind, EmailLogEntry, QuizAttempt, StepStatusRecord,
};

/// An employee progressing through the onboarding pipeline.
///
/// The employee row is the unit of persistence: identity and profile
/// fields, the step-status record, quiz-attempt history, the email audit
/// log, document dispatch records, and the workflow-instance token all
/// live on the same record so that a restart loses nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    /// UUIDv7 assigned at creation.
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub department: String,
    pub start_date: NaiveDate,
    /// Durable per-step onboarding state.
    pub onboarding: StepStatusRecord,
    /// Workflow-instance token, assigned when onboarding starts. Persisted
    /// here (not in a process-local table) so resume survives restarts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_token: Option<Uuid>,
    /// Quiz attempts, recorded regardless of pass/fail.
    #[serde(default)]
    pub quiz_attempts: Vec<QuizAttempt>,
    /// Audit trail of notification email attempts.
    #[serde(default)]
    pub email_log: Vec<EmailLogEntry>,
    /// Document dispatch records keyed by document kind.
    #[serde(default)]
    pub documents: HashMap<DocumentKind, DocumentDispatch>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a new employee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEmployeeRequest {
    pub email: String,
    pub name: String,
    pub role: String,
    pub department: String,
    /// Start date in `YYYY-MM-DD` form.
    pub start_date: String,
}

impl CreateEmployeeRequest {
    /// Validate the request, returning the parsed start date.
    ///
    /// Checks the email has a plausible `local@domain` shape and that the
    /// start date parses as `YYYY-MM-DD`.
    pub fn validate(&self) -> Result<NaiveDate, EmployeeError> {
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err(EmployeeError::InvalidEmail(self.email.clone())),
        }
        if self.name.trim().is_empty() {
            return Err(EmployeeError::InvalidName("name must not be empty".to_string()));
        }
        NaiveDate::parse_from_str(&self.start_date, "%Y-%m-%d")
            .map_err(|_| EmployeeError::InvalidStartDate(self.start_date.clone()))
    }
}

impl Employee {
    /// Construct a new employee from a validated create request.
    pub fn from_request(request: &CreateEmployeeRequest, start_date: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            email: request.email.trim().to_string(),
            name: request.name.trim().to_string(),
            role: request.role.clone(),
            department: request.department.clone(),
            start_date,
            onboarding: StepStatusRecord::new(),
            workflow_token: None,
            quiz_attempts: Vec::new(),
            email_log: Vec::new(),
            documents: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::{StepName, StepStatus};

    fn sample_request() -> CreateEmployeeRequest {
        CreateEmployeeRequest {
            email: "dana@example.com".to_string(),
            name: "Dana Reyes".to_string(),
            role: "Backend Engineer".to_string(),
            department: "Platform".to_string(),
            start_date: "2026-09-01".to_string(),
        }
    }

    #[test]
    fn validate_accepts_well_formed_request() {
        let date = sample_request().validate().unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 9, 1).unwrap());
    }

    #[test]
    fn validate_rejects_bad_email() {
        for bad in ["not-an-email", "@example.com", "dana@localhost", ""] {
            let mut req = sample_request();
            req.email = bad.to_string();
            assert!(
                matches!(req.validate(), Err(EmployeeError::InvalidEmail(_))),
                "expected InvalidEmail for {bad:?}"
            );
        }
    }

    #[test]
    fn validate_rejects_bad_start_date() {
        for bad in ["09/01/2026", "2026-13-01", "soon", ""] {
            let mut req = sample_request();
            req.start_date = bad.to_string();
            assert!(
                matches!(req.validate(), Err(EmployeeError::InvalidStartDate(_))),
                "expected InvalidStartDate for {bad:?}"
            );
        }
    }

    #[test]
    fn validate_rejects_blank_name() {
        let mut req = sample_request();
        req.name = "   ".to_string();
        assert!(matches!(req.validate(), Err(EmployeeError::InvalidName(_))));
    }

    #[test]
    fn from_request_initializes_empty_onboarding() {
        let req = sample_request();
        let date = req.validate().unwrap();
        let employee = Employee::from_request(&req, date);

        assert_eq!(employee.email, "dana@example.com");
        assert!(employee.workflow_token.is_none());
        assert!(employee.quiz_attempts.is_empty());
        assert!(employee.documents.is_empty());
        assert_eq!(
            employee.onboarding.status(StepName::PolicySent),
            StepStatus::NotStarted
        );
    }

    #[test]
    fn employee_json_roundtrip() {
        let req = sample_request();
        let date = req.validate().unwrap();
        let mut employee = Employee::from_request(&req, date);
        employee.workflow_token = Some(Uuid::now_v7());
        employee
            .onboarding
            .set_status(StepName::PolicySent, StepStatus::Completed);

        let json = serde_json::to_string(&employee).unwrap();
        assert!(json.contains("\"start_date\":\"2026-09-01\""));

        let parsed: Employee = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, employee.id);
        assert_eq!(parsed.workflow_token, employee.workflow_token);
        assert_eq!(
            parsed.onboarding.status(StepName::PolicySent),
            StepStatus::Completed
        );
    }
}

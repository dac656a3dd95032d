//! Employee service: enrollment-side operations.
//!
//! Validated creation (with duplicate-email rejection), lookup by id or
//! workflow token, and listing. Workflow advancement is the engine's job;
//! this service only manages the employee records themselves.

use std::sync::Arc;

use onramp_types::employee::{CreateEmployeeRequest, Employee};
use onramp_types::error::{EmployeeError, RepositoryError};
use uuid::Uuid;

use crate::repository::employee::EmployeeRepository;

/// Service for employee record management.
pub struct EmployeeService<R> {
    repo: Arc<R>,
}

impl<R: EmployeeRepository> EmployeeService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Create a new employee.
    ///
    /// Validates the request and rejects duplicate email addresses.
    pub async fn create(&self, request: CreateEmployeeRequest) -> Result<Employee, EmployeeError> {
        let start_date = request.validate()?;

        let email = request.email.trim();
        if self
            .repo
            .get_by_email(email)
            .await
            .map_err(storage)?
            .is_some()
        {
            return Err(EmployeeError::EmailConflict(email.to_string()));
        }

        let employee = Employee::from_request(&request, start_date);
        self.repo.create(&employee).await.map_err(|e| match e {
            RepositoryError::Conflict(email) => EmployeeError::EmailConflict(email),
            other => storage(other),
        })?;

        tracing::info!(
            employee_id = %employee.id,
            email = employee.email.as_str(),
            "employee created"
        );
        Ok(employee)
    }

    /// Get an employee by id.
    pub async fn get(&self, id: &Uuid) -> Result<Employee, EmployeeError> {
        self.repo
            .get(id)
            .await
            .map_err(storage)?
            .ok_or(EmployeeError::NotFound)
    }

    /// Get an employee by workflow-instance token.
    pub async fn get_by_token(&self, token: &Uuid) -> Result<Employee, EmployeeError> {
        self.repo
            .get_by_token(token)
            .await
            .map_err(storage)?
            .ok_or(EmployeeError::NotFound)
    }

    /// List all employees.
    pub async fn list(&self) -> Result<Vec<Employee>, EmployeeError> {
        self.repo.list().await.map_err(storage)
    }
}

fn storage(e: RepositoryError) -> EmployeeError {
    EmployeeError::StorageError(e.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::testing::InMemoryEmployeeRepository;

    fn service() -> EmployeeService<InMemoryEmployeeRepository> {
        EmployeeService::new(Arc::new(InMemoryEmployeeRepository::new()))
    }

    fn request(email: &str) -> CreateEmployeeRequest {
        CreateEmployeeRequest {
            email: email.to_string(),
            name: "Dana Reyes".to_string(),
            role: "Backend Engineer".to_string(),
            department: "Platform".to_string(),
            start_date: "2026-09-01".to_string(),
        }
    }

    #[tokio::test]
    async fn create_and_get() {
        let service = service();
        let employee = service.create(request("dana@example.com")).await.unwrap();

        let loaded = service.get(&employee.id).await.unwrap();
        assert_eq!(loaded.email, "dana@example.com");
        assert!(loaded.workflow_token.is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let service = service();
        service.create(request("dana@example.com")).await.unwrap();

        let err = service
            .create(request("dana@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, EmployeeError::EmailConflict(_)));
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_storage() {
        let service = service();
        let mut bad = request("dana@example.com");
        bad.start_date = "tomorrow".to_string();

        let err = service.create(bad).await.unwrap_err();
        assert!(matches!(err, EmployeeError::InvalidStartDate(_)));
        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let service = service();
        let err = service.get(&Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, EmployeeError::NotFound));
    }

    #[tokio::test]
    async fn lookup_by_token() {
        let repo = Arc::new(InMemoryEmployeeRepository::new());
        let service = EmployeeService::new(Arc::clone(&repo));
        let employee = service.create(request("kim@example.com")).await.unwrap();

        // No token assigned yet.
        assert!(matches!(
            service.get_by_token(&Uuid::now_v7()).await.unwrap_err(),
            EmployeeError::NotFound
        ));

        let token = Uuid::now_v7();
        repo.begin_onboarding(&employee.id, token, chrono::Utc::now())
            .await
            .unwrap();
        let loaded = service.get_by_token(&token).await.unwrap();
        assert_eq!(loaded.id, employee.id);
    }
}

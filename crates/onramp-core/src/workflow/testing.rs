//! Shared test doubles for the workflow engine: an in-memory repository
//! and counting delivery-client fakes.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use onramp_types::employee::{CreateEmployeeRequest, Employee};
use onramp_types::error::RepositoryError;
use onramp_types::onboarding::{
    DocumentDispatch, DocumentKind, EmailLogEntry, QuizAttempt, StepName, StepStatus,
};
use uuid::Uuid;

use crate::repository::employee::EmployeeRepository;

use super::engine::WorkflowEngine;
use super::executor::{DeliveryError, DocumentClient, EmailClient};

// ---------------------------------------------------------------------------
// In-memory repository
// ---------------------------------------------------------------------------

pub(crate) struct InMemoryEmployeeRepository {
    employees: Mutex<HashMap<Uuid, Employee>>,
}

impl InMemoryEmployeeRepository {
    pub(crate) fn new() -> Self {
        Self {
            employees: Mutex::new(HashMap::new()),
        }
    }

    fn with_employee<T>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut Employee) -> T,
    ) -> Result<T, RepositoryError> {
        let mut employees = self.employees.lock().unwrap();
        let employee = employees.get_mut(id).ok_or(RepositoryError::NotFound)?;
        let result = f(employee);
        employee.updated_at = Utc::now();
        Ok(result)
    }

    /// Test-only: overwrite a step status bypassing the completed-is-
    /// terminal guard, to stage crash-recovery scenarios.
    pub(crate) async fn force_step_status(&self, id: &Uuid, step: StepName, status: StepStatus) {
        self.with_employee(id, |e| {
            e.onboarding.statuses.insert(step, status);
        })
        .unwrap();
    }
}

impl EmployeeRepository for InMemoryEmployeeRepository {
    async fn create(&self, employee: &Employee) -> Result<(), RepositoryError> {
        let mut employees = self.employees.lock().unwrap();
        if employees.values().any(|e| e.email == employee.email) {
            return Err(RepositoryError::Conflict(employee.email.clone()));
        }
        employees.insert(employee.id, employee.clone());
        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Employee>, RepositoryError> {
        Ok(self.employees.lock().unwrap().get(id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Employee>, RepositoryError> {
        Ok(self
            .employees
            .lock()
            .unwrap()
            .values()
            .find(|e| e.email == email)
            .cloned())
    }

    async fn get_by_token(&self, token: &Uuid) -> Result<Option<Employee>, RepositoryError> {
        Ok(self
            .employees
            .lock()
            .unwrap()
            .values()
            .find(|e| e.workflow_token == Some(*token))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Employee>, RepositoryError> {
        let mut all: Vec<Employee> = self.employees.lock().unwrap().values().cloned().collect();
        all.sort_by_key(|e| e.created_at);
        Ok(all)
    }

    async fn list_in_flight(&self) -> Result<Vec<Employee>, RepositoryError> {
        Ok(self
            .employees
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.workflow_token.is_some() && e.onboarding.completed_at.is_none())
            .cloned()
            .collect())
    }

    async fn update_step_status(
        &self,
        id: &Uuid,
        step: StepName,
        status: StepStatus,
    ) -> Result<bool, RepositoryError> {
        self.with_employee(id, |e| e.onboarding.set_status(step, status))
    }

    async fn record_step_attempt(&self, id: &Uuid, step: StepName) -> Result<u32, RepositoryError> {
        self.with_employee(id, |e| e.onboarding.record_attempt(step))
    }

    async fn record_document_dispatch(
        &self,
        id: &Uuid,
        document: DocumentKind,
        dispatch: &DocumentDispatch,
    ) -> Result<(), RepositoryError> {
        self.with_employee(id, |e| {
            e.documents.insert(document, dispatch.clone());
        })
    }

    async fn append_quiz_attempt(
        &self,
        id: &Uuid,
        attempt: &QuizAttempt,
    ) -> Result<(), RepositoryError> {
        self.with_employee(id, |e| e.quiz_attempts.push(attempt.clone()))
    }

    async fn append_email_log(
        &self,
        id: &Uuid,
        entry: &EmailLogEntry,
    ) -> Result<(), RepositoryError> {
        self.with_employee(id, |e| e.email_log.push(entry.clone()))
    }

    async fn begin_onboarding(
        &self,
        id: &Uuid,
        token: Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.with_employee(id, |e| {
            e.workflow_token = Some(token);
            e.onboarding.started_at = Some(started_at);
            e.onboarding.last_updated = started_at;
        })
    }

    async fn mark_onboarding_complete(
        &self,
        id: &Uuid,
        completed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.with_employee(id, |e| {
            if e.onboarding.completed_at.is_none() {
                e.onboarding.completed_at = Some(completed_at);
                e.onboarding.last_updated = completed_at;
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Delivery client fakes
// ---------------------------------------------------------------------------

pub(crate) struct MockDocumentClient {
    sent: Mutex<Vec<(Uuid, DocumentKind)>>,
    fail_remaining: AtomicU32,
}

impl MockDocumentClient {
    pub(crate) fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_remaining: AtomicU32::new(0),
        }
    }

    /// Make the next `count` sends fail with a transport error.
    pub(crate) fn fail_next(&self, count: u32) {
        self.fail_remaining.store(count, Ordering::SeqCst);
    }

    pub(crate) fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub(crate) fn sent_documents(&self) -> Vec<DocumentKind> {
        self.sent.lock().unwrap().iter().map(|(_, d)| *d).collect()
    }
}

impl DocumentClient for MockDocumentClient {
    async fn send_document(
        &self,
        employee: &Employee,
        document: DocumentKind,
    ) -> Result<DocumentDispatch, DeliveryError> {
        if self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(DeliveryError::Transport("connection refused".to_string()));
        }

        let mut sent = self.sent.lock().unwrap();
        sent.push((employee.id, document));
        Ok(DocumentDispatch {
            tracking_id: format!("trk-{}-{}", document, sent.len()),
            signing_url: format!("https://esign.test/sign/{document}"),
            simulated: false,
            dispatched_at: Utc::now(),
        })
    }
}

pub(crate) struct MockEmailClient {
    sent: Mutex<Vec<(String, String, String)>>,
    failing_templates: Mutex<HashSet<String>>,
}

impl MockEmailClient {
    pub(crate) fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing_templates: Mutex::new(HashSet::new()),
        }
    }

    /// Make every send using `template` fail.
    pub(crate) fn fail_template(&self, template: &str) {
        self.failing_templates
            .lock()
            .unwrap()
            .insert(template.to_string());
    }

    /// Number of successfully delivered emails.
    pub(crate) fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl EmailClient for MockEmailClient {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        _content: &str,
        template: &str,
    ) -> Result<(), DeliveryError> {
        if self.failing_templates.lock().unwrap().contains(template) {
            return Err(DeliveryError::Status { status: 503 });
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), template.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub(crate) struct TestEngine {
    pub(crate) repo: Arc<InMemoryEmployeeRepository>,
    pub(crate) documents: Arc<MockDocumentClient>,
    pub(crate) email: Arc<MockEmailClient>,
    pub(crate) engine:
        Arc<WorkflowEngine<InMemoryEmployeeRepository, MockDocumentClient, MockEmailClient>>,
}

pub(crate) fn build_engine() -> TestEngine {
    let repo = Arc::new(InMemoryEmployeeRepository::new());
    let documents = Arc::new(MockDocumentClient::new());
    let email = Arc::new(MockEmailClient::new());
    let engine = Arc::new(WorkflowEngine::new(
        Arc::clone(&repo),
        Arc::clone(&documents),
        Arc::clone(&email),
        "https://calendly.test/hr/onboarding".to_string(),
    ));
    TestEngine {
        repo,
        documents,
        email,
        engine,
    }
}

/// Insert a fresh employee and return its id.
pub(crate) async fn seed_employee(repo: &InMemoryEmployeeRepository) -> Uuid {
    let request = CreateEmployeeRequest {
        email: format!("employee-{}@example.com", Uuid::now_v7()),
        name: "Dana Reyes".to_string(),
        role: "Backend Engineer".to_string(),
        department: "Platform".to_string(),
        start_date: "2026-09-01".to_string(),
    };
    let start_date = request.validate().unwrap();
    let employee = Employee::from_request(&request, start_date);
    let id = employee.id;
    repo.create(&employee).await.unwrap();
    id
}

//! SQLite employee repository implementation.
//!
//! Implements `EmployeeRepository` from `onramp-core` using sqlx with split
//! read/write pools. The onboarding record, quiz attempts, email log, and
//! document dispatches are stored as JSON blobs on the employee row.
//!
//! Status transitions are single `UPDATE ... json_set ... WHERE` statements
//! guarded by the current value, so per-subject read-modify-write is atomic
//! even when the engine and a webhook delivery race on the same employee.

use chrono::{DateTime, NaiveDate, Utc};
use onramp_core::repository::employee::EmployeeRepository;
use onramp_types::employee::Employee;
use onramp_types::error::RepositoryError;
use onramp_types::onboarding::{
    DocumentDispatch, DocumentKind, EmailLogEntry, QuizAttempt, StepName, StepStatus,
};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `EmployeeRepository`.
pub struct SqliteEmployeeRepository {
    pool: DatabasePool,
}

impl SqliteEmployeeRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn exists(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT 1 FROM employees WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(row.is_some())
    }
}

// ---------------------------------------------------------------------------
// Internal row type
// ---------------------------------------------------------------------------

struct EmployeeRow {
    id: String,
    email: String,
    name: String,
    role: String,
    department: String,
    start_date: String,
    workflow_token: Option<String>,
    onboarding: String,
    quiz_attempts: String,
    email_log: String,
    documents: String,
    created_at: String,
    updated_at: String,
}

impl EmployeeRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            role: row.try_get("role")?,
            department: row.try_get("department")?,
            start_date: row.try_get("start_date")?,
            workflow_token: row.try_get("workflow_token")?,
            onboarding: row.try_get("onboarding")?,
            quiz_attempts: row.try_get("quiz_attempts")?,
            email_log: row.try_get("email_log")?,
            documents: row.try_get("documents")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_employee(self) -> Result<Employee, RepositoryError> {
        let id = parse_uuid(&self.id)?;
        let workflow_token = self
            .workflow_token
            .as_deref()
            .map(parse_uuid)
            .transpose()?;

        let start_date = NaiveDate::parse_from_str(&self.start_date, "%Y-%m-%d")
            .map_err(|e| RepositoryError::Query(format!("invalid start_date: {e}")))?;

        let onboarding = serde_json::from_str(&self.onboarding)
            .map_err(|e| RepositoryError::Query(format!("invalid onboarding JSON: {e}")))?;
        let quiz_attempts = serde_json::from_str(&self.quiz_attempts)
            .map_err(|e| RepositoryError::Query(format!("invalid quiz_attempts JSON: {e}")))?;
        let email_log = serde_json::from_str(&self.email_log)
            .map_err(|e| RepositoryError::Query(format!("invalid email_log JSON: {e}")))?;
        let documents = serde_json::from_str(&self.documents)
            .map_err(|e| RepositoryError::Query(format!("invalid documents JSON: {e}")))?;

        Ok(Employee {
            id,
            email: self.email,
            name: self.name,
            role: self.role,
            department: self.department,
            start_date,
            onboarding,
            workflow_token,
            quiz_attempts,
            email_log,
            documents,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn status_path(step: StepName) -> String {
    format!("$.statuses.{}", step.as_str())
}

fn attempt_path(step: StepName) -> String {
    format!("$.attempts.{}", step.as_str())
}

fn query_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

async fn fetch_employee(
    pool: &DatabasePool,
    sql: &str,
    bind: &str,
) -> Result<Option<Employee>, RepositoryError> {
    let row = sqlx::query(sql)
        .bind(bind)
        .fetch_optional(&pool.reader)
        .await
        .map_err(query_err)?;

    match row {
        Some(row) => {
            let r = EmployeeRow::from_row(&row).map_err(query_err)?;
            Ok(Some(r.into_employee()?))
        }
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// EmployeeRepository impl
// ---------------------------------------------------------------------------

impl EmployeeRepository for SqliteEmployeeRepository {
    async fn create(&self, employee: &Employee) -> Result<(), RepositoryError> {
        let onboarding = serde_json::to_string(&employee.onboarding)
            .map_err(|e| RepositoryError::Query(format!("serialize onboarding: {e}")))?;
        let quiz_attempts = serde_json::to_string(&employee.quiz_attempts)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let email_log = serde_json::to_string(&employee.email_log)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let documents = serde_json::to_string(&employee.documents)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO employees
               (id, email, name, role, department, start_date, workflow_token,
                onboarding, quiz_attempts, email_log, documents, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(employee.id.to_string())
        .bind(&employee.email)
        .bind(&employee.name)
        .bind(&employee.role)
        .bind(&employee.department)
        .bind(employee.start_date.format("%Y-%m-%d").to_string())
        .bind(employee.workflow_token.map(|t| t.to_string()))
        .bind(&onboarding)
        .bind(&quiz_attempts)
        .bind(&email_log)
        .bind(&documents)
        .bind(format_datetime(&employee.created_at))
        .bind(format_datetime(&employee.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE") {
                RepositoryError::Conflict(employee.email.clone())
            } else {
                RepositoryError::Query(e.to_string())
            }
        })?;

        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Employee>, RepositoryError> {
        fetch_employee(
            &self.pool,
            "SELECT * FROM employees WHERE id = ?",
            &id.to_string(),
        )
        .await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Employee>, RepositoryError> {
        fetch_employee(&self.pool, "SELECT * FROM employees WHERE email = ?", email).await
    }

    async fn get_by_token(&self, token: &Uuid) -> Result<Option<Employee>, RepositoryError> {
        fetch_employee(
            &self.pool,
            "SELECT * FROM employees WHERE workflow_token = ?",
            &token.to_string(),
        )
        .await
    }

    async fn list(&self) -> Result<Vec<Employee>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM employees ORDER BY created_at ASC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut employees = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = EmployeeRow::from_row(row).map_err(query_err)?;
            employees.push(r.into_employee()?);
        }
        Ok(employees)
    }

    async fn list_in_flight(&self) -> Result<Vec<Employee>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM employees
               WHERE workflow_token IS NOT NULL
                 AND json_extract(onboarding, '$.completed_at') IS NULL
               ORDER BY created_at ASC"#,
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let mut employees = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = EmployeeRow::from_row(row).map_err(query_err)?;
            employees.push(r.into_employee()?);
        }
        Ok(employees)
    }

    async fn update_step_status(
        &self,
        id: &Uuid,
        step: StepName,
        status: StepStatus,
    ) -> Result<bool, RepositoryError> {
        let path = status_path(step);
        let now = format_datetime(&Utc::now());

        // Single guarded statement: the completed-is-terminal invariant is
        // enforced here, atomically, not just in memory.
        let result = sqlx::query(
            r#"UPDATE employees
               SET onboarding = json_set(onboarding, ?, ?, '$.last_updated', ?),
                   updated_at = ?
               WHERE id = ?
                 AND COALESCE(json_extract(onboarding, ?), 'not_started') != 'completed'"#,
        )
        .bind(&path)
        .bind(status.as_str())
        .bind(&now)
        .bind(&now)
        .bind(id.to_string())
        .bind(&path)
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        if self.exists(id).await? {
            // Step already completed; the write was refused.
            Ok(false)
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    async fn record_step_attempt(&self, id: &Uuid, step: StepName) -> Result<u32, RepositoryError> {
        let path = attempt_path(step);
        let now = format_datetime(&Utc::now());

        let result = sqlx::query(
            r#"UPDATE employees
               SET onboarding = json_set(onboarding, ?,
                       COALESCE(json_extract(onboarding, ?), 0) + 1,
                       '$.last_updated', ?),
                   updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&path)
        .bind(&path)
        .bind(&now)
        .bind(&now)
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        let row = sqlx::query("SELECT COALESCE(json_extract(onboarding, ?), 0) AS n FROM employees WHERE id = ?")
            .bind(&path)
            .bind(id.to_string())
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_err)?;
        let count: i64 = row.try_get("n").map_err(query_err)?;
        Ok(count as u32)
    }

    async fn record_document_dispatch(
        &self,
        id: &Uuid,
        document: DocumentKind,
        dispatch: &DocumentDispatch,
    ) -> Result<(), RepositoryError> {
        let path = format!("$.{}", document.as_str());
        let value = serde_json::to_string(dispatch)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let now = format_datetime(&Utc::now());

        let result = sqlx::query(
            "UPDATE employees SET documents = json_set(documents, ?, json(?)), updated_at = ? WHERE id = ?",
        )
        .bind(&path)
        .bind(&value)
        .bind(&now)
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn append_quiz_attempt(
        &self,
        id: &Uuid,
        attempt: &QuizAttempt,
    ) -> Result<(), RepositoryError> {
        let value = serde_json::to_string(attempt)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let now = format_datetime(&Utc::now());

        let result = sqlx::query(
            "UPDATE employees SET quiz_attempts = json_insert(quiz_attempts, '$[#]', json(?)), updated_at = ? WHERE id = ?",
        )
        .bind(&value)
        .bind(&now)
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn append_email_log(
        &self,
        id: &Uuid,
        entry: &EmailLogEntry,
    ) -> Result<(), RepositoryError> {
        let value = serde_json::to_string(entry)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let now = format_datetime(&Utc::now());

        let result = sqlx::query(
            "UPDATE employees SET email_log = json_insert(email_log, '$[#]', json(?)), updated_at = ? WHERE id = ?",
        )
        .bind(&value)
        .bind(&now)
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn begin_onboarding(
        &self,
        id: &Uuid,
        token: Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let started = format_datetime(&started_at);

        let result = sqlx::query(
            r#"UPDATE employees
               SET workflow_token = ?,
                   onboarding = json_set(onboarding, '$.started_at', ?, '$.last_updated', ?),
                   updated_at = ?
               WHERE id = ?"#,
        )
        .bind(token.to_string())
        .bind(&started)
        .bind(&started)
        .bind(&started)
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn mark_onboarding_complete(
        &self,
        id: &Uuid,
        completed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let completed = format_datetime(&completed_at);

        let result = sqlx::query(
            r#"UPDATE employees
               SET onboarding = json_set(onboarding, '$.completed_at', ?, '$.last_updated', ?),
                   updated_at = ?
               WHERE id = ?
                 AND json_extract(onboarding, '$.completed_at') IS NULL"#,
        )
        .bind(&completed)
        .bind(&completed)
        .bind(&completed)
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 && !self.exists(id).await? {
            return Err(RepositoryError::NotFound);
        }
        // Already-completed records keep their original stamp.
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

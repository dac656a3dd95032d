//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST
//! API. The engine, dispatcher, and services are generic over the
//! repository and delivery-client traits, but AppState pins them to the
//! concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;

use onramp_core::service::employee::EmployeeService;
use onramp_core::workflow::engine::WorkflowEngine;
use onramp_core::workflow::resume::ResumeDispatcher;
use onramp_infra::config::{load_global_config, resolve_data_dir};
use onramp_infra::email::WebhookEmailClient;
use onramp_infra::esign::EsignClient;
use onramp_infra::sqlite::employee::SqliteEmployeeRepository;
use onramp_infra::sqlite::pool::DatabasePool;
use onramp_types::config::GlobalConfig;

/// Concrete type aliases for the generics pinned to infra implementations.
pub type ConcreteEngine =
    WorkflowEngine<SqliteEmployeeRepository, EsignClient, WebhookEmailClient>;

pub type ConcreteDispatcher =
    ResumeDispatcher<SqliteEmployeeRepository, EsignClient, WebhookEmailClient>;

pub type ConcreteEmployeeService = EmployeeService<SqliteEmployeeRepository>;

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub employee_service: Arc<ConcreteEmployeeService>,
    pub engine: Arc<ConcreteEngine>,
    pub dispatcher: Arc<ConcreteDispatcher>,
    pub config: GlobalConfig,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: connect to DB, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_global_config(&data_dir).await;

        // Initialize database
        let db_url = format!(
            "sqlite://{}?mode=rwc",
            data_dir.join("onramp.db").display()
        );
        let db_pool = DatabasePool::new(&db_url).await?;

        let repo = Arc::new(SqliteEmployeeRepository::new(db_pool.clone()));
        let documents = Arc::new(EsignClient::new(&config));
        let email = Arc::new(WebhookEmailClient::new(&config));

        let engine = Arc::new(WorkflowEngine::new(
            Arc::clone(&repo),
            documents,
            email,
            config.scheduling_link.clone(),
        ));
        let dispatcher = Arc::new(ResumeDispatcher::new(
            Arc::clone(&repo),
            Arc::clone(&engine),
        ));
        let employee_service = Arc::new(EmployeeService::new(repo));

        Ok(Self {
            employee_service,
            engine,
            dispatcher,
            config,
            data_dir,
            db_pool,
        })
    }
}

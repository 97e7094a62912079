use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;
use vitrine_agent::llm::{client_from_config, LlmError};
use vitrine_agent::runtime::ChatRuntime;
use vitrine_core::config::{AppConfig, ConfigError, LoadOptions};
use vitrine_core::knowledge::KnowledgeLoader;
use vitrine_db::{connection::connect_with_config, migrations, DbPool, SqlEventSink};

use crate::chat::ChatState;
use crate::health::HealthState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub knowledge: Arc<KnowledgeLoader>,
    pub chat_state: ChatState,
}

impl Application {
    pub fn health_state(&self) -> HealthState {
        HealthState::new(self.db_pool.clone(), Arc::clone(&self.knowledge))
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm client setup failed: {0}")]
    Llm(#[source] LlmError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        llm_provider = config.llm.provider.as_str(),
        "starting application bootstrap"
    );

    let db_pool = connect_with_config(&config.database)
        .await
        .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let knowledge = Arc::new(KnowledgeLoader::from_config(&config.knowledge));
    let resource = knowledge.load().await;
    info!(
        event_name = "system.bootstrap.knowledge_loaded",
        correlation_id = "bootstrap",
        kb_status = resource.status.as_str(),
        kb_source = resource.source_id.as_deref().unwrap_or("none"),
        kb_digest = %resource.digest,
        "knowledge resource resolved"
    );

    let llm = client_from_config(&config.llm).map_err(BootstrapError::Llm)?;
    let runtime = ChatRuntime::new(
        Arc::clone(&knowledge),
        llm,
        Duration::from_secs(config.llm.timeout_secs),
        config.llm.max_tokens,
    );
    let sink = Arc::new(SqlEventSink::new(db_pool.clone()));
    let chat_state = ChatState::new(Arc::new(runtime), sink, &config.chat);

    Ok(Application { config, db_pool, knowledge, chat_state })
}

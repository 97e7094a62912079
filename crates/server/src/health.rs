use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

use vitrine_core::knowledge::{KnowledgeLoader, KnowledgeStatus};
use vitrine_db::DbPool;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    knowledge: Arc<KnowledgeLoader>,
}

impl HealthState {
    pub fn new(db_pool: DbPool, knowledge: Arc<KnowledgeLoader>) -> Self {
        Self { db_pool, knowledge }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub knowledge: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

/// Readiness follows the database only. A missing knowledge file degrades
/// generative answers but the widget still serves deterministic replies.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let knowledge = knowledge_check(&state.knowledge).await;
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "vitrine-server runtime initialized".to_string(),
        },
        database,
        knowledge,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match vitrine_db::connection::ping(pool).await {
        Ok(()) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

async fn knowledge_check(loader: &KnowledgeLoader) -> HealthCheck {
    let resource = loader.load().await;
    let source = resource.source_id.as_deref().unwrap_or("none");
    match resource.status {
        KnowledgeStatus::Ok => HealthCheck {
            status: "ready",
            detail: format!("source={source} digest={}", resource.digest),
        },
        other => HealthCheck {
            status: "degraded",
            detail: format!("knowledge {} (source={source})", other.as_str()),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};
    use tempfile::TempDir;
    use vitrine_core::knowledge::KnowledgeLoader;
    use vitrine_db::connect_with_settings;

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_returns_ready_when_database_is_reachable() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("knowledge.txt");
        fs::write(&path, "Livraison 7 à 13 jours.").expect("write kb");
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");

        let state = HealthState::new(pool.clone(), Arc::new(KnowledgeLoader::new(vec![path])));
        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.database.status, "ready");
        assert_eq!(payload.knowledge.status, "ready");
        assert!(payload.knowledge.detail.contains("sha256:"));

        pool.close().await;
    }

    #[tokio::test]
    async fn missing_knowledge_degrades_the_check_but_not_readiness() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        let loader = KnowledgeLoader::new(vec!["/nonexistent/vitrine/knowledge.txt".into()]);

        let (status, Json(payload)) =
            health(State(HealthState::new(pool.clone(), Arc::new(loader)))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.knowledge.status, "degraded");
        assert!(payload.knowledge.detail.contains("missing"));

        pool.close().await;
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_database_is_unavailable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        pool.close().await;

        let loader = KnowledgeLoader::new(Vec::new());
        let (status, Json(payload)) =
            health(State(HealthState::new(pool, Arc::new(loader)))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.database.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }
}

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::Serialize;
use vitrine_core::config::{AppConfig, LlmProvider, LoadOptions};
use vitrine_core::knowledge::{KnowledgeLoader, KnowledgeResource, KnowledgeStatus};
use vitrine_db::connection::{connect_with_config, ping};

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

/// A missing knowledge file is a warning: the widget still answers support,
/// promo and catalog questions, it only withholds generative answers.
pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_llm_credentials(&config));
            match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => {
                    checks.push(runtime.block_on(check_knowledge(&config)));
                    checks.push(runtime.block_on(check_database_connectivity(&config)));
                }
                Err(error) => {
                    let details = format!("failed to initialize async runtime: {error}");
                    checks.push(DoctorCheck {
                        name: "knowledge_resource",
                        status: CheckStatus::Fail,
                        details: details.clone(),
                    });
                    checks.push(DoctorCheck {
                        name: "database_connectivity",
                        status: CheckStatus::Fail,
                        details,
                    });
                }
            }
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["llm_credentials", "knowledge_resource", "database_connectivity"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let failed = checks
        .iter()
        .any(|check| matches!(check.status, CheckStatus::Fail | CheckStatus::Skipped));
    let warned = checks.iter().any(|check| check.status == CheckStatus::Warn);
    let (overall_status, summary) = if failed {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    } else if warned {
        (CheckStatus::Warn, "doctor: ready with warnings")
    } else {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_llm_credentials(config: &AppConfig) -> DoctorCheck {
    let llm = &config.llm;
    let has_key =
        llm.api_key.as_ref().map(|key| !key.expose_secret().trim().is_empty()).unwrap_or(false);

    let (status, details) = match llm.provider {
        LlmProvider::Ollama => (
            CheckStatus::Pass,
            format!(
                "ollama model `{}` at {}",
                llm.model,
                llm.base_url.as_deref().unwrap_or("<unset>")
            ),
        ),
        provider if has_key => {
            (CheckStatus::Pass, format!("{} model `{}` with api key", provider.as_str(), llm.model))
        }
        provider => (CheckStatus::Fail, format!("{} requires llm.api_key", provider.as_str())),
    };

    DoctorCheck { name: "llm_credentials", status, details }
}

async fn check_knowledge(config: &AppConfig) -> DoctorCheck {
    let loader = KnowledgeLoader::from_config(&config.knowledge);
    let resource: Arc<KnowledgeResource> = loader.load().await;
    let source = resource.source_id.as_deref().unwrap_or("none");

    let (status, details) = match resource.status {
        KnowledgeStatus::Ok => (
            CheckStatus::Pass,
            format!("{} chars from {source} ({})", resource.text.chars().count(), resource.digest),
        ),
        KnowledgeStatus::Empty => (CheckStatus::Warn, format!("knowledge file {source} is empty")),
        KnowledgeStatus::Missing => (
            CheckStatus::Warn,
            format!("no knowledge file found among {} candidates", loader.candidates().len()),
        ),
    };

    DoctorCheck { name: "knowledge_resource", status, details }
}

async fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let result = async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;
        let pinged = ping(&pool).await.map_err(|error| format!("database query failed: {error}"));
        pool.close().await;
        pinged
    }
    .await;

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

use serde::Serialize;
use thiserror::Error;

use crate::knowledge::{KnowledgeResource, KnowledgeStatus};

pub const MAX_DIAGNOSTIC_CHARS: usize = 400;

/// Knowledge diagnostics echoed back on upstream failures so an operator can
/// tell a provider outage apart from a stale or missing knowledge file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeDiagnostics {
    pub kb_status: KnowledgeStatus,
    pub kb_source: Option<String>,
    pub kb_digest: String,
}

impl From<&KnowledgeResource> for KnowledgeDiagnostics {
    fn from(resource: &KnowledgeResource) -> Self {
        Self {
            kb_status: resource.status,
            kb_source: resource.source_id.clone(),
            kb_digest: resource.digest.clone(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("invalid input: {0}")]
    Input(String),
    #[error("too many requests, retry after {retry_after_secs}s")]
    Throttled { retry_after_secs: u64, limit: u32, remaining: u32 },
    #[error("origin `{0}` is not allowed")]
    ForbiddenOrigin(String),
    #[error("upstream provider failed with status {status:?}")]
    Upstream { status: Option<u16>, details: String, knowledge: KnowledgeDiagnostics },
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChatError {
    pub fn upstream(
        status: Option<u16>,
        details: impl AsRef<str>,
        knowledge: &KnowledgeResource,
    ) -> Self {
        Self::Upstream {
            status,
            details: truncate_diagnostic(details.as_ref()),
            knowledge: KnowledgeDiagnostics::from(knowledge),
        }
    }

    pub fn internal(details: impl AsRef<str>) -> Self {
        Self::Internal(truncate_diagnostic(details.as_ref()))
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Input(_) => 400,
            Self::ForbiddenOrigin(_) => 403,
            Self::Throttled { .. } => 429,
            Self::Upstream { .. } => 502,
            Self::Internal(_) => 500,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Input(_) => "Message invalide.",
            Self::Throttled { .. } => "Trop de requêtes. Réessaie dans un instant.",
            Self::ForbiddenOrigin(_) => "Origine non autorisée.",
            Self::Upstream { .. } => "Le service de réponse est indisponible.",
            Self::Internal(_) => "Erreur interne.",
        }
    }

    pub fn body(&self) -> ErrorBody {
        let mut body = ErrorBody {
            error: self.user_message().to_string(),
            kind: self.kind(),
            retry_after_sec: None,
            status: None,
            details: None,
            knowledge: None,
        };
        match self {
            Self::Input(reason) => body.details = Some(reason.clone()),
            Self::Throttled { retry_after_secs, .. } => {
                body.retry_after_sec = Some(*retry_after_secs)
            }
            Self::ForbiddenOrigin(_) => {}
            Self::Upstream { status, details, knowledge } => {
                body.status = *status;
                body.details = Some(details.clone());
                body.knowledge = Some(knowledge.clone());
            }
            Self::Internal(details) => body.details = Some(details.clone()),
        }
        body
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Input(_) => "input_error",
            Self::Throttled { .. } => "throttled",
            Self::ForbiddenOrigin(_) => "forbidden_origin",
            Self::Upstream { .. } => "upstream_provider_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_sec: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(flatten)]
    pub knowledge: Option<KnowledgeDiagnostics>,
}

pub fn truncate_diagnostic(text: &str) -> String {
    text.chars().take(MAX_DIAGNOSTIC_CHARS).collect()
}

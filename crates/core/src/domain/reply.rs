use serde::{Deserialize, Serialize};

use crate::domain::product::ProductCard;
use crate::knowledge::KnowledgeStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Link,
    Copy,
}

/// Quick action rendered under a reply. `target` is a URL for links and the
/// literal value to copy for copy actions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub label: String,
    pub target: String,
}

impl Action {
    pub fn link(label: impl Into<String>, target: impl Into<String>) -> Self {
        Self { kind: ActionKind::Link, label: label.into(), target: target.into() }
    }

    pub fn copy(label: impl Into<String>, target: impl Into<String>) -> Self {
        Self { kind: ActionKind::Copy, label: label.into(), target: target.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyEnvelope {
    pub reply: String,
    pub cards: Vec<ProductCard>,
    pub actions: Vec<Action>,
    pub kb_status: KnowledgeStatus,
    pub kb_source: Option<String>,
    pub kb_digest: String,
}

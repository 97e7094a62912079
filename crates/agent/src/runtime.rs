use std::sync::Arc;
use std::time::{Duration, Instant};

use vitrine_core::domain::catalog::Catalog;
use vitrine_core::domain::reply::ReplyEnvelope;
use vitrine_core::errors::ChatError;
use vitrine_core::intent::{Intent, IntentClassifier};
use vitrine_core::knowledge::{KnowledgeLoader, KnowledgeResource, KnowledgeStatus};
use vitrine_core::policy::replies::fallback_reply;
use vitrine_core::policy::{DeterministicResponsePolicy, Plan, ReplyMode, ResponsePolicy};

use crate::guardrails::ProductGuardrail;
use crate::llm::{ChatTurn, CompletionRequest, LlmClient, LlmError};
use crate::prompt::PromptBuilder;

pub const MAX_MESSAGE_CHARS: usize = 1_200;
pub const MAX_HISTORY_CONTENT_CHARS: usize = 1_200;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<ChatTurn>,
}

impl ChatRequest {
    /// Trims and bounds the message, keeps only the most recent `history_limit`
    /// turns and truncates each of them.
    pub fn parse(
        message: Option<&str>,
        history: Vec<ChatTurn>,
        history_limit: usize,
    ) -> Result<Self, ChatError> {
        let message = message.map(str::trim).unwrap_or_default();
        if message.is_empty() {
            return Err(ChatError::Input("message is empty".to_string()));
        }
        let length = message.chars().count();
        if length > MAX_MESSAGE_CHARS {
            return Err(ChatError::Input(format!(
                "message is {length} characters long, the limit is {MAX_MESSAGE_CHARS}"
            )));
        }

        let skip = history.len().saturating_sub(history_limit);
        let history = history
            .into_iter()
            .skip(skip)
            .map(|turn| ChatTurn {
                role: turn.role,
                content: turn.content.chars().take(MAX_HISTORY_CONTENT_CHARS).collect(),
            })
            .collect();

        Ok(Self { message: message.to_string(), history })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatOutcome {
    pub envelope: ReplyEnvelope,
    pub mode: ReplyMode,
    pub reply_rule: &'static str,
    pub card_rule: Option<&'static str>,
    pub guardrail_rewritten: bool,
    pub latency_ms: u64,
}

pub struct ChatRuntime {
    knowledge: Arc<KnowledgeLoader>,
    classifier: IntentClassifier,
    policy: Arc<dyn ResponsePolicy>,
    catalog: Catalog,
    prompt: PromptBuilder,
    guardrail: ProductGuardrail,
    llm: Arc<dyn LlmClient>,
    llm_timeout: Duration,
    max_tokens: u32,
}

impl ChatRuntime {
    pub fn new(
        knowledge: Arc<KnowledgeLoader>,
        llm: Arc<dyn LlmClient>,
        llm_timeout: Duration,
        max_tokens: u32,
    ) -> Self {
        let catalog = Catalog;
        Self {
            knowledge,
            classifier: IntentClassifier::new(),
            policy: Arc::new(DeterministicResponsePolicy::new(catalog)),
            catalog,
            prompt: PromptBuilder::new(catalog),
            guardrail: ProductGuardrail::from_catalog(catalog),
            llm,
            llm_timeout,
            max_tokens,
        }
    }

    /// Classification and planning only, without touching the provider.
    pub fn explain(&self, message: &str, kb_status: KnowledgeStatus) -> (Intent, Plan) {
        let intent = self.classifier.classify(message);
        let plan = self.policy.plan(&intent, kb_status);
        (intent, plan)
    }

    pub async fn respond(
        &self,
        request: ChatRequest,
        correlation_id: &str,
    ) -> Result<ChatOutcome, ChatError> {
        let started = Instant::now();
        let knowledge = self.knowledge.load().await;
        let (intent, plan) = self.explain(&request.message, knowledge.status);

        let (reply, guardrail_rewritten) = match plan.reply.clone() {
            Some(reply) => (reply, false),
            None => self.generate(&request, &knowledge, &intent, correlation_id).await?,
        };

        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            event_name = "chat.reply",
            correlation_id = %correlation_id,
            mode = plan.mode.as_str(),
            reply_rule = plan.reply_rule,
            card_rule = plan.card_rule.unwrap_or("none"),
            cards = plan.cards.len(),
            actions = plan.actions.len(),
            kb_status = knowledge.status.as_str(),
            guardrail_rewritten,
            latency_ms,
            "chat reply produced"
        );

        Ok(ChatOutcome {
            envelope: ReplyEnvelope {
                reply,
                cards: self.catalog.cards(&plan.cards),
                actions: plan.actions,
                kb_status: knowledge.status,
                kb_source: knowledge.source_id.clone(),
                kb_digest: knowledge.digest.clone(),
            },
            mode: plan.mode,
            reply_rule: plan.reply_rule,
            card_rule: plan.card_rule,
            guardrail_rewritten,
            latency_ms,
        })
    }

    async fn generate(
        &self,
        request: &ChatRequest,
        knowledge: &KnowledgeResource,
        intent: &Intent,
        correlation_id: &str,
    ) -> Result<(String, bool), ChatError> {
        let completion = CompletionRequest {
            system: self.prompt.system_prompt(knowledge),
            history: request.history.clone(),
            message: request.message.clone(),
            max_tokens: self.max_tokens,
        };

        let result = match tokio::time::timeout(self.llm_timeout, self.llm.complete(&completion))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.llm_timeout)),
        };

        let generated = match result {
            Ok(text) => text,
            Err(error) => {
                tracing::error!(
                    event_name = "chat.upstream_failed",
                    correlation_id = %correlation_id,
                    provider = self.llm.provider(),
                    status = ?error.status(),
                    error = %error,
                    "generative provider call failed"
                );
                return Err(ChatError::upstream(error.status(), error.details(), knowledge));
            }
        };

        if generated.trim().is_empty() {
            return Ok((fallback_reply(), false));
        }

        let sanitized = self.guardrail.sanitize(generated, intent);
        Ok((sanitized.text, sanitized.rewritten))
    }
}

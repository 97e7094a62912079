use serde::Serialize;
use vitrine_core::domain::catalog::Catalog;
use vitrine_core::domain::product::ProductKey;
use vitrine_core::domain::reply::Action;
use vitrine_core::intent::{IntentClassifier, Signal};
use vitrine_core::knowledge::{KnowledgeLoader, KnowledgeStatus};
use vitrine_core::policy::{DeterministicResponsePolicy, ResponsePolicy};

use crate::commands::{current_thread_runtime, load_config, CommandResult};

#[derive(Debug, Serialize)]
struct Explanation {
    command: &'static str,
    status: &'static str,
    normalized: String,
    signals: Vec<Signal>,
    mentioned_products: Vec<ProductKey>,
    kb_status: KnowledgeStatus,
    kb_source: Option<String>,
    mode: &'static str,
    reply_rule: &'static str,
    card_rule: Option<&'static str>,
    cards: Vec<ProductKey>,
    actions: Vec<Action>,
    reply: Option<String>,
    calls_provider: bool,
}

/// Runs the classifier and reply policy against the configured knowledge
/// file. Never contacts the LLM provider.
pub fn run(message: &str) -> CommandResult {
    if message.trim().is_empty() {
        return CommandResult::failure("explain", "input", "message must not be empty", 2);
    }

    let config = match load_config("explain") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match current_thread_runtime("explain") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let knowledge = runtime.block_on(KnowledgeLoader::from_config(&config.knowledge).load());
    let intent = IntentClassifier::new().classify(message);
    let plan = DeterministicResponsePolicy::new(Catalog).plan(&intent, knowledge.status);

    let explanation = Explanation {
        command: "explain",
        status: "ok",
        normalized: intent.normalized().to_string(),
        signals: intent.signals().collect(),
        mentioned_products: intent.mentioned_products(),
        kb_status: knowledge.status,
        kb_source: knowledge.source_id.clone(),
        mode: plan.mode.as_str(),
        reply_rule: plan.reply_rule,
        card_rule: plan.card_rule,
        cards: plan.cards,
        actions: plan.actions,
        reply: plan.reply,
        calls_provider: !plan.mode.is_deterministic(),
    };

    match serde_json::to_string_pretty(&explanation) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure("explain", "serialization", error.to_string(), 1),
    }
}

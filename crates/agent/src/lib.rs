//! Chat runtime - deterministic routing in front of a generative provider
//!
//! The runtime turns one visitor message into a `ReplyEnvelope`:
//! 1. **Knowledge** - resolve the knowledge text (`vitrine_core::knowledge`)
//! 2. **Classification** - keyword signals (`vitrine_core::intent`)
//! 3. **Policy** - reply mode, cards and actions (`vitrine_core::policy`)
//! 4. **Generation** - only for the generative mode (`llm`, `prompt`)
//! 5. **Guardrail** - post-generation product check (`guardrails`)
//!
//! # Safety Principle
//!
//! The model only writes prose. Cards, promo codes and links always come from
//! the fixed catalog and promo table, never from generated text.

pub mod guardrails;
pub mod llm;
pub mod prompt;
pub mod runtime;

pub use guardrails::{ProductGuardrail, Sanitized};
pub use llm::{ChatTurn, CompletionRequest, LlmClient, LlmError, Role};
pub use runtime::{ChatOutcome, ChatRequest, ChatRuntime};

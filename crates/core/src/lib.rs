pub mod config;
pub mod domain;
pub mod errors;
pub mod events;
pub mod intent;
pub mod knowledge;
pub mod policy;
pub mod rate_limit;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::catalog::Catalog;
pub use domain::product::{ProductCard, ProductKey};
pub use domain::promo::PromoCode;
pub use domain::reply::{Action, ActionKind, ReplyEnvelope};
pub use errors::{ChatError, ErrorBody, KnowledgeDiagnostics};
pub use events::{ChatEvent, EventName, EventSink, NormalizedBatch, SinkError};
pub use intent::{Intent, IntentClassifier, Signal};
pub use knowledge::{KnowledgeLoader, KnowledgeResource, KnowledgeStatus};
pub use policy::{DeterministicResponsePolicy, Plan, ReplyMode, ResponsePolicy};
pub use rate_limit::{Admission, RateLimitPolicy, RateLimiter};

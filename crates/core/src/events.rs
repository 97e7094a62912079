//! Storefront widget events and the sink they are written to.
//!
//! Inbound events are untrusted JSON. `normalize_event` keeps only allow-listed
//! event names and bounds every field before anything reaches a sink.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const MAX_BATCH_EVENTS: usize = 25;
const MAX_META_JSON_CHARS: usize = 7_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    PageView,
    PageUnload,
    ChatOpen,
    ChatClose,
    FullscreenOn,
    FullscreenOff,
    QuickClick,
    UiClick,
    MsgUserSend,
    MsgBotReply,
    CardsShown,
    CardClickView,
    CardClickAdd,
    ActionsShown,
    ActionClick,
    CouponCopySuccess,
    CouponCopyFail,
    ErrorClient,
}

impl EventName {
    pub const ALL: [EventName; 18] = [
        Self::PageView,
        Self::PageUnload,
        Self::ChatOpen,
        Self::ChatClose,
        Self::FullscreenOn,
        Self::FullscreenOff,
        Self::QuickClick,
        Self::UiClick,
        Self::MsgUserSend,
        Self::MsgBotReply,
        Self::CardsShown,
        Self::CardClickView,
        Self::CardClickAdd,
        Self::ActionsShown,
        Self::ActionClick,
        Self::CouponCopySuccess,
        Self::CouponCopyFail,
        Self::ErrorClient,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PageView => "page_view",
            Self::PageUnload => "page_unload",
            Self::ChatOpen => "chat_open",
            Self::ChatClose => "chat_close",
            Self::FullscreenOn => "fullscreen_on",
            Self::FullscreenOff => "fullscreen_off",
            Self::QuickClick => "quick_click",
            Self::UiClick => "ui_click",
            Self::MsgUserSend => "msg_user_send",
            Self::MsgBotReply => "msg_bot_reply",
            Self::CardsShown => "cards_shown",
            Self::CardClickView => "card_click_view",
            Self::CardClickAdd => "card_click_add",
            Self::ActionsShown => "actions_shown",
            Self::ActionClick => "action_click",
            Self::CouponCopySuccess => "coupon_copy_success",
            Self::CouponCopyFail => "coupon_copy_fail",
            Self::ErrorClient => "error_client",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|name| name.as_str() == value)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatEvent {
    pub session_id: String,
    pub event_name: EventName,
    pub page_url: Option<String>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub timezone: Option<String>,
    pub language: Option<String>,
    pub meta: Value,
    pub received_at: DateTime<Utc>,
}

impl ChatEvent {
    pub fn new(session_id: impl Into<String>, event_name: EventName) -> Self {
        Self {
            session_id: bounded(&session_id.into(), 180),
            event_name,
            page_url: None,
            referrer: None,
            user_agent: None,
            timezone: None,
            language: None,
            meta: Value::Object(Map::new()),
            received_at: Utc::now(),
        }
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = bounded_meta(&meta);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedBatch {
    pub events: Vec<ChatEvent>,
    pub rejected: usize,
}

/// Accepts either a single event object or `{ "batch": [...] }`. Only the first
/// `MAX_BATCH_EVENTS` entries are considered; everything past that, and every
/// entry that fails normalization, counts as rejected.
pub fn normalize_batch(body: &Value) -> NormalizedBatch {
    let raw: Vec<&Value> = match body.get("batch").and_then(Value::as_array) {
        Some(batch) => batch.iter().collect(),
        None => vec![body],
    };

    let events: Vec<ChatEvent> =
        raw.iter().take(MAX_BATCH_EVENTS).filter_map(|value| normalize_event(value)).collect();
    let rejected = raw.len() - events.len();
    NormalizedBatch { events, rejected }
}

pub fn normalize_event(raw: &Value) -> Option<ChatEvent> {
    let object = raw.as_object()?;
    let session_id = field(object, "session_id", 180)?;
    let event_name = EventName::parse(&field(object, "event_name", 80)?)?;
    if session_id.is_empty() {
        return None;
    }

    Some(ChatEvent {
        session_id,
        event_name,
        page_url: field(object, "page_url", 800),
        referrer: field(object, "referrer", 800),
        user_agent: field(object, "user_agent", 400),
        timezone: field(object, "tz", 120),
        language: field(object, "lang", 40),
        meta: object.get("meta").map(bounded_meta).unwrap_or_else(|| Value::Object(Map::new())),
        received_at: Utc::now(),
    })
}

fn field(object: &Map<String, Value>, key: &str, max_chars: usize) -> Option<String> {
    match object.get(key)? {
        Value::Null => None,
        Value::String(value) => Some(bounded(value, max_chars)),
        other => Some(bounded(&other.to_string(), max_chars)),
    }
}

fn bounded(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

fn bounded_meta(meta: &Value) -> Value {
    match meta {
        Value::Object(_) | Value::Array(_) => {
            let serialized_len = serde_json::to_string(meta).map(|s| s.len()).unwrap_or(usize::MAX);
            if serialized_len > MAX_META_JSON_CHARS {
                serde_json::json!({ "_trimmed": true })
            } else {
                meta.clone()
            }
        }
        _ => Value::Object(Map::new()),
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("event sink unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn record(&self, events: &[ChatEvent]) -> Result<usize, SinkError>;
}

#[derive(Clone, Default)]
pub struct InMemoryEventSink {
    events: Arc<Mutex<Vec<ChatEvent>>>,
}

impl InMemoryEventSink {
    pub fn events(&self) -> Vec<ChatEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl EventSink for InMemoryEventSink {
    async fn record(&self, events: &[ChatEvent]) -> Result<usize, SinkError> {
        match self.events.lock() {
            Ok(mut stored) => stored.extend_from_slice(events),
            Err(poisoned) => poisoned.into_inner().extend_from_slice(events),
        }
        Ok(events.len())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{normalize_batch, normalize_event, EventName, MAX_BATCH_EVENTS};

    #[test]
    fn rejects_unknown_event_names_and_missing_session() {
        assert!(normalize_event(&json!({ "session_id": "s1", "event_name": "drop_table" })).is_none());
        assert!(normalize_event(&json!({ "event_name": "chat_open" })).is_none());
        assert!(normalize_event(&json!({ "session_id": "", "event_name": "chat_open" })).is_none());
        assert!(normalize_event(&json!("chat_open")).is_none());
    }

    #[test]
    fn bounds_fields_and_meta() {
        let event = normalize_event(&json!({
            "session_id": "s".repeat(500),
            "event_name": "cards_shown",
            "lang": "fr-FR-with-a-very-long-suffix-that-keeps-going-on",
            "tz": "Europe/Paris",
            "meta": { "blob": "x".repeat(8_000) },
        }))
        .expect("valid event");

        assert_eq!(event.event_name, EventName::CardsShown);
        assert_eq!(event.session_id.chars().count(), 180);
        assert_eq!(event.language.as_deref().map(|l| l.chars().count()), Some(40));
        assert_eq!(event.timezone.as_deref(), Some("Europe/Paris"));
        assert_eq!(event.meta, json!({ "_trimmed": true }));
        assert_eq!(event.page_url, None);
    }

    #[test]
    fn non_object_meta_becomes_empty_object() {
        let event =
            normalize_event(&json!({ "session_id": "s1", "event_name": "ui_click", "meta": 42 }))
                .expect("valid event");
        assert_eq!(event.meta, json!({}));
    }

    #[test]
    fn batch_keeps_first_twenty_five_and_counts_rejections() {
        let mut batch: Vec<_> = (0..30)
            .map(|index| json!({ "session_id": format!("s{index}"), "event_name": "page_view" }))
            .collect();
        batch[1] = json!({ "session_id": "s1", "event_name": "not_allowed" });

        let normalized = normalize_batch(&json!({ "batch": batch }));

        assert_eq!(normalized.events.len(), MAX_BATCH_EVENTS - 1);
        assert_eq!(normalized.rejected, 6);
    }

    #[test]
    fn single_event_body_is_accepted() {
        let normalized =
            normalize_batch(&json!({ "session_id": "abc", "event_name": "chat_open" }));
        assert_eq!(normalized.events.len(), 1);
        assert_eq!(normalized.rejected, 0);
    }
}

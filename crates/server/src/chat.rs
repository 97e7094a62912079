use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header, Extensions, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use vitrine_agent::llm::{ChatTurn, Role};
use vitrine_agent::runtime::{ChatOutcome, ChatRequest, ChatRuntime};
use vitrine_core::config::ChatConfig;
use vitrine_core::errors::ChatError;
use vitrine_core::events::{normalize_batch, ChatEvent, EventName, EventSink};
use vitrine_core::rate_limit::{client_key, Admission, RateLimitPolicy, RateLimiter};

const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

#[derive(Clone)]
pub struct ChatState {
    runtime: Arc<ChatRuntime>,
    sink: Arc<dyn EventSink>,
    chat_limiter: Arc<RateLimiter>,
    track_limiter: Arc<RateLimiter>,
    allowed_origins: Arc<Vec<String>>,
    history_limit: usize,
}

impl ChatState {
    pub fn new(runtime: Arc<ChatRuntime>, sink: Arc<dyn EventSink>, config: &ChatConfig) -> Self {
        let window = Duration::from_secs(config.window_secs);
        Self {
            runtime,
            sink,
            chat_limiter: Arc::new(RateLimiter::new(
                "chat",
                RateLimitPolicy { max_per_window: config.max_requests_per_window, window },
            )),
            track_limiter: Arc::new(RateLimiter::new(
                "track",
                RateLimitPolicy { max_per_window: config.track_max_requests_per_window, window },
            )),
            allowed_origins: Arc::new(config.allowed_origins.clone()),
            history_limit: config.history_limit,
        }
    }

    pub fn limiters(&self) -> Vec<Arc<RateLimiter>> {
        vec![Arc::clone(&self.chat_limiter), Arc::clone(&self.track_limiter)]
    }
}

/// `/api/chat` is restricted to the configured storefront origins. Widget
/// analytics are accepted from any origin, since the storefront is also served
/// from custom domains and previews.
pub fn router(state: ChatState) -> Router {
    let origins: Vec<HeaderValue> = state
        .allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    let chat_routes = Router::new()
        .route("/api/chat", post(chat))
        .layer(cors_layer(AllowOrigin::list(origins)));
    let track_routes = Router::new()
        .route("/api/track", post(track))
        .layer(cors_layer(AllowOrigin::mirror_request()));

    chat_routes.merge(track_routes).with_state(state)
}

fn cors_layer(allow_origin: AllowOrigin) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(86_400))
}

/// Periodically drops rate-limit buckets that have been idle for two windows.
pub fn spawn_sweeper(
    limiters: Vec<Arc<RateLimiter>>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let now = Instant::now();
            for limiter in &limiters {
                limiter.sweep_idle(now, limiter.policy().window * 2);
            }
        }
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatBody {
    message: Option<String>,
    #[serde(default)]
    history: Vec<HistoryEntry>,
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryEntry {
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: String,
}

impl HistoryEntry {
    fn into_turn(self) -> Option<ChatTurn> {
        let role = match self.role.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            _ => return None,
        };
        Some(ChatTurn { role, content: self.content })
    }
}

#[derive(Debug, Serialize)]
struct TrackResponse {
    ok: bool,
    inserted: usize,
    rejected: usize,
}

async fn chat(
    State(state): State<ChatState>,
    headers: HeaderMap,
    extensions: Extensions,
    body: Bytes,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Err(error) = check_origin(&state.allowed_origins, &headers) {
        warn!(event_name = "chat.origin_rejected", correlation_id = %correlation_id, error = %error, "request rejected");
        return error_response(&error, None);
    }

    let admission = state.chat_limiter.admit(&request_client_key(&headers, &extensions));
    if !admission.allowed {
        return error_response(&throttled(&admission), Some(&admission));
    }

    match answer(&state, &body, &correlation_id).await {
        Ok(outcome) => {
            let mut response = (StatusCode::OK, Json(outcome.envelope)).into_response();
            apply_rate_headers(response.headers_mut(), &admission);
            response
        }
        Err(error) => {
            info!(
                event_name = "chat.request_failed",
                correlation_id = %correlation_id,
                status = error.status_code(),
                error = %error,
                "chat request failed"
            );
            error_response(&error, Some(&admission))
        }
    }
}

async fn answer(
    state: &ChatState,
    body: &Bytes,
    correlation_id: &str,
) -> Result<ChatOutcome, ChatError> {
    let body: ChatBody = serde_json::from_slice(body)
        .map_err(|err| ChatError::Input(format!("malformed JSON body: {err}")))?;

    let history = body.history.into_iter().filter_map(HistoryEntry::into_turn).collect();
    let request = ChatRequest::parse(body.message.as_deref(), history, state.history_limit)?;
    let session_id =
        body.session_id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty());

    if let Some(session_id) = &session_id {
        let event = ChatEvent::new(session_id.as_str(), EventName::MsgUserSend)
            .with_meta(json!({ "length": request.message.chars().count() }));
        emit(&state.sink, vec![event]);
    }

    let outcome = state.runtime.respond(request, correlation_id).await?;

    if let Some(session_id) = session_id {
        let cards: Vec<&str> = outcome.envelope.cards.iter().map(|card| card.key.as_str()).collect();
        let event = ChatEvent::new(session_id, EventName::MsgBotReply).with_meta(json!({
            "mode": outcome.mode.as_str(),
            "cards": cards,
            "latencyMs": outcome.latency_ms,
            "guardrailRewritten": outcome.guardrail_rewritten,
            "kbStatus": outcome.envelope.kb_status.as_str(),
        }));
        emit(&state.sink, vec![event]);
    }

    Ok(outcome)
}

async fn track(
    State(state): State<ChatState>,
    headers: HeaderMap,
    extensions: Extensions,
    body: Bytes,
) -> Response {
    let admission = state.track_limiter.admit(&request_client_key(&headers, &extensions));
    if !admission.allowed {
        return error_response(&throttled(&admission), Some(&admission));
    }

    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => {
            let error = ChatError::Input(format!("malformed JSON body: {err}"));
            return error_response(&error, Some(&admission));
        }
    };

    let batch = normalize_batch(&value);
    let inserted = if batch.events.is_empty() {
        0
    } else {
        match state.sink.record(&batch.events).await {
            Ok(inserted) => inserted,
            Err(err) => return error_response(&ChatError::internal(err.to_string()), Some(&admission)),
        }
    };

    let mut response =
        Json(TrackResponse { ok: true, inserted, rejected: batch.rejected }).into_response();
    apply_rate_headers(response.headers_mut(), &admission);
    response
}

fn emit(sink: &Arc<dyn EventSink>, events: Vec<ChatEvent>) {
    let sink = Arc::clone(sink);
    tokio::spawn(async move {
        if let Err(error) = sink.record(&events).await {
            warn!(event_name = "events.emit_failed", error = %error, "chat event dropped");
        }
    });
}

fn check_origin(allowed_origins: &[String], headers: &HeaderMap) -> Result<(), ChatError> {
    let Some(origin) = headers.get(header::ORIGIN) else {
        return Ok(());
    };
    let origin = origin.to_str().unwrap_or_default();
    if allowed_origins.iter().any(|allowed| allowed == origin) {
        Ok(())
    } else {
        Err(ChatError::ForbiddenOrigin(origin.to_string()))
    }
}

fn request_client_key(headers: &HeaderMap, extensions: &Extensions) -> String {
    let forwarded_for = headers.get("x-forwarded-for").and_then(|value| value.to_str().ok());
    let peer = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(address)| address.ip().to_string());
    let user_agent = headers.get(header::USER_AGENT).and_then(|value| value.to_str().ok());
    client_key(forwarded_for, peer.as_deref(), user_agent)
}

fn throttled(admission: &Admission) -> ChatError {
    ChatError::Throttled {
        retry_after_secs: admission.retry_after_secs,
        limit: admission.limit,
        remaining: admission.remaining,
    }
}

fn apply_rate_headers(headers: &mut HeaderMap, admission: &Admission) {
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(admission.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(admission.remaining));
}

fn error_response(error: &ChatError, admission: Option<&Admission>) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, Json(error.body())).into_response();
    if let ChatError::Throttled { retry_after_secs, .. } = error {
        response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
    }
    if let Some(admission) = admission {
        apply_rate_headers(response.headers_mut(), admission);
    }
    response
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use vitrine_agent::llm::{CompletionRequest, LlmClient, LlmError};
    use vitrine_agent::runtime::ChatRuntime;
    use vitrine_core::config::AppConfig;
    use vitrine_core::events::{EventName, InMemoryEventSink};
    use vitrine_core::knowledge::KnowledgeLoader;

    use super::{router, ChatState};

    struct FakeLlm {
        reply: Result<&'static str, (u16, &'static str)>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for FakeLlm {
        fn provider(&self) -> &'static str {
            "fake"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Ok(text) => Ok(text.to_string()),
                Err((status, body)) => Err(LlmError::Upstream { status, body: body.to_string() }),
            }
        }
    }

    struct Harness {
        app: Router,
        sink: InMemoryEventSink,
        llm: Arc<FakeLlm>,
        _dir: TempDir,
    }

    fn harness(reply: Result<&'static str, (u16, &'static str)>) -> Harness {
        let dir = TempDir::new().expect("tempdir");
        let knowledge_path = dir.path().join("knowledge.txt");
        fs::write(&knowledge_path, "Délais fournisseurs: 7 à 13 jours.").expect("write kb");

        let llm = Arc::new(FakeLlm { reply, calls: AtomicUsize::new(0) });
        let runtime = ChatRuntime::new(
            Arc::new(KnowledgeLoader::new(vec![knowledge_path])),
            llm.clone(),
            Duration::from_secs(5),
            500,
        );
        let sink = InMemoryEventSink::default();
        let config = AppConfig::default();
        let state = ChatState::new(Arc::new(runtime), Arc::new(sink.clone()), &config.chat);

        Harness { app: router(state), sink, llm, _dir: dir }
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-forwarded-for", "203.0.113.9")
            .header("user-agent", "test-agent")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn header(response: &axum::response::Response, name: &str) -> Option<String> {
        response.headers().get(name).and_then(|value| value.to_str().ok()).map(str::to_string)
    }

    #[tokio::test]
    async fn promo_question_returns_envelope_with_rate_headers() {
        let harness = harness(Ok("unused"));

        let response = harness
            .app
            .clone()
            .oneshot(post("/api/chat", json!({ "message": "code promo pour le giga bundle" })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "x-ratelimit-limit").as_deref(), Some("30"));
        assert_eq!(header(&response, "x-ratelimit-remaining").as_deref(), Some("29"));

        let body = json_body(response).await;
        assert!(body["reply"].as_str().is_some_and(|reply| reply.contains("GIGA20")));
        assert_eq!(body["cards"][0]["key"], json!("bundle"));
        assert_eq!(body["cards"][0]["url"], json!("https://resell-academy.com/b/giga-bundle"));
        let actions = body["actions"].as_array().cloned().unwrap_or_default();
        assert!(actions
            .iter()
            .any(|action| action["kind"] == json!("copy") && action["target"] == json!("GIGA20")));
        assert_eq!(body["kbStatus"], json!("ok"));
        assert!(body["kbDigest"].as_str().is_some_and(|digest| digest.starts_with("sha256:")));
        assert_eq!(harness.llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oversized_message_is_rejected_after_counting_against_the_limit() {
        let harness = harness(Ok("unused"));

        let response = harness
            .app
            .clone()
            .oneshot(post("/api/chat", json!({ "message": "a".repeat(1_500) })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(header(&response, "x-ratelimit-remaining").as_deref(), Some("29"));
        let body = json_body(response).await;
        assert_eq!(body["kind"], json!("input_error"));
        assert_eq!(harness.llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_json_is_an_input_error() {
        let harness = harness(Ok("unused"));
        let request = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .expect("request");

        let response = harness.app.clone().oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn thirty_first_request_is_throttled() {
        let harness = harness(Ok("unused"));
        for _ in 0..30 {
            let response = harness
                .app
                .clone()
                .oneshot(post("/api/chat", json!({ "message": "la faq svp" })))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = harness
            .app
            .clone()
            .oneshot(post("/api/chat", json!({ "message": "la faq svp" })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header(&response, "x-ratelimit-remaining").as_deref(), Some("0"));
        let retry_after: u64 = header(&response, "retry-after")
            .and_then(|value| value.parse().ok())
            .expect("retry-after header");
        assert!(retry_after > 0);
        let body = json_body(response).await;
        assert_eq!(body["retryAfterSec"], json!(retry_after));
    }

    #[tokio::test]
    async fn unknown_origin_is_forbidden_and_known_origin_allowed() {
        let harness = harness(Ok("unused"));

        let mut forbidden = post("/api/chat", json!({ "message": "la faq" }));
        forbidden.headers_mut().insert("origin", "https://evil.example".parse().expect("header"));
        let response = harness.app.clone().oneshot(forbidden).await.expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let mut allowed = post("/api/chat", json!({ "message": "la faq" }));
        allowed.headers_mut().insert("origin", "https://payhip.com".parse().expect("header"));
        let response = harness.app.clone().oneshot(allowed).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            header(&response, "access-control-allow-origin").as_deref(),
            Some("https://payhip.com")
        );
    }

    #[tokio::test]
    async fn upstream_failure_maps_to_bad_gateway_with_diagnostics() {
        let harness = harness(Err((529, "overloaded")));

        let response = harness
            .app
            .clone()
            .oneshot(post("/api/chat", json!({ "message": "bonjour" })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = json_body(response).await;
        assert_eq!(body["status"], json!(529));
        assert_eq!(body["details"], json!("overloaded"));
        assert_eq!(body["kbStatus"], json!("ok"));
        assert!(body["kbSource"].as_str().is_some());
    }

    #[tokio::test]
    async fn session_messages_emit_send_and_reply_events() {
        let harness = harness(Ok("Salut ! Comment puis-je t'aider ?"));

        let response = harness
            .app
            .clone()
            .oneshot(post(
                "/api/chat",
                json!({
                    "message": "bonjour",
                    "sessionId": "sess-42",
                    "history": [
                        { "role": "user", "content": "hello" },
                        { "role": "system", "content": "ignored" }
                    ]
                }),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let mut names = Vec::new();
        for _ in 0..50 {
            names = harness.sink.events().iter().map(|event| event.event_name).collect();
            if names.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(names.contains(&EventName::MsgUserSend));
        assert!(names.contains(&EventName::MsgBotReply));
        assert!(harness.sink.events().iter().all(|event| event.session_id == "sess-42"));
    }

    #[tokio::test]
    async fn track_accepts_batch_and_counts_rejections() {
        let harness = harness(Ok("unused"));

        let response = harness
            .app
            .clone()
            .oneshot(post(
                "/api/track",
                json!({
                    "batch": [
                        { "session_id": "s1", "event_name": "chat_open" },
                        { "session_id": "s1", "event_name": "not_allowed" },
                        { "session_id": "s1", "event_name": "card_click_view", "meta": { "key": "tech" } }
                    ]
                }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "x-ratelimit-limit").as_deref(), Some("180"));
        let body = json_body(response).await;
        assert_eq!(body, json!({ "ok": true, "inserted": 2, "rejected": 1 }));
        assert_eq!(harness.sink.events().len(), 2);
    }

    #[tokio::test]
    async fn track_accepts_events_from_any_storefront_origin() {
        let harness = harness(Ok("unused"));

        let mut request =
            post("/api/track", json!({ "session_id": "s2", "event_name": "chat_open" }));
        request
            .headers_mut()
            .insert("origin", "https://shop.custom-domain.example".parse().expect("header"));
        let response = harness.app.clone().oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            header(&response, "access-control-allow-origin").as_deref(),
            Some("https://shop.custom-domain.example")
        );
        let body = json_body(response).await;
        assert_eq!(body, json!({ "ok": true, "inserted": 1, "rejected": 0 }));
    }
}

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use toml::Value;
use vitrine_core::config::{resolve_config_path, AppConfig, LoadOptions};

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let knowledge_path = config
        .knowledge
        .path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unset>".to_string());
    let fallbacks = config
        .knowledge
        .fallbacks
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    let entries = vec![
        entry("database.url", config.database.url.clone(), &["VITRINE_DATABASE_URL"]),
        entry(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["VITRINE_DATABASE_MAX_CONNECTIONS"],
        ),
        entry(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["VITRINE_DATABASE_TIMEOUT_SECS"],
        ),
        entry("llm.provider", config.llm.provider.as_str().to_string(), &["VITRINE_LLM_PROVIDER"]),
        entry("llm.model", config.llm.model.clone(), &["VITRINE_LLM_MODEL"]),
        entry(
            "llm.base_url",
            config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["VITRINE_LLM_BASE_URL"],
        ),
        entry("llm.api_key", api_key, &["VITRINE_LLM_API_KEY", "ANTHROPIC_API_KEY"]),
        entry("llm.max_tokens", config.llm.max_tokens.to_string(), &["VITRINE_LLM_MAX_TOKENS"]),
        entry("llm.timeout_secs", config.llm.timeout_secs.to_string(), &["VITRINE_LLM_TIMEOUT_SECS"]),
        entry(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["VITRINE_SERVER_BIND_ADDRESS"],
        ),
        entry("server.port", config.server.port.to_string(), &["VITRINE_SERVER_PORT"]),
        entry(
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            &["VITRINE_SERVER_HEALTH_CHECK_PORT"],
        ),
        entry(
            "chat.max_requests_per_window",
            config.chat.max_requests_per_window.to_string(),
            &["VITRINE_CHAT_MAX_REQUESTS_PER_WINDOW"],
        ),
        entry("chat.window_secs", config.chat.window_secs.to_string(), &["VITRINE_CHAT_WINDOW_SECS"]),
        entry(
            "chat.track_max_requests_per_window",
            config.chat.track_max_requests_per_window.to_string(),
            &[],
        ),
        entry("chat.sweep_interval_secs", config.chat.sweep_interval_secs.to_string(), &[]),
        entry("chat.history_limit", config.chat.history_limit.to_string(), &[]),
        entry(
            "chat.allowed_origins",
            config.chat.allowed_origins.join(", "),
            &["VITRINE_CHAT_ALLOWED_ORIGINS"],
        ),
        entry("knowledge.path", knowledge_path, &["VITRINE_KNOWLEDGE_PATH"]),
        entry("knowledge.fallbacks", fallbacks, &[]),
        entry(
            "logging.level",
            config.logging.level.clone(),
            &["VITRINE_LOGGING_LEVEL", "VITRINE_LOG_LEVEL"],
        ),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["VITRINE_LOGGING_FORMAT", "VITRINE_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(
        entries
            .iter()
            .map(|entry| render_line(entry.key, &entry.value, source(entry.key, entry.env_keys))),
    );
    lines.join("\n")
}

struct Entry {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn entry(key: &'static str, value: String, env_keys: &'static [&'static str]) -> Entry {
    Entry { key, value, env_keys }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("config file"));
            return format!("file ({})", file_path.display());
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the vendor prefix (`sk-ant`, `sk`) so operators can tell keys apart.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let segments: Vec<&str> = trimmed.split('-').collect();
    let prefix: Vec<&str> = segments
        .iter()
        .take(segments.len().saturating_sub(1).min(2))
        .take_while(|segment| {
            (1..=5).contains(&segment.len())
                && segment.chars().all(|c| c.is_ascii_alphabetic())
        })
        .copied()
        .collect();

    if prefix.is_empty() {
        "<redacted>".to_string()
    } else {
        format!("{}-***", prefix.join("-"))
    }
}

#[cfg(test)]
mod tests {
    use super::redact_token;

    #[test]
    fn redaction_keeps_only_the_vendor_prefix() {
        assert_eq!(redact_token("sk-ant-abcdef"), "sk-ant-***");
        assert_eq!(redact_token("sk-ant-api03-abcdef"), "sk-ant-***");
        assert_eq!(redact_token("sk-abcdef"), "sk-***");
        assert_eq!(redact_token("opaque"), "<redacted>");
        assert_eq!(redact_token("   "), "<empty>");
    }
}

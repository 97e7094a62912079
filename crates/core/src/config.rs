use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub chat: ChatConfig,
    pub knowledge: KnowledgeConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub max_requests_per_window: u32,
    pub window_secs: u64,
    pub track_max_requests_per_window: u32,
    pub sweep_interval_secs: u64,
    pub history_limit: usize,
    pub allowed_origins: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct KnowledgeConfig {
    pub path: Option<PathBuf>,
    pub fallbacks: Vec<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub knowledge_path: Option<PathBuf>,
    pub max_requests_per_window: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const CONFIG_FILE_NAME: &str = "vitrine.toml";

pub const DEFAULT_KNOWLEDGE_FALLBACKS: [&str; 4] = [
    "knowledge/knowledge.txt",
    "knowledge/ra_knowledge.txt",
    "api/knowledge/ra_knowledge.txt",
    "knowledge.txt",
];

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://vitrine.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                max_tokens: 500,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 3000,
                health_check_port: 8080,
            },
            chat: ChatConfig {
                max_requests_per_window: 30,
                window_secs: 60,
                track_max_requests_per_window: 180,
                sweep_interval_secs: 300,
                history_limit: 8,
                allowed_origins: vec![
                    "https://resell-academy.com".to_string(),
                    "https://www.resell-academy.com".to_string(),
                    "https://payhip.com".to_string(),
                    "https://www.payhip.com".to_string(),
                ],
            },
            knowledge: KnowledgeConfig {
                path: None,
                fallbacks: DEFAULT_KNOWLEDGE_FALLBACKS.iter().map(PathBuf::from).collect(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    /// Layers, lowest to highest: defaults, config file, `VITRINE_*` env vars,
    /// programmatic overrides. Validation runs once on the merged result.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match resolve_config_path(options.config_path.as_deref()) {
            Some(path) => read_file_layer(&path)?.merge_into(&mut config),
            None if options.require_file => {
                return Err(ConfigError::MissingConfigFile(
                    options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME)),
                ));
            }
            None => {}
        }

        config.merge_env()?;
        options.overrides.merge_into(&mut config);
        config.validate()?;

        Ok(config)
    }

    fn merge_env(&mut self) -> Result<(), ConfigError> {
        let database = &mut self.database;
        layer(&mut database.url, env_string("VITRINE_DATABASE_URL"));
        layer(&mut database.max_connections, env_parsed("VITRINE_DATABASE_MAX_CONNECTIONS")?);
        layer(&mut database.timeout_secs, env_parsed("VITRINE_DATABASE_TIMEOUT_SECS")?);

        let llm = &mut self.llm;
        layer(&mut llm.provider, env_parsed("VITRINE_LLM_PROVIDER")?);
        layer(&mut llm.api_key, first_env(&["VITRINE_LLM_API_KEY", "ANTHROPIC_API_KEY"]).map(secret));
        layer(&mut llm.base_url, env_string("VITRINE_LLM_BASE_URL").map(Some));
        layer(&mut llm.model, env_string("VITRINE_LLM_MODEL"));
        layer(&mut llm.max_tokens, env_parsed("VITRINE_LLM_MAX_TOKENS")?);
        layer(&mut llm.timeout_secs, env_parsed("VITRINE_LLM_TIMEOUT_SECS")?);

        let server = &mut self.server;
        layer(&mut server.bind_address, env_string("VITRINE_SERVER_BIND_ADDRESS"));
        layer(&mut server.port, env_parsed("VITRINE_SERVER_PORT")?);
        layer(&mut server.health_check_port, env_parsed("VITRINE_SERVER_HEALTH_CHECK_PORT")?);

        let chat = &mut self.chat;
        layer(
            &mut chat.max_requests_per_window,
            env_parsed("VITRINE_CHAT_MAX_REQUESTS_PER_WINDOW")?,
        );
        layer(&mut chat.window_secs, env_parsed("VITRINE_CHAT_WINDOW_SECS")?);
        layer(
            &mut chat.allowed_origins,
            env_string("VITRINE_CHAT_ALLOWED_ORIGINS").map(|value| comma_list(&value)),
        );

        layer(&mut self.knowledge.path, env_string("VITRINE_KNOWLEDGE_PATH").map(|p| Some(p.into())));

        layer(&mut self.logging.level, first_env(&["VITRINE_LOGGING_LEVEL", "VITRINE_LOG_LEVEL"]));
        if let Some(format) = first_env(&["VITRINE_LOGGING_FORMAT", "VITRINE_LOG_FORMAT"]) {
            self.logging.format = format.parse()?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let database = &self.database;
        let url = database.url.trim();
        require(
            url.starts_with("sqlite:") || url == ":memory:",
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::memory:`, or `:memory:`)",
        )?;
        require(database.max_connections > 0, "database.max_connections must be greater than zero")?;
        require(
            (1..=300).contains(&database.timeout_secs),
            "database.timeout_secs must be in range 1..=300",
        )?;

        let llm = &self.llm;
        require((1..=300).contains(&llm.timeout_secs), "llm.timeout_secs must be in range 1..=300")?;
        require(llm.max_tokens > 0, "llm.max_tokens must be greater than zero")?;
        match llm.provider {
            LlmProvider::OpenAi | LlmProvider::Anthropic => require(
                llm.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty()),
                format!("llm.api_key is required for the {} provider", llm.provider.as_str()),
            )?,
            LlmProvider::Ollama => require(
                llm.base_url.as_deref().is_some_and(|base| !base.trim().is_empty()),
                "llm.base_url is required for the ollama provider",
            )?,
        }

        let server = &self.server;
        require(server.port > 0, "server.port must be greater than zero")?;
        require(server.health_check_port > 0, "server.health_check_port must be greater than zero")?;
        require(
            server.port != server.health_check_port,
            "server.port and server.health_check_port must differ",
        )?;

        let chat = &self.chat;
        require(
            chat.max_requests_per_window > 0 && chat.track_max_requests_per_window > 0,
            "chat rate limits must be greater than zero",
        )?;
        require((1..=3_600).contains(&chat.window_secs), "chat.window_secs must be in range 1..=3600")?;
        require(chat.sweep_interval_secs > 0, "chat.sweep_interval_secs must be greater than zero")?;
        require(chat.history_limit <= 50, "chat.history_limit must be at most 50")?;
        if let Some(origin) = chat
            .allowed_origins
            .iter()
            .find(|origin| !origin.starts_with("http://") && !origin.starts_with("https://"))
        {
            return Err(ConfigError::Validation(format!(
                "chat.allowed_origins entry `{origin}` must start with http:// or https://"
            )));
        }

        require(
            self.knowledge.path.is_some() || !self.knowledge.fallbacks.is_empty(),
            "knowledge.path or at least one knowledge.fallbacks entry is required",
        )?;

        require(
            matches!(
                self.logging.level.trim().to_ascii_lowercase().as_str(),
                "trace" | "debug" | "info" | "warn" | "error"
            ),
            "logging.level must be one of trace|debug|info|warn|error",
        )
    }
}

impl ConfigOverrides {
    fn merge_into(self, config: &mut AppConfig) {
        layer(&mut config.database.url, self.database_url);
        layer(&mut config.logging.level, self.log_level);
        layer(&mut config.llm.provider, self.llm_provider);
        layer(&mut config.llm.model, self.llm_model);
        layer(&mut config.llm.api_key, self.llm_api_key.map(secret));
        layer(&mut config.knowledge.path, self.knowledge_path.map(Some));
        layer(&mut config.chat.max_requests_per_window, self.max_requests_per_window);
    }
}

/// `vitrine.toml` in the working directory, then `config/vitrine.toml`.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from(CONFIG_FILE_NAME), Path::new("config").join(CONFIG_FILE_NAME)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_file_layer(path: &Path) -> Result<FileLayer, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    toml::from_str::<FileLayer>(&interpolate_env_vars(&raw)?)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Expands every `${NAME}` with the value of the environment variable `NAME`.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let end = tail.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let var = &tail[..end];
        let value = env::var(var)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: var.to_string() })?;
        output.push_str(&value);
        rest = &tail[end + 1..];
    }
    output.push_str(rest);

    Ok(output)
}

fn layer<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn require(condition: bool, message: impl Into<String>) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::Validation(message.into()))
    }
}

fn secret(value: String) -> Option<SecretString> {
    Some(SecretString::from(value))
}

fn comma_list(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty()).map(str::to_string).collect()
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn first_env(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| env_string(key))
}

fn env_parsed<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    env_string(key)
        .map(|value| {
            value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
                key: key.to_string(),
                value,
            })
        })
        .transpose()
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileLayer {
    database: Option<DatabaseSection>,
    llm: Option<LlmSection>,
    server: Option<ServerSection>,
    chat: Option<ChatSection>,
    knowledge: Option<KnowledgeSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabaseSection {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmSection {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatSection {
    max_requests_per_window: Option<u32>,
    window_secs: Option<u64>,
    track_max_requests_per_window: Option<u32>,
    sweep_interval_secs: Option<u64>,
    history_limit: Option<usize>,
    allowed_origins: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct KnowledgeSection {
    path: Option<PathBuf>,
    fallbacks: Option<Vec<PathBuf>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl FileLayer {
    fn merge_into(self, config: &mut AppConfig) {
        if let Some(section) = self.database {
            layer(&mut config.database.url, section.url);
            layer(&mut config.database.max_connections, section.max_connections);
            layer(&mut config.database.timeout_secs, section.timeout_secs);
        }
        if let Some(section) = self.llm {
            layer(&mut config.llm.provider, section.provider);
            layer(&mut config.llm.api_key, section.api_key.map(secret));
            layer(&mut config.llm.base_url, section.base_url.map(Some));
            layer(&mut config.llm.model, section.model);
            layer(&mut config.llm.max_tokens, section.max_tokens);
            layer(&mut config.llm.timeout_secs, section.timeout_secs);
        }
        if let Some(section) = self.server {
            layer(&mut config.server.bind_address, section.bind_address);
            layer(&mut config.server.port, section.port);
            layer(&mut config.server.health_check_port, section.health_check_port);
        }
        if let Some(section) = self.chat {
            layer(&mut config.chat.max_requests_per_window, section.max_requests_per_window);
            layer(&mut config.chat.window_secs, section.window_secs);
            layer(
                &mut config.chat.track_max_requests_per_window,
                section.track_max_requests_per_window,
            );
            layer(&mut config.chat.sweep_interval_secs, section.sweep_interval_secs);
            layer(&mut config.chat.history_limit, section.history_limit);
            layer(&mut config.chat.allowed_origins, section.allowed_origins);
        }
        if let Some(section) = self.knowledge {
            layer(&mut config.knowledge.path, section.path.map(Some));
            layer(&mut config.knowledge.fallbacks, section.fallbacks);
        }
        if let Some(section) = self.logging {
            layer(&mut config.logging.level, section.level);
            layer(&mut config.logging.format, section.format);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        interpolate_env_vars, AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions,
        LogFormat,
    };

    const TOUCHED: [&str; 6] = [
        "VITRINE_DATABASE_URL",
        "VITRINE_LLM_PROVIDER",
        "VITRINE_LLM_API_KEY",
        "ANTHROPIC_API_KEY",
        "VITRINE_CHAT_MAX_REQUESTS_PER_WINDOW",
        "VITRINE_CHAT_ALLOWED_ORIGINS",
    ];

    /// Holds the env lock and clears every touched variable on drop.
    struct EnvScope {
        _guard: MutexGuard<'static, ()>,
    }

    impl EnvScope {
        fn with(vars: &[(&str, &str)]) -> Self {
            static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
            let guard = LOCK
                .get_or_init(|| Mutex::new(()))
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            for key in TOUCHED {
                env::remove_var(key);
            }
            for (key, value) in vars {
                env::set_var(key, value);
            }
            Self { _guard: guard }
        }
    }

    impl Drop for EnvScope {
        fn drop(&mut self) {
            for key in TOUCHED {
                env::remove_var(key);
            }
        }
    }

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("vitrine.toml");
        fs::write(&path, body).expect("write config");
        path
    }

    #[test]
    fn defaults_load_without_a_file() {
        let _env = EnvScope::with(&[]);

        let config = AppConfig::load(LoadOptions::default()).expect("defaults are valid");

        assert_eq!(config.chat.max_requests_per_window, 30);
        assert_eq!(config.chat.window_secs, 60);
        assert_eq!(config.chat.history_limit, 8);
        assert!(config.knowledge.path.is_none());
        assert_eq!(config.knowledge.fallbacks.len(), 4);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
    }

    #[test]
    fn file_values_are_interpolated_from_env() {
        let _env = EnvScope::with(&[("TEST_VITRINE_LLM_KEY", "sk-ant-from-env")]);
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(
            &dir,
            r#"
[llm]
provider = "anthropic"
api_key = "${TEST_VITRINE_LLM_KEY}"
model = "claude-3-haiku-20240307"

[knowledge]
path = "kb/current.txt"
"#,
        );

        let config = AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
            .expect("config loads");
        env::remove_var("TEST_VITRINE_LLM_KEY");

        assert_eq!(config.llm.provider, LlmProvider::Anthropic);
        assert_eq!(
            config.llm.api_key.as_ref().map(|key| key.expose_secret().to_string()),
            Some("sk-ant-from-env".to_string())
        );
        assert_eq!(config.knowledge.path, Some(PathBuf::from("kb/current.txt")));
    }

    #[test]
    fn interpolation_reports_missing_and_unterminated_variables() {
        let _env = EnvScope::with(&[]);

        assert!(matches!(
            interpolate_env_vars("key = \"${VITRINE_TEST_DOES_NOT_EXIST}\""),
            Err(ConfigError::MissingEnvInterpolation { ref var }) if var == "VITRINE_TEST_DOES_NOT_EXIST"
        ));
        assert!(matches!(
            interpolate_env_vars("key = \"${OPEN"),
            Err(ConfigError::UnterminatedInterpolation)
        ));
        assert_eq!(interpolate_env_vars("plain = 1").ok().as_deref(), Some("plain = 1"));
    }

    #[test]
    fn overrides_beat_env_and_env_beats_file() {
        let _env = EnvScope::with(&[
            ("VITRINE_DATABASE_URL", "sqlite://from-env.db"),
            ("VITRINE_CHAT_MAX_REQUESTS_PER_WINDOW", "12"),
        ]);
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(
            &dir,
            r#"
[database]
url = "sqlite://from-file.db"

[chat]
max_requests_per_window = 5
track_max_requests_per_window = 90
allowed_origins = ["https://shop.example"]

[logging]
level = "warn"
"#,
        );

        let config = AppConfig::load(LoadOptions {
            config_path: Some(path),
            overrides: ConfigOverrides {
                database_url: Some("sqlite://from-override.db".to_string()),
                log_level: Some("debug".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("config loads");

        assert_eq!(config.database.url, "sqlite://from-override.db");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.chat.max_requests_per_window, 12);
        assert_eq!(config.chat.track_max_requests_per_window, 90);
        assert_eq!(config.chat.allowed_origins, vec!["https://shop.example".to_string()]);
    }

    #[test]
    fn hosted_provider_without_key_is_rejected() {
        let _env = EnvScope::with(&[("VITRINE_LLM_PROVIDER", "anthropic")]);

        let error = AppConfig::load(LoadOptions::default()).expect_err("key is required");

        assert!(
            matches!(error, ConfigError::Validation(ref message) if message.contains("llm.api_key")),
            "unexpected error: {error}"
        );
    }

    #[test]
    fn anthropic_key_falls_back_to_vendor_variable() {
        let _env = EnvScope::with(&[
            ("VITRINE_LLM_PROVIDER", "anthropic"),
            ("ANTHROPIC_API_KEY", "sk-ant-vendor"),
        ]);

        let config = AppConfig::load(LoadOptions::default()).expect("config loads");

        assert_eq!(
            config.llm.api_key.as_ref().map(|key| key.expose_secret().to_string()),
            Some("sk-ant-vendor".to_string())
        );
    }

    #[test]
    fn non_http_origin_is_named_in_the_error() {
        let _env = EnvScope::with(&[(
            "VITRINE_CHAT_ALLOWED_ORIGINS",
            "https://ok.example, ftp://nope.example",
        )]);

        let error = AppConfig::load(LoadOptions::default()).expect_err("bad origin");

        assert!(error.to_string().contains("ftp://nope.example"));
    }

    #[test]
    fn unparsable_env_number_is_an_override_error() {
        let _env = EnvScope::with(&[("VITRINE_CHAT_MAX_REQUESTS_PER_WINDOW", "many")]);

        let error = AppConfig::load(LoadOptions::default()).expect_err("not a number");

        assert!(matches!(
            error,
            ConfigError::InvalidEnvOverride { ref key, .. } if key == "VITRINE_CHAT_MAX_REQUESTS_PER_WINDOW"
        ));
    }

    #[test]
    fn api_key_stays_out_of_debug_output() {
        let _env = EnvScope::with(&[
            ("VITRINE_LLM_PROVIDER", "openai"),
            ("VITRINE_LLM_API_KEY", "sk-secret-value"),
        ]);

        let config = AppConfig::load(LoadOptions::default()).expect("config loads");

        assert!(!format!("{config:?}").contains("sk-secret-value"));
    }
}

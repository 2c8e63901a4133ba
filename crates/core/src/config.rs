use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::GREET_USER;
use crate::classifier::{MatcherKind, DEFAULT_SIMILARITY_THRESHOLD};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub dialogue: DialogueConfig,
    pub sessions: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct DialogueConfig {
    pub similarity_threshold: f64,
    pub fallback_intent: String,
    pub matcher: MatcherKind,
    pub catalog_path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub max_sessions: usize,
    pub default_session_id: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
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
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub similarity_threshold: Option<f64>,
    pub matcher: Option<MatcherKind>,
    pub catalog_path: Option<PathBuf>,
    pub idle_timeout_secs: Option<u64>,
    pub max_sessions: Option<usize>,
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

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 3000,
                graceful_shutdown_secs: 15,
            },
            dialogue: DialogueConfig {
                similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
                fallback_intent: GREET_USER.to_string(),
                matcher: MatcherKind::JaroWinkler,
                catalog_path: None,
            },
            sessions: SessionConfig {
                idle_timeout_secs: 1800,
                sweep_interval_secs: 60,
                max_sessions: 10_000,
                default_session_id: "default".to_string(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
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

impl std::str::FromStr for MatcherKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "jaro_winkler" | "jaro-winkler" => Ok(Self::JaroWinkler),
            "exact" => Ok(Self::Exact),
            other => Err(ConfigError::Validation(format!(
                "unsupported matcher `{other}` (expected jaro_winkler|exact)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("slotbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(dialogue) = patch.dialogue {
            if let Some(similarity_threshold) = dialogue.similarity_threshold {
                self.dialogue.similarity_threshold = similarity_threshold;
            }
            if let Some(fallback_intent) = dialogue.fallback_intent {
                self.dialogue.fallback_intent = fallback_intent;
            }
            if let Some(matcher) = dialogue.matcher {
                self.dialogue.matcher = matcher;
            }
            if let Some(catalog_path) = dialogue.catalog_path {
                self.dialogue.catalog_path = Some(catalog_path);
            }
        }

        if let Some(sessions) = patch.sessions {
            if let Some(idle_timeout_secs) = sessions.idle_timeout_secs {
                self.sessions.idle_timeout_secs = idle_timeout_secs;
            }
            if let Some(sweep_interval_secs) = sessions.sweep_interval_secs {
                self.sessions.sweep_interval_secs = sweep_interval_secs;
            }
            if let Some(max_sessions) = sessions.max_sessions {
                self.sessions.max_sessions = max_sessions;
            }
            if let Some(default_session_id) = sessions.default_session_id {
                self.sessions.default_session_id = default_session_id;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SLOTBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SLOTBOT_SERVER_PORT") {
            self.server.port = parse_env("SLOTBOT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SLOTBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("SLOTBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("SLOTBOT_DIALOGUE_SIMILARITY_THRESHOLD") {
            self.dialogue.similarity_threshold =
                parse_env("SLOTBOT_DIALOGUE_SIMILARITY_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("SLOTBOT_DIALOGUE_FALLBACK_INTENT") {
            self.dialogue.fallback_intent = value;
        }
        if let Some(value) = read_env("SLOTBOT_DIALOGUE_MATCHER") {
            self.dialogue.matcher = value.parse()?;
        }
        if let Some(value) = read_env("SLOTBOT_DIALOGUE_CATALOG_PATH") {
            self.dialogue.catalog_path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("SLOTBOT_SESSIONS_IDLE_TIMEOUT_SECS") {
            self.sessions.idle_timeout_secs =
                parse_env("SLOTBOT_SESSIONS_IDLE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SLOTBOT_SESSIONS_SWEEP_INTERVAL_SECS") {
            self.sessions.sweep_interval_secs =
                parse_env("SLOTBOT_SESSIONS_SWEEP_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("SLOTBOT_SESSIONS_MAX_SESSIONS") {
            self.sessions.max_sessions = parse_env("SLOTBOT_SESSIONS_MAX_SESSIONS", &value)?;
        }
        if let Some(value) = read_env("SLOTBOT_SESSIONS_DEFAULT_SESSION_ID") {
            self.sessions.default_session_id = value;
        }

        let log_level =
            read_env("SLOTBOT_LOGGING_LEVEL").or_else(|| read_env("SLOTBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SLOTBOT_LOGGING_FORMAT").or_else(|| read_env("SLOTBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(similarity_threshold) = overrides.similarity_threshold {
            self.dialogue.similarity_threshold = similarity_threshold;
        }
        if let Some(matcher) = overrides.matcher {
            self.dialogue.matcher = matcher;
        }
        if let Some(catalog_path) = overrides.catalog_path {
            self.dialogue.catalog_path = Some(catalog_path);
        }
        if let Some(idle_timeout_secs) = overrides.idle_timeout_secs {
            self.sessions.idle_timeout_secs = idle_timeout_secs;
        }
        if let Some(max_sessions) = overrides.max_sessions {
            self.sessions.max_sessions = max_sessions;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_dialogue(&self.dialogue)?;
        validate_sessions(&self.sessions)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("slotbot.toml"), PathBuf::from("config/slotbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_dialogue(dialogue: &DialogueConfig) -> Result<(), ConfigError> {
    let threshold = dialogue.similarity_threshold;
    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        return Err(ConfigError::Validation(
            "dialogue.similarity_threshold must be in range 0.0..=1.0".to_string(),
        ));
    }

    if dialogue.fallback_intent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "dialogue.fallback_intent must name an intent from the catalog".to_string(),
        ));
    }

    Ok(())
}

fn validate_sessions(sessions: &SessionConfig) -> Result<(), ConfigError> {
    if sessions.idle_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "sessions.idle_timeout_secs must be greater than zero".to_string(),
        ));
    }

    if sessions.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "sessions.sweep_interval_secs must be greater than zero".to_string(),
        ));
    }

    if sessions.max_sessions == 0 {
        return Err(ConfigError::Validation(
            "sessions.max_sessions must be greater than zero".to_string(),
        ));
    }

    if sessions.default_session_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "sessions.default_session_id must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    dialogue: Option<DialoguePatch>,
    sessions: Option<SessionPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DialoguePatch {
    similarity_threshold: Option<f64>,
    fallback_intent: Option<String>,
    matcher: Option<MatcherKind>,
    catalog_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    idle_timeout_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
    max_sessions: Option<usize>,
    default_session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

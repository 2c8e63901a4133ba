use std::env;
use std::fs;
use std::path::Path;

use slotbot_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG_VALIDATION};

pub fn run(options: LoadOptions) -> CommandResult {
    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                error.to_string(),
                EXIT_CONFIG_VALIDATION,
            )
        }
    };

    CommandResult { exit_code: 0, output: render(&config, config_file_path.as_deref()) }
}

pub fn render(config: &AppConfig, config_file_path: Option<&Path>) -> String {
    let config_file_doc = load_config_file_doc(config_file_path);
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path)
    };

    let catalog_path = config
        .dialogue
        .catalog_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<builtin>".to_string());

    let field = |key: &str, value: String, env_keys: &[&str]| {
        render_line(key, &value, source(key, env_keys))
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.push(field(
        "server.bind_address",
        config.server.bind_address.clone(),
        &["SLOTBOT_SERVER_BIND_ADDRESS"],
    ));
    lines.push(field("server.port", config.server.port.to_string(), &["SLOTBOT_SERVER_PORT"]));
    lines.push(field(
        "server.graceful_shutdown_secs",
        config.server.graceful_shutdown_secs.to_string(),
        &["SLOTBOT_SERVER_GRACEFUL_SHUTDOWN_SECS"],
    ));

    lines.push(field(
        "dialogue.similarity_threshold",
        config.dialogue.similarity_threshold.to_string(),
        &["SLOTBOT_DIALOGUE_SIMILARITY_THRESHOLD"],
    ));
    lines.push(field(
        "dialogue.fallback_intent",
        config.dialogue.fallback_intent.clone(),
        &["SLOTBOT_DIALOGUE_FALLBACK_INTENT"],
    ));
    lines.push(field(
        "dialogue.matcher",
        config.dialogue.matcher.name().to_string(),
        &["SLOTBOT_DIALOGUE_MATCHER"],
    ));
    lines.push(field("dialogue.catalog_path", catalog_path, &["SLOTBOT_DIALOGUE_CATALOG_PATH"]));

    lines.push(field(
        "sessions.idle_timeout_secs",
        config.sessions.idle_timeout_secs.to_string(),
        &["SLOTBOT_SESSIONS_IDLE_TIMEOUT_SECS"],
    ));
    lines.push(field(
        "sessions.sweep_interval_secs",
        config.sessions.sweep_interval_secs.to_string(),
        &["SLOTBOT_SESSIONS_SWEEP_INTERVAL_SECS"],
    ));
    lines.push(field(
        "sessions.max_sessions",
        config.sessions.max_sessions.to_string(),
        &["SLOTBOT_SESSIONS_MAX_SESSIONS"],
    ));
    lines.push(field(
        "sessions.default_session_id",
        config.sessions.default_session_id.clone(),
        &["SLOTBOT_SESSIONS_DEFAULT_SESSION_ID"],
    ));

    lines.push(field(
        "logging.level",
        config.logging.level.clone(),
        &["SLOTBOT_LOGGING_LEVEL", "SLOTBOT_LOG_LEVEL"],
    ));
    lines.push(field(
        "logging.format",
        format!("{:?}", config.logging.format).to_ascii_lowercase(),
        &["SLOTBOT_LOGGING_FORMAT", "SLOTBOT_LOG_FORMAT"],
    ));

    lines.join("\n")
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
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
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

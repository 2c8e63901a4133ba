pub mod chat;
pub mod classify;
pub mod config;

use serde::Serialize;
use slotbot_agent::ChatRuntime;
use slotbot_core::config::{AppConfig, LoadOptions};

pub const EXIT_RUNTIME_FAILURE: u8 = 1;
pub const EXIT_CONFIG_VALIDATION: u8 = 2;
pub const EXIT_RUNTIME_INIT: u8 = 3;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(&payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }
}

/// Loads config and builds an in-process runtime, or the failure to report for `command`.
pub(crate) fn load_runtime(
    command: &str,
    options: LoadOptions,
) -> Result<(AppConfig, ChatRuntime), CommandResult> {
    let config = AppConfig::load(options).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            error.to_string(),
            EXIT_CONFIG_VALIDATION,
        )
    })?;

    let runtime = ChatRuntime::from_config(&config).map_err(|error| {
        CommandResult::failure(command, "runtime_init", error.to_string(), EXIT_RUNTIME_INIT)
    })?;

    Ok((config, runtime))
}

pub(crate) fn serialize_payload<T: Serialize>(payload: &T) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

use std::sync::Arc;

use slotbot_agent::ChatRuntime;
use slotbot_core::config::{AppConfig, ConfigError, LoadOptions};
use slotbot_core::errors::ApplicationError;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub runtime: Arc<ChatRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("chat runtime initialization failed: {0}")]
    Runtime(#[from] ApplicationError),
}

pub fn load_config(options: LoadOptions) -> Result<AppConfig, BootstrapError> {
    Ok(AppConfig::load(options)?)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let runtime = ChatRuntime::from_config(&config)?;
    info!(
        event_name = "system.bootstrap.runtime_ready",
        correlation_id = "bootstrap",
        intents = runtime.engine().catalog().len(),
        catalog = config
            .dialogue
            .catalog_path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "builtin".to_string()),
        "chat runtime ready"
    );

    Ok(Application { config, runtime: Arc::new(runtime) })
}

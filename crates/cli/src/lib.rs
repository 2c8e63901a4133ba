pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use slotbot_core::config::LoadOptions;

#[derive(Debug, Parser)]
#[command(
    name = "slotbot",
    about = "Slotbot operator CLI",
    long_about = "Talk to the slot-filling chatbot in-process, inspect intent classification, and review effective configuration.",
    after_help = "Examples:\n  slotbot chat --session demo\n  slotbot classify \"I want to book a flight\"\n  slotbot config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a slotbot.toml config file")]
    config_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive conversation; type `bye` or send EOF to exit")]
    Chat {
        #[arg(long, help = "Session id to converse under (defaults to the configured session)")]
        session: Option<String>,
    },
    #[command(about = "Classify a message and print the detected intent as JSON")]
    Classify {
        #[arg(help = "Message text to classify")]
        text: String,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions {
        require_file: cli.config_file.is_some(),
        config_path: cli.config_file,
        ..LoadOptions::default()
    };

    let result = match cli.command {
        Command::Chat { session } => commands::chat::run(options, session.as_deref()),
        Command::Classify { text } => commands::classify::run(options, &text),
        Command::Config => commands::config::run(options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

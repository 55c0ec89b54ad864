pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dermadesk_core::config::LoadOptions;

#[derive(Debug, Parser)]
#[command(
    name = "dermadesk",
    about = "Skincare support assistant with human-approved cart changes",
    long_about = "Chat with the skincare support assistant, prepare its catalog database, and inspect configuration.",
    after_help = "Examples:\n  dermadesk seed\n  dermadesk chat\n  dermadesk chat --session 3f2c...\n  dermadesk config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a dermadesk.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive support conversation")]
    Chat {
        #[arg(long, help = "Resume an existing session instead of starting a new one")]
        session: Option<String>,
    },
    #[command(about = "Discard a session's checkpoint without running its pending actions")]
    Cancel {
        #[arg(long)]
        session: String,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Reset the catalog to the demo skincare products and clear carts and sessions"
    )]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions {
        require_file: cli.config.is_some(),
        config_path: cli.config,
        ..LoadOptions::default()
    };

    let result = match cli.command {
        Command::Chat { session } => commands::chat::run(options, session),
        Command::Cancel { session } => commands::cancel::run(options, &session),
        Command::Migrate => commands::migrate::run(options),
        Command::Seed => commands::seed::run(options),
        Command::Config => commands::config::run(options),
    };

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    ExitCode::from(result.exit_code)
}

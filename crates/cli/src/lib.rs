pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "vitrine",
    about = "Vitrine operator CLI",
    long_about = "Inspect configuration, check readiness, apply migrations, and explain how a \
                  visitor message would be routed.",
    after_help = "Examples:\n  vitrine doctor --json\n  vitrine config\n  vitrine explain \"code promo ?\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, LLM credentials, knowledge file, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Classify a message and show the reply plan without calling the provider")]
    Explain {
        #[arg(help = "Visitor message to explain")]
        message: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Explain { message } => commands::explain::run(&message),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

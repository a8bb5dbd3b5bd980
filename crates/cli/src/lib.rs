pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "quoteflow",
    about = "Quoteflow operator CLI",
    long_about = "Inspect configuration, check Salesforce readiness, and drive scripted wizard submissions.",
    after_help = "Examples:\n  quoteflow doctor --json\n  quoteflow config\n  quoteflow submit --file quotation.toml"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config and acquire a Salesforce token as a live readiness check")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Drive one wizard session through every step from a TOML script")]
    Submit {
        #[arg(long, value_name = "SCRIPT", help = "Path to the submission script")]
        file: PathBuf,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Submit { file } => commands::submit::run(&file),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

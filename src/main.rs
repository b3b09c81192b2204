use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;

use fieldguard::report::OutputFormat;

mod commands;

#[derive(Parser)]
#[command(
    name = "fieldguard",
    about = "Checks that required fields in scenes and resources are assigned",
    version,
    author,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the project root
    #[arg(short, long, default_value = ".", global = true)]
    project: String,

    /// Enable verbose output (use -vv for debug output)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every scene and resource in the project (default command)
    Check {
        /// Do not print a summary when validation passes
        #[arg(short, long)]
        quiet: bool,

        /// Output format for violations
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show the validation rules enforced for a script type
    Rules {
        #[arg(help = "Script path or class name (e.g., 'res://player.gd' or 'Player')")]
        type_name: String,
    },

    /// List the files a check would scan
    Files,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Check { quiet, format }) => commands::check_command(&cli.project, quiet, format),
        Some(Commands::Rules { type_name }) => {
            commands::rules_command(&cli.project, &type_name)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Files) => {
            commands::files_command(&cli.project)?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            // Default to check command
            commands::check_command(&cli.project, false, OutputFormat::Text)
        }
    }
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbose {
        0 => EnvFilter::new("fieldguard=warn"),
        1 => EnvFilter::new("fieldguard=info"),
        _ => EnvFilter::new("fieldguard=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

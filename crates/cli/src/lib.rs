pub mod commands;

use clap::{Args, Parser, Subcommand, ValueEnum};
use splitflow_store::ResourceProfile;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "splitflow",
    about = "Splitflow operator CLI",
    long_about = "Inspect configuration, check backend readiness, and collect orphaned draft documents left behind by interrupted split workflows.",
    after_help = "Examples:\n  splitflow doctor --json\n  splitflow config\n  splitflow sweep --profile delivery-notes --dry-run"
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
    #[command(about = "Validate config and backend reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
        #[arg(long, value_enum, default_value_t = ProfileArg::DeliveryNotes, help = "Resource pair to probe")]
        profile: ProfileArg,
    },
    #[command(about = "Delete orphaned draft documents older than the age cutoff")]
    Sweep(SweepArgs),
}

#[derive(Args, Debug)]
pub struct SweepArgs {
    #[arg(long, value_enum, default_value_t = ProfileArg::DeliveryNotes, help = "Resource pair to sweep")]
    pub profile: ProfileArg,
    #[arg(long, help = "Override the configured minimum draft age in hours")]
    pub older_than_hours: Option<i64>,
    #[arg(long, help = "Narrow the sweep to drafts of one parent document")]
    pub parent: Option<String>,
    #[arg(long, help = "List stale drafts without deleting anything")]
    pub dry_run: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProfileArg {
    DeliveryNotes,
    PurchaseOrders,
}

impl ProfileArg {
    pub fn resolve(self) -> ResourceProfile {
        match self {
            Self::DeliveryNotes => ResourceProfile::delivery_notes(),
            Self::PurchaseOrders => ResourceProfile::purchase_orders(),
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json, profile } => commands::CommandResult {
            exit_code: 0,
            output: commands::doctor::run(json, profile.resolve()),
        },
        Command::Sweep(args) => commands::sweep::run(&args),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

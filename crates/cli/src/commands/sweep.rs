use chrono::Duration;
use serde_json::json;

use splitflow_core::config::{AppConfig, LoadOptions};
use splitflow_core::domain::parent::ParentId;
use splitflow_core::store::StoreError;
use splitflow_core::workflow::sweep_orphaned_drafts;
use splitflow_store::RestStore;

use super::CommandResult;
use crate::SweepArgs;

pub fn run(args: &SweepArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("sweep", "config_validation", error.to_string(), 2);
        }
    };
    init_logging(&config);

    let min_age_hours = args.older_than_hours.unwrap_or(config.sweep.min_age_hours);
    if min_age_hours < 0 {
        return CommandResult::failure(
            "sweep",
            "invalid_arguments",
            format!("--older-than-hours must not be negative, got {min_age_hours}"),
            2,
        );
    }

    let store = match RestStore::new(&config.store, args.profile.resolve()) {
        Ok(store) => store,
        Err(error) => return CommandResult::failure("sweep", "store_init", error.to_string(), 3),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "sweep",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let parent = args.parent.clone().map(ParentId);
    let result = runtime.block_on(sweep_orphaned_drafts(
        &store,
        parent.as_ref(),
        Duration::hours(min_age_hours),
        args.dry_run,
    ));

    match result {
        Ok(report) => {
            let details = json!({
                "examined": report.examined,
                "stale": report.stale.iter().map(|id| id.0.clone()).collect::<Vec<_>>(),
                "deleted": report.deleted.iter().map(|id| id.0.clone()).collect::<Vec<_>>(),
                "failed": report
                    .failed
                    .iter()
                    .map(|(id, error)| json!({ "child_id": id.0, "error": error.to_string() }))
                    .collect::<Vec<_>>(),
                "cutoff": report.cutoff.to_rfc3339(),
                "dry_run": report.dry_run,
            });

            let message = if report.dry_run {
                format!(
                    "dry run: {} of {} draft(s) are older than the cutoff",
                    report.stale.len(),
                    report.examined
                )
            } else {
                format!("deleted {} of {} stale draft(s)", report.deleted.len(), report.stale.len())
            };

            if report.failed.is_empty() {
                CommandResult::success_with_details("sweep", message, details)
            } else {
                CommandResult::failure_with_details(
                    "sweep",
                    "partial_failure",
                    format!("{message}; {} delete(s) failed", report.failed.len()),
                    details,
                    4,
                )
            }
        }
        Err(error) => {
            let (error_class, exit_code) = match &error {
                StoreError::Unavailable(_) => ("store_unavailable", 5),
                StoreError::Rejected(_) => ("store_rejected", 4),
                StoreError::NotFound(_) => ("not_found", 4),
            };
            CommandResult::failure("sweep", error_class, error.to_string(), exit_code)
        }
    }
}

fn init_logging(config: &AppConfig) {
    use splitflow_core::config::LogFormat::*;
    use tracing_subscriber::filter::LevelFilter;

    let log_level = config.logging.level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);

    // try_init so repeated invocations in-process (tests) stay quiet.
    let result = match config.logging.format {
        Compact => tracing_subscriber::fmt()
            .with_target(false)
            .with_max_level(log_level)
            .compact()
            .try_init(),
        Pretty => tracing_subscriber::fmt()
            .with_target(false)
            .with_max_level(log_level)
            .pretty()
            .try_init(),
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().try_init()
        }
    };
    let _ = result;
}

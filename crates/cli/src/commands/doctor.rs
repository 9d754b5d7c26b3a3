use serde::Serialize;
use splitflow_core::config::{AppConfig, LoadOptions};
use splitflow_core::store::ChildStore;
use splitflow_store::{ResourceProfile, RestStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool, profile: ResourceProfile) -> String {
    let report = build_report(profile);

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report(profile: ResourceProfile) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_api_token(&config));
            checks.push(check_store_reachability(&config, profile));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "api_token_presence",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
            checks.push(DoctorCheck {
                name: "store_reachability",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }

    let all_usable = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if all_usable { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_usable {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_api_token(config: &AppConfig) -> DoctorCheck {
    let details = if config.store.api_token.is_some() {
        "api token configured".to_string()
    } else {
        "no api token configured; requests are sent unauthenticated".to_string()
    };
    DoctorCheck { name: "api_token_presence", status: CheckStatus::Pass, details }
}

fn check_store_reachability(config: &AppConfig, profile: ResourceProfile) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "store_reachability",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let store = RestStore::new(&config.store, profile)
            .map_err(|error| format!("failed to build http client: {error}"))?;
        let drafts = store
            .list_drafts(None)
            .await
            .map_err(|error| format!("failed to reach backend: {error}"))?;
        Ok::<usize, String>(drafts.len())
    });

    match result {
        Ok(count) => DoctorCheck {
            name: "store_reachability",
            status: CheckStatus::Pass,
            details: format!(
                "listed {count} draft {}(s) at `{}`",
                profile.child_label, config.store.base_url
            ),
        },
        Err(error) => {
            DoctorCheck { name: "store_reachability", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

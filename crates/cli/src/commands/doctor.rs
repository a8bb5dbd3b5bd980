use quoteflow_core::config::{AppConfig, LoadOptions};
use quoteflow_crm::SalesforceSync;
use serde::Serialize;

use crate::commands::{CommandResult, EXIT_CONFIG, EXIT_OK, EXIT_RUNTIME, EXIT_UPSTREAM};

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
    command: &'static str,
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    fn exit_code(&self) -> u8 {
        let failed = |name: &str| {
            self.checks.iter().any(|check| check.name == name && check.status == CheckStatus::Fail)
        };
        if failed("config_validation") {
            EXIT_CONFIG
        } else if failed("runtime") {
            EXIT_RUNTIME
        } else if failed("salesforce_token") {
            EXIT_UPSTREAM
        } else {
            EXIT_OK
        }
    }
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report(AppConfig::load(LoadOptions::default()));
    let exit_code = report.exit_code();

    if json_output {
        return CommandResult::report(exit_code, &report);
    }
    CommandResult::text(exit_code, render_human(&report))
}

fn build_report(
    loaded: Result<AppConfig, quoteflow_core::config::ConfigError>,
) -> DoctorReport {
    let mut checks = Vec::new();

    match loaded {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_salesforce_token(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "salesforce_token",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { command: "doctor", overall_status, summary, checks }
}

fn check_salesforce_token(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "runtime",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let sync = SalesforceSync::from_config(&config.salesforce)
            .map_err(|error| format!("failed to build http client: {error}"))?;
        sync.acquire_token().await.map_err(|error| error.to_string())
    });

    match result {
        Ok(token) => DoctorCheck {
            name: "salesforce_token",
            status: CheckStatus::Pass,
            details: format!("token acquired for instance `{}`", token.instance_url),
        },
        Err(details) => DoctorCheck { name: "salesforce_token", status: CheckStatus::Fail, details },
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

#[cfg(test)]
mod tests {
    use quoteflow_core::config::ConfigError;

    use super::{build_report, render_human, CheckStatus};
    use crate::commands::EXIT_CONFIG;

    #[test]
    fn config_failure_skips_the_token_check() {
        let report =
            build_report(Err(ConfigError::Validation("salesforce.login_url is required".into())));

        assert_eq!(report.overall_status, CheckStatus::Fail);
        assert_eq!(report.exit_code(), EXIT_CONFIG);
        assert_eq!(report.checks[1].status, CheckStatus::Skipped);

        let human = render_human(&report);
        assert!(human.contains("- [fail] config_validation: configuration validation failed"));
        assert!(human.contains("- [skip] salesforce_token"));
    }
}

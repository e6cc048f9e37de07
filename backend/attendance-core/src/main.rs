// src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use attendance_core::{feed, AppConfig, AuditRecord, CalendarBasis, DateInput, MAX_NUM_WEEKS};

const EXIT_COMPLIANT: u8 = 0;
const EXIT_FAILURE: u8 = 1;
// Exit code when the evaluation succeeded but the policy is not met
const EXIT_NOT_COMPLIANT: u8 = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Checks office attendance against the rolling alignment-period policy.
#[derive(Parser, Debug)]
#[command(name = "attendance-check", version, about)]
struct Cli {
    /// Calculation date (defaults to today under the configured UTC offset)
    #[arg(long = "on", value_name = "DATE")]
    on: Option<String>,

    /// CSV export with one attendance date per row
    #[arg(long, value_name = "CSV")]
    file: Option<PathBuf>,

    /// Name of the date column in the CSV export
    #[arg(long, value_name = "NAME", requires = "file")]
    column: Option<String>,

    /// Additional attendance date (repeatable)
    #[arg(long = "day", value_name = "DATE")]
    days: Vec<String>,

    /// Alignment period length in weeks
    #[arg(
        long,
        value_name = "N",
        value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_NUM_WEEKS))
    )]
    weeks: Option<u32>,

    /// Number of lowest-attendance weeks to drop
    #[arg(long, value_name = "N")]
    excluded: Option<u32>,

    /// Attendance days required across the included weeks
    #[arg(long, value_name = "N")]
    required: Option<u32>,

    /// Offset used to turn timestamps into calendar days (Z, ±HH:MM)
    #[arg(long = "utc-offset", value_name = "OFFSET")]
    utc_offset: Option<CalendarBasis>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

impl Cli {
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(weeks) = self.weeks {
            config.num_weeks = weeks;
        }
        if let Some(excluded) = self.excluded {
            config.excluded_weeks = excluded;
        }
        if let Some(required) = self.required {
            config.required_included_days = required;
        }
        if let Some(basis) = self.utc_offset {
            config.utc_offset = basis;
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Rendered output of one evaluation and its verdict.
#[derive(Debug)]
struct Report {
    rendered: String,
    is_compliant: bool,
}

fn run(cli: &Cli, mut config: AppConfig) -> Result<Report> {
    cli.apply_overrides(&mut config);
    for warning in config.validate() {
        warn!("Configuration: {}", warning);
    }
    debug!("Effective configuration: {:?}", config);

    let calculation_date = match &cli.on {
        Some(raw) => DateInput::from(raw.as_str()),
        None => DateInput::from(config.utc_offset.today()),
    };

    let mut attendance = Vec::new();
    if let Some(path) = &cli.file {
        let records = feed::read_attendance_file(path, cli.column.as_deref())
            .with_context(|| format!("Failed to read attendance feed {}", path.display()))?;
        attendance.extend(records);
    }
    attendance.extend(cli.days.iter().map(|day| DateInput::from(day.as_str())));

    let result = config
        .evaluator()
        .evaluate(calculation_date, attendance)
        .context("Compliance evaluation failed")?;

    let audit = AuditRecord::from_result(&result);
    audit.emit();

    let rendered = match cli.format {
        OutputFormat::Text => result.to_string(),
        OutputFormat::Json => {
            let output = serde_json::json!({ "result": &result, "audit": &audit });
            format!("{}\n", serde_json::to_string_pretty(&output)?)
        }
    };

    Ok(Report {
        rendered,
        is_compliant: result.is_compliant,
    })
}

fn exit_status(outcome: &Result<Report>) -> u8 {
    match outcome {
        Ok(report) if report.is_compliant => EXIT_COMPLIANT,
        Ok(_) => {
            info!("Attendance policy not met");
            EXIT_NOT_COMPLIANT
        }
        Err(e) => {
            error!("{:#}", e);
            EXIT_FAILURE
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let outcome = AppConfig::from_env()
        .context("Failed to load attendance configuration")
        .and_then(|config| run(&cli, config));
    if let Ok(report) = &outcome {
        print!("{}", report.rendered);
    }
    ExitCode::from(exit_status(&outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn overrides_replace_configured_policy() {
        let cli = Cli::try_parse_from([
            "attendance-check",
            "--on",
            "2025-04-16",
            "--weeks",
            "6",
            "--required",
            "10",
            "--utc-offset",
            "+01:00",
            "--day",
            "2025-04-07",
            "--day",
            "2025-04-08",
            "--format",
            "json",
        ])
        .unwrap();

        let mut config = AppConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.num_weeks, 6);
        assert_eq!(config.excluded_weeks, 4);
        assert_eq!(config.required_included_days, 10);
        assert_eq!(config.utc_offset.to_string(), "+01:00");
        assert_eq!(cli.days.len(), 2);
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn invalid_offset_is_rejected_at_parse_time() {
        let err = Cli::try_parse_from(["attendance-check", "--utc-offset", "Europe/Paris"])
            .unwrap_err();
        assert!(err.to_string().contains("Europe/Paris"), "{}", err);
    }

    #[test]
    fn column_requires_a_file() {
        assert!(Cli::try_parse_from(["attendance-check", "--column", "date"]).is_err());
    }

    #[test]
    fn oversized_window_is_rejected_at_parse_time() {
        assert!(Cli::try_parse_from(["attendance-check", "--weeks", "13000000"]).is_err());
        let cli = Cli::try_parse_from(["attendance-check", "--weeks", "520"]).unwrap();
        assert_eq!(cli.weeks, Some(MAX_NUM_WEEKS));
    }

    // 2025-04-07 and 2025-04-08 fall in the last week of the period seen on 2025-04-16
    fn cli(extra: &[&str]) -> Cli {
        let mut args = vec![
            "attendance-check",
            "--on",
            "2025-04-16",
            "--day",
            "2025-04-07",
            "--day",
            "2025-04-08",
            "--day",
            "2025-04-08T17:30:00Z",
        ];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn text_report_lists_weeks_and_verdict() {
        let report = run(&cli(&["--required", "2"]), AppConfig::default()).unwrap();

        assert!(report.is_compliant);
        let lines: Vec<&str> = report.rendered.lines().collect();
        assert_eq!(
            lines[0],
            "Alignment period: 2025-01-19 to 2025-04-12 (12 weeks, calculated on 2025-04-16)"
        );
        assert_eq!(lines.len(), 1 + 12 + 2);
        assert!(lines[1].ends_with("0 days  (excluded)"), "{}", lines[1]);
        assert!(lines[12].contains("2025-04-06 to 2025-04-12  2 days"), "{}", lines[12]);
        assert_eq!(
            lines[13],
            "Included days: 2 of 2 required (avg 0.25 per included week)"
        );
        assert_eq!(lines[14], "Verdict: compliant");
    }

    #[test]
    fn json_report_carries_result_and_audit() {
        let report = run(&cli(&["--format", "json"]), AppConfig::default()).unwrap();
        assert!(!report.is_compliant);
        assert!(report.rendered.ends_with('\n'));

        let json: serde_json::Value = serde_json::from_str(&report.rendered).unwrap();
        assert_eq!(json["result"]["period"]["start"], "2025-01-19");
        assert_eq!(json["result"]["period"]["end"], "2025-04-12");
        assert_eq!(json["result"]["is_compliant"], false);
        assert_eq!(json["result"]["total_included_days"], 2);
        assert_eq!(json["result"]["included_weeks"].as_array().unwrap().len(), 8);
        assert_eq!(json["audit"]["records_received"], 3);
        assert_eq!(json["audit"]["unique_days"], 2);
        assert_eq!(json["audit"]["required_included_days"], 24);
        assert_eq!(
            json["audit"]["attendance_fingerprint"].as_str().map(str::len),
            Some(64)
        );
    }

    #[test]
    fn configuration_applies_when_no_flag_overrides_it() {
        let config = AppConfig {
            required_included_days: 2,
            ..AppConfig::default()
        };
        let report = run(&cli(&[]), config).unwrap();
        assert!(report.is_compliant);
    }

    #[test]
    fn verdicts_map_to_exit_codes() {
        let compliant = run(&cli(&["--required", "2"]), AppConfig::default());
        assert_eq!(exit_status(&compliant), 0);

        let short = run(&cli(&[]), AppConfig::default());
        assert_eq!(exit_status(&short), 2);
    }

    #[test]
    fn failures_map_to_exit_code_one() {
        let bad_date = Cli::try_parse_from(["attendance-check", "--on", "2025-02-30"]).unwrap();
        let outcome = run(&bad_date, AppConfig::default());
        let err = outcome.as_ref().unwrap_err();
        assert!(format!("{:#}", err).contains("not a valid calendar date"), "{:#}", err);
        assert_eq!(exit_status(&outcome), 1);

        let missing_feed = Cli::try_parse_from([
            "attendance-check",
            "--on",
            "2025-04-16",
            "--file",
            "/nonexistent/attendance.csv",
        ])
        .unwrap();
        let outcome = run(&missing_feed, AppConfig::default());
        let err = outcome.as_ref().unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read attendance feed"), "{:#}", err);
        assert_eq!(exit_status(&outcome), 1);
    }
}

//! kavi-scan - device security scan
//!
//! Runs the threat detectors over a captured device snapshot (JSON), prints
//! the weighted report and appends it to the report log in the database.

use anyhow::{Context, Result};
use clap::Parser;
use kavi_core::security::{create_default_analyzer, DeviceSnapshot, SecurityReport};
use kavi_core::{Config, Database};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kavi-scan")]
#[command(about = "Scan a device snapshot for spyware indicators")]
#[command(version)]
struct Args {
    /// Device snapshot to scan
    #[arg(required_unless_present_any = ["list_detectors", "history"])]
    snapshot: Option<PathBuf>,

    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Also check system settings and persistent services
    #[arg(long)]
    extended: bool,

    /// Don't write the report to the database
    #[arg(long)]
    no_save: bool,

    /// List the detectors that would run, then exit
    #[arg(long)]
    list_detectors: bool,

    /// Show the N most recent stored reports instead of scanning
    #[arg(long, value_name = "N")]
    history: Option<usize>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    let mut config = Config::load().context("failed to load configuration")?;
    if args.extended {
        config.security.extended_checks = true;
    }

    let _log_guard =
        kavi_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let analyzer = create_default_analyzer(&config.security, &config.assistant.self_package);

    if args.list_detectors {
        println!("Available detectors:");
        for name in analyzer.detector_names() {
            println!("  - {}", name);
        }
        return Ok(());
    }

    let db_path = Config::database_path();
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    if let Some(limit) = args.history {
        let reports = db
            .recent_security_reports(limit)
            .context("failed to load stored reports")?;
        if args.format == "json" {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        } else if reports.is_empty() {
            println!("No stored reports.");
        } else {
            for report in &reports {
                println!(
                    "{}  {:<8} score {:>3}  {}",
                    report.generated_at.format("%Y-%m-%d %H:%M"),
                    report.threat_level.as_str(),
                    report.total_score,
                    report.summary
                );
            }
        }
        return Ok(());
    }

    let Some(path) = args.snapshot.as_ref() else {
        anyhow::bail!("no snapshot given");
    };
    let snapshot = DeviceSnapshot::load(path)
        .with_context(|| format!("failed to load device snapshot {}", path.display()))?;

    tracing::info!(path = %path.display(), "Scanning device snapshot");
    let report = analyzer.analyze(&snapshot);

    if !args.no_save {
        db.insert_security_report(&report)
            .context("failed to store report")?;
    }

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text_report(&report);
    }

    Ok(())
}

fn print_text_report(report: &SecurityReport) {
    println!(
        "Threat level: {} (score {})",
        report.threat_level, report.total_score
    );
    println!("{}", report.summary);
    if report.threats.is_empty() {
        return;
    }

    println!();
    for threat in &report.threats {
        let severity = format!("{:?}", threat.severity).to_lowercase();
        println!(
            "  [{:<9}] {:>3}  {}",
            severity, threat.score, threat.description
        );
        if let Some(package) = &threat.package_name {
            println!("               package: {}", package);
        }
    }
}

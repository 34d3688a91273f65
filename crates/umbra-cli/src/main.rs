//! `umbra` – command line entry point.
//!
//! ```text
//! umbra replay <scenario.json>   feed a recorded scenario through the detector
//! umbra config                   print the effective configuration
//! umbra config init              write the default configuration file
//! umbra help                     show this message
//! ```
//!
//! Ctrl-C stops a running replay after the pass in flight completes.

mod config;
mod replay;
mod scenario;

use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

fn main() -> ExitCode {
    let _telemetry = umbra_runtime::init_tracing("umbra");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["replay", path] => cmd_replay(Path::new(path)),
        ["config"] => cmd_config(),
        ["config", "init"] => cmd_config_init(),
        [] | ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => Err(format!("Unknown command: {}", other.join(" "))),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_replay(path: &Path) -> Result<(), String> {
    let cfg = config::effective()?;
    let scenario = scenario::load(path)?;

    println!(
        "  Replaying {} ({} scan(s), grid {})",
        path.display().to_string().bold(),
        scenario.scans.len(),
        if scenario.grid.is_some() { "present".green() } else { "missing".yellow() },
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping replay …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; replay cannot be interrupted");
    }

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start async runtime: {}", e))?;
    let report = runtime.block_on(replay::run(scenario, &cfg, shutdown))?;

    for (i, detections) in report.detections.iter().enumerate() {
        if detections.points.is_empty() {
            println!("  {} {}", format!("[{i:>4}]").dimmed(), "no hidden people".dimmed());
            continue;
        }
        let points: Vec<String> = detections
            .points
            .iter()
            .map(|p| format!("({:.3}, {:.3})", p.x, p.y))
            .collect();
        println!(
            "  {} {} in {}: {}",
            format!("[{i:>4}]").dimmed(),
            format!("{} candidate(s)", points.len()).green().bold(),
            detections.frame_id.cyan(),
            points.join(", "),
        );
    }

    let s = report.stats;
    println!();
    println!(
        "  {} scans received, {} dropped, {} passes completed, {} skipped (no grid)",
        s.scans_received.to_string().bold(),
        s.scans_dropped.to_string().bold(),
        s.passes_completed.to_string().bold(),
        s.passes_skipped.to_string().bold(),
    );
    if report.interrupted {
        println!("  {}", "Replay interrupted.".yellow());
    }
    Ok(())
}

fn cmd_config() -> Result<(), String> {
    let cfg = config::effective()?;
    let path = config::config_path();
    let source = if path.exists() { path.display().to_string() } else { "defaults".to_string() };
    println!("  {} {}", "# source:".dimmed(), source.bold());
    let raw = toml::to_string_pretty(&cfg).map_err(|e| format!("Failed to render config: {}", e))?;
    println!("{raw}");
    Ok(())
}

fn cmd_config_init() -> Result<(), String> {
    let path = config::config_path();
    if config::load()?.is_some() {
        println!("  Config already exists at {}", path.display().to_string().bold());
        return Ok(());
    }
    config::save(&config::Config::default())?;
    println!("  {} Config saved to {}", "✓".green().bold(), path.display().to_string().bold());
    Ok(())
}

fn print_usage() {
    println!();
    println!("  {} {}", "umbra".bold(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!("  Occluded-human inference from range scans");
    println!();
    println!("  {}", "Usage:".bold());
    println!("    umbra replay <scenario.json>   feed a recorded scenario through the detector");
    println!("    umbra config                   print the effective configuration");
    println!("    umbra config init              write the default configuration file");
    println!();
}

//! Capture command handlers for the raw and filter subcommands.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};

use dvbcap::capture::{CaptureOptions, CaptureOrchestrator, CaptureReport};
use dvbcap::runner::{ProcessRunner, SystemRunner};
use dvbcap::settings::Settings;
use dvbcap::tools::{DvbZap, Tshark};
use dvbcap::PidSelector;

use crate::commands::load_channels;
use crate::context::CaptureArgs;

/// Raw command implementation.
pub fn cmd_raw(
    args: CaptureArgs,
    settings: &Settings,
    interrupted: Arc<AtomicBool>,
    verbose: bool,
) -> i32 {
    let options = build_options(args, None, settings);
    run_capture(options, settings, interrupted, verbose)
}

/// Filter command implementation.
pub fn cmd_filter(
    args: CaptureArgs,
    pids: Vec<u16>,
    skip_pids: Vec<u16>,
    settings: &Settings,
    interrupted: Arc<AtomicBool>,
    verbose: bool,
) -> i32 {
    let selector = match resolve_selector(&pids, &skip_pids, settings) {
        Ok(selector) => selector,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    let options = build_options(args, Some(selector), settings);
    run_capture(options, settings, interrupted, verbose)
}

/// Selector for the filter subcommand. With neither list given, the
/// configured default PIDs are kept.
fn resolve_selector(
    pids: &[u16],
    skip_pids: &[u16],
    settings: &Settings,
) -> Result<PidSelector, dvbcap_channels::ConfigError> {
    match PidSelector::from_lists(pids, skip_pids)? {
        Some(selector) => Ok(selector),
        None => {
            let defaults = settings.default_pids();
            info!("No PIDs given, keeping {:?}", defaults);
            PidSelector::keep(defaults)
        }
    }
}

/// Merge command-line arguments over the settings file.
fn build_options(
    args: CaptureArgs,
    selector: Option<PidSelector>,
    settings: &Settings,
) -> CaptureOptions {
    let defaults = CaptureOptions::new(args.channel_file);
    let duration = args
        .duration
        .or(settings.capture.duration)
        .map(Duration::from_secs)
        .unwrap_or(defaults.duration);

    CaptureOptions {
        duration,
        prefix: args
            .prefix
            .or_else(|| settings.capture.prefix.clone())
            .unwrap_or(defaults.prefix.clone()),
        output_dir: args
            .path
            .or_else(|| settings.capture.path.clone())
            .unwrap_or(defaults.output_dir.clone()),
        selector,
        continue_on_error: args.continue_on_error,
        ..defaults
    }
}

fn run_capture(
    options: CaptureOptions,
    settings: &Settings,
    interrupted: Arc<AtomicBool>,
    verbose: bool,
) -> i32 {
    let channels = match load_channels(&options.channel_file) {
        Ok(channels) => channels,
        Err(code) => return code,
    };

    if channels.is_empty() {
        warn!("No channels defined in {}", options.channel_file.display());
        return 0;
    }

    info!(
        "Capturing {} channel(s) for {}s each into {}",
        channels.len(),
        options.duration.as_secs(),
        options.output_dir.display()
    );

    let runner: Arc<dyn ProcessRunner> = Arc::new(SystemRunner::default());
    let zap = DvbZap::new(settings.zap_path(), runner.clone()).with_grace(settings.capture_grace());
    let tshark = Tshark::new(settings.tshark_path(), runner);

    let orchestrator =
        CaptureOrchestrator::new(options, &zap, &tshark).with_interrupt_flag(interrupted);

    let show = show_progress(verbose, log::log_enabled!(log::Level::Info));
    let progress = progress_bar(channels.len() as u64, show);

    let report = match orchestrator.run(&channels, &progress) {
        Ok(report) => report,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    if let Some(reason) = &report.stopped {
        error!("{}", reason);
    }
    print_summary(&report, &orchestrator.options().output_dir);

    if report.is_success() {
        0
    } else {
        1
    }
}

/// The bar shares stderr with the log and with the tools' forwarded output,
/// so it is drawn only when neither writes there at `info` level.
fn show_progress(verbose: bool, info_logged: bool) -> bool {
    !verbose && !info_logged
}

fn progress_bar(len: u64, show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template("{pos}/{len} [{bar:30}] {msg}") {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

fn print_summary(report: &CaptureReport, dir: &Path) {
    for channel in &report.captured {
        println!("{} {:<20} {}", "OK".green(), channel.name, channel.path.display());
    }
    for failure in &report.failed {
        println!(
            "{} {:<20} {}",
            "FAILED".red(),
            failure.channel().unwrap_or("-"),
            failure
        );
    }
    let mut failed = report.failed.len();
    if let Some(reason) = &report.stopped {
        if reason.channel().is_some() {
            failed += 1;
        }
        println!(
            "{} {:<20} {}",
            "STOPPED".yellow(),
            reason.channel().unwrap_or("-"),
            reason
        );
    }
    println!(
        "\nTotal: {} captured, {} failed (in {})",
        report.captured.len(),
        failed,
        dir.display()
    );
}

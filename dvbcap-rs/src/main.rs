mod commands;
mod context;
mod logging;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use log::{debug, warn};

use dvbcap::settings::Settings;

use crate::context::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let cwd = std::env::current_dir()?;
    let (settings_path, settings) = match Settings::discover(cli.settings.as_deref(), &cwd) {
        Ok(found) => found,
        Err(e) => {
            eprintln!("Failed to load settings: {}", e);
            std::process::exit(1);
        }
    };

    logging::init_logging(cli.verbose, settings.logging.level.as_deref());
    if let Some(path) = settings_path {
        debug!("Loaded settings from {}", path.display());
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::SeqCst);
        }) {
            warn!("Failed to install the interrupt handler: {}", e);
        }
    }

    let code = match command {
        Commands::Raw { capture } => {
            commands::capture::cmd_raw(capture, &settings, interrupted, cli.verbose)
        }
        Commands::Filter {
            capture,
            pids,
            skip_pids,
        } => commands::capture::cmd_filter(
            capture,
            pids,
            skip_pids,
            &settings,
            interrupted,
            cli.verbose,
        ),
        Commands::List {
            channel_file,
            format,
        } => commands::list::cmd_list(&channel_file, format),
    };

    std::process::exit(code);
}

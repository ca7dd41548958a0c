use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_num::maybe_hex;

#[derive(Debug, Parser)]
#[clap(name = "dvbcap")]
#[clap(about = "Capture fragments of DVB-C multiplexes and filter them by PID.", long_about = None)]
#[clap(version)]
pub(crate) struct Cli {
    /// Perform verbose logging.
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Settings file.{n}
    /// Defaults to `dvbcap.toml` in the working directory when present.
    #[clap(long, value_name = "FILE", global = true)]
    pub settings: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Option<Commands>,
}

/// Output format for channel listing.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Arguments shared by the capturing subcommands.
///
/// Options left out fall back to the settings file, then to the built-in
/// defaults. A value given explicitly, zero included, is always used.
#[derive(Debug, Args)]
pub(crate) struct CaptureArgs {
    /// Channel file in dvbv5-zap format.
    #[clap(value_name = "CHANNEL_FILE")]
    pub channel_file: PathBuf,

    /// Capture duration per channel in seconds [default: 15].
    #[clap(short = 't', long, value_name = "seconds")]
    pub duration: Option<u64>,

    /// Prefix for the file names [default: Capture].{n}
    /// Files are named `<prefix>_<channel>_<MHz>.ts`.
    #[clap(long)]
    pub prefix: Option<String>,

    /// Directory to save files in [default: .].
    #[clap(long, value_name = "DIR")]
    pub path: Option<PathBuf>,

    /// Continue with the next channel when a capture fails.
    #[clap(long)]
    pub continue_on_error: bool,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Capture every channel unfiltered.
    Raw {
        #[clap(flatten)]
        capture: CaptureArgs,
    },

    /// Capture every channel and filter the packets by PID.{n}
    /// Without --pid and --skip-pid, null packets (0x1fff) are kept
    /// unless the settings file says otherwise.
    Filter {
        #[clap(flatten)]
        capture: CaptureArgs,

        /// PID to keep (repeatable, decimal or 0x-prefixed hex).
        #[clap(long = "pid", value_name = "PID", value_parser = maybe_hex::<u16>)]
        pids: Vec<u16>,

        /// PID to drop (repeatable, decimal or 0x-prefixed hex).{n}
        /// Cannot be combined with --pid.
        #[clap(long = "skip-pid", value_name = "PID", value_parser = maybe_hex::<u16>)]
        skip_pids: Vec<u16>,
    },

    /// Print the channels of a channel file.
    List {
        /// Channel file in dvbv5-zap format.
        #[clap(value_name = "CHANNEL_FILE")]
        channel_file: PathBuf,

        /// Output format.
        #[clap(value_enum, long, short = 'f', default_value = "table")]
        format: OutputFormat,
    },
}

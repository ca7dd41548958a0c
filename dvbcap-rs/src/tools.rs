//! Adapters for the external capture and filter programs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dvbcap_channels::ChannelDescriptor;

use crate::runner::{CommandLine, ProcessRunner, RunError};

pub const DEFAULT_ZAP_PATH: &str = "/usr/bin/dvbv5-zap";
pub const DEFAULT_TSHARK_PATH: &str = "/usr/bin/tshark";

/// Extra time granted to the capture tool beyond the requested duration
/// (tuning, lock acquisition) before it is killed.
pub const DEFAULT_CAPTURE_GRACE: Duration = Duration::from_secs(30);

/// Records a raw transport stream of one channel.
pub trait CaptureTool {
    /// Tune to `channel` as defined in `channel_file` and write `duration`
    /// worth of TS to `output`.
    fn capture(
        &self,
        channel_file: &Path,
        channel: &ChannelDescriptor,
        duration: Duration,
        output: &Path,
    ) -> Result<(), RunError>;
}

/// Writes the packets of a capture that match a filter expression.
pub trait FilterTool {
    fn filter(&self, input: &Path, expression: &str, output: &Path) -> Result<(), RunError>;
}

/// `dvbv5-zap` in record mode.
pub struct DvbZap {
    program: PathBuf,
    grace: Duration,
    runner: Arc<dyn ProcessRunner>,
}

impl DvbZap {
    pub fn new(program: impl Into<PathBuf>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            program: program.into(),
            grace: DEFAULT_CAPTURE_GRACE,
            runner,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// `dvbv5-zap -c <file> -P -t <secs> <channel> -o <output>`.
    ///
    /// `-P` passes every PID of the multiplex through the demux.
    pub fn command(
        &self,
        channel_file: &Path,
        channel: &ChannelDescriptor,
        duration: Duration,
        output: &Path,
    ) -> CommandLine {
        CommandLine::new(&self.program)
            .arg("-c")
            .arg(channel_file)
            .arg("-P")
            .arg("-t")
            .arg(duration.as_secs().to_string())
            .arg(channel.name())
            .arg("-o")
            .arg(output)
    }
}

impl CaptureTool for DvbZap {
    fn capture(
        &self,
        channel_file: &Path,
        channel: &ChannelDescriptor,
        duration: Duration,
        output: &Path,
    ) -> Result<(), RunError> {
        let command = self.command(channel_file, channel, duration, output);
        self.runner.run(&command, Some(duration.saturating_add(self.grace)))
    }
}

/// `tshark` applying a display filter while rewriting a capture.
pub struct Tshark {
    program: PathBuf,
    runner: Arc<dyn ProcessRunner>,
}

impl Tshark {
    pub fn new(program: impl Into<PathBuf>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            program: program.into(),
            runner,
        }
    }

    /// `tshark -r <input> -Y <expression> -w <output>`.
    pub fn command(&self, input: &Path, expression: &str, output: &Path) -> CommandLine {
        CommandLine::new(&self.program)
            .arg("-r")
            .arg(input)
            .arg("-Y")
            .arg(expression)
            .arg("-w")
            .arg(output)
    }
}

impl FilterTool for Tshark {
    fn filter(&self, input: &Path, expression: &str, output: &Path) -> Result<(), RunError> {
        self.runner.run(&self.command(input, expression, output), None)
    }
}

//! Sequential capture of every channel of a channel file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dvbcap_channels::{ChannelDescriptor, PidFilterBuilder, PidSelector};
use indicatif::ProgressBar;
use log::{debug, error, info, warn};
use thiserror::Error;

use crate::runner::RunError;
use crate::tools::{CaptureTool, FilterTool};

pub const DEFAULT_DURATION: Duration = Duration::from_secs(15);
pub const DEFAULT_PREFIX: &str = "Capture";

/// Errors while capturing one channel.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capturing {channel} failed: {source}")]
    Capture {
        channel: String,
        #[source]
        source: RunError,
    },

    #[error("Filtering {channel} failed: {source}")]
    Filter {
        channel: String,
        #[source]
        source: RunError,
    },

    #[error("I/O error while processing {channel}: {source}")]
    Io {
        channel: String,
        #[source]
        source: io::Error,
    },

    #[error("Capture interrupted")]
    Interrupted,
}

impl CaptureError {
    /// Channel the error belongs to, if any.
    pub fn channel(&self) -> Option<&str> {
        match self {
            CaptureError::Capture { channel, .. }
            | CaptureError::Filter { channel, .. }
            | CaptureError::Io { channel, .. } => Some(channel),
            CaptureError::Interrupted => None,
        }
    }
}

/// Everything a capture run needs besides the tools.
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Channel file handed to the capture tool.
    pub channel_file: PathBuf,
    pub duration: Duration,
    /// File name prefix; files are named `<prefix>_<channel>_<MHz>.ts`.
    pub prefix: String,
    pub output_dir: PathBuf,
    /// `None` writes the raw capture.
    pub selector: Option<PidSelector>,
    /// Keep going after a channel fails instead of aborting the run.
    pub continue_on_error: bool,
}

impl CaptureOptions {
    pub fn new(channel_file: impl Into<PathBuf>) -> Self {
        Self {
            channel_file: channel_file.into(),
            duration: DEFAULT_DURATION,
            prefix: DEFAULT_PREFIX.to_string(),
            output_dir: PathBuf::from("."),
            selector: None,
            continue_on_error: false,
        }
    }
}

/// `<prefix>_<channel>_<MHz>.ts`
pub fn output_file_name(prefix: &str, channel: &ChannelDescriptor) -> String {
    format!(
        "{}_{}_{}.ts",
        prefix,
        channel.name(),
        channel.display_frequency_mhz()
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedChannel {
    pub name: String,
    pub path: PathBuf,
}

/// Outcome of [`CaptureOrchestrator::run`], partial when the run stopped
/// early.
#[derive(Debug, Default)]
pub struct CaptureReport {
    pub captured: Vec<CapturedChannel>,
    /// Only filled when `continue_on_error` is set.
    pub failed: Vec<CaptureError>,
    /// Why the remaining channels were skipped: an interrupt, or the first
    /// failure without `continue_on_error`.
    pub stopped: Option<CaptureError>,
}

impl CaptureReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.stopped.is_none()
    }
}

/// Drives the capture tool and, when a selector is set, the filter tool for
/// each channel in turn.
pub struct CaptureOrchestrator<'a> {
    options: CaptureOptions,
    capture: &'a dyn CaptureTool,
    filter: &'a dyn FilterTool,
    builder: PidFilterBuilder,
    interrupted: Option<Arc<AtomicBool>>,
}

impl<'a> CaptureOrchestrator<'a> {
    pub fn new(
        options: CaptureOptions,
        capture: &'a dyn CaptureTool,
        filter: &'a dyn FilterTool,
    ) -> Self {
        Self {
            options,
            capture,
            filter,
            builder: PidFilterBuilder::tshark(),
            interrupted: None,
        }
    }

    pub fn with_filter_builder(mut self, builder: PidFilterBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Stop before the next channel once `flag` is set.
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(flag);
        self
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }

    pub fn output_path(&self, channel: &ChannelDescriptor) -> PathBuf {
        self.options
            .output_dir
            .join(output_file_name(&self.options.prefix, channel))
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Capture all `channels` in order.
    ///
    /// Without `continue_on_error` the first failure stops the run. With it,
    /// failures are collected in the report and the run goes on. Channels
    /// captured before a stop stay in the report. Only a missing output
    /// directory fails the whole call.
    pub fn run(
        &self,
        channels: &[ChannelDescriptor],
        progress: &ProgressBar,
    ) -> Result<CaptureReport, CaptureError> {
        fs::create_dir_all(&self.options.output_dir).map_err(|source| CaptureError::Io {
            channel: self.options.output_dir.display().to_string(),
            source,
        })?;

        let mut report = CaptureReport::default();

        for channel in channels {
            if self.is_interrupted() {
                warn!("Interrupted, skipping remaining channels");
                report.stopped = Some(CaptureError::Interrupted);
                break;
            }

            progress.set_message(channel.name().to_string());

            match self.capture_channel(channel) {
                Ok(path) => {
                    info!(
                        "Captured {} ({} MHz) to {}",
                        channel.name(),
                        channel.display_frequency_mhz(),
                        path.display()
                    );
                    report.captured.push(CapturedChannel {
                        name: channel.name().to_string(),
                        path,
                    });
                }
                Err(_) if self.is_interrupted() => {
                    warn!("Interrupted while capturing {}", channel.name());
                    report.stopped = Some(CaptureError::Interrupted);
                    break;
                }
                Err(e) if self.options.continue_on_error => {
                    error!("{}", e);
                    report.failed.push(e);
                }
                Err(e) => {
                    report.stopped = Some(e);
                    break;
                }
            }

            progress.inc(1);
        }

        if report.stopped.is_some() {
            progress.abandon();
        } else {
            progress.finish_and_clear();
        }
        Ok(report)
    }

    /// Capture one channel and return the path of the written file.
    ///
    /// The raw capture goes to a temporary file next to the output; it is
    /// removed on every path out of this function.
    pub fn capture_channel(&self, channel: &ChannelDescriptor) -> Result<PathBuf, CaptureError> {
        let name = channel.name();
        let io_error = |source: io::Error| CaptureError::Io {
            channel: name.to_string(),
            source,
        };

        let output = self.output_path(channel);
        let temp = tempfile::Builder::new()
            .prefix(".dvbcap-")
            .suffix(".ts")
            .tempfile_in(&self.options.output_dir)
            .map_err(io_error)?;
        debug!("Recording {} into {}", name, temp.path().display());

        self.capture
            .capture(
                &self.options.channel_file,
                channel,
                self.options.duration,
                temp.path(),
            )
            .map_err(|source| CaptureError::Capture {
                channel: name.to_string(),
                source,
            })?;

        match &self.options.selector {
            Some(selector) => {
                let expression = self.builder.build(selector);
                debug!("Filtering {} with {}", name, expression);
                self.filter
                    .filter(temp.path(), &expression, &output)
                    .map_err(|source| CaptureError::Filter {
                        channel: name.to_string(),
                        source,
                    })?;
            }
            None => {
                temp.persist(&output).map_err(|e| io_error(e.error))?;
            }
        }

        Ok(output)
    }
}

/// Does `path` look like one of our temporary files?
pub fn is_temp_artifact(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(".dvbcap-") && n.ends_with(".ts"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use dvbcap_channels::read_channels;

    /// Writes a marker into the output; fails for the listed channels and
    /// raises `interrupt` once a capture is done.
    #[derive(Default)]
    struct FakeCapture {
        fail_for: Vec<&'static str>,
        interrupt: Option<Arc<AtomicBool>>,
        temp_paths: RefCell<Vec<PathBuf>>,
        channels: RefCell<Vec<String>>,
    }

    impl CaptureTool for FakeCapture {
        fn capture(
            &self,
            _channel_file: &Path,
            channel: &ChannelDescriptor,
            _duration: Duration,
            output: &Path,
        ) -> Result<(), RunError> {
            self.temp_paths.borrow_mut().push(output.to_path_buf());
            self.channels.borrow_mut().push(channel.name().to_string());
            if self.fail_for.iter().any(|name| *name == channel.name()) {
                return Err(RunError::Failed {
                    program: "dvbv5-zap".into(),
                    code: Some(1),
                    stderr: "ERROR: no lock".into(),
                });
            }
            fs::write(output, format!("TS:{}", channel.name())).unwrap();
            if let Some(flag) = &self.interrupt {
                flag.store(true, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    /// Copies the input and records the expression.
    #[derive(Default)]
    struct FakeFilter {
        fail: bool,
        expressions: RefCell<Vec<String>>,
    }

    impl FilterTool for FakeFilter {
        fn filter(&self, input: &Path, expression: &str, output: &Path) -> Result<(), RunError> {
            self.expressions.borrow_mut().push(expression.to_string());
            if self.fail {
                return Err(RunError::Failed {
                    program: "tshark".into(),
                    code: Some(2),
                    stderr: String::new(),
                });
            }
            let data = fs::read_to_string(input).unwrap();
            fs::write(output, format!("filtered {}", data)).unwrap();
            Ok(())
        }
    }

    fn channels() -> Vec<ChannelDescriptor> {
        read_channels(
            "[Mux1]\nDELIVERY_SYSTEM = DVBC/ANNEX_A\nFREQUENCY = 474000000\n\
             SYMBOL_RATE = 6900000\nINNER_FEC = NONE\nMODULATION = QAM256\nINVERSION = OFF\n\
             [Mux2]\nDELIVERY_SYSTEM = DVBC/ANNEX_A\nFREQUENCY = 482500000\n\
             SYMBOL_RATE = 6900000\nINNER_FEC = NONE\nMODULATION = QAM256\nINVERSION = OFF\n",
        )
        .unwrap()
    }

    fn options(dir: &Path) -> CaptureOptions {
        CaptureOptions {
            output_dir: dir.to_path_buf(),
            ..CaptureOptions::new("channels.conf")
        }
    }

    fn leftover_temp_files(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| is_temp_artifact(p))
            .collect()
    }

    #[test]
    fn test_output_file_name() {
        let chs = channels();
        assert_eq!(output_file_name(DEFAULT_PREFIX, &chs[0]), "Capture_Mux1_474.ts");
        assert_eq!(output_file_name("lab", &chs[1]), "lab_Mux2_482.ts");
    }

    #[test]
    fn test_raw_capture_moves_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let capture = FakeCapture::default();
        let filter = FakeFilter::default();
        let orchestrator = CaptureOrchestrator::new(options(dir.path()), &capture, &filter);

        let report = orchestrator
            .run(&channels(), &ProgressBar::hidden())
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.captured.len(), 2);
        let first = dir.path().join("Capture_Mux1_474.ts");
        assert_eq!(report.captured[0].path, first);
        assert_eq!(fs::read_to_string(&first).unwrap(), "TS:Mux1");
        assert!(filter.expressions.borrow().is_empty());
        assert!(leftover_temp_files(dir.path()).is_empty());
    }

    #[test]
    fn test_filtered_capture() {
        let dir = tempfile::tempdir().unwrap();
        let capture = FakeCapture::default();
        let filter = FakeFilter::default();
        let opts = CaptureOptions {
            selector: Some(PidSelector::exclude([0, 17]).unwrap()),
            ..options(dir.path())
        };
        let orchestrator = CaptureOrchestrator::new(opts, &capture, &filter);

        let path = orchestrator.capture_channel(&channels()[0]).unwrap();

        assert_eq!(fs::read_to_string(path).unwrap(), "filtered TS:Mux1");
        assert_eq!(
            filter.expressions.borrow()[0],
            "!((mp2t.pid == 0x00) || (mp2t.pid == 0x11))"
        );
        for temp in capture.temp_paths.borrow().iter() {
            assert!(!temp.exists());
        }
    }

    #[test]
    fn test_custom_filter_field() {
        let dir = tempfile::tempdir().unwrap();
        let capture = FakeCapture::default();
        let filter = FakeFilter::default();
        let opts = CaptureOptions {
            selector: Some(PidSelector::keep([0x1fff]).unwrap()),
            ..options(dir.path())
        };
        let orchestrator = CaptureOrchestrator::new(opts, &capture, &filter)
            .with_filter_builder(PidFilterBuilder::new("pid"));

        orchestrator.capture_channel(&channels()[0]).unwrap();
        assert_eq!(filter.expressions.borrow()[0], "(pid == 0x1fff)");
    }

    #[test]
    fn test_filter_failure_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let capture = FakeCapture::default();
        let filter = FakeFilter {
            fail: true,
            ..Default::default()
        };
        let opts = CaptureOptions {
            selector: Some(PidSelector::keep([0x1fff]).unwrap()),
            ..options(dir.path())
        };
        let orchestrator = CaptureOrchestrator::new(opts, &capture, &filter);

        let err = orchestrator.capture_channel(&channels()[0]).unwrap_err();

        assert!(matches!(err, CaptureError::Filter { .. }));
        assert_eq!(err.channel(), Some("Mux1"));
        assert!(!dir.path().join("Capture_Mux1_474.ts").exists());
        assert!(leftover_temp_files(dir.path()).is_empty());
    }

    #[test]
    fn test_capture_failure_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let capture = FakeCapture {
            fail_for: vec!["Mux1"],
            ..Default::default()
        };
        let filter = FakeFilter::default();
        let orchestrator = CaptureOrchestrator::new(options(dir.path()), &capture, &filter);

        let report = orchestrator
            .run(&channels(), &ProgressBar::hidden())
            .unwrap();

        assert!(!report.is_success());
        assert!(matches!(report.stopped, Some(CaptureError::Capture { .. })));
        assert!(report.captured.is_empty());
        assert_eq!(*capture.channels.borrow(), vec!["Mux1".to_string()]);
        assert!(leftover_temp_files(dir.path()).is_empty());
    }

    #[test]
    fn test_abort_keeps_earlier_captures() {
        let dir = tempfile::tempdir().unwrap();
        let capture = FakeCapture {
            fail_for: vec!["Mux2"],
            ..Default::default()
        };
        let filter = FakeFilter::default();
        let orchestrator = CaptureOrchestrator::new(options(dir.path()), &capture, &filter);

        let report = orchestrator
            .run(&channels(), &ProgressBar::hidden())
            .unwrap();

        assert_eq!(report.captured.len(), 1);
        assert_eq!(report.captured[0].name, "Mux1");
        assert!(report.failed.is_empty());
        let stopped = report.stopped.as_ref().unwrap();
        assert_eq!(stopped.channel(), Some("Mux2"));
        assert!(dir.path().join("Capture_Mux1_474.ts").exists());
    }

    #[test]
    fn test_continue_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let capture = FakeCapture {
            fail_for: vec!["Mux1"],
            ..Default::default()
        };
        let filter = FakeFilter::default();
        let opts = CaptureOptions {
            continue_on_error: true,
            ..options(dir.path())
        };
        let orchestrator = CaptureOrchestrator::new(opts, &capture, &filter);

        let report = orchestrator
            .run(&channels(), &ProgressBar::hidden())
            .unwrap();

        assert!(!report.is_success());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].channel(), Some("Mux1"));
        assert_eq!(report.captured.len(), 1);
        assert_eq!(report.captured[0].name, "Mux2");
        assert!(dir.path().join("Capture_Mux2_482.ts").exists());
    }

    #[test]
    fn test_interrupt_stops_before_next_channel() {
        let dir = tempfile::tempdir().unwrap();
        let capture = FakeCapture::default();
        let filter = FakeFilter::default();
        let flag = Arc::new(AtomicBool::new(true));
        let orchestrator = CaptureOrchestrator::new(options(dir.path()), &capture, &filter)
            .with_interrupt_flag(flag);

        let report = orchestrator
            .run(&channels(), &ProgressBar::hidden())
            .unwrap();

        assert!(matches!(report.stopped, Some(CaptureError::Interrupted)));
        assert!(report.captured.is_empty());
        assert!(capture.channels.borrow().is_empty());
    }

    #[test]
    fn test_interrupt_keeps_captured_channels() {
        let dir = tempfile::tempdir().unwrap();
        let flag = Arc::new(AtomicBool::new(false));
        let capture = FakeCapture {
            interrupt: Some(flag.clone()),
            ..Default::default()
        };
        let filter = FakeFilter::default();
        let orchestrator = CaptureOrchestrator::new(options(dir.path()), &capture, &filter)
            .with_interrupt_flag(flag);

        let report = orchestrator
            .run(&channels(), &ProgressBar::hidden())
            .unwrap();

        assert!(!report.is_success());
        assert!(matches!(report.stopped, Some(CaptureError::Interrupted)));
        assert_eq!(report.captured.len(), 1);
        assert_eq!(report.captured[0].path, dir.path().join("Capture_Mux1_474.ts"));
        assert_eq!(*capture.channels.borrow(), vec!["Mux1".to_string()]);
    }

    #[test]
    fn test_is_temp_artifact() {
        assert!(is_temp_artifact(Path::new("/x/.dvbcap-a1b2.ts")));
        assert!(!is_temp_artifact(Path::new("/x/Capture_Mux1_474.ts")));
    }
}

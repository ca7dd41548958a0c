//! dvbcap library - DVB-C multiplex capture
//!
//! Captures a short fragment of every multiplex in a `dvbv5-zap` channel
//! file and optionally keeps or drops packets by PID. Tuning and filtering
//! are done by external programs (`dvbv5-zap`, `tshark`); this crate only
//! drives them.

pub mod capture;
pub mod runner;
pub mod settings;
pub mod tools;

// Re-export commonly used types
pub use capture::{CaptureError, CaptureOptions, CaptureOrchestrator, CaptureReport};
pub use dvbcap_channels::{ChannelDescriptor, PidFilterBuilder, PidSelector};
pub use runner::{CommandLine, ProcessRunner, RunError, SystemRunner};
pub use settings::Settings;
pub use tools::{CaptureTool, DvbZap, FilterTool, Tshark};

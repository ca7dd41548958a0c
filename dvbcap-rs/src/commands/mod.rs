//! Subcommand handlers. Each returns the process exit code.

pub mod capture;
pub mod list;

use std::path::Path;

use log::{debug, error};

use dvbcap::ChannelDescriptor;
use dvbcap_channels::read_channels;

/// Read and parse a channel file, logging the reason on failure.
fn load_channels(path: &Path) -> Result<Vec<ChannelDescriptor>, i32> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        error!("Failed to read channel file {}: {}", path.display(), e);
        1
    })?;

    let channels = read_channels(&content).map_err(|e| {
        error!("{}: {}", path.display(), e);
        1
    })?;

    debug!("Read {} channel(s) from {}", channels.len(), path.display());
    Ok(channels)
}

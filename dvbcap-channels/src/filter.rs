//! PID selection and filter expressions.
//!
//! A [`PidSelector`] either keeps or excludes a set of PIDs; a
//! [`PidFilterBuilder`] turns it into a display-filter expression:
//!
//! ```text
//! keep {0x00, 0x11}     (pid == 0x00) || (pid == 0x11)
//! exclude {0x00, 0x11}  !((pid == 0x00) || (pid == 0x11))
//! ```

use std::collections::BTreeSet;

use crate::error::ConfigError;

/// Largest value of the 13-bit PID field.
pub const MAX_PID: u16 = 0x1FFF;

/// PID of null (stuffing) packets.
pub const NULL_PID: u16 = 0x1FFF;

/// Whether the selected PIDs are admitted or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorMode {
    /// Admit only the selected PIDs.
    Keep,
    /// Admit everything except the selected PIDs.
    Exclude,
}

/// A validated, non-empty set of PIDs together with a [`SelectorMode`].
///
/// The only ways to obtain one are the constructors below, so every selector
/// in circulation names at least one PID and all PIDs are within range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PidSelector {
    mode: SelectorMode,
    pids: BTreeSet<u16>,
}

impl PidSelector {
    /// Admit only `pids`.
    pub fn keep(pids: impl IntoIterator<Item = u16>) -> Result<Self, ConfigError> {
        Self::new(SelectorMode::Keep, pids)
    }

    /// Admit everything except `pids`.
    pub fn exclude(pids: impl IntoIterator<Item = u16>) -> Result<Self, ConfigError> {
        Self::new(SelectorMode::Exclude, pids)
    }

    /// Build a selector from a keep-list and an exclude-list as given on the
    /// command line.
    ///
    /// Both lists filled is an error. Both lists empty means no filtering at
    /// all and yields `None`; the capture is then written unfiltered.
    pub fn from_lists(keep: &[u16], exclude: &[u16]) -> Result<Option<Self>, ConfigError> {
        match (keep.is_empty(), exclude.is_empty()) {
            (false, false) => Err(ConfigError::MutuallyExclusiveSelectors),
            (true, true) => Ok(None),
            (false, true) => Self::keep(keep.iter().copied()).map(Some),
            (true, false) => Self::exclude(exclude.iter().copied()).map(Some),
        }
    }

    fn new(mode: SelectorMode, pids: impl IntoIterator<Item = u16>) -> Result<Self, ConfigError> {
        let pids: BTreeSet<u16> = pids.into_iter().collect();
        if pids.is_empty() {
            return Err(ConfigError::EmptySelector);
        }
        if let Some(&pid) = pids.iter().find(|&&pid| pid > MAX_PID) {
            return Err(ConfigError::PidOutOfRange(pid));
        }
        Ok(Self { mode, pids })
    }

    pub fn mode(&self) -> SelectorMode {
        self.mode
    }

    /// Selected PIDs in ascending order.
    pub fn pids(&self) -> &BTreeSet<u16> {
        &self.pids
    }
}

/// Renders [`PidSelector`]s as boolean filter expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidFilterBuilder {
    field: String,
}

impl PidFilterBuilder {
    /// Wireshark/tshark display-filter field holding the TS packet PID.
    pub const TSHARK_FIELD: &'static str = "mp2t.pid";

    /// Builder comparing against `field`.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    /// Builder for tshark's `-Y` display filters.
    pub fn tshark() -> Self {
        Self::new(Self::TSHARK_FIELD)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Render `selector`. Same input, same output.
    pub fn build(&self, selector: &PidSelector) -> String {
        let disjunction = selector
            .pids()
            .iter()
            .map(|pid| format!("({} == 0x{:02x})", self.field, pid))
            .collect::<Vec<_>>()
            .join(" || ");

        match selector.mode() {
            SelectorMode::Keep => disjunction,
            SelectorMode::Exclude => format!("!({})", disjunction),
        }
    }
}

impl Default for PidFilterBuilder {
    fn default() -> Self {
        Self::tshark()
    }
}

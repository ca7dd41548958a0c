//! Reader for dvbv5 channel files.
//!
//! `dvbv5-scan` writes one INI-style section per multiplex:
//!
//! ```text
//! [Mux1]
//! 	DELIVERY_SYSTEM = DVBC/ANNEX_A
//! 	FREQUENCY = 474000000
//! 	SYMBOL_RATE = 6900000
//! 	INNER_FEC = NONE
//! 	MODULATION = QAM/256
//! 	INVERSION = AUTO
//! ```
//!
//! Only the six tuning keys are read. Other keys (`VIDEO_PID`, `SERVICE_ID`,
//! ...) are accepted and ignored.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::ParseError;

pub const DELIVERY_SYSTEM: &str = "DELIVERY_SYSTEM";
pub const FREQUENCY: &str = "FREQUENCY";
pub const SYMBOL_RATE: &str = "SYMBOL_RATE";
pub const INNER_FEC: &str = "INNER_FEC";
pub const MODULATION: &str = "MODULATION";
pub const INVERSION: &str = "INVERSION";

/// Keys every channel section must define.
pub const REQUIRED_FIELDS: [&str; 6] = [
    DELIVERY_SYSTEM,
    FREQUENCY,
    SYMBOL_RATE,
    INNER_FEC,
    MODULATION,
    INVERSION,
];

/// Tuning parameters of one multiplex, as read from a channel file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChannelDescriptor {
    name: String,
    delivery_system: String,
    frequency_hz: u64,
    symbol_rate: u64,
    inner_fec: String,
    modulation: String,
    inversion: String,
}

impl ChannelDescriptor {
    /// Section name; also the name `dvbv5-zap` tunes by.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Delivery system, lower-cased (e.g. `dvbc/annex_a`).
    pub fn delivery_system(&self) -> &str {
        &self.delivery_system
    }

    pub fn frequency_hz(&self) -> u64 {
        self.frequency_hz
    }

    pub fn symbol_rate(&self) -> u64 {
        self.symbol_rate
    }

    pub fn inner_fec(&self) -> &str {
        &self.inner_fec
    }

    pub fn modulation(&self) -> &str {
        &self.modulation
    }

    pub fn inversion(&self) -> &str {
        &self.inversion
    }

    /// Frequency in whole megahertz, truncated. Used for file naming only.
    pub fn display_frequency_mhz(&self) -> u64 {
        self.frequency_hz / 1_000_000
    }
}

/// Parses channel files into [`ChannelDescriptor`]s.
///
/// The reader never touches the filesystem: callers load the text and pass
/// it in, so the same input always produces the same result.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChannelConfigReader;

impl ChannelConfigReader {
    /// Read every channel section of `content`, in source order.
    pub fn read(&self, content: &str) -> Result<Vec<ChannelDescriptor>, ParseError> {
        parse_sections(content)?
            .iter()
            .map(RawSection::to_descriptor)
            .collect()
    }
}

/// Shorthand for `ChannelConfigReader.read(content)`.
pub fn read_channels(content: &str) -> Result<Vec<ChannelDescriptor>, ParseError> {
    ChannelConfigReader.read(content)
}

struct RawSection<'a> {
    name: &'a str,
    entries: Vec<(&'a str, &'a str)>,
}

impl<'a> RawSection<'a> {
    fn get(&self, key: &str) -> Option<&'a str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| *v)
    }

    fn require(&self, field: &'static str) -> Result<&'a str, ParseError> {
        self.get(field).ok_or_else(|| ParseError::MissingField {
            section: self.name.to_string(),
            field,
        })
    }

    fn require_number(&self, field: &'static str) -> Result<u64, ParseError> {
        let value = self.require(field)?;
        value.parse().map_err(|_| ParseError::InvalidNumber {
            section: self.name.to_string(),
            field,
            value: value.to_string(),
        })
    }

    fn to_descriptor(&self) -> Result<ChannelDescriptor, ParseError> {
        Ok(ChannelDescriptor {
            name: self.name.to_string(),
            delivery_system: self.require(DELIVERY_SYSTEM)?.to_lowercase(),
            frequency_hz: self.require_number(FREQUENCY)?,
            symbol_rate: self.require_number(SYMBOL_RATE)?,
            inner_fec: self.require(INNER_FEC)?.to_string(),
            modulation: self.require(MODULATION)?.to_string(),
            inversion: self.require(INVERSION)?.to_string(),
        })
    }
}

fn parse_sections(content: &str) -> Result<Vec<RawSection<'_>>, ParseError> {
    let mut sections: Vec<RawSection<'_>> = Vec::new();
    let mut seen = HashSet::new();

    for (index, raw) in content.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();

        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            // Kept as written: it is the name handed to the capture tool.
            if name.trim().is_empty() {
                return Err(ParseError::EmptySectionName { line: line_no });
            }
            if !seen.insert(name) {
                return Err(ParseError::DuplicateSection {
                    name: name.to_string(),
                });
            }
            sections.push(RawSection {
                name,
                entries: Vec::new(),
            });
            continue;
        }

        let Some((key, value)) = split_key_value(line) else {
            return Err(ParseError::MalformedLine {
                line: line_no,
                content: line.to_string(),
            });
        };

        let Some(section) = sections.last_mut() else {
            return Err(ParseError::MissingSectionHeader { line: line_no });
        };

        if section.get(key).is_some() {
            return Err(ParseError::DuplicateKey {
                section: section.name.to_string(),
                key: key.to_string(),
            });
        }
        section.entries.push((key, value));
    }

    Ok(sections)
}

/// Split `KEY = VALUE` (or `KEY: VALUE`) at the first delimiter.
fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let pos = line.find(['=', ':'])?;
    let key = line[..pos].trim();
    if key.is_empty() {
        return None;
    }
    Some((key, line[pos + 1..].trim()))
}

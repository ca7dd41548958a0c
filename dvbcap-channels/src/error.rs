//! Error types for channel file parsing and PID selection.

use thiserror::Error;

/// Errors raised while reading a dvbv5 channel file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A required key is absent from a section.
    #[error("Channel [{section}] is missing required field {field}")]
    MissingField { section: String, field: &'static str },

    /// FREQUENCY or SYMBOL_RATE is not a base-10 integer.
    #[error("Channel [{section}]: {field} = {value:?} is not a valid integer")]
    InvalidNumber {
        section: String,
        field: &'static str,
        value: String,
    },

    /// The same section name appears twice.
    #[error("Duplicate channel section [{name}]")]
    DuplicateSection { name: String },

    /// The same key appears twice inside one section.
    #[error("Channel [{section}] defines {key} more than once")]
    DuplicateKey { section: String, key: String },

    /// A key/value pair appears before the first section header.
    #[error("Line {line}: key/value pair outside of any channel section")]
    MissingSectionHeader { line: usize },

    /// A section header with nothing between the brackets.
    #[error("Line {line}: empty channel name")]
    EmptySectionName { line: usize },

    /// A line that is neither a header, a comment nor a key/value pair.
    #[error("Line {line}: cannot parse {content:?}")]
    MalformedLine { line: usize, content: String },
}

impl ParseError {
    /// Coarse classification, independent of the offending location.
    pub fn kind(&self) -> ParseErrorKind {
        match self {
            ParseError::MissingField { .. } => ParseErrorKind::MissingField,
            ParseError::InvalidNumber { .. } => ParseErrorKind::InvalidNumber,
            ParseError::DuplicateSection { .. } => ParseErrorKind::DuplicateSection,
            ParseError::DuplicateKey { .. } => ParseErrorKind::DuplicateKey,
            ParseError::MissingSectionHeader { .. }
            | ParseError::EmptySectionName { .. }
            | ParseError::MalformedLine { .. } => ParseErrorKind::Syntax,
        }
    }
}

/// Kind of a [`ParseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    MissingField,
    InvalidNumber,
    DuplicateSection,
    DuplicateKey,
    Syntax,
}

/// Errors raised while building a PID selector.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// PIDs were supplied both to keep and to exclude.
    #[error("PIDs to keep and PIDs to exclude are mutually exclusive")]
    MutuallyExclusiveSelectors,

    /// A selector was constructed without any PID.
    #[error("A PID selector needs at least one PID")]
    EmptySelector,

    /// The PID does not fit in the 13-bit PID field.
    #[error("PID 0x{0:04x} is outside the 13-bit PID range (max 0x1fff)")]
    PidOutOfRange(u16),
}

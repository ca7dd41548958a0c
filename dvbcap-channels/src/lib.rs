//! Channel file and PID filter definitions for dvbcap.
//!
//! This crate holds the I/O-free half of dvbcap: reading `dvbv5-zap`
//! channel files into [`ChannelDescriptor`]s and turning a PID selection into
//! a filter expression for the packet filter.
//!
//! # Example
//!
//! ```rust
//! use dvbcap_channels::{read_channels, PidFilterBuilder, PidSelector};
//!
//! let text = "[Mux1]\n\
//!     DELIVERY_SYSTEM = DVBC/ANNEX_A\n\
//!     FREQUENCY = 474000000\n\
//!     SYMBOL_RATE = 6900000\n\
//!     INNER_FEC = NONE\n\
//!     MODULATION = QAM256\n\
//!     INVERSION = OFF\n";
//!
//! let channels = read_channels(text).unwrap();
//! assert_eq!(channels[0].delivery_system(), "dvbc/annex_a");
//! assert_eq!(channels[0].display_frequency_mhz(), 474);
//!
//! let selector = PidSelector::exclude([0, 17]).unwrap();
//! let expr = PidFilterBuilder::new("pid").build(&selector);
//! assert_eq!(expr, "!((pid == 0x00) || (pid == 0x11))");
//! ```

pub mod error;
pub mod filter;
pub mod reader;

pub use error::{ConfigError, ParseError, ParseErrorKind};
pub use filter::{PidFilterBuilder, PidSelector, SelectorMode, MAX_PID, NULL_PID};
pub use reader::{read_channels, ChannelConfigReader, ChannelDescriptor, REQUIRED_FIELDS};

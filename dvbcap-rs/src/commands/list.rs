//! List command handler.

use std::path::Path;

use log::error;

use dvbcap::capture::{output_file_name, DEFAULT_PREFIX};
use dvbcap::ChannelDescriptor;

use crate::commands::load_channels;
use crate::context::OutputFormat;

/// List command implementation.
pub fn cmd_list(channel_file: &Path, format: OutputFormat) -> i32 {
    let channels = match load_channels(channel_file) {
        Ok(channels) => channels,
        Err(code) => return code,
    };

    let output = match format {
        OutputFormat::Table => render_channels_table(&channels),
        OutputFormat::Json => match render_channels_json(&channels) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize channels: {}", e);
                return 1;
            }
        },
    };
    println!("{}", output);

    0
}

fn render_channels_json(channels: &[ChannelDescriptor]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(channels)
}

fn render_channels_table(channels: &[ChannelDescriptor]) -> String {
    if channels.is_empty() {
        return "No channels found.".to_string();
    }

    let mut out = format!(
        "{:<16} {:<14} {:>8} {:>10} {:<8} {:<10} {:<8} {}\n",
        "Name", "Delivery", "MHz", "Symbols/s", "FEC", "Modulation", "Inv.", "Default file"
    );
    out.push_str(&"-".repeat(100));
    out.push('\n');

    for ch in channels {
        out.push_str(&format!(
            "{:<16} {:<14} {:>8} {:>10} {:<8} {:<10} {:<8} {}\n",
            ch.name().chars().take(16).collect::<String>(),
            ch.delivery_system(),
            ch.display_frequency_mhz(),
            ch.symbol_rate(),
            ch.inner_fec(),
            ch.modulation(),
            ch.inversion(),
            output_file_name(DEFAULT_PREFIX, ch)
        ));
    }

    out.push_str(&format!("\nTotal: {} channels", channels.len()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use dvbcap_channels::read_channels;

    fn mux1() -> Vec<ChannelDescriptor> {
        read_channels(
            "[Mux1]\nDELIVERY_SYSTEM = DVBC/ANNEX_A\nFREQUENCY = 474000000\n\
             SYMBOL_RATE = 6900000\nINNER_FEC = NONE\nMODULATION = QAM/256\nINVERSION = OFF\n",
        )
        .unwrap()
    }

    #[test]
    fn test_table() {
        let table = render_channels_table(&mux1());
        let lines: Vec<&str> = table.lines().collect();

        assert!(lines[0].starts_with("Name"));
        assert!(lines[0].ends_with("Default file"));
        assert_eq!(lines[1], "-".repeat(100));

        let row: Vec<&str> = lines[2].split_whitespace().collect();
        assert_eq!(row[0], "Mux1");
        assert_eq!(row[1], "dvbc/annex_a");
        assert_eq!(row[2], "474");
        assert_eq!(row[3], "6900000");
        assert_eq!(row.last(), Some(&"Capture_Mux1_474.ts"));

        assert_eq!(lines.last(), Some(&"Total: 1 channels"));
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(render_channels_table(&[]), "No channels found.");
    }

    #[test]
    fn test_json_fields() {
        let json = render_channels_json(&mux1()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let ch = &value[0];
        assert_eq!(ch["name"], "Mux1");
        assert_eq!(ch["delivery_system"], "dvbc/annex_a");
        assert_eq!(ch["frequency_hz"], 474_000_000u64);
        assert_eq!(ch["symbol_rate"], 6_900_000u64);
        assert!(ch.get("inner_fec").is_some());
        assert!(ch.get("modulation").is_some());
        assert!(ch.get("inversion").is_some());
        assert_eq!(value.as_array().map(Vec::len), Some(1));
    }
}

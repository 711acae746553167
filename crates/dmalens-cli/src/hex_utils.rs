//! Hex address parsing utilities.

use anyhow::Result;

/// Parse a hex address string (with or without 0x prefix).
pub fn parse_hex_address(s: &str) -> Result<u64> {
    let trimmed = s.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(trimmed, 16).map_err(|e| anyhow::anyhow!("Invalid hex address {s:?}: {e}"))
}

/// Parse a comma-separated list of hex offsets, e.g. `0x17F8D28,0x88,0x28`.
pub fn parse_offset_list(s: &str) -> Result<Vec<u64>> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_hex_address)
        .collect()
}

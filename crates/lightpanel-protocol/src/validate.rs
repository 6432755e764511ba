//! Parameter validation for panel commands.
//!
//! The panel is a 3 x 8 grid: rows (also called lines) `0..=2`, columns
//! `0..=7`. Validation never panics; failures come back as [`PanelError`].

use crate::error::{PanelError, PanelResult};

/// Highest valid row / line index.
pub const MAX_ROW: i64 = 2;

/// Highest valid column index.
pub const MAX_COLUMN: i64 = 7;

/// Highest valid tempo in beats per minute.
pub const MAX_TEMPO: i64 = 360;

/// Validate a row (line) index, returning it narrowed to `u8`.
pub fn validate_row(row: i64) -> PanelResult<u8> {
    if (0..=MAX_ROW).contains(&row) {
        Ok(row as u8)
    } else {
        Err(PanelError::InvalidRow(row))
    }
}

/// Validate a column index, returning it narrowed to `u8`.
pub fn validate_column(column: i64) -> PanelResult<u8> {
    if (0..=MAX_COLUMN).contains(&column) {
        Ok(column as u8)
    } else {
        Err(PanelError::InvalidColumn(column))
    }
}

/// Validate a tempo in beats per minute. Zero is rejected, 360 accepted.
pub fn validate_tempo(bpm: i64) -> PanelResult<u16> {
    if bpm > 0 && bpm <= MAX_TEMPO {
        Ok(bpm as u16)
    } else {
        Err(PanelError::InvalidTempo(bpm))
    }
}

/// Parse a boolean-ish token.
///
/// Accepts `true`/`yes`/`1`/`on` and `false`/`no`/`0`/`off` in any case;
/// anything else yields `default`.
pub fn parse_bool_token(token: &str, default: bool) -> bool {
    match token.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => true,
        "false" | "no" | "0" | "off" => false,
        _ => default,
    }
}

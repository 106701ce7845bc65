//! Human-readable byte sizes.
//!
//! Parses strings such as `"512KB"` or `"1.5MB"` into a byte count. Units are
//! binary (`KB` is 1024 bytes) and case-insensitive.

/// Error returned when a size string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SizeError {
    #[error("empty size string")]
    Empty,
    #[error("invalid size {0:?}: no numeric portion")]
    MissingNumber(String),
    #[error("invalid size {0:?}: malformed number")]
    InvalidNumber(String),
    #[error("unknown size unit {0:?}")]
    UnknownUnit(String),
}

/// Parse a byte size such as `"100"`, `"512KB"` or `"2GB"`.
///
/// A bare integer is a raw byte count. Otherwise the leading number (digits and
/// at most one decimal point) is multiplied by the unit (`B`, `KB`, `MB`, `GB`,
/// `TB`) and the fractional part of the result is discarded.
///
/// # Examples
///
/// ```rust
/// use response_logger::size::parse_size;
///
/// assert_eq!(parse_size("512KB").unwrap(), 524_288);
/// assert_eq!(parse_size("1.5mb").unwrap(), 1_572_864);
/// assert!(parse_size("10XY").is_err());
/// ```
pub fn parse_size(input: &str) -> Result<u64, SizeError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(SizeError::Empty);
    }

    if let Ok(bytes) = input.parse::<u64>() {
        return Ok(bytes);
    }

    let mut seen_dot = false;
    let split = input
        .char_indices()
        .find(|&(_, c)| {
            if c == '.' && !seen_dot {
                seen_dot = true;
                false
            } else {
                !c.is_ascii_digit()
            }
        })
        .map(|(i, _)| i)
        .unwrap_or(input.len());

    let (number, unit) = input.split_at(split);
    if !number.bytes().any(|b| b.is_ascii_digit()) {
        return Err(SizeError::MissingNumber(input.to_string()));
    }
    let value: f64 = number
        .parse()
        .map_err(|_| SizeError::InvalidNumber(input.to_string()))?;

    let unit = unit.trim();
    let multiplier: u64 = match unit.to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "KB" => 1 << 10,
        "MB" => 1 << 20,
        "GB" => 1 << 30,
        "TB" => 1 << 40,
        _ => return Err(SizeError::UnknownUnit(unit.to_string())),
    };

    Ok((value * multiplier as f64) as u64)
}

use anyhow::{anyhow, Result};

/// Lovelace per ADA, as a power of ten.
pub const ADA_DECIMALS: u8 = 6;

/// Render an integer amount of smallest units as a decimal string.
pub fn format_amount(units: u64, decimals: u8) -> String {
    if decimals == 0 {
        return units.to_string();
    }
    let Some(scale) = 10u128.checked_pow(decimals as u32) else {
        return units.to_string();
    };
    let whole = units as u128 / scale;
    let frac = units as u128 % scale;
    format!("{}.{:0width$}", whole, frac, width = decimals as usize)
}

pub fn format_ada(lovelace: u64) -> String {
    format_amount(lovelace, ADA_DECIMALS)
}

/// Parse a decimal string into smallest units.
///
/// Works on the string digits directly so that values like `0.000001` are exact.
///
/// # Errors
/// Returns an error for empty input, negative values, more fractional digits
/// than `decimals`, or values that overflow `u64`.
pub fn parse_amount_str(input: &str, decimals: u8) -> Result<u64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Amount cannot be empty"));
    }
    if trimmed.starts_with('-') {
        return Err(anyhow!("Amount cannot be negative: {}", trimmed));
    }

    let (whole, frac) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(anyhow!("Invalid amount '{}'", trimmed));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(anyhow!("Invalid amount '{}'", trimmed));
    }
    if frac.len() > decimals as usize {
        return Err(anyhow!(
            "Amount '{}' has more than {} decimal places",
            trimmed,
            decimals
        ));
    }

    let padded = format!("{}{:0<width$}", whole, frac, width = decimals as usize);
    let digits = padded.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    digits
        .parse::<u64>()
        .map_err(|e| anyhow!("Amount '{}' is out of range: {}", trimmed, e))
}

/// Parse an ADA amount string to lovelace.
pub fn parse_ada_str_to_lovelace(input: &str) -> Result<u64> {
    parse_amount_str(input, ADA_DECIMALS)
}

use crate::{Address, AssetRegistry, HistoryError, RawEvent, Result};
use num_bigint::BigUint;

/// Render `raw / 10^decimals` with exactly `decimals` fractional digits.
///
/// No trailing zeros are trimmed: `format_units(1500000, 6)` is `"1.500000"`.
/// With `decimals == 0` the integer is returned without a point.
pub fn format_units(raw: &BigUint, decimals: u8) -> String {
    let digits = raw.to_str_radix(10);
    let scale = decimals as usize;
    if scale == 0 {
        return digits;
    }

    // at least one digit must stay in front of the point
    let padded = if digits.len() <= scale {
        format!("{}{}", "0".repeat(scale + 1 - digits.len()), digits)
    } else {
        digits
    };

    let (whole, fraction) = padded.split_at(padded.len() - scale);
    format!("{}.{}", whole, fraction)
}

/// Inverse of [`format_units`]: parse a decimal string into base units.
///
/// Returns `None` for malformed text or more fractional digits than `decimals`.
pub fn parse_units(text: &str, decimals: u8) -> Option<BigUint> {
    let text = text.trim();
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (text, ""),
    };

    let scale = decimals as usize;
    if whole.is_empty() || fraction.len() > scale {
        return None;
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut digits = String::with_capacity(whole.len() + scale);
    digits.push_str(whole);
    digits.push_str(fraction);
    digits.push_str(&"0".repeat(scale - fraction.len()));

    BigUint::parse_bytes(digits.as_bytes(), 10)
}

/// Formats amounts using the precision recorded in the asset registry
#[derive(Debug, Clone, Copy)]
pub struct AmountFormatter<'a> {
    registry: &'a AssetRegistry,
}

impl<'a> AmountFormatter<'a> {
    pub fn new(registry: &'a AssetRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'a AssetRegistry {
        self.registry
    }

    pub fn format(&self, raw: &BigUint, asset: &Address) -> Result<String> {
        let decimals = self
            .registry
            .decimals_of(asset)
            .ok_or(HistoryError::UnknownAsset(*asset))?;
        Ok(format_units(raw, decimals))
    }

    /// `<symbol> <amount>` for one event
    pub fn display(&self, event: &RawEvent) -> Result<String> {
        let entry = self
            .registry
            .get(&event.asset)
            .ok_or(HistoryError::UnknownAsset(event.asset))?;
        Ok(format!(
            "{} {}",
            entry.symbol,
            format_units(&event.amount, entry.decimals)
        ))
    }
}

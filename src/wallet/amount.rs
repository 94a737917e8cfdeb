use super::WalletError;

/// Smallest units per coin.
pub const UNITS_PER_COIN: u64 = 100_000_000;
const FRACTION_DIGITS: usize = 8;

/// `"<coins>.<8 digit fraction> ARC"`.
pub fn format_amount(amount: u64) -> String {
    format!(
        "{}.{:08} ARC",
        amount / UNITS_PER_COIN,
        amount % UNITS_PER_COIN
    )
}

/// Parse a decimal coin amount (`"12"`, `"0.5"`, `"1.00000001 ARC"`) into
/// smallest units without going through floating point.
pub fn parse_amount(input: &str) -> Result<u64, WalletError> {
    let invalid = || WalletError::InvalidAmount(input.to_string());

    let s = input.trim();
    let s = s.strip_suffix("ARC").map(str::trim_end).unwrap_or(s);
    let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));

    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b.is_ascii_digit())
        || fraction.len() > FRACTION_DIGITS
    {
        return Err(invalid());
    }

    let coins: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let units: u64 = if fraction.is_empty() {
        0
    } else {
        let scale = 10u64.pow((FRACTION_DIGITS - fraction.len()) as u32);
        fraction.parse::<u64>().map_err(|_| invalid())? * scale
    };

    coins
        .checked_mul(UNITS_PER_COIN)
        .and_then(|c| c.checked_add(units))
        .ok_or_else(invalid)
}

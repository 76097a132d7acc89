//! Разбор временных меток субтитров

use crate::error::{Result, ShadowSyncError};

/// Конвертирует метку "HH:MM:SS.mmm" или "MM:SS,mmm" в секунды.
///
/// Десятичным разделителем может быть как `.`, так и `,`; дробная часть
/// необязательна и читается как десятичная дробь (`.5` = 500 мс).
pub fn parse_timestamp(token: &str) -> Result<f64> {
    let token = token.trim();
    let fields: Vec<&str> = token.split(':').collect();

    let (hours, minutes, seconds) = match fields.as_slice() {
        [h, m, s] => (
            parse_integer(h, token)?,
            parse_integer(m, token)?,
            parse_seconds(s, token)?,
        ),
        [m, s] => (0, parse_integer(m, token)?, parse_seconds(s, token)?),
        _ => return Err(malformed(token, "expected 2 or 3 fields")),
    };

    Ok(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}

fn parse_integer(field: &str, token: &str) -> Result<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(token, "non-numeric field"));
    }
    field
        .parse::<u64>()
        .map_err(|e| malformed(token, &e.to_string()))
}

fn parse_seconds(field: &str, token: &str) -> Result<f64> {
    let (whole, fraction) = match field.split_once(['.', ',']) {
        Some((whole, fraction)) => (whole, fraction),
        None => (field, ""),
    };

    let whole = parse_integer(whole, token)?;
    let fraction = if fraction.is_empty() {
        0.0
    } else {
        if !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed(token, "non-numeric fraction"));
        }
        format!("0.{}", fraction)
            .parse::<f64>()
            .map_err(|e| malformed(token, &e.to_string()))?
    };

    Ok(whole as f64 + fraction)
}

fn malformed(token: &str, reason: &str) -> ShadowSyncError {
    ShadowSyncError::MalformedTimestamp(format!("'{}': {}", token, reason))
}

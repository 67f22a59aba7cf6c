use crate::error::{CrawlError, Result};

/// Parses localized price text such as "1 299,50 ₽" into a number
///
/// Absent or blank text is a price of 0.0. Whitespace (including the
/// non-breaking spaces used as thousands separators) and any leading or
/// trailing currency marks are dropped. When both `.` and `,` appear the
/// later one is the decimal point. A lone separator is a thousands separator
/// when exactly three digits follow it, a decimal point otherwise.
pub fn parse_price(text: Option<&str>) -> Result<f64> {
    let Some(text) = text else {
        return Ok(0.0);
    };
    if text.trim().is_empty() {
        return Ok(0.0);
    }

    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = compact.trim_matches(|c: char| !c.is_ascii_digit());
    if digits.is_empty() {
        return Err(CrawlError::MalformedPrice(text.to_string()));
    }

    let parsed = normalize_separators(digits).and_then(|n| n.parse::<f64>().ok());
    match parsed {
        Some(value) if value.is_finite() => Ok(value),
        _ => Err(CrawlError::MalformedPrice(text.to_string())),
    }
}

/// Rewrites the number with `.` as the only separator, `None` if the
/// separators do not form a number
fn normalize_separators(digits: &str) -> Option<String> {
    match (digits.rfind('.'), digits.rfind(',')) {
        (None, None) => Some(digits.to_string()),
        (Some(dot), Some(comma)) => {
            let (decimal, grouping) = if dot > comma { ('.', ',') } else { (',', '.') };
            let (whole, fraction) = digits.rsplit_once(decimal)?;
            if whole.contains(decimal) {
                return None;
            }
            Some(format!("{}.{}", ungroup(whole, grouping)?, fraction))
        }
        (Some(_), None) => single_separator(digits, '.'),
        (None, Some(_)) => single_separator(digits, ','),
    }
}

fn single_separator(digits: &str, sep: char) -> Option<String> {
    match digits.split_once(sep) {
        Some((whole, fraction)) if !fraction.contains(sep) && fraction.len() != 3 => {
            Some(format!("{whole}.{fraction}"))
        }
        _ => ungroup(digits, sep),
    }
}

/// "1.299.000" becomes "1299000"; every group after the first has three digits
fn ungroup(digits: &str, sep: char) -> Option<String> {
    let mut groups = digits.split(sep);
    let mut out = groups.next()?.to_string();
    for group in groups {
        if group.len() != 3 {
            return None;
        }
        out.push_str(group);
    }
    Some(out)
}

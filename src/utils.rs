//! Utility functions for sizes, timestamps, links and file system checks.
//!
//! This module provides helpers used throughout the application:
//! - Human-readable dataset sizes and their inverse
//! - Normalization of the timestamp formats the sources publish
//! - Link resolution against a source home page
//! - String truncation for logging
//! - File system validation for the data directory

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};
use url::Url;

/// Format of `dataset_last_update` and of normalized publication times.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// "14:32, 16 октября 2026", "14:32, 16 октября" or a bare "14:32".
static RU_TEXT_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2})(?:,\s*(\d{1,2})\s+(\p{L}+)(?:\s+(\d{4}))?)?$")
        .expect("valid regex")
});

/// "14:05 16.10.2026"
static RU_DOTTED_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2})\s+(\d{1,2})\.(\d{1,2})\.(\d{4})$").expect("valid regex")
});

/// "16 октября 2026, 14:32" or "16 октября, 14:32"
static RU_DATE_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})\s+(\p{L}+)(?:\s+(\d{4}))?,?\s+(\d{1,2}):(\d{2})$")
        .expect("valid regex")
});

const RU_MONTHS: [&str; 12] = [
    "января",
    "февраля",
    "марта",
    "апреля",
    "мая",
    "июня",
    "июля",
    "августа",
    "сентября",
    "октября",
    "ноября",
    "декабря",
];

/// Render a byte count the way the metadata file stores it.
///
/// Decimal units: below one gigabyte the value is given in megabytes,
/// otherwise in gigabytes, always with two decimals.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(human_readable_size(12_340_000), "12.34 МБ");
/// assert_eq!(human_readable_size(2_500_000_000), "2.50 ГБ");
/// ```
pub fn human_readable_size(bytes: u64) -> String {
    let bytes = bytes as f64;
    if bytes < 1e9 {
        format!("{:.2} МБ", bytes / 1e6)
    } else {
        format!("{:.2} ГБ", bytes / 1e9)
    }
}

/// Parse a size string produced by [`human_readable_size`] back into megabytes.
///
/// Accepts the Cyrillic and Latin unit spellings. A bare number is read as
/// megabytes. Returns `None` for anything else.
pub fn parse_size_mb(text: &str) -> Option<f64> {
    let mut parts = text.split_whitespace();
    let value: f64 = parts.next()?.replace(',', ".").parse().ok()?;
    let factor = match parts.next() {
        None => 1.0,
        Some(unit) => match unit.to_lowercase().as_str() {
            "мб" | "mb" => 1.0,
            "гб" | "gb" => 1000.0,
            _ => return None,
        },
    };
    if parts.next().is_some() || !value.is_finite() {
        return None;
    }
    Some(value * factor)
}

/// Normalize a publication time to [`TIMESTAMP_FORMAT`].
///
/// Understands RFC 3339 (`time[datetime]` attributes) and the Russian
/// textual forms used in article headers. `today` fills in a missing date or
/// year. Unrecognized input is returned trimmed but otherwise untouched.
pub fn normalize_published_at(raw: &str, today: NaiveDate) -> String {
    let text = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return dt.naive_local().format(TIMESTAMP_FORMAT).to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return dt.format(TIMESTAMP_FORMAT).to_string();
    }
    match parse_ru_time(text, today) {
        Some(dt) => dt.format(TIMESTAMP_FORMAT).to_string(),
        None => text.to_string(),
    }
}

fn parse_ru_time(text: &str, today: NaiveDate) -> Option<NaiveDateTime> {
    use chrono::Datelike;

    let number = |s: &str| s.parse::<u32>().ok();

    if let Some(caps) = RU_DOTTED_TIME.captures(text) {
        let date = NaiveDate::from_ymd_opt(
            caps[5].parse().ok()?,
            number(&caps[4])?,
            number(&caps[3])?,
        )?;
        return date.and_hms_opt(number(&caps[1])?, number(&caps[2])?, 0);
    }

    let month_date = |day: &str, month: &str, year: Option<&str>| {
        let month_name = month.to_lowercase();
        let month = RU_MONTHS.iter().position(|m| *m == month_name)? as u32 + 1;
        let year = match year {
            Some(y) => y.parse().ok()?,
            None => today.year(),
        };
        NaiveDate::from_ymd_opt(year, month, number(day)?)
    };

    if let Some(caps) = RU_DATE_FIRST.captures(text) {
        let date = month_date(&caps[1], &caps[2], caps.get(3).map(|y| y.as_str()))?;
        return date.and_hms_opt(number(&caps[4])?, number(&caps[5])?, 0);
    }

    let caps = RU_TEXT_TIME.captures(text)?;
    let (hour, minute) = (number(&caps[1])?, number(&caps[2])?);
    let date = match (caps.get(3), caps.get(4)) {
        (Some(day), Some(month)) => {
            month_date(day.as_str(), month.as_str(), caps.get(5).map(|y| y.as_str()))?
        }
        _ => today,
    };
    date.and_hms_opt(hour, minute, 0)
}

/// Resolve an `href` found on a source page to an absolute URL.
pub fn resolve_link(base: &Url, href: &str) -> Result<String, url::ParseError> {
    let href = href.trim();
    if href.starts_with("https://") || href.starts_with("http://") {
        return Ok(href.to_string());
    }
    Ok(base.join(href)?.to_string())
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut at a character boundary no later than `max` bytes
/// with an ellipsis and the number of dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a scratch file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    // Try a small sync write using std fs (simpler error surface)
    let scratch_path = path.join("..__write_check__");
    match stdfs::File::create(&scratch_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&scratch_path);
            info!("Data directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

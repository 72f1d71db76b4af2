//! Age-based inclusion rule for discovered articles.
//!
//! Date formats differ per site, so parsing is delegated to a source-specific
//! function. Anything that cannot be parsed counts as recent: over-fetching is
//! preferred to silently dropping new content after a site changes its markup.

use chrono::{Local, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

static DMY_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})/(\d{1,2})/(\d{4})").expect("valid date regex"));

/// Whether `date_text` is at most `max_age_days` old, measured from now.
pub fn is_recent<F>(date_text: Option<&str>, max_age_days: u32, parse: F) -> bool
where
    F: Fn(&str) -> Option<NaiveDateTime>,
{
    is_recent_at(date_text, max_age_days, parse, Local::now().naive_local())
}

/// [`is_recent`] against an explicit reference time.
///
/// The age is the whole-day difference between `now` and the parsed date; the
/// boundary is inclusive.
pub fn is_recent_at<F>(date_text: Option<&str>, max_age_days: u32, parse: F, now: NaiveDateTime) -> bool
where
    F: Fn(&str) -> Option<NaiveDateTime>,
{
    match days_old_at(date_text, parse, now) {
        Some(age) => age <= i64::from(max_age_days),
        None => true,
    }
}

/// Age in whole days, or `None` when the date is absent or unparseable.
pub fn days_old_at<F>(date_text: Option<&str>, parse: F, now: NaiveDateTime) -> Option<i64>
where
    F: Fn(&str) -> Option<NaiveDateTime>,
{
    let text = date_text.map(str::trim).filter(|t| !t.is_empty() && *t != "N/A")?;
    let published = parse(text)?;
    Some((now - published).num_days())
}

/// Extract the first `D/M/YYYY` date in `text` as midnight of that day.
pub fn parse_dmy(text: &str) -> Option<NaiveDateTime> {
    let caps = DMY_DATE.captures(text)?;
    let day = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let year = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)
}

/// Normalize the first `D/M/YYYY` date in `text` to `YYYY-MM-DD`.
pub fn normalize_dmy(text: &str) -> Option<String> {
    parse_dmy(text).map(|dt| dt.format("%Y-%m-%d").to_string())
}

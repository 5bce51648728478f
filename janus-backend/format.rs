use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
    "%Y%m%dT%H%M%S%.f%:z",
    "%Y%m%dT%H%M%S%.f%#z",
    "%Y%m%dT%H%M%:z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%S%.f",
    "%Y%m%dT%H%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d"];

/// An ISO-8601 value as it came off the wire: with or without a UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsoTimestamp {
    Zoned(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

/// Parse ISO-8601 text in extended (`2024-03-05T07:08:09`) or basic
/// (`20240305T070809`) form. A trailing `Z` is read as UTC, an hour without
/// minutes is read as `HH:00`, and a bare date is midnight with no zone.
pub fn parse_iso8601(text: &str) -> Option<IsoTimestamp> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Some(expanded) = expand_hour_only(text) {
        return parse_iso8601(&expanded);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(IsoTimestamp::Zoned(parsed));
    }

    // chrono's offset specifiers do not accept the `Z` designator
    let normalized = text.replace('Z', "+00:00");
    for fmt in ZONED_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(&normalized, fmt) {
            return Some(IsoTimestamp::Zoned(parsed));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(IsoTimestamp::Naive(parsed));
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(IsoTimestamp::Naive)
}

/// `2024-03-05T07` → `2024-03-05T07:00`; anything else is left alone.
fn expand_hour_only(text: &str) -> Option<String> {
    let (date, hour) = text.split_at_checked(10)?;
    let mut hour = hour.chars();
    let separator = hour.next()?;
    let digits = hour.as_str();
    let is_hour = digits.len() == 2 && digits.bytes().all(|b| b.is_ascii_digit());
    let is_date = date.len() == 10 && date.as_bytes()[4] == b'-' && date.as_bytes()[7] == b'-';
    (is_date && is_hour && matches!(separator, 'T' | ' ')).then(|| format!("{text}:00"))
}

/// Whole seconds between two ISO-8601 instants, or `None` under the same
/// conditions that make [`format_duration`] empty.
pub fn elapsed_seconds(started_at: Option<&str>, ended_at: Option<&str>) -> Option<i64> {
    let start = parse_iso8601(started_at?)?;
    let end = parse_iso8601(ended_at?)?;
    let elapsed = match (start, end) {
        (IsoTimestamp::Zoned(start), IsoTimestamp::Zoned(end)) => end.signed_duration_since(start),
        (IsoTimestamp::Naive(start), IsoTimestamp::Naive(end)) => end.signed_duration_since(start),
        _ => return None,
    };
    (elapsed >= chrono::Duration::zero()).then(|| elapsed.num_seconds())
}

/// Elapsed time between two ISO-8601 instants, e.g. `1h 4m 3s`.
///
/// Returns an empty string when either side is missing or unparseable, when
/// one side carries an offset and the other does not, or when the end comes
/// before the start. Callers omit the duration line in that case.
pub fn format_duration(started_at: Option<&str>, ended_at: Option<&str>) -> String {
    elapsed_seconds(started_at, ended_at)
        .map(format_elapsed_seconds)
        .unwrap_or_default()
}

fn format_elapsed_seconds(total_seconds: i64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Render an ISO-8601 value as `YYYY-MM-DD HH:MM:SS` plus a zone label.
///
/// Absent values read `unknown`; text that does not parse is returned as-is.
pub fn format_timestamp(value: Option<&str>) -> String {
    let Some(text) = value else {
        return "unknown".to_string();
    };
    match parse_iso8601(text) {
        Some(IsoTimestamp::Zoned(parsed)) => format_zoned(&parsed),
        Some(IsoTimestamp::Naive(parsed)) => parsed.format(DISPLAY_FORMAT).to_string(),
        None => text.to_string(),
    }
}

pub fn format_zoned(value: &DateTime<FixedOffset>) -> String {
    let label = zone_label(value.offset());
    format!("{} {}", value.format(DISPLAY_FORMAT), label)
        .trim_end()
        .to_string()
}

fn zone_label(offset: &FixedOffset) -> String {
    let total = offset.local_minus_utc();
    if total == 0 {
        return "UTC".to_string();
    }
    let sign = if total < 0 { '-' } else { '+' };
    let total = total.abs();
    format!("UTC{sign}{:02}:{:02}", total / 3600, (total % 3600) / 60)
}

/// `1234567` → `1,234,567`.
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

//! HTTP date handling
//!
//! Formats IMF-fixdate and parses the three formats HTTP/1.1 allows.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::time::SystemTime;

const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
const RFC_850: &str = "%A, %d-%b-%y %H:%M:%S GMT";
const ASCTIME: &str = "%a %b %e %H:%M:%S %Y";

pub fn format_http_date(time: DateTime<Utc>) -> String {
    time.format(IMF_FIXDATE).to_string()
}

/// Parse IMF-fixdate, RFC 850 or asctime
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, IMF_FIXDATE) {
        return Some(Utc.from_utc_datetime(&dt));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, RFC_850) {
        return Some(Utc.from_utc_datetime(&dt));
    }
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDateTime::parse_from_str(&collapsed, ASCTIME)
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// File time truncated to whole seconds, the resolution of HTTP dates
pub fn to_http_time(time: SystemTime) -> DateTime<Utc> {
    let time = DateTime::<Utc>::from(time);
    Utc.timestamp_opt(time.timestamp(), 0)
        .single()
        .unwrap_or(time)
}

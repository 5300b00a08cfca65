use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;

/// Canonical representation events are compared and sorted in.
pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
/// Comment headings and tracker timestamps.
pub const COMMENT_FORMAT: &str = "%Y-%m-%d %H:%M";
pub const TIME_FORMAT: &str = "%H:%M";
pub const DATETIME_FORMAT: &str = "%d/%m/%Y %H:%M";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

pub fn parse_time(value: &str) -> Option<NaiveTime> {
    let (hour, minute) = value.trim().split_once(':')?;
    if hour.is_empty() || minute.is_empty() || hour.len() > 2 || minute.len() > 2 {
        return None;
    }
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Reads any timestamp shape the diary or a remote may hand us.
///
/// A bare `HH:MM` is resolved against `date`, the diary's own day. Offsets on
/// RFC 3339 values are dropped; the wall-clock time is what the schedule shows.
pub fn parse_timestamp(value: &str, date: NaiveDate) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(time) = parse_time(trimmed) {
        return Some(date.and_time(time));
    }

    for format in [DATETIME_FORMAT, COMMENT_FORMAT, "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed);
        }
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.naive_local());
    }

    parse_date(trimmed).and_then(|day| day.and_hms_opt(0, 0, 0))
}

/// Rewrites a timestamp into [`ISO_FORMAT`]. Unreadable input is kept as-is so
/// it still compares equal to itself.
pub fn normalize_timestamp(value: &str, date: NaiveDate) -> String {
    match parse_timestamp(value, date) {
        Some(parsed) => parsed.format(ISO_FORMAT).to_string(),
        None => value.to_string(),
    }
}

/// Short form for the schedule: time only on the diary's day, full date otherwise.
pub fn display_timestamp(value: &str, date: NaiveDate) -> String {
    match parse_timestamp(value, date) {
        Some(parsed) if parsed.date() == date => parsed.format(TIME_FORMAT).to_string(),
        Some(parsed) => parsed.format(DATETIME_FORMAT).to_string(),
        None => value.to_string(),
    }
}

pub fn format_comment_time(moment: DateTime<Utc>, timezone: Tz) -> String {
    moment.with_timezone(&timezone).format(COMMENT_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn diary_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 1, 1).unwrap()
    }

    #[test]
    fn bare_times_use_the_diary_date() {
        assert_eq!(normalize_timestamp("10:00", diary_day()), "2018-01-01T10:00:00");
        assert_eq!(normalize_timestamp("9:05", diary_day()), "2018-01-01T09:05:00");
    }

    #[test]
    fn every_known_shape_normalizes() {
        let day = diary_day();
        let expected = "2018-01-02T14:30:00";
        assert_eq!(normalize_timestamp("02/01/2018 14:30", day), expected);
        assert_eq!(normalize_timestamp("2018-01-02 14:30", day), expected);
        assert_eq!(normalize_timestamp("2018-01-02T14:30:00.000000", day), expected);
        assert_eq!(normalize_timestamp("2018-01-02T14:30:00+01:00", day), expected);
        assert_eq!(normalize_timestamp("2018-01-02", day), "2018-01-02T00:00:00");
    }

    #[test]
    fn garbage_is_left_alone() {
        assert_eq!(normalize_timestamp("soon", diary_day()), "soon");
        assert!(parse_time("123:00").is_none());
        assert!(parse_time("25:00").is_none());
    }

    #[test]
    fn display_drops_the_date_only_for_today() {
        let day = diary_day();
        assert_eq!(display_timestamp("2018-01-01T10:00:00", day), "10:00");
        assert_eq!(display_timestamp("2018-01-02T10:00:00", day), "02/01/2018 10:00");
    }

    #[test]
    fn remote_times_render_in_the_configured_zone() {
        let summer = Utc.with_ymd_and_hms(2018, 7, 1, 12, 0, 0).unwrap();
        assert_eq!(format_comment_time(summer, chrono_tz::Europe::London), "2018-07-01 13:00");
        let winter = Utc.with_ymd_and_hms(2018, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(format_comment_time(winter, chrono_tz::Europe::London), "2018-01-01 12:00");
        assert_eq!(format_comment_time(winter, chrono_tz::UTC), "2018-01-01 12:00");
    }
}

//! Lexical forms of the temporal atomic types.
//!
//! Dates and date-times carry an optional timezone offset; values without
//! one are interpreted against the implicit timezone of the dynamic context
//! when compared or subtracted.
use chrono::{FixedOffset, Months, NaiveDate, NaiveDateTime, TimeDelta};

use crate::error::{Error, ErrorCode};

const SECS_PER_DAY: i64 = 24 * 3600;

fn invalid(type_name: &str, s: &str) -> Error {
    Error::from_code(
        ErrorCode::FORG0001,
        format!("invalid {type_name} value '{s}'"),
    )
}

/// Parse `Z`, `+hh:mm` or `-hh:mm`.
pub fn parse_offset(s: &str) -> Option<FixedOffset> {
    if s == "Z" || s == "z" {
        return FixedOffset::east_opt(0);
    }
    let bytes = s.as_bytes();
    if bytes.len() != 6 || bytes[3] != b':' {
        return None;
    }
    let sign = match bytes[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let hours: i32 = s[1..3].parse().ok()?;
    let mins: i32 = s[4..6].parse().ok()?;
    if hours > 14 || mins > 59 || (hours == 14 && mins != 0) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + mins * 60))
}

pub fn format_offset(off: &FixedOffset) -> String {
    let secs = off.local_minus_utc();
    if secs == 0 {
        return "Z".to_string();
    }
    let sign = if secs < 0 { '-' } else { '+' };
    let s = secs.abs();
    format!("{}{:02}:{:02}", sign, s / 3600, (s % 3600) / 60)
}

/// Split a trailing timezone designator off a date or date-time lexical.
/// `min_len` is the length of the shortest valid value part, so the date's
/// own `-` separators are never mistaken for an offset.
fn split_timezone(s: &str, min_len: usize) -> Option<(&str, Option<FixedOffset>)> {
    if let Some(body) = s.strip_suffix(['Z', 'z']) {
        return Some((body, FixedOffset::east_opt(0)));
    }
    // The cut point can fall inside a multi-byte character; such text has no
    // offset and fails later as a malformed value.
    let cut = s.len().saturating_sub(6);
    if cut >= min_len
        && let (Some(body), Some(tz)) = (s.get(..cut), s.get(cut..))
        && tz.starts_with(['+', '-'])
        && tz.as_bytes()[3] == b':'
    {
        return Some((body, Some(parse_offset(tz)?)));
    }
    Some((s, None))
}

pub fn parse_date(s: &str) -> Result<(NaiveDate, Option<FixedOffset>), Error> {
    let trimmed = s.trim();
    let (body, tz) = split_timezone(trimmed, 10).ok_or_else(|| invalid("date", s))?;
    let date = NaiveDate::parse_from_str(body, "%Y-%m-%d").map_err(|_| invalid("date", s))?;
    Ok((date, tz))
}

pub fn parse_date_time(s: &str) -> Result<(NaiveDateTime, Option<FixedOffset>), Error> {
    let trimmed = s.trim();
    let (body, tz) = split_timezone(trimmed, 19).ok_or_else(|| invalid("date-time", s))?;
    let value = NaiveDateTime::parse_from_str(body, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|_| invalid("date-time", s))?;
    Ok((value, tz))
}

pub fn format_date(date: &NaiveDate, tz: Option<&FixedOffset>) -> String {
    let mut out = date.format("%Y-%m-%d").to_string();
    if let Some(off) = tz {
        out.push_str(&format_offset(off));
    }
    out
}

pub fn format_date_time(value: &NaiveDateTime, tz: Option<&FixedOffset>) -> String {
    let mut out = value.format("%Y-%m-%dT%H:%M:%S%.f").to_string();
    if let Some(off) = tz {
        out.push_str(&format_offset(off));
    }
    out
}

/// Leading run of ASCII digits (and, when `fraction` is set, a decimal point).
fn take_number(cur: &str, fraction: bool) -> (&str, &str) {
    let end = cur
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || (fraction && *c == '.')))
        .map_or(cur.len(), |(i, _)| i);
    cur.split_at(end)
}

/// `-?P(nY)?(nM)?` with at least one component, as a signed month count.
pub fn parse_year_month_duration(s: &str) -> Result<i32, Error> {
    let err = || invalid("year-month-duration", s);
    let t = s.trim();
    let (neg, body) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t),
    };
    let mut cur = body.strip_prefix('P').ok_or_else(err)?;
    let mut total: i32 = 0;
    let mut seen_any = false;
    for designator in ['Y', 'M'] {
        let (digits, rest) = take_number(cur, false);
        if digits.is_empty() {
            continue;
        }
        let Some(rest) = rest.strip_prefix(designator) else {
            continue;
        };
        let n: i32 = digits.parse().map_err(|_| err())?;
        let months = if designator == 'Y' {
            n.checked_mul(12).ok_or_else(err)?
        } else {
            n
        };
        total = total.checked_add(months).ok_or_else(err)?;
        cur = rest;
        seen_any = true;
    }
    if !seen_any || !cur.is_empty() {
        return Err(err());
    }
    Ok(if neg { -total } else { total })
}

/// `-?P(nD)?(T(nH)?(nM)?(n(.n)?S)?)?` with at least one component.
pub fn parse_day_time_duration(s: &str) -> Result<TimeDelta, Error> {
    let err = || invalid("day-time-duration", s);
    let t = s.trim();
    let (neg, body) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t),
    };
    let mut cur = body.strip_prefix('P').ok_or_else(err)?;
    let mut secs: i64 = 0;
    let mut nanos: i64 = 0;
    let mut seen_any = false;

    let (digits, rest) = take_number(cur, false);
    if !digits.is_empty() {
        let rest = rest.strip_prefix('D').ok_or_else(err)?;
        let days: i64 = digits.parse().map_err(|_| err())?;
        secs = days.checked_mul(SECS_PER_DAY).ok_or_else(err)?;
        cur = rest;
        seen_any = true;
    }
    if let Some(time) = cur.strip_prefix('T') {
        cur = time;
        let mut seen_time = false;
        for (designator, scale) in [('H', 3600i64), ('M', 60)] {
            let (digits, rest) = take_number(cur, false);
            if digits.is_empty() {
                continue;
            }
            let Some(rest) = rest.strip_prefix(designator) else {
                continue;
            };
            let n: i64 = digits.parse().map_err(|_| err())?;
            secs = n
                .checked_mul(scale)
                .and_then(|v| secs.checked_add(v))
                .ok_or_else(err)?;
            cur = rest;
            seen_time = true;
        }
        let (number, rest) = take_number(cur, true);
        if !number.is_empty() {
            let rest = rest.strip_prefix('S').ok_or_else(err)?;
            let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
            if whole.is_empty() || frac.contains('.') {
                return Err(err());
            }
            let n: i64 = whole.parse().map_err(|_| err())?;
            secs = secs.checked_add(n).ok_or_else(err)?;
            let digits: String = frac.chars().chain(std::iter::repeat('0')).take(9).collect();
            nanos = digits.parse().map_err(|_| err())?;
            cur = rest;
            seen_time = true;
        }
        if !seen_time {
            return Err(err());
        }
        seen_any = true;
    }
    if !seen_any || !cur.is_empty() {
        return Err(err());
    }
    let delta = TimeDelta::try_seconds(secs)
        .and_then(|d| d.checked_add(&TimeDelta::nanoseconds(nanos)))
        .ok_or_else(err)?;
    Ok(if neg { -delta } else { delta })
}

pub fn format_year_month_duration(months: i32) -> String {
    if months == 0 {
        return "P0M".to_string();
    }
    let mut out = String::new();
    if months < 0 {
        out.push('-');
    }
    out.push('P');
    let m = months.unsigned_abs();
    let (years, rest) = (m / 12, m % 12);
    if years != 0 {
        out.push_str(&format!("{years}Y"));
    }
    if rest != 0 {
        out.push_str(&format!("{rest}M"));
    }
    out
}

pub fn format_day_time_duration(delta: &TimeDelta) -> String {
    if delta.is_zero() {
        return "PT0S".to_string();
    }
    let abs = delta.abs();
    let total = abs.num_seconds();
    let nanos = abs.subsec_nanos();
    let days = total / SECS_PER_DAY;
    let hours = (total % SECS_PER_DAY) / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;

    let mut out = String::new();
    if *delta < TimeDelta::zero() {
        out.push('-');
    }
    out.push('P');
    if days != 0 {
        out.push_str(&format!("{days}D"));
    }
    if hours != 0 || mins != 0 || secs != 0 || nanos != 0 {
        out.push('T');
        if hours != 0 {
            out.push_str(&format!("{hours}H"));
        }
        if mins != 0 {
            out.push_str(&format!("{mins}M"));
        }
        if nanos != 0 {
            let frac = format!("{nanos:09}");
            out.push_str(&format!("{secs}.{}S", frac.trim_end_matches('0')));
        } else if secs != 0 {
            out.push_str(&format!("{secs}S"));
        }
    }
    out
}

/// Add a signed number of months; the day is clamped to the target month's length.
pub fn add_months_to_date(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    if months >= 0 {
        date.checked_add_months(Months::new(months.unsigned_abs()))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    }
}

pub fn add_months_to_date_time(value: NaiveDateTime, months: i32) -> Option<NaiveDateTime> {
    add_months_to_date(value.date(), months).map(|d| d.and_time(value.time()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_time_duration_lexical() {
        let d = parse_day_time_duration("P1DT2H3M4.5S").unwrap();
        assert_eq!(d.num_seconds(), 86400 + 7200 + 180 + 4);
        assert_eq!(format_day_time_duration(&d), "P1DT2H3M4.5S");
        assert_eq!(format_day_time_duration(&-d), "-P1DT2H3M4.5S");
        assert!(parse_day_time_duration("P1DT").is_err());
        assert!(parse_day_time_duration("PT").is_err());
    }

    #[test]
    fn year_month_duration_lexical() {
        assert_eq!(parse_year_month_duration("P1Y2M").unwrap(), 14);
        assert_eq!(parse_year_month_duration("-P3M").unwrap(), -3);
        assert_eq!(format_year_month_duration(14), "P1Y2M");
        assert_eq!(format_year_month_duration(-12), "-P1Y");
        assert!(parse_year_month_duration("P").is_err());
        assert!(parse_year_month_duration("P2M1Y").is_err());
    }

    #[test]
    fn date_with_offset() {
        let (d, tz) = parse_date("2024-02-29-05:00").unwrap();
        assert_eq!(format_date(&d, tz.as_ref()), "2024-02-29-05:00");
        let (d, tz) = parse_date("2024-02-29").unwrap();
        assert!(tz.is_none());
        assert_eq!(add_months_to_date(d, 12).unwrap().to_string(), "2025-02-28");
    }

    #[test]
    fn multibyte_text_where_an_offset_would_start() {
        let err = parse_date("2024-01-01€abcd").unwrap_err();
        assert_eq!(err.code, ErrorCode::FORG0001);
        let err = parse_date_time("2024-01-01T00:00:00ü:0000").unwrap_err();
        assert_eq!(err.code, ErrorCode::FORG0001);
        assert!(parse_date("€").is_err());
    }
}

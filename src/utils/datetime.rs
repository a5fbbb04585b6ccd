//! DATETIME string <-> packed-decimal integer conversion (spec §6).
//!
//! Treated by the source spec as an out-of-scope "trivial utility", but
//! DML type coercion (`STRING -> DATETIME`, spec §4.8 Insert/Update)
//! depends on it, so it is supplemented here per SPEC_FULL.md §D.

use crate::error::SmallError;

/// `YYYY-MM-DD HH:MM:SS`, always 19 bytes.
pub const DATETIME_STR_LEN: usize = 19;

pub fn parse(s: &str) -> Result<i64, SmallError> {
    if s.len() != DATETIME_STR_LEN {
        return Err(SmallError::DatetimeFormat(s.to_string()));
    }
    let bytes = s.as_bytes();
    let ok_layout = bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes[10] == b' '
        && bytes[13] == b':'
        && bytes[16] == b':';
    if !ok_layout {
        return Err(SmallError::DatetimeFormat(s.to_string()));
    }

    let year: i64 = digits(&s[0..4], s)?;
    let month: i64 = digits(&s[5..7], s)?;
    let day: i64 = digits(&s[8..10], s)?;
    let hour: i64 = digits(&s[11..13], s)?;
    let minute: i64 = digits(&s[14..16], s)?;
    let second: i64 = digits(&s[17..19], s)?;

    validate(year, month, day, hour, minute, second)
        .ok_or_else(|| SmallError::DatetimeFormat(s.to_string()))?;

    Ok(pack(year, month, day, hour, minute, second))
}

fn digits(slice: &str, original: &str) -> Result<i64, SmallError> {
    slice
        .parse::<i64>()
        .map_err(|_| SmallError::DatetimeFormat(original.to_string()))
}

fn pack(year: i64, month: i64, day: i64, hour: i64, minute: i64, second: i64) -> i64 {
    (((((year * 100 + month) * 100 + day) * 100 + hour) * 100 + minute) * 100) + second
}

fn days_in_month(year: i64, month: i64) -> i64 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            // spec §8 S6: Feb is accepted up to day 29 regardless of
            // leap-year status ("2 and 29 ≤ 29"); day 30 is rejected.
            let _ = year;
            29
        }
        _ => 0,
    }
}

fn validate(year: i64, month: i64, day: i64, hour: i64, minute: i64, second: i64) -> Option<()> {
    if !(1000..=9999).contains(&year) {
        return None;
    }
    if !(1..=12).contains(&month) {
        return None;
    }
    if day < 1 || day > days_in_month(year, month).min(31) {
        return None;
    }
    if !(0..=23).contains(&hour) {
        return None;
    }
    if !(0..=59).contains(&minute) {
        return None;
    }
    if !(0..=59).contains(&second) {
        return None;
    }
    Some(())
}

pub fn format(packed: i64) -> String {
    let second = packed % 100;
    let mut rest = packed / 100;
    let minute = rest % 100;
    rest /= 100;
    let hour = rest % 100;
    rest /= 100;
    let day = rest % 100;
    rest /= 100;
    let month = rest % 100;
    let year = rest / 100;

    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        year, month, day, hour, minute, second
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let s = "2024-02-29 00:00:00";
        let packed = parse(s).unwrap();
        assert_eq!(format(packed), s);
    }

    #[test]
    fn leap_day_accepted() {
        assert!(parse("2024-02-29 00:00:00").is_ok());
    }

    #[test]
    fn feb_30_rejected() {
        assert!(matches!(
            parse("2023-02-30 00:00:00"),
            Err(SmallError::DatetimeFormat(_))
        ));
    }

    #[test]
    fn bad_month_rejected() {
        assert!(parse("2023-13-01 00:00:00").is_err());
    }

    #[test]
    fn bad_layout_rejected() {
        assert!(parse("2023/01/01 00:00:00").is_err());
    }
}

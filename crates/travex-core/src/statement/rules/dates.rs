//! Date recognition for transport statements.

use chrono::NaiveDate;

use super::patterns::{
    DATE_DAY_MONTH_YEAR, DATE_ISO, DATE_WEEKDAY_DAY_MONTH, FIELD_DATE_DMY, FIELD_DATE_ISO,
    FIELD_DATE_LONG,
};

/// Find a date header anywhere in a line.
///
/// Forms are tried in priority order: ISO `YYYY-MM-DD`, `D Month YYYY`,
/// then `Weekday D Month [YYYY]` where a missing year becomes `default_year`.
/// Matches that are not real calendar dates are skipped.
pub fn find_header_date(line: &str, default_year: i32) -> Option<NaiveDate> {
    find_iso(line)
        .or_else(|| find_day_month_year(line))
        .or_else(|| find_weekday_day_month(line, default_year))
}

fn find_iso(line: &str) -> Option<NaiveDate> {
    DATE_ISO.captures_iter(line).find_map(|caps| {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

fn find_day_month_year(line: &str) -> Option<NaiveDate> {
    DATE_DAY_MONTH_YEAR.captures_iter(line).find_map(|caps| {
        let day: u32 = caps[1].parse().ok()?;
        let month = month_from_name(&caps[2])?;
        let year: i32 = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

fn find_weekday_day_month(line: &str, default_year: i32) -> Option<NaiveDate> {
    DATE_WEEKDAY_DAY_MONTH.captures_iter(line).find_map(|caps| {
        let day: u32 = caps[1].parse().ok()?;
        let month = month_from_name(&caps[2])?;
        let year = match caps.get(3) {
            Some(m) => m.as_str().parse().ok()?,
            None => default_year,
        };
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

/// Parse the date in a statement column.
///
/// Accepts ISO, `D/M/Y` or `D-M-Y` (two-digit years are 20xx) and
/// `D Month YYYY`; the first form that yields a valid date wins.
pub fn parse_field_date(field: &str) -> Option<NaiveDate> {
    let field = field.trim();

    let iso = FIELD_DATE_ISO.captures(field).and_then(|caps| {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    });

    iso.or_else(|| {
        FIELD_DATE_DMY.captures(field).and_then(|caps| {
            let day: u32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let year = parse_year(&caps[3])?;
            NaiveDate::from_ymd_opt(year, month, day)
        })
    })
    .or_else(|| {
        FIELD_DATE_LONG.captures(field).and_then(|caps| {
            let day: u32 = caps[1].parse().ok()?;
            let month = month_from_name(&caps[2])?;
            let year: i32 = caps[3].parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        })
    })
}

fn parse_year(s: &str) -> Option<i32> {
    let year: i32 = s.parse().ok()?;
    // Statements are recent: two-digit years are always this century.
    if s.len() == 2 { Some(2000 + year) } else { Some(year) }
}

/// Month number from an English month name or abbreviation.
///
/// Only the first three letters are significant (`Sept`, `September` and
/// `sep` are all 9).
pub fn month_from_name(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take(3).collect::<String>().to_lowercase();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_header_iso() {
        assert_eq!(find_header_date("2025-10-14", 2030), Some(ymd(2025, 10, 14)));
    }

    #[test]
    fn test_header_day_month_year() {
        assert_eq!(find_header_date("14 Oct 2025", 2030), Some(ymd(2025, 10, 14)));
        assert_eq!(find_header_date("3rd SEPTEMBER 2025", 2030), Some(ymd(2025, 9, 3)));
    }

    #[test]
    fn test_header_weekday_defaults_year() {
        assert_eq!(find_header_date("Tuesday 14 October", 2025), Some(ymd(2025, 10, 14)));
        assert_eq!(find_header_date("Wed, 1 Jan 2025", 2030), Some(ymd(2025, 1, 1)));
    }

    #[test]
    fn test_header_rejects_impossible_dates() {
        assert_eq!(find_header_date("2025-13-40", 2025), None);
        assert_eq!(find_header_date("31 Feb 2025", 2025), None);
        assert_eq!(find_header_date("Sat 3 buses", 2025), None);
    }

    #[test]
    fn test_iso_takes_priority() {
        assert_eq!(
            find_header_date("Tue 14 Oct 2025 (2025-10-15)", 2030),
            Some(ymd(2025, 10, 15))
        );
    }

    #[test]
    fn test_field_dates() {
        assert_eq!(parse_field_date("14/10/2025"), Some(ymd(2025, 10, 14)));
        assert_eq!(parse_field_date("14-10-25"), Some(ymd(2025, 10, 14)));
        assert_eq!(parse_field_date("2025-10-15"), Some(ymd(2025, 10, 15)));
        assert_eq!(parse_field_date("15 October 2025"), Some(ymd(2025, 10, 15)));
        assert_eq!(parse_field_date("Bus journey"), None);
        assert_eq!(parse_field_date("31/02/2025"), None);
    }

    #[test]
    fn test_month_from_name() {
        assert_eq!(month_from_name("Sept"), Some(9));
        assert_eq!(month_from_name("DECEMBER"), Some(12));
        assert_eq!(month_from_name("bus"), None);
    }
}

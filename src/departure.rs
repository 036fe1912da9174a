use chrono::Datelike;
use chrono::Duration;
use chrono::Local;
use chrono::NaiveDateTime;
use chrono::NaiveTime;

/// The next upcoming Monday at hour:minute, seen from `now`.  If `now` is a
/// Monday already past that time, rolls a full week forward.  Anchoring all
/// transit queries to a weekday morning keeps results comparable across runs
/// started at arbitrary times.
pub fn next_monday_from(now: NaiveDateTime, hour: u32, minute: u32) -> NaiveDateTime {
    let departure_time = NaiveTime::from_hms_opt(hour, minute, 0).
        expect("departure hour/minute out of range");
    // Monday is 0
    let weekday = now.weekday().num_days_from_monday();
    let mut days_until_monday = (7 - weekday) % 7;
    if days_until_monday == 0 && now.time() > departure_time {
        days_until_monday = 7;
    }

    let monday = now.date() + Duration::days(days_until_monday as i64);
    return monday.and_time(departure_time);
}

/// next_monday_from anchored at the wall clock.
pub fn upcoming_monday(hour: u32, minute: u32) -> NaiveDateTime {
    next_monday_from(Local::now().naive_local(), hour, minute)
}


#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use chrono::Weekday;
    use super::*;

    fn datetime(yy: i32, mo: u32, dd: u32, hh: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(yy, mo, dd).unwrap().
            and_hms_opt(hh, mi, 0).unwrap()
    }

    #[test]
    fn test_midweek_rolls_to_next_monday() {
        // 2026-08-05 is a Wednesday
        let now = datetime(2026, 8, 5, 14, 30);
        let dep = next_monday_from(now, 8, 0);
        assert_eq!(dep, datetime(2026, 8, 10, 8, 0));
        assert_eq!(dep.weekday(), Weekday::Mon);
    }

    #[test]
    fn test_monday_before_departure_stays_today() {
        // 2026-08-10 is a Monday
        let now = datetime(2026, 8, 10, 7, 15);
        assert_eq!(next_monday_from(now, 8, 0), datetime(2026, 8, 10, 8, 0));
    }

    #[test]
    fn test_monday_after_departure_rolls_a_week() {
        let now = datetime(2026, 8, 10, 9, 0);
        assert_eq!(next_monday_from(now, 8, 0), datetime(2026, 8, 17, 8, 0));
    }

    #[test]
    fn test_sunday_rolls_one_day() {
        // 2026-08-09 is a Sunday
        let now = datetime(2026, 8, 9, 23, 59);
        assert_eq!(next_monday_from(now, 8, 0), datetime(2026, 8, 10, 8, 0));
    }
}

// Calendar arithmetic on zoned timestamps
use chrono::{DateTime, Days, Duration, Months, NaiveDate, TimeZone};
use chrono_tz::Tz;

/// Local midnight of `date` in `tz`.
///
/// When midnight falls in a DST gap the first valid instant after it is used.
pub fn local_midnight(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    let naive = date.and_time(chrono::NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}

pub fn start_of_day(date: &DateTime<Tz>) -> DateTime<Tz> {
    local_midnight(&date.timezone(), date.date_naive())
}

pub fn days_before(date: &DateTime<Tz>, days: u64) -> DateTime<Tz> {
    date.checked_sub_days(Days::new(days))
        .unwrap_or_else(|| *date - Duration::days(days as i64))
}

/// Same local time one or more calendar months earlier, clamped to month end.
pub fn months_before(date: &DateTime<Tz>, months: u32) -> DateTime<Tz> {
    date.checked_sub_months(Months::new(months))
        .unwrap_or_else(|| *date - Duration::days(30 * months as i64))
}

/// Start date of the week ending at `last`, used by the weekly header label.
pub fn last_week_start(last: &DateTime<Tz>) -> DateTime<Tz> {
    days_before(last, 7)
}

pub fn last_month_start(last: &DateTime<Tz>) -> DateTime<Tz> {
    months_before(last, 1)
}

/// Every calendar day from `from` up to and including `to`.
pub fn dates_range(from: &DateTime<Tz>, to: &DateTime<Tz>) -> Vec<DateTime<Tz>> {
    step_range(from, to, |d| {
        d.checked_add_days(Days::new(1))
            .unwrap_or_else(|| *d + Duration::days(1))
    })
}

/// Every hour from `from` up to and including `to`.
pub fn hours_range(from: &DateTime<Tz>, to: &DateTime<Tz>) -> Vec<DateTime<Tz>> {
    step_range(from, to, |d| *d + Duration::hours(1))
}

fn step_range<F>(from: &DateTime<Tz>, to: &DateTime<Tz>, step: F) -> Vec<DateTime<Tz>>
where
    F: Fn(&DateTime<Tz>) -> DateTime<Tz>,
{
    if from > to {
        return Vec::new();
    }

    let mut dates = vec![*from];
    let mut current = step(from);
    while current <= *to {
        dates.push(current);
        current = step(&current);
    }
    dates
}

/// Items whose index is a multiple of `stride`.
pub fn items_at_indices_multiple_of<T: Clone>(stride: usize, items: &[T]) -> Vec<T> {
    if stride == 0 {
        return Vec::new();
    }
    items
        .iter()
        .enumerate()
        .filter(|(i, _)| i % stride == 0)
        .map(|(_, item)| item.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        Tz::UTC.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_dates_range_empty_when_reversed() {
        let from = utc(2020, 6, 10, 0, 0);
        let to = utc(2020, 6, 9, 0, 0);
        assert!(dates_range(&from, &to).is_empty());
        assert!(hours_range(&from, &to).is_empty());
    }

    #[test]
    fn test_dates_range_single_element_when_equal() {
        let day = utc(2020, 6, 10, 8, 0);
        assert_eq!(dates_range(&day, &day), vec![day]);
        assert_eq!(hours_range(&day, &day), vec![day]);
    }

    #[test]
    fn test_dates_range_stops_at_end() {
        let from = utc(2020, 6, 1, 0, 0);
        let to = utc(2020, 6, 3, 15, 0);
        let dates = dates_range(&from, &to);
        assert_eq!(dates, vec![utc(2020, 6, 1, 0, 0), utc(2020, 6, 2, 0, 0), utc(2020, 6, 3, 0, 0)]);
    }

    #[test]
    fn test_hours_range_counts_hours_so_far() {
        let now = utc(2020, 6, 10, 14, 30);
        let hours = hours_range(&start_of_day(&now), &now);
        assert_eq!(hours.len(), 15);
        assert_eq!(hours.last().map(|h| h.hour()), Some(14));
    }

    #[test]
    fn test_items_at_indices_multiple_of() {
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(items_at_indices_multiple_of(3, &items), vec![0, 3, 6, 9]);
        assert_eq!(items_at_indices_multiple_of(7, &items), vec![0, 7]);
        assert!(items_at_indices_multiple_of(0, &items).is_empty());
    }

    #[test]
    fn test_months_before_clamps_to_month_end() {
        let end_of_march = utc(2021, 3, 31, 9, 0);
        assert_eq!(months_before(&end_of_march, 1), utc(2021, 2, 28, 9, 0));
    }

    #[test]
    fn test_start_of_day_in_zone() {
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        let now = tz.with_ymd_and_hms(2020, 6, 10, 1, 30, 0).unwrap();
        let start = start_of_day(&now);
        assert_eq!(start, tz.with_ymd_and_hms(2020, 6, 10, 0, 0, 0).unwrap());
    }
}

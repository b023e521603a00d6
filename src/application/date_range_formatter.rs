// Date range labels and horizontal axis markers for charts
use crate::application::calendar::{
    dates_range, hours_range, items_at_indices_multiple_of, last_month_start,
    last_week_start, start_of_day,
};
use crate::domain::chart::AxisLabelSet;
use crate::domain::time_range::{AxisFormat, TimeRange};
use chrono::{DateTime, Datelike};
use chrono_tz::Tz;

const WEEKDAY_TITLES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

const MONTH_DAY: &str = "%b %-d";
const MONTH_DAY_YEAR: &str = "%b %-d, %Y";
const DAY_YEAR: &str = "%-d, %Y";
const AXIS_MONTH_DAY: &str = "%b-%-d";
const AXIS_HOUR: &str = "%-H";

/// Header label for the span shown by `range`, ending at `anchor`.
pub fn date_range_label(range: TimeRange, anchor: &DateTime<Tz>) -> String {
    match range {
        TimeRange::Day => today_label(anchor),
        TimeRange::Week => weekly_date_range_label(anchor),
        TimeRange::Month => monthly_date_range_label(anchor),
    }
}

/// e.g. "Jun 3–10, 2020" or "Jun 25–Jul 2, 2020".
pub fn weekly_date_range_label(last: &DateTime<Tz>) -> String {
    span_label(&last_week_start(last), last)
}

pub fn monthly_date_range_label(last: &DateTime<Tz>) -> String {
    span_label(&last_month_start(last), last)
}

pub fn today_label(today: &DateTime<Tz>) -> String {
    today.format(MONTH_DAY_YEAR).to_string()
}

pub fn last_updated_label(last_updated: &DateTime<Tz>) -> String {
    format!("last updated on {}", last_updated.format(MONTH_DAY_YEAR))
}

fn span_label(start: &DateTime<Tz>, end: &DateTime<Tz>) -> String {
    let same_year = start.year() == end.year();
    let same_month = same_year && start.month() == end.month();

    let start_label = if same_year {
        start.format(MONTH_DAY).to_string()
    } else {
        start.format(MONTH_DAY_YEAR).to_string()
    };
    let end_label = if same_month {
        end.format(DAY_YEAR).to_string()
    } else {
        end.format(MONTH_DAY_YEAR).to_string()
    };

    format!("{}–{}", start_label, end_label)
}

/// Tick labels for the horizontal axis of `range`, with `now` as the last bucket.
pub fn horizontal_axis_markers(range: TimeRange, now: &DateTime<Tz>) -> AxisLabelSet {
    let params = range.params();
    match params.axis_format {
        AxisFormat::Hour => {
            let hours = hours_range(&start_of_day(now), now);
            format_every(params.axis_stride, &hours, AXIS_HOUR)
        }
        AxisFormat::Weekday => weekday_axis_markers(now),
        AxisFormat::MonthDay => {
            let start = start_of_day(&last_month_start(now));
            let dates = dates_range(&start, now);
            format_every(params.axis_stride, &dates, AXIS_MONTH_DAY)
        }
    }
}

/// Weekday abbreviations for the last seven days, ending with `now`'s weekday.
pub fn weekday_axis_markers(now: &DateTime<Tz>) -> AxisLabelSet {
    let weekday = (now.weekday().num_days_from_sunday() as usize + 1) % WEEKDAY_TITLES.len();
    WEEKDAY_TITLES[weekday..]
        .iter()
        .chain(WEEKDAY_TITLES[..weekday].iter())
        .map(|t| t.to_string())
        .collect()
}

fn format_every(stride: usize, dates: &[DateTime<Tz>], format: &str) -> AxisLabelSet {
    items_at_indices_multiple_of(stride, dates)
        .iter()
        .map(|d| d.format(format).to_string())
        .collect()
}

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

const RECORD_NAME_FORMAT: &str = "%Y-%m-%d";

/// This is the standard way of converting a date to a string in apptrail.
pub fn date_to_record_name(date: NaiveDate) -> String {
    date.format(RECORD_NAME_FORMAT).to_string()
}

/// Inverse of [date_to_record_name]. Returns [None] for files that weren't created by the store.
pub fn record_name_to_date(name: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(name, RECORD_NAME_FORMAT).ok()
}

/// Returns start of the next day. A midnight skipped by a DST change falls back to the same time
/// tomorrow.
pub fn next_day_start<Tz: TimeZone>(date: DateTime<Tz>) -> DateTime<Tz> {
    let next = date + Duration::days(1);
    next.with_time(NaiveTime::MIN).earliest().unwrap_or(next)
}

/// First instant of `date` in the timezone. Days that start inside a DST gap begin at the first
/// instant that exists.
pub fn day_start<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
        .map(|v| v.to_utc())
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// Returns `[start, end)` of a calendar day in the timezone.
pub fn day_bounds<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let next = date.succ_opt().unwrap_or(date);
    (day_start(date, tz), day_start(next, tz))
}

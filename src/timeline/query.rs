use anyhow::Result;
use chrono::{DateTime, NaiveDate, TimeZone};
use chrono_english::{parse_date_string, Dialect};
use tracing::{instrument, warn};

use crate::{
    daemon::storage::{entities::ActivityEvent, event_store::EventStore},
    utils::{clock::Clock, time::day_bounds},
};

use super::{
    segmentation::{segment_events, TimelineSegment},
    summary::{summarize, DaySummary},
};

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Turns user input into a calendar day. Accepts `2025-03-15` as well as anything
/// [chrono_english] understands, like "yesterday" or "15/03/2025". Anything else is today.
pub fn parse_day<Tz: TimeZone>(
    input: Option<&str>,
    now: DateTime<Tz>,
    dialect: Dialect,
) -> NaiveDate
where
    Tz::Offset: Copy,
{
    let today = now.date_naive();
    let Some(input) = input.map(str::trim).filter(|v| !v.is_empty()) else {
        return today;
    };

    if let Ok(date) = NaiveDate::parse_from_str(input, DAY_FORMAT) {
        return date;
    }

    match parse_date_string(input, now, dialect) {
        Ok(date) => date.date_naive(),
        Err(e) => {
            warn!("Couldn't parse date {input:?}, using today. {e}");
            today
        }
    }
}

/// Read side of the event log. Days are calendar days in `tz`.
pub struct ActivityQuery<S: EventStore, Tz: TimeZone> {
    store: S,
    time_provider: Box<dyn Clock>,
    tz: Tz,
}

impl<S: EventStore, Tz: TimeZone> ActivityQuery<S, Tz>
where
    Tz::Offset: Copy,
{
    pub fn new(store: S, time_provider: Box<dyn Clock>, tz: Tz) -> Self {
        Self {
            store,
            time_provider,
            tz,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.time_provider.time().with_timezone(&self.tz).date_naive()
    }

    pub fn parse_day(&self, input: Option<&str>, dialect: Dialect) -> NaiveDate {
        parse_day(
            input,
            self.time_provider.time().with_timezone(&self.tz),
            dialect,
        )
    }

    /// Raw events of the day in the order they were recorded.
    #[instrument(skip(self))]
    pub async fn events(&self, day: NaiveDate) -> Result<Vec<ActivityEvent>> {
        let (start, end) = day_bounds(day, &self.tz);
        self.store.query_range(start, end).await
    }

    /// Timeline of the day. An idle period that never ended is closed at the current instant.
    pub async fn segments(&self, day: NaiveDate) -> Result<Vec<TimelineSegment>> {
        let events = self.events(day).await?;
        Ok(segment_events(&events, self.time_provider.time()))
    }

    pub async fn summary(&self, day: NaiveDate) -> Result<DaySummary> {
        let segments = self.segments(day).await?;
        Ok(DaySummary::new(day, summarize(&segments)))
    }
}

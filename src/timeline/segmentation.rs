use std::{collections::BTreeSet, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::trace;

use crate::daemon::storage::entities::{ActivityEvent, EventType};

use super::color::{color, IDLE_COLOR};

/// Name idle segments are reported under.
pub const IDLE_APP_NAME: &str = "Idle";

/// Time added after the last event of a segment that is still going on. Matches the heartbeat
/// interval, since at most that much time could have passed without a new event.
pub const OPEN_SEGMENT_PAD: Duration = Duration::seconds(60);

/// A contiguous span of time spent in one application, or away from the computer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSegment {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub app_name: Arc<str>,
    pub bundle_id: Option<Arc<str>>,
    pub window_titles: BTreeSet<Arc<str>>,
    pub color: String,
    pub duration_seconds: i64,
    pub is_idle: bool,
}

impl TimelineSegment {
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }
}

struct OpenSegment {
    start: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    app_name: Arc<str>,
    bundle_id: Option<Arc<str>>,
    window_titles: BTreeSet<Arc<str>>,
}

impl OpenSegment {
    fn from_event(event: &ActivityEvent) -> Self {
        Self {
            start: event.timestamp,
            last_seen: event.timestamp,
            app_name: event.app_name.clone(),
            bundle_id: event.bundle_id.clone(),
            window_titles: event.window_title.iter().cloned().collect(),
        }
    }

    fn close(self, end: DateTime<Utc>) -> Option<TimelineSegment> {
        let duration_seconds = (end - self.start).num_seconds();
        (duration_seconds > 0).then(|| TimelineSegment {
            start_time: self.start,
            end_time: end,
            color: color(&self.app_name),
            app_name: self.app_name,
            bundle_id: self.bundle_id,
            window_titles: self.window_titles,
            duration_seconds,
            is_idle: false,
        })
    }
}

fn idle_segment(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<TimelineSegment> {
    let duration_seconds = (end - start).num_seconds();
    (duration_seconds > 0).then(|| TimelineSegment {
        start_time: start,
        end_time: end,
        app_name: IDLE_APP_NAME.into(),
        bundle_id: None,
        window_titles: BTreeSet::new(),
        color: IDLE_COLOR.into(),
        duration_seconds,
        is_idle: true,
    })
}

/// Walks the events keeping at most one open application segment and one open idle window.
#[derive(Default)]
struct SegmentBuilder {
    segments: Vec<TimelineSegment>,
    open: Option<OpenSegment>,
    idle_since: Option<DateTime<Utc>>,
}

impl SegmentBuilder {
    fn close_open(&mut self, end: DateTime<Utc>) {
        if let Some(segment) = self.open.take().and_then(|v| v.close(end)) {
            self.segments.push(segment);
        }
    }

    fn push(&mut self, event: &ActivityEvent) {
        match event.event_type {
            EventType::IdleStart => {
                self.close_open(event.timestamp);
                // A repeated idle start doesn't move the beginning of the idle window.
                self.idle_since.get_or_insert(event.timestamp);
            }
            EventType::IdleEnd => {
                if let Some(segment) = self
                    .idle_since
                    .take()
                    .and_then(|start| idle_segment(start, event.timestamp))
                {
                    self.segments.push(segment);
                }
            }
            EventType::Change | EventType::Heartbeat if self.idle_since.is_some() => {
                trace!("Ignoring {} event while idle", event.event_type);
            }
            EventType::Change | EventType::Heartbeat => match self.open.as_mut() {
                Some(open) if open.app_name == event.app_name => {
                    open.last_seen = event.timestamp;
                    if let Some(title) = &event.window_title {
                        open.window_titles.insert(title.clone());
                    }
                }
                Some(_) => {
                    self.close_open(event.timestamp);
                    self.open = Some(OpenSegment::from_event(event));
                }
                None => self.open = Some(OpenSegment::from_event(event)),
            },
        }
    }

    fn finish(mut self, horizon: DateTime<Utc>) -> Vec<TimelineSegment> {
        if let Some(open) = self.open.take() {
            let end = open.last_seen + OPEN_SEGMENT_PAD;
            self.segments.extend(open.close(end));
        }
        if let Some(start) = self.idle_since.take() {
            self.segments.extend(idle_segment(start, horizon));
        }
        self.segments.sort_by_key(|v| v.start_time);
        self.segments
    }
}

/// Turns an ordered range of events into a timeline.
///
/// Consecutive events of the same application are merged into one segment that lasts until the
/// next application or idle period starts. Idle periods become segments of their own. A segment
/// that is still open at the end is padded by [OPEN_SEGMENT_PAD], while an idle window that never
/// ended is closed at `horizon`. Segments shorter than a second are dropped.
///
/// Only the open tails depend on `horizon`, so calling this again later can extend the last
/// segment.
pub fn segment_events(events: &[ActivityEvent], horizon: DateTime<Utc>) -> Vec<TimelineSegment> {
    if events.is_empty() {
        return vec![];
    }

    let mut builder = SegmentBuilder::default();
    for event in events {
        builder.push(event);
    }
    builder.finish(horizon)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

    use crate::{
        daemon::storage::entities::{ActivityEvent, EventType},
        timeline::color::{color, IDLE_COLOR},
    };

    use super::{segment_events, TimelineSegment, IDLE_APP_NAME};

    const TEST_DATE: NaiveDate = NaiveDate::from_ymd_opt(2024, 4, 5).unwrap();

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(&NaiveDateTime::new(
            TEST_DATE,
            NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
        ))
    }

    fn event(time: DateTime<Utc>, app: &str, event_type: EventType) -> ActivityEvent {
        ActivityEvent::new(time, app, event_type)
    }

    fn idle(time: DateTime<Utc>, event_type: EventType) -> ActivityEvent {
        ActivityEvent::new(time, "A", event_type).with_idle(event_type == EventType::IdleStart)
    }

    fn summary(segments: &[TimelineSegment]) -> Vec<(&str, DateTime<Utc>, DateTime<Utc>, i64)> {
        segments
            .iter()
            .map(|v| (&*v.app_name, v.start_time, v.end_time, v.duration_seconds))
            .collect()
    }

    fn assert_well_formed(segments: &[TimelineSegment]) {
        for segment in segments {
            assert!(segment.duration_seconds > 0, "{segment:?}");
            assert_eq!(segment.duration().num_seconds(), segment.duration_seconds);
        }
        for pair in segments.windows(2) {
            assert!(pair[0].start_time <= pair[1].start_time, "{pair:?}");
            assert!(pair[0].end_time <= pair[1].start_time, "{pair:?}");
        }
    }

    #[test]
    fn empty_events_produce_nothing() {
        assert!(segment_events(&[], at(12, 0)).is_empty());
    }

    #[test]
    fn reference_day() {
        let events = [
            event(at(9, 0), "A", EventType::Change),
            event(at(9, 1), "A", EventType::Heartbeat).with_window_title("x"),
            event(at(9, 5), "B", EventType::Change),
            idle(at(9, 10), EventType::IdleStart),
            idle(at(9, 15), EventType::IdleEnd),
            event(at(9, 15), "B", EventType::Change),
        ];

        let segments = segment_events(&events, at(12, 0));

        assert_eq!(
            summary(&segments),
            vec![
                ("A", at(9, 0), at(9, 5), 300),
                ("B", at(9, 5), at(9, 10), 300),
                (IDLE_APP_NAME, at(9, 10), at(9, 15), 300),
                ("B", at(9, 15), at(9, 16), 60),
            ]
        );
        assert_eq!(
            segments[0].window_titles.iter().map(|v| &**v).collect::<Vec<_>>(),
            vec!["x"]
        );
        assert!(segments[2].is_idle);
        assert!(segments[2].window_titles.is_empty());
        assert_eq!(segments[2].color, IDLE_COLOR);
        assert_eq!(segments[0].color, color("A"));
        assert_well_formed(&segments);
    }

    #[test]
    fn same_app_merges_titles() {
        let events = [
            event(at(9, 0), "A", EventType::Change).with_window_title("b"),
            event(at(9, 1), "A", EventType::Change).with_window_title("a"),
            event(at(9, 2), "A", EventType::Heartbeat).with_window_title("b"),
            event(at(9, 3), "A", EventType::Heartbeat),
            event(at(9, 4), "B", EventType::Change),
        ];

        let segments = segment_events(&events, at(12, 0));

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start_time, at(9, 0));
        assert_eq!(segments[0].end_time, at(9, 4));
        assert_eq!(
            segments[0].window_titles.iter().map(|v| &**v).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn returning_to_app_creates_new_segment() {
        let events = [
            event(at(9, 0), "A", EventType::Change),
            event(at(9, 5), "B", EventType::Change),
            event(at(9, 10), "A", EventType::Change),
        ];

        let segments = segment_events(&events, at(12, 0));

        assert_eq!(
            summary(&segments),
            vec![
                ("A", at(9, 0), at(9, 5), 300),
                ("B", at(9, 5), at(9, 10), 300),
                ("A", at(9, 10), at(9, 11), 60),
            ]
        );
    }

    #[test]
    fn open_segment_is_padded_from_last_event() {
        let events = [
            event(at(9, 0), "A", EventType::Change),
            event(at(9, 1), "A", EventType::Heartbeat),
            event(at(9, 2), "A", EventType::Heartbeat),
        ];

        let segments = segment_events(&events, at(12, 0));

        assert_eq!(summary(&segments), vec![("A", at(9, 0), at(9, 3), 180)]);
    }

    #[test]
    fn zero_length_segments_are_dropped() {
        let events = [
            event(at(9, 0), "A", EventType::Change),
            event(at(9, 0), "B", EventType::Change),
            idle(at(9, 5), EventType::IdleStart),
            idle(at(9, 5), EventType::IdleEnd),
            event(at(9, 6), "C", EventType::Change),
        ];

        let segments = segment_events(&events, at(12, 0));

        assert_eq!(
            summary(&segments),
            vec![("B", at(9, 0), at(9, 5), 300), ("C", at(9, 6), at(9, 7), 60)]
        );
    }

    #[test]
    fn events_while_idle_are_ignored() {
        let events = [
            event(at(9, 0), "A", EventType::Change),
            idle(at(9, 10), EventType::IdleStart),
            event(at(9, 11), "A", EventType::Heartbeat),
            event(at(9, 12), "B", EventType::Change),
            idle(at(9, 20), EventType::IdleEnd),
            event(at(9, 20), "A", EventType::Change),
        ];

        let segments = segment_events(&events, at(12, 0));

        assert_eq!(
            summary(&segments),
            vec![
                ("A", at(9, 0), at(9, 10), 600),
                (IDLE_APP_NAME, at(9, 10), at(9, 20), 600),
                ("A", at(9, 20), at(9, 21), 60),
            ]
        );
    }

    #[test]
    fn ongoing_idle_is_closed_at_horizon() {
        let events = [
            event(at(9, 0), "A", EventType::Change),
            idle(at(9, 10), EventType::IdleStart),
        ];

        let segments = segment_events(&events, at(9, 30));

        assert_eq!(
            summary(&segments),
            vec![
                ("A", at(9, 0), at(9, 10), 600),
                (IDLE_APP_NAME, at(9, 10), at(9, 30), 1200),
            ]
        );

        // Recomputing later extends the tail.
        let later = segment_events(&events, at(10, 0));
        assert_eq!(later[1].end_time, at(10, 0));
    }

    #[test]
    fn idle_end_without_start_is_ignored() {
        let events = [
            event(at(9, 0), "A", EventType::Change),
            idle(at(9, 5), EventType::IdleEnd),
            event(at(9, 6), "A", EventType::Heartbeat),
        ];

        let segments = segment_events(&events, at(12, 0));

        assert_eq!(summary(&segments), vec![("A", at(9, 0), at(9, 7), 420)]);
    }

    #[test]
    fn repeated_idle_start_keeps_first() {
        let events = [
            idle(at(9, 0), EventType::IdleStart),
            idle(at(9, 5), EventType::IdleStart),
            idle(at(9, 10), EventType::IdleEnd),
        ];

        let segments = segment_events(&events, at(12, 0));

        assert_eq!(summary(&segments), vec![(IDLE_APP_NAME, at(9, 0), at(9, 10), 600)]);
    }

    #[test]
    fn generated_days_are_well_formed() {
        let apps = ["A", "B", "C"];
        let types = [
            EventType::Change,
            EventType::Heartbeat,
            EventType::Heartbeat,
            EventType::IdleStart,
            EventType::IdleEnd,
        ];
        // Small LCG so the sequence is reproducible.
        let mut seed = 7u64;
        let mut next = move |bound: u64| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) % bound
        };

        for _ in 0..50 {
            let mut time = at(0, 0);
            let mut events = vec![];
            for _ in 0..200 {
                time += Duration::seconds(next(120) as i64);
                let app = apps[next(apps.len() as u64) as usize];
                let event_type = types[next(types.len() as u64) as usize];
                let mut event = event(time, app, event_type);
                if next(2) == 0 {
                    event = event.with_window_title(format!("title {}", next(4)));
                }
                events.push(event);
            }

            let segments = segment_events(&events, time + Duration::minutes(5));
            assert_well_formed(&segments);
            for segment in segments.iter().filter(|v| v.is_idle) {
                assert!(segment.window_titles.is_empty());
                assert_eq!(&*segment.app_name, IDLE_APP_NAME);
            }
        }
    }
}

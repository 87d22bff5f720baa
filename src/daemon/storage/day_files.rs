use std::{
    io::{ErrorKind, SeekFrom},
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use fs4::tokio::AsyncFileExt;
use futures::future::try_join_all;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, info, instrument, warn};

use crate::utils::time::{date_to_record_name, record_name_to_date};

use super::{entities::ActivityEvent, event_store::EventStore};

/// The main realization of [EventStore].
///
/// Every UTC day gets its own file inside `record_dir`. Each line of a file is one
/// [ActivityEvent] serialized as json, in the order events were appended.
pub struct DayFileStore {
    record_dir: PathBuf,
}

impl DayFileStore {
    pub fn new(record_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&record_dir)?;

        Ok(Self { record_dir })
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.record_dir.join(date_to_record_name(date))
    }

    async fn read_day(&self, date: NaiveDate) -> Result<Vec<ActivityEvent>> {
        let mut file = match File::open(self.path_for(date)).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => Err(e)?,
        };

        debug!("Extracting {date}");
        file.lock_shared()?;
        let result = async {
            let mut lines = BufReader::new(&mut file).split(b'\n');
            let mut events = vec![];
            while let Some(line) = lines.next_segment().await? {
                if let Some(event) = parse_line(&line, date) {
                    events.push(event);
                }
            }
            Ok::<_, std::io::Error>(events)
        }
        .await;
        file.unlock_async().await?;

        Ok(result?)
    }

    /// Drops events before `cutoff` from the file of the day `cutoff` falls on.
    async fn trim_day(&self, path: &Path, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut file = File::options().read(true).write(true).open(path).await?;
        file.lock_exclusive()?;
        let result = Self::trim_with_file(&mut file, cutoff).await;
        file.unlock_async().await?;
        result
    }

    async fn trim_with_file(file: &mut File, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut content = Vec::new();
        file.read_to_end(&mut content).await?;

        let mut removed = 0;
        let mut dropped = 0;
        let mut buffer = Vec::<u8>::new();
        for line in content.split(|v| *v == b'\n').filter(|v| !v.is_empty()) {
            match serde_json::from_slice::<ActivityEvent>(line) {
                Ok(event) if event.timestamp >= cutoff => {
                    buffer.extend_from_slice(line);
                    buffer.push(b'\n');
                }
                Ok(_) => removed += 1,
                Err(e) => {
                    dropped += 1;
                    warn!(
                        "Dropping illegal json string {} during pruning: {e}",
                        String::from_utf8_lossy(line)
                    )
                }
            }
        }

        if removed == 0 && dropped == 0 {
            return Ok(0);
        }

        file.rewind().await?;
        file.set_len(0).await?;
        file.write_all(&buffer).await?;
        file.flush().await?;
        Ok(removed)
    }
}

/// Lines that can't be parsed are skipped. They are left behind when the process dies
/// mid-write, and may even end inside a multi-byte character.
fn parse_line(line: &[u8], date: NaiveDate) -> Option<ActivityEvent> {
    if line.is_empty() {
        return None;
    }
    serde_json::from_slice::<ActivityEvent>(line)
        .inspect_err(|e| {
            warn!(
                "During parsing of {date} found illegal json string {}:  {e}",
                String::from_utf8_lossy(line)
            )
        })
        .ok()
}

/// Whether the next write starts on a fresh line. A crash can leave a partial line without its
/// terminating newline behind.
async fn ends_with_newline(file: &mut File) -> std::io::Result<bool> {
    if file.metadata().await?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1)).await?;
    Ok(file.read_u8().await? == b'\n')
}

impl EventStore for DayFileStore {
    async fn append(&self, event: ActivityEvent) -> Result<()> {
        let path = self.path_for(event.timestamp.date_naive());

        let mut buffer = Vec::<u8>::new();
        serde_json::to_writer(&mut buffer, &event)?;
        buffer.push(b'\n');

        let mut file = File::options()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .await?;

        // Semi-safe acquire-release for a file
        file.lock_exclusive()?;
        let result = async {
            if !ends_with_newline(&mut file).await? {
                file.write_all(b"\n").await?;
            }
            file.write_all(&buffer).await?;
            file.flush().await
        }
        .await;
        file.unlock_async().await?;
        Ok(result?)
    }

    #[instrument(skip(self))]
    async fn query_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<ActivityEvent>> {
        if end <= start {
            return Ok(vec![]);
        }

        let last_day = (end - TimeDelta::nanoseconds(1)).date_naive();
        let days = start
            .date_naive()
            .iter_days()
            .take_while(|day| *day <= last_day)
            .collect::<Vec<_>>();

        let per_day = try_join_all(days.into_iter().map(|day| self.read_day(day))).await?;

        let mut events = per_day
            .into_iter()
            .flatten()
            .filter(|v| v.timestamp >= start && v.timestamp < end)
            .collect::<Vec<_>>();
        // stable, so equal timestamps keep insertion order
        events.sort_by_key(|v| v.timestamp);
        Ok(events)
    }

    #[instrument(skip(self))]
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let cutoff_day = cutoff.date_naive();
        let mut removed = 0;

        let mut entries = tokio::fs::read_dir(&self.record_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(date) = name.to_str().and_then(record_name_to_date) else {
                debug!("Skipping unrelated file {name:?}");
                continue;
            };

            if date < cutoff_day {
                removed += self.read_day(date).await?.len();
                tokio::fs::remove_file(entry.path()).await?;
                info!("Removed record file for {date}");
            } else if date == cutoff_day {
                removed += self.trim_day(&entry.path(), cutoff).await?;
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
    use tempfile::tempdir;

    use crate::daemon::storage::{
        entities::{ActivityEvent, EventType},
        event_store::EventStore,
    };

    use super::DayFileStore;

    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    fn at(offset: Duration) -> DateTime<Utc> {
        Utc.from_utc_datetime(&TEST_START_DATE) + offset
    }

    #[tokio::test]
    async fn test_store_basic() -> Result<()> {
        let dir = tempdir()?;
        let store = DayFileStore::new(dir.path().to_owned())?;
        let events = [
            ActivityEvent::new(at(Duration::zero()), "test", EventType::Change)
                .with_window_title("window")
                .with_bundle_id("/usr/bin/test"),
            ActivityEvent::new(at(Duration::seconds(60)), "test", EventType::Heartbeat)
                .with_window_title("window"),
        ];
        for event in events.clone() {
            store.append(event).await?;
        }

        let stored = store.query_range(at(Duration::zero()), at(Duration::days(1))).await?;

        assert_eq!(stored, events.to_vec());
        Ok(())
    }

    #[tokio::test]
    async fn test_store_range_spans_files() -> Result<()> {
        let dir = tempdir()?;
        let store = DayFileStore::new(dir.path().to_owned())?;
        for hours in [-2, 3, 23, 26] {
            store
                .append(ActivityEvent::new(at(Duration::hours(hours)), "test", EventType::Heartbeat))
                .await?;
        }

        // Local days rarely line up with UTC days.
        let stored = store.query_range(at(Duration::hours(-3)), at(Duration::hours(24))).await?;

        let times = stored.iter().map(|v| v.timestamp).collect::<Vec<_>>();
        assert_eq!(
            times,
            vec![at(Duration::hours(-2)), at(Duration::hours(3)), at(Duration::hours(23))]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_store_skips_corrupted_lines() -> Result<()> {
        let dir = tempdir()?;
        let store = DayFileStore::new(dir.path().to_owned())?;
        store
            .append(ActivityEvent::new(at(Duration::zero()), "test", EventType::Change))
            .await?;
        let path = dir.path().join("2018-07-04");
        let mut content = std::fs::read_to_string(&path)?;
        content.push_str("{\"timestamp\":\"2018-07-04T0");
        std::fs::write(&path, content)?;

        let stored = store.query_range(at(Duration::zero()), at(Duration::days(1))).await?;

        assert_eq!(stored.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_store_keeps_reading_after_torn_utf8() -> Result<()> {
        let dir = tempdir()?;
        let store = DayFileStore::new(dir.path().to_owned())?;
        store
            .append(ActivityEvent::new(at(Duration::zero()), "first", EventType::Change))
            .await?;
        let path = dir.path().join("2018-07-04");
        let mut content = std::fs::read(&path)?;
        content.extend_from_slice(b"{\"timestamp\":\"2018-07-04T00:00:30Z\",\"app_name\":\"\xe6\x97\n");
        std::fs::write(&path, content)?;
        for (minutes, name) in [(1, "second"), (2, "third")] {
            store
                .append(ActivityEvent::new(at(Duration::minutes(minutes)), name, EventType::Change))
                .await?;
        }

        let stored = store.query_range(at(Duration::zero()), at(Duration::days(1))).await?;

        let names = stored.iter().map(|v| &*v.app_name).collect::<Vec<_>>();
        assert_eq!(names, vec!["first", "second", "third"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_store_append_after_partial_line() -> Result<()> {
        let dir = tempdir()?;
        let store = DayFileStore::new(dir.path().to_owned())?;
        store
            .append(ActivityEvent::new(at(Duration::zero()), "first", EventType::Change))
            .await?;
        let path = dir.path().join("2018-07-04");
        let mut content = std::fs::read_to_string(&path)?;
        content.push_str("{\"timestamp\":\"2018-07-04T0");
        std::fs::write(&path, content)?;

        store
            .append(ActivityEvent::new(at(Duration::minutes(1)), "after_restart", EventType::Change))
            .await?;

        let stored = store.query_range(at(Duration::zero()), at(Duration::days(1))).await?;
        let names = stored.iter().map(|v| &*v.app_name).collect::<Vec<_>>();
        assert_eq!(names, vec!["first", "after_restart"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_store_missing_day_is_empty() -> Result<()> {
        let dir = tempdir()?;
        let store = DayFileStore::new(dir.path().to_owned())?;

        let stored = store.query_range(at(Duration::zero()), at(Duration::days(1))).await?;

        assert!(stored.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_store_pruning() -> Result<()> {
        let dir = tempdir()?;
        let store = DayFileStore::new(dir.path().to_owned())?;
        for hours in [-30, 1, 5, 30] {
            store
                .append(ActivityEvent::new(at(Duration::hours(hours)), "test", EventType::Heartbeat))
                .await?;
        }
        std::fs::write(dir.path().join("notes.txt"), "keep me")?;

        let removed = store.delete_older_than(at(Duration::hours(3))).await?;

        assert_eq!(removed, 2);
        let stored = store.query_range(at(Duration::days(-2)), at(Duration::days(2))).await?;
        let times = stored.iter().map(|v| v.timestamp).collect::<Vec<_>>();
        assert_eq!(times, vec![at(Duration::hours(5)), at(Duration::hours(30))]);
        assert!(!dir.path().join("2018-07-02").exists());
        assert!(dir.path().join("notes.txt").exists());

        // Appending after a prune continues the same file.
        store
            .append(ActivityEvent::new(at(Duration::hours(6)), "test", EventType::Heartbeat))
            .await?;
        let stored = store.query_range(at(Duration::zero()), at(Duration::days(1))).await?;
        assert_eq!(stored.len(), 2);
        Ok(())
    }
}

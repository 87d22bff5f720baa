use std::{collections::HashMap, sync::Arc};

use chrono::NaiveDate;
use serde::Serialize;

use crate::utils::percentage::{seconds_percentage, Percentage};

use super::segmentation::TimelineSegment;

/// Total usage of one application over a day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub app_name: Arc<str>,
    pub total_seconds: i64,
    pub percentage: Percentage,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub date: NaiveDate,
    pub total_seconds: i64,
    pub apps: Vec<DailySummary>,
}

impl DaySummary {
    pub fn new(date: NaiveDate, apps: Vec<DailySummary>) -> Self {
        Self {
            date,
            total_seconds: apps.iter().map(|v| v.total_seconds).sum(),
            apps,
        }
    }
}

/// Returns one row per application, largest first. Idle time is reported under its own name,
/// the same way it appears on the timeline.
pub fn summarize(segments: &[TimelineSegment]) -> Vec<DailySummary> {
    let mut map = HashMap::<Arc<str>, (i64, &str)>::new();

    for segment in segments {
        let usage = map
            .entry(segment.app_name.clone())
            .or_insert((0, segment.color.as_str()));
        usage.0 += segment.duration_seconds;
    }

    let total: i64 = map.values().map(|v| v.0).sum();
    if total <= 0 {
        return vec![];
    }

    let mut usages = map
        .into_iter()
        .map(|(app_name, (total_seconds, color))| DailySummary {
            app_name,
            total_seconds,
            percentage: seconds_percentage(total_seconds, total),
            color: color.to_string(),
        })
        .collect::<Vec<_>>();
    usages.sort_by(|a, b| {
        b.total_seconds
            .cmp(&a.total_seconds)
            .then_with(|| a.app_name.cmp(&b.app_name))
    });
    usages
}

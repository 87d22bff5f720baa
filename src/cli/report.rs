use std::{collections::BTreeSet, fmt::Display, sync::Arc};

use ansi_term::Colour;
use anyhow::Result;
use chrono::{Duration, TimeZone};
use clap::ValueEnum;
use serde::Serialize;

use crate::{
    daemon::{status::RecorderStatus, storage::entities::ActivityEvent},
    timeline::{
        color::parse_hex,
        segmentation::TimelineSegment,
        summary::{DailySummary, DaySummary},
    },
    utils::percentage::Percentage,
};

const TIME_FORMAT: &str = "%H:%M:%S";
const SWATCH: &str = "██";

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

/// Options shared by every command that reports on a single day.
#[derive(Debug, Clone, clap::Args)]
pub struct DayArgs {
    #[arg(
        long = "date",
        short,
        help = "Day to report on, today by default. Examples are \"2025-03-15\", \"yesterday\", \"15/03/2025\""
    )]
    pub date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    pub date_style: DateStyle,
    #[arg(long, help = "Print JSON instead of a table")]
    pub json: bool,
}

pub fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn format_duration(v: Duration) -> String {
    if v.num_hours() > 0 {
        format!(
            "{}h{}m{}s",
            v.num_hours(),
            v.num_minutes() % 60,
            v.num_seconds() % 60
        )
    } else if v.num_minutes() > 0 {
        format!("{}m{}s", v.num_minutes() % 60, v.num_seconds() % 60)
    } else {
        format!("{}s", v.num_seconds() % 60)
    }
}

/// A small block painted in `color`. Colors that can't be parsed leave the block unpainted.
pub fn swatch(color: &str) -> String {
    match parse_hex(color) {
        Some((r, g, b)) => Colour::RGB(r, g, b).paint(SWATCH).to_string(),
        None => SWATCH.to_string(),
    }
}

fn join_titles(titles: &BTreeSet<Arc<str>>) -> String {
    titles.iter().map(|v| &**v).collect::<Vec<_>>().join(", ")
}

pub fn timeline_row<Tz: TimeZone>(segment: &TimelineSegment, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    format!(
        "{}\t{}\t{}\t{} {}\t{}",
        segment.start_time.with_timezone(tz).format(TIME_FORMAT),
        segment.end_time.with_timezone(tz).format(TIME_FORMAT),
        format_duration(segment.duration()),
        swatch(&segment.color),
        segment.app_name,
        join_titles(&segment.window_titles)
    )
}

pub fn summary_row(row: &DailySummary) -> String {
    format!(
        "{}%\t{}\t{} {}",
        *row.percentage as i32,
        format_duration(Duration::seconds(row.total_seconds)),
        swatch(&row.color),
        row.app_name
    )
}

pub fn event_row<Tz: TimeZone>(event: &ActivityEvent, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    format!(
        "{}\t{}\t{}\t{}{}",
        event.timestamp.with_timezone(tz).format(TIME_FORMAT),
        event.event_type,
        event.app_name,
        event.window_title.as_deref().unwrap_or_default(),
        if event.is_idle { "\t(idle)" } else { "" }
    )
}

pub fn print_timeline<Tz: TimeZone>(segments: &[TimelineSegment], tz: &Tz)
where
    Tz::Offset: Display,
{
    if segments.is_empty() {
        println!("No activity recorded");
        return;
    }
    for segment in segments {
        println!("{}", timeline_row(segment, tz));
    }
}

/// Prints rows that take at least `min_percentage` of the day, followed by the total.
pub fn print_summary(summary: &DaySummary, min_percentage: Percentage) {
    if summary.apps.is_empty() {
        println!("No activity recorded");
        return;
    }
    for row in summary
        .apps
        .iter()
        .filter(|v| *v.percentage >= *min_percentage)
    {
        println!("{}", summary_row(row));
    }
    println!();
    println!(
        "{}\t{}",
        summary.date,
        format_duration(Duration::seconds(summary.total_seconds))
    );
}

pub fn print_events<Tz: TimeZone>(events: &[ActivityEvent], tz: &Tz)
where
    Tz::Offset: Display,
{
    for event in events {
        println!("{}", event_row(event, tz));
    }
}

pub fn print_status(status: &RecorderStatus) {
    let state = match (status.is_tracking, status.is_idle) {
        (false, _) => "not tracking",
        (true, true) => "idle",
        (true, false) => "active",
    };
    println!("{state}");
    if let Some(app) = &status.current_app {
        match &status.current_window_title {
            Some(title) => println!("{app}\t{title}"),
            None => println!("{app}"),
        }
    }
}

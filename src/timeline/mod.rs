//! Everything derived from the event log: timelines, daily summaries and the colors they are
//! drawn with. Nothing in here is persisted, it is recomputed on every query.

pub mod color;
pub mod query;
pub mod segmentation;
pub mod summary;

//!  Storage is organized through [event_store::EventStore].
//!  The basic idea is:
//!   - The log is a sequence of [entities::ActivityEvent] that is only ever appended to.
//!   - [day_files::DayFileStore] keeps a directory with one json-lines file per UTC day.
//!   - Old files are pruned after the retention window passes.

pub mod day_files;
pub mod entities;
pub mod event_store;
pub mod memory;

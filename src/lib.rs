//! Records which application is in the foreground, when the user goes idle, and turns that into
//! a daily timeline and per application summary. Runs as a small background recorder with a
//! terminal interface for reading the results.
//!

pub mod cli;
pub mod daemon;
pub mod sampler;
pub mod timeline;
pub mod utils;

use std::time::Duration;

use clap::Args;
use tracing::level_filters::LevelFilter;

use super::collection::recorder::RecorderConfig;

#[derive(Args, Debug, Clone)]
pub struct DaemonArgs {
    #[arg(long = "idle-threshold", default_value_t = 300, help = "Seconds without input before the user counts as idle")]
    pub idle_threshold: u64,
    #[arg(long = "heartbeat", default_value_t = 60, help = "Seconds between heartbeat events")]
    pub heartbeat: u64,
    #[arg(long = "window-poll", default_value_t = 3, help = "Seconds between window title checks")]
    pub window_poll: u64,
    #[arg(long = "idle-poll", default_value_t = 10, help = "Seconds between idle checks")]
    pub idle_poll: u64,
    #[arg(long = "retention-days", default_value_t = 7, help = "Days events are kept for")]
    pub retention_days: u32,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log_filter: Option<LevelFilter>,
}

impl From<&DaemonArgs> for RecorderConfig {
    fn from(args: &DaemonArgs) -> Self {
        // Zero would make the tickers spin.
        let seconds = |v: u64| Duration::from_secs(v.max(1));
        RecorderConfig {
            window_poll: seconds(args.window_poll),
            heartbeat: seconds(args.heartbeat),
            idle_poll: seconds(args.idle_poll),
            idle_threshold_s: args.idle_threshold,
        }
    }
}

pub mod report;

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{Duration, Local};
use clap::{Parser, Subcommand};
use report::{print_events, print_json, print_status, print_summary, print_timeline, DayArgs};
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};

use crate::{
    daemon::{
        args::DaemonArgs,
        retention::RetentionModule,
        start_daemon,
        status::StatusFile,
        storage::day_files::DayFileStore,
        EVENTS_DIR,
    },
    timeline::query::ActivityQuery,
    utils::{
        clock::DefaultClock,
        dir::{create_application_default_path, ensure_dir},
        logging::{enable_logging, CLI_PREFIX, DAEMON_PREFIX},
        percentage::Percentage,
    },
};

#[derive(Parser, Debug)]
#[command(name = "apptrail", version, long_about = None)]
#[command(about = "Records which applications you use and turns it into a daily timeline", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Run the recorder in the current console until Ctrl-C")]
    Serve {
        #[command(flatten)]
        daemon: DaemonArgs,
    },
    #[command(flatten)]
    Data(DataCommand),
}

/// Commands that only read or maintain the recorded data.
#[derive(Subcommand, Debug)]
enum DataCommand {
    #[command(about = "Display the timeline of a day")]
    Timeline {
        #[command(flatten)]
        day: DayArgs,
    },
    #[command(about = "Display how much time each application took during a day")]
    Summary {
        #[command(flatten)]
        day: DayArgs,
        #[arg(
            short = 'p',
            long = "percentage",
            help = "Filter apps to have at least specified percentage",
            default_value = "0"
        )]
        min_percentage: Percentage,
    },
    #[command(about = "Display raw recorded events of a day")]
    Events {
        #[command(flatten)]
        day: DayArgs,
    },
    #[command(about = "Display what the recorder is doing right now")]
    Status {
        #[arg(long, help = "Print JSON instead of text")]
        json: bool,
    },
    #[command(about = "Remove old events right away")]
    Prune {
        #[arg(long, default_value_t = 7, help = "Days events are kept for")]
        days: u32,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let dir = match args.dir {
        Some(dir) => ensure_dir(dir)?,
        None => create_application_default_path()?,
    };

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };

    match args.commands {
        Commands::Serve { daemon } => {
            enable_logging(
                DAEMON_PREFIX,
                &dir,
                daemon.log_filter.or(logging_level),
                daemon.log_console || args.log,
            )?;
            start_daemon(
                dir,
                (&daemon).into(),
                Duration::days(daemon.retention_days.into()),
            )
            .await
        }
        Commands::Data(command) => {
            enable_logging(CLI_PREFIX, &dir, logging_level, args.log)?;
            process_data_command(&dir, command).await
        }
    }
}

async fn process_data_command(dir: &Path, command: DataCommand) -> Result<()> {
    match command {
        DataCommand::Timeline { day } => {
            let query = open_query(dir)?;
            let date = query.parse_day(day.date.as_deref(), day.date_style.into());
            let segments = query.segments(date).await?;
            if day.json {
                print_json(&segments)
            } else {
                print_timeline(&segments, &Local);
                Ok(())
            }
        }
        DataCommand::Summary {
            day,
            min_percentage,
        } => {
            let query = open_query(dir)?;
            let date = query.parse_day(day.date.as_deref(), day.date_style.into());
            let summary = query.summary(date).await?;
            if day.json {
                print_json(&summary)
            } else {
                print_summary(&summary, min_percentage);
                Ok(())
            }
        }
        DataCommand::Events { day } => {
            let query = open_query(dir)?;
            let date = query.parse_day(day.date.as_deref(), day.date_style.into());
            let events = query.events(date).await?;
            if day.json {
                print_json(&events)
            } else {
                print_events(&events, &Local);
                Ok(())
            }
        }
        DataCommand::Status { json } => {
            let status = StatusFile::in_dir(dir).read().await?;
            if json {
                print_json(&status)
            } else {
                print_status(&status);
                Ok(())
            }
        }
        DataCommand::Prune { days } => {
            let retention = RetentionModule::new(
                DayFileStore::new(dir.join(EVENTS_DIR))?,
                Box::new(DefaultClock),
                Duration::days(days.into()),
                CancellationToken::new(),
            );
            let removed = retention.prune().await?;
            info!("Pruned {removed} events by request");
            println!("Removed {removed} events");
            Ok(())
        }
    }
}

fn open_query(dir: &Path) -> Result<ActivityQuery<DayFileStore, Local>> {
    Ok(ActivityQuery::new(
        DayFileStore::new(dir.join(EVENTS_DIR))?,
        Box::new(DefaultClock),
        Local,
    ))
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Args, Commands, DataCommand};

    #[test]
    fn command_definitions_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn serve_and_data_commands_parse_apart() {
        let args = Args::try_parse_from(["apptrail", "serve", "--idle-threshold", "10"]).unwrap();
        let Commands::Serve { daemon } = args.commands else {
            panic!("expected the serve command");
        };
        assert_eq!(daemon.idle_threshold, 10);

        let args = Args::try_parse_from(["apptrail", "summary", "-p", "5", "--log"]).unwrap();
        assert!(args.log);
        let Commands::Data(DataCommand::Summary { min_percentage, .. }) = args.commands else {
            panic!("expected the summary command");
        };
        assert_eq!(*min_percentage, 5.0);

        let args = Args::try_parse_from(["apptrail", "prune", "--days", "3"]).unwrap();
        assert!(matches!(
            args.commands,
            Commands::Data(DataCommand::Prune { days: 3 })
        ));
    }
}

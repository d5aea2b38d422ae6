use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

mod calculator;
mod clockify;
mod config;
mod console;
mod datetime;
mod error;
mod report_command;
mod time_entry;

use clockify::ClockifyClient;
use config::Config;
use console::{ConsoleReport, ReportPresenter};
use report_command::{ReportArgs, ReportCommand};

/// Clockifyのtime entryを集計し、平日の予定時間との差分を表示するCLIアプリケーション。
///
/// # Examples
/// ```
/// $ cargo run
/// $ cargo run -- --year 2025 --category 64e7801cebeee150228ea1db
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(
        long = "env-file",
        help = "Loads environment variables from this file instead of .env",
        parse(from_os_str)
    )]
    env_file: Option<PathBuf>,

    #[clap(long = "debug", help = "Shows debug logs")]
    debug: bool,

    #[clap(flatten)]
    report: ReportArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logger(if args.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    })?;

    config::load_env_file(args.env_file.as_deref()).context("Failed to load environment file")?;
    let config = Config::from_env().context("Failed to load configuration")?;
    let client = ClockifyClient::new(&config);

    let report = ReportCommand::new(&client, &config)
        .run(args.report)
        .await?;

    let mut stdout = io::stdout();
    ConsoleReport::new(&mut stdout).show_report(&report)?;

    Ok(())
}

/// ログを標準エラー出力に出す。
fn setup_logger(level: LevelFilter) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} {:5} {}: {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(LevelFilter::Warn)
        .level_for(env!("CARGO_CRATE_NAME"), level)
        .chain(io::stderr())
        .apply()
        .context("Failed to set up logger")?;

    Ok(())
}

use std::io;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

mod config;
mod console;
mod datetime;
mod description;
mod error;
mod import_command;
mod kimai;
mod one_shot_command;
mod resolver;
mod row;
mod submitter;

use config::Config;
use console::ConsoleReport;
use description::DescriptionMapping;
use import_command::{ImportArgs, ImportCommand};
use kimai::KimaiClient;
use one_shot_command::{OneShotArgs, OneShotCommand};

/// Kimaiにタイムシートを登録するためのCLIアプリケーション。
///
/// 接続先や認証情報は環境変数(`.env`も可)から読み込む。
///
/// # Examples
/// ```
/// $ KIMAI_TOKEN=... cargo run -- import --file rows.csv
/// $ KIMAI_TOKEN=... FROM_TIME=13:00 cargo run -- one-shot --dry-run
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(subcommand)]
    subcommand: SubCommands,

    #[clap(short = 'v', long = "verbose", global = true, help = "Show debug logs")]
    verbose: bool,
}

/// サブコマンドを表す列挙型。
#[derive(Debug, Subcommand)]
enum SubCommands {
    Import(ImportArgs),
    OneShot(OneShotArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    setup_logger(args.verbose).context("Failed to set up logger")?;

    let config = Config::from_env()?;
    let descriptions = DescriptionMapping::load(config.description_map.as_deref())?;
    let client = KimaiClient::new(&config.base_url, &config.token);

    let mut stdout = io::stdout().lock();
    let mut presenter = ConsoleReport::new(&mut stdout);
    match args.subcommand {
        SubCommands::Import(import) => {
            ImportCommand::new(&client)
                .run(import, &config, &descriptions, &mut presenter)
                .await?;
        }
        SubCommands::OneShot(one_shot) => {
            OneShotCommand::new(&client)
                .run(one_shot, &config, &descriptions, &mut presenter)
                .await?;
        }
    }

    Ok(())
}

/// ログの出力先と書式を設定する。
///
/// 標準出力は進捗表示に使うため、ログは標準エラー出力に書き出す。
fn setup_logger(verbose: bool) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue);
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%dT%H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("hyper", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Warn)
        .chain(io::stderr())
        .apply()?;

    Ok(())
}

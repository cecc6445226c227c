use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use log::info;

use crate::config::Config;
use crate::console::ImportPresenter;
use crate::datetime::end_time_after;
use crate::description::DescriptionMapping;
use crate::kimai::KimaiRepository;
use crate::resolver::EntityResolver;
use crate::row::{RawRow, RowTransformer};
use crate::submitter::{BatchResult, BatchSubmitter};

/// タイムシートを1件だけ登録するためのサブコマンド。
///
/// 開始時刻は環境変数`FROM_TIME`で指定する。
#[derive(Debug, clap::Args)]
pub struct OneShotArgs {
    #[clap(
        short = 'd',
        long = "date",
        help = "Date of the entry in the format YYYY-MM-DD",
        default_value = "2025-07-15"
    )]
    date: NaiveDate,

    #[clap(
        long = "duration",
        help = "Duration of the entry in seconds",
        default_value = "3600"
    )]
    duration: i64,

    #[clap(long = "project", default_value = "Research")]
    project: String,

    #[clap(long = "activity", default_value = "Social Media")]
    activity: String,

    #[clap(long = "description", default_value = "creating social media accounts")]
    description: String,

    #[clap(long = "dry-run", help = "Print the request without sending it")]
    dry_run: bool,
}

pub struct OneShotCommand<'a, T: KimaiRepository> {
    kimai: &'a T,
}

impl<'a, T: KimaiRepository> OneShotCommand<'a, T> {
    /// 新しい`OneShotCommand`を返す。
    ///
    /// # Arguments
    /// * `kimai` - Kimai APIと通信するためのリポジトリ
    pub fn new(kimai: &'a T) -> Self {
        Self { kimai }
    }

    /// `one-shot`サブコマンドの処理を行う。
    ///
    /// 終了時刻は開始時刻に`duration`秒を足したものとし、日付をまたぐ場合はエラーとする。
    pub async fn run<P: ImportPresenter>(
        &self,
        args: OneShotArgs,
        config: &Config,
        descriptions: &DescriptionMapping,
        presenter: &mut P,
    ) -> Result<BatchResult> {
        let dry_run = config.dry_run || args.dry_run;
        let duration = Duration::try_seconds(args.duration)
            .with_context(|| format!("Duration out of range: {}s", args.duration))?;
        let to = end_time_after(&config.from_time, duration)
            .context("Failed to calculate end time")?;
        let row = RawRow {
            date: args.date.format("%Y-%m-%d").to_string(),
            from: config.from_time.clone(),
            to,
            project: args.project,
            activity: args.activity,
            description: args.description,
        };

        let resolver = EntityResolver::new(self.kimai);
        let project = resolver.resolve_project(&row.project).await?;
        let activity = resolver.resolve_activity(&project.id, &row.activity).await?;

        let transformer = RowTransformer::new(&project.id, &activity.id, descriptions);
        let entry = transformer.prepare(&row)?;

        let submitter = BatchSubmitter::new(self.kimai, dry_run);
        let result = submitter
            .submit_all(std::slice::from_ref(&entry), presenter)
            .await;
        if result.successful == 1 {
            info!(
                "Created on {} {} for {}s - Project: {}, Activity: {}",
                row.date,
                row.from,
                args.duration,
                project.name.as_deref().unwrap_or(&row.project),
                activity.name.as_deref().unwrap_or(&row.activity)
            );
        }
        presenter.show_summary(&result, 0, dry_run)?;

        Ok(result)
    }
}

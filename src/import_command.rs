use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};

use crate::config::Config;
use crate::console::ImportPresenter;
use crate::description::DescriptionMapping;
use crate::kimai::{EntityId, KimaiRepository};
use crate::resolver::EntityResolver;
use crate::row::{read_rows, RowTransformer};
use crate::submitter::{BatchResult, BatchSubmitter, DEFAULT_PACING};

pub const DEFAULT_PROJECT: &str = "Reserach and Documentation";
pub const DEFAULT_ACTIVITY: &str = "General Research";

/// CSVからタイムシートを一括登録するためのサブコマンド。
#[derive(Debug, clap::Args)]
pub struct ImportArgs {
    #[clap(
        short = 'f',
        long = "file",
        help = "CSV file to import (defaults to CSV_FILE)"
    )]
    file: Option<PathBuf>,

    #[clap(
        long = "project",
        help = "Project every row is booked to",
        default_value = DEFAULT_PROJECT,
    )]
    project: String,

    #[clap(
        long = "activity",
        help = "Activity every row is booked to",
        default_value = DEFAULT_ACTIVITY,
    )]
    activity: String,

    #[clap(long = "dry-run", help = "Print the requests without sending them")]
    dry_run: bool,
}

/// 一括登録の結果。
#[derive(Debug, PartialEq)]
pub struct ImportSummary {
    pub batch: BatchResult,
    /// 送信前に読み飛ばした行数。
    pub skipped: usize,
}

pub struct ImportCommand<'a, T: KimaiRepository> {
    kimai: &'a T,
    pacing: Duration,
}

impl<'a, T: KimaiRepository> ImportCommand<'a, T> {
    /// 新しい`ImportCommand`を返す。
    ///
    /// # Arguments
    /// * `kimai` - Kimai APIと通信するためのリポジトリ
    pub fn new(kimai: &'a T) -> Self {
        Self {
            kimai,
            pacing: DEFAULT_PACING,
        }
    }

    /// 送信の間隔を変更する。
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// `import`サブコマンドの処理を行う。
    ///
    /// プロジェクトとアクティビティを一度だけ解決し、CSVの全行をそれに紐づけて登録する。
    /// 解決に失敗した場合やCSVを開けない場合は1件も送信せずにエラーを返す。
    /// 行ごとの失敗は集計に含めるだけでエラーにはしない。
    pub async fn run<P: ImportPresenter>(
        &self,
        args: ImportArgs,
        config: &Config,
        descriptions: &DescriptionMapping,
        presenter: &mut P,
    ) -> Result<ImportSummary> {
        let path = args.file.unwrap_or_else(|| config.csv_file.clone());
        let dry_run = config.dry_run || args.dry_run;
        presenter.show_start(&path.display().to_string(), dry_run)?;

        let resolver = EntityResolver::new(self.kimai);
        let project = resolver.resolve_project(&args.project).await?;
        let activity = resolver.resolve_activity(&project.id, &args.activity).await?;

        let file = File::open(&path)
            .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
        info!("Reading rows from {}", path.display());

        self.import(
            file,
            &project.id,
            &activity.id,
            descriptions,
            dry_run,
            presenter,
        )
        .await
    }

    /// 読み込んだ行を変換して送信する。
    async fn import<R: Read, P: ImportPresenter>(
        &self,
        reader: R,
        project: &EntityId,
        activity: &EntityId,
        descriptions: &DescriptionMapping,
        dry_run: bool,
        presenter: &mut P,
    ) -> Result<ImportSummary> {
        let transformer = RowTransformer::new(project, activity, descriptions);
        let mut entries = Vec::new();
        let mut skipped = 0;
        for row in read_rows(reader)? {
            match row.and_then(|row| transformer.prepare(&row)) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    skipped += 1;
                    error!("{}", err);
                }
            }
        }
        presenter.show_found(entries.len())?;

        let submitter = BatchSubmitter::new(self.kimai, dry_run).with_pacing(self.pacing);
        let batch = submitter.submit_all(&entries, presenter).await;
        presenter.show_summary(&batch, skipped, dry_run)?;
        for failure in &batch.failures {
            warn!(
                "Row {} starting at {} was not imported: {}",
                failure.position, failure.entry.begin, failure.error
            );
        }
        debug!("Created timesheets: {:?}", batch.created);
        info!(
            "Import finished: {} successful, {} failed, {} skipped",
            batch.successful, batch.failed, skipped
        );

        Ok(ImportSummary { batch, skipped })
    }
}

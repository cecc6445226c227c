use std::io::Write;

use anyhow::{Context, Result};

use crate::kimai::EntityId;
use crate::row::SubmissionEntry;
use crate::submitter::BatchResult;

/// インポートの進捗をConsoleに表示するためのtrait。
pub trait ImportPresenter {
    /// インポートの開始を表示する。
    ///
    /// # Arguments
    ///
    /// * `source` - 入力元の名前
    /// * `dry_run` - dry-runかどうか
    fn show_start(&mut self, source: &str, dry_run: bool) -> Result<()>;

    /// 送信対象の件数を表示する。
    fn show_found(&mut self, count: usize) -> Result<()>;

    /// dry-runで送信される予定の内容を表示する。
    fn show_dry_run(&mut self, entry: &SubmissionEntry) -> Result<()>;

    /// 作成に成功したタイムシートを表示する。
    fn show_created(
        &mut self,
        position: usize,
        total: usize,
        id: &EntityId,
        entry: &SubmissionEntry,
    ) -> Result<()>;

    /// 作成に失敗したタイムシートを表示する。
    fn show_failed(
        &mut self,
        position: usize,
        total: usize,
        entry: &SubmissionEntry,
        error: &str,
    ) -> Result<()>;

    /// 集計結果を表示する。
    ///
    /// `skipped`は送信前に読み飛ばした行数で、0の場合は表示しない。
    fn show_summary(&mut self, result: &BatchResult, skipped: usize, dry_run: bool) -> Result<()>;
}

/// インポートの進捗を1行ずつ書き出す。
pub struct ConsoleReport<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> ConsoleReport<'a, W> {
    /// 新しい`ConsoleReport`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }
}

fn dry_run_prefix(dry_run: bool) -> &'static str {
    if dry_run {
        "[DRY RUN] "
    } else {
        ""
    }
}

impl<'a, W: Write> ImportPresenter for ConsoleReport<'a, W> {
    fn show_start(&mut self, source: &str, dry_run: bool) -> Result<()> {
        writeln!(
            self.writer,
            "{}Starting bulk import from {}...",
            dry_run_prefix(dry_run),
            source
        )
        .context("Failed to write start message")
    }

    fn show_found(&mut self, count: usize) -> Result<()> {
        writeln!(self.writer, "Found {} entries to process", count)
            .context("Failed to write entry count")
    }

    fn show_dry_run(&mut self, entry: &SubmissionEntry) -> Result<()> {
        writeln!(
            self.writer,
            "[DRY RUN] Would create: {} {}-{} | {}",
            entry.date, entry.from, entry.to, entry.description
        )
        .with_context(|| format!("Failed to write entry: {:?}", entry))
    }

    fn show_created(
        &mut self,
        position: usize,
        total: usize,
        id: &EntityId,
        entry: &SubmissionEntry,
    ) -> Result<()> {
        writeln!(
            self.writer,
            "✅ [{}/{}] Created #{}: {} {}-{} | {}",
            position, total, id, entry.date, entry.from, entry.to, entry.description
        )
        .with_context(|| format!("Failed to write entry: {:?}", entry))
    }

    fn show_failed(
        &mut self,
        position: usize,
        total: usize,
        entry: &SubmissionEntry,
        error: &str,
    ) -> Result<()> {
        writeln!(
            self.writer,
            "❌ [{}/{}] Failed: {} {}-{} | {} | {}",
            position, total, entry.date, entry.from, entry.to, entry.description, error
        )
        .with_context(|| format!("Failed to write entry: {:?}", entry))
    }

    fn show_summary(&mut self, result: &BatchResult, skipped: usize, dry_run: bool) -> Result<()> {
        writeln!(self.writer)?;
        writeln!(self.writer, "{}Import complete!", dry_run_prefix(dry_run))?;
        writeln!(self.writer, "✅ Successful: {}", result.successful)?;
        writeln!(self.writer, "❌ Failed: {}", result.failed)?;
        if skipped > 0 {
            writeln!(self.writer, "⏭️ Skipped: {}", skipped)?;
        }
        writeln!(self.writer, "📊 Total: {}", result.total).context("Failed to write summary")
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{ConsoleReport, ImportPresenter};
    use crate::kimai::EntityId;
    use crate::row::SubmissionEntry;
    use crate::submitter::BatchResult;

    #[rstest]
    #[case::normal(false, "Starting bulk import from rows.csv...\n")]
    #[case::dry_run(true, "[DRY RUN] Starting bulk import from rows.csv...\n")]
    fn test_show_start(#[case] dry_run: bool, #[case] expected: &str) {
        let mut writer = Vec::new();
        let mut presenter = ConsoleReport::new(&mut writer);

        presenter.show_start("rows.csv", dry_run).unwrap();

        assert_eq!(String::from_utf8(writer).unwrap(), expected);
    }

    #[test]
    fn test_show_entries() {
        let mut writer = Vec::new();
        let mut presenter = ConsoleReport::new(&mut writer);
        let entry = dummy_entry();

        presenter.show_found(2).unwrap();
        presenter
            .show_created(1, 2, &EntityId::Number(42), &entry)
            .unwrap();
        presenter
            .show_failed(2, 2, &entry, "Validation Failed")
            .unwrap();
        presenter.show_dry_run(&entry).unwrap();

        assert_eq!(
            String::from_utf8(writer).unwrap(),
            [
                "Found 2 entries to process\n",
                "✅ [1/2] Created #42: 2025-07-15 09:00:00-09:30:00 | PEP work\n",
                "❌ [2/2] Failed: 2025-07-15 09:00:00-09:30:00 | PEP work | Validation Failed\n",
                "[DRY RUN] Would create: 2025-07-15 09:00:00-09:30:00 | PEP work\n",
            ]
            .join("")
        );
    }

    #[rstest]
    #[case::normal(0, false, "\nImport complete!\n✅ Successful: 2\n❌ Failed: 1\n📊 Total: 3\n")]
    #[case::skipped(
        2,
        false,
        "\nImport complete!\n✅ Successful: 2\n❌ Failed: 1\n⏭️ Skipped: 2\n📊 Total: 3\n"
    )]
    #[case::dry_run(
        0,
        true,
        "\n[DRY RUN] Import complete!\n✅ Successful: 2\n❌ Failed: 1\n📊 Total: 3\n"
    )]
    fn test_show_summary(#[case] skipped: usize, #[case] dry_run: bool, #[case] expected: &str) {
        let mut writer = Vec::new();
        let mut presenter = ConsoleReport::new(&mut writer);
        let result = BatchResult {
            successful: 2,
            failed: 1,
            total: 3,
            ..BatchResult::default()
        };

        presenter.show_summary(&result, skipped, dry_run).unwrap();

        assert_eq!(String::from_utf8(writer).unwrap(), expected);
    }

    fn dummy_entry() -> SubmissionEntry {
        SubmissionEntry {
            date: "2025-07-15".to_string(),
            from: "09:00:00".to_string(),
            to: "09:30:00".to_string(),
            begin: "2025-07-15T09:00:00".to_string(),
            end: "2025-07-15T09:30:00".to_string(),
            project: EntityId::Number(1),
            activity: EntityId::Number(2),
            description: "PEP work".to_string(),
        }
    }
}

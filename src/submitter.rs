use std::time::Duration;

use anyhow::Result;
use log::{error, info, warn};
use tokio::time::sleep;

use crate::console::ImportPresenter;
use crate::kimai::{EntityId, KimaiError, KimaiRepository};
use crate::row::SubmissionEntry;

/// dry-run時に作成されたことにするタイムシートのID。
pub const DRY_RUN_ID: &str = "DRY_RUN";

/// 連続した送信の間に空ける時間。
pub const DEFAULT_PACING: Duration = Duration::from_millis(100);

/// 送信に失敗した1件。
#[derive(Clone, Debug, PartialEq)]
pub struct FailedSubmission {
    /// 1始まりの位置。
    pub position: usize,
    pub entry: SubmissionEntry,
    pub error: String,
}

/// 一括送信の集計結果。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchResult {
    pub successful: usize,
    pub failed: usize,
    pub total: usize,
    pub created: Vec<EntityId>,
    pub failures: Vec<FailedSubmission>,
}

/// タイムシートを1件ずつ順番に送信する。
pub struct BatchSubmitter<'a, T: KimaiRepository + ?Sized> {
    kimai: &'a T,
    dry_run: bool,
    pacing: Duration,
}

impl<'a, T: KimaiRepository + ?Sized> BatchSubmitter<'a, T> {
    /// 新しい`BatchSubmitter`を返す。
    ///
    /// # Arguments
    ///
    /// * `kimai` - Kimai APIと通信するためのリポジトリ
    /// * `dry_run` - `true`の場合はAPIを呼ばずに送信内容を表示するだけにする
    pub fn new(kimai: &'a T, dry_run: bool) -> Self {
        Self {
            kimai,
            dry_run,
            pacing: DEFAULT_PACING,
        }
    }

    /// 送信の間隔を変更する。
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// 1件送信し、作成されたタイムシートのIDを返す。
    ///
    /// dry-runの場合はAPIを呼ばずに`DRY_RUN_ID`を返す。
    pub async fn submit_one(&self, entry: &SubmissionEntry) -> Result<EntityId, KimaiError> {
        if self.dry_run {
            info!("[DRY RUN] Skipping POST for {}", entry.begin);
            return Ok(EntityId::from(DRY_RUN_ID));
        }

        let created = self.kimai.create_timesheet(&entry.payload()).await?;
        Ok(created.id)
    }

    /// 全件を入力順に送信する。
    ///
    /// 1件の失敗は記録するだけで、残りの送信は続ける。
    /// 進捗の表示に失敗しても送信は止めない。
    /// 送信と送信の間には`pacing`だけ待つ。
    pub async fn submit_all<P: ImportPresenter>(
        &self,
        entries: &[SubmissionEntry],
        presenter: &mut P,
    ) -> BatchResult {
        let total = entries.len();
        let mut result = BatchResult {
            total,
            ..BatchResult::default()
        };

        for (index, entry) in entries.iter().enumerate() {
            if index > 0 && !self.pacing.is_zero() {
                sleep(self.pacing).await;
            }

            let position = index + 1;
            match self.submit_one(entry).await {
                Ok(id) => {
                    result.successful += 1;
                    let shown = if self.dry_run {
                        presenter.show_dry_run(entry)
                    } else {
                        presenter.show_created(position, total, &id, entry)
                    };
                    warn_unshown(shown);
                    result.created.push(id);
                }
                Err(err) => {
                    result.failed += 1;
                    error!(
                        "Failed to create timesheet {} {}-{} ({}): {}",
                        entry.date, entry.from, entry.to, entry.description, err
                    );
                    let message = error_payload(&err);
                    warn_unshown(presenter.show_failed(position, total, entry, &message));
                    result.failures.push(FailedSubmission {
                        position,
                        entry: entry.clone(),
                        error: message,
                    });
                }
            }
        }

        result
    }
}

fn warn_unshown(shown: Result<()>) {
    if let Err(err) = shown {
        warn!("Failed to report progress: {:#}", err);
    }
}

/// エラー表示用の文字列。Kimaiがエラーを返した場合はそのレスポンス本文を使う。
fn error_payload(error: &KimaiError) -> String {
    match error {
        KimaiError::Status { body, .. } if !body.is_empty() => body.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};
    use std::time::{Duration, Instant};

    use reqwest::StatusCode;
    use rstest::rstest;

    use super::{BatchSubmitter, DRY_RUN_ID};
    use crate::console::ConsoleReport;
    use crate::kimai::{CreatedTimesheet, EntityId, KimaiError, MockKimaiRepository};
    use crate::row::SubmissionEntry;

    /// 成功と失敗が混在しても件数の合計が一致し、失敗後も送信を続けることを確認する。
    #[rstest]
    #[case::all_success(vec![true, true, true])]
    #[case::all_failure(vec![false, false])]
    #[case::mixed(vec![true, false, true, false, false])]
    #[case::empty(vec![])]
    #[tokio::test]
    async fn test_submit_all_counts(#[case] outcomes: Vec<bool>) {
        let entries: Vec<SubmissionEntry> = (0..outcomes.len()).map(dummy_entry).collect();
        let mut kimai = MockKimaiRepository::new();
        let mut sequence = mockall::Sequence::new();
        for (index, outcome) in outcomes.iter().copied().enumerate() {
            kimai
                .expect_create_timesheet()
                .times(1)
                .in_sequence(&mut sequence)
                .returning(move |payload| {
                    assert_eq!(payload.description, format!("entry {}", index));
                    if outcome {
                        Ok(CreatedTimesheet {
                            id: EntityId::Number(index as i64),
                        })
                    } else {
                        Err(KimaiError::Status {
                            status: StatusCode::BAD_REQUEST,
                            body: r#"{"message":"Validation Failed"}"#.to_string(),
                        })
                    }
                });
        }

        let mut writer = Vec::new();
        let mut presenter = ConsoleReport::new(&mut writer);
        let submitter = BatchSubmitter::new(&kimai, false).with_pacing(Duration::ZERO);
        let result = submitter.submit_all(&entries, &mut presenter).await;

        let expected_successful = outcomes.iter().filter(|outcome| **outcome).count();
        assert_eq!(result.successful, expected_successful);
        assert_eq!(result.failed, outcomes.len() - expected_successful);
        assert_eq!(result.successful + result.failed, result.total);
        assert_eq!(result.total, entries.len());
        assert_eq!(result.failures.len(), result.failed);
        for failure in &result.failures {
            assert_eq!(failure.error, r#"{"message":"Validation Failed"}"#);
            assert!(!outcomes[failure.position - 1]);
        }
    }

    /// dry-runではAPIを呼ばずに全件成功として数えることを確認する。
    #[tokio::test]
    async fn test_submit_all_dry_run() {
        let entries: Vec<SubmissionEntry> = (0..3).map(dummy_entry).collect();
        let mut kimai = MockKimaiRepository::new();
        kimai.expect_create_timesheet().times(0);

        let mut writer = Vec::new();
        let mut presenter = ConsoleReport::new(&mut writer);
        let submitter = BatchSubmitter::new(&kimai, true).with_pacing(Duration::ZERO);
        let result = submitter.submit_all(&entries, &mut presenter).await;

        assert_eq!(result.successful, 3);
        assert_eq!(result.failed, 0);
        assert_eq!(result.created, vec![EntityId::from(DRY_RUN_ID); 3]);
        let output = String::from_utf8(writer).unwrap();
        assert_eq!(output.matches("[DRY RUN] Would create:").count(), 3);
    }

    #[tokio::test]
    async fn test_submit_one_dry_run() {
        let kimai = MockKimaiRepository::new();
        let submitter = BatchSubmitter::new(&kimai, true);

        let id = submitter.submit_one(&dummy_entry(0)).await.unwrap();

        assert_eq!(id, EntityId::Text("DRY_RUN".to_string()));
    }

    /// 送信の間に指定した時間だけ待つことを確認する。
    #[tokio::test]
    async fn test_submit_all_pacing() {
        let entries: Vec<SubmissionEntry> = (0..3).map(dummy_entry).collect();
        let mut kimai = MockKimaiRepository::new();
        kimai.expect_create_timesheet().times(3).returning(|_| {
            Ok(CreatedTimesheet {
                id: EntityId::Number(1),
            })
        });

        let mut writer = Vec::new();
        let mut presenter = ConsoleReport::new(&mut writer);
        let submitter = BatchSubmitter::new(&kimai, false).with_pacing(Duration::from_millis(30));
        let started = Instant::now();
        submitter.submit_all(&entries, &mut presenter).await;

        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    /// 書き込みが常に失敗する出力先。
    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    /// 進捗を書き出せなくても全件を送信して数えることを確認する。
    #[rstest]
    #[case::live(false)]
    #[case::dry_run(true)]
    #[tokio::test]
    async fn test_submit_all_broken_output(#[case] dry_run: bool) {
        let entries: Vec<SubmissionEntry> = (0..3).map(dummy_entry).collect();
        let mut kimai = MockKimaiRepository::new();
        let mut sequence = mockall::Sequence::new();
        kimai
            .expect_create_timesheet()
            .times(if dry_run { 0 } else { 1 })
            .in_sequence(&mut sequence)
            .returning(|_| {
                Err(KimaiError::Status {
                    status: StatusCode::BAD_REQUEST,
                    body: r#"{"message":"Validation Failed"}"#.to_string(),
                })
            });
        kimai
            .expect_create_timesheet()
            .times(if dry_run { 0 } else { 2 })
            .in_sequence(&mut sequence)
            .returning(|_| {
                Ok(CreatedTimesheet {
                    id: EntityId::Number(5),
                })
            });

        let mut writer = BrokenWriter;
        let mut presenter = ConsoleReport::new(&mut writer);
        let submitter = BatchSubmitter::new(&kimai, dry_run).with_pacing(Duration::ZERO);
        let result = submitter.submit_all(&entries, &mut presenter).await;

        assert_eq!(result.total, 3);
        if dry_run {
            assert_eq!(result.successful, 3);
            assert_eq!(result.failed, 0);
        } else {
            assert_eq!(result.successful, 2);
            assert_eq!(result.failed, 1);
            assert_eq!(result.failures[0].position, 1);
        }
    }

    fn dummy_entry(index: usize) -> SubmissionEntry {
        SubmissionEntry {
            date: "2025-07-15".to_string(),
            from: "09:00:00".to_string(),
            to: "09:30:00".to_string(),
            begin: "2025-07-15T09:00:00".to_string(),
            end: "2025-07-15T09:30:00".to_string(),
            project: EntityId::Number(1),
            activity: EntityId::Number(2),
            description: format!("entry {}", index),
        }
    }
}

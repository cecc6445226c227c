use std::io::Read;

use anyhow::{Context, Result};
use csv::{ByteRecord, ReaderBuilder, StringRecord, Trim};
use serde::Deserialize;

use crate::datetime::{is_ordered, local_timestamp, normalize_time};
use crate::description::DescriptionMapping;
use crate::error::ImportError;
use crate::kimai::{EntityId, TimesheetPayload};

/// 入力の1行。
///
/// CSVのヘッダー名に合わせてデシリアライズする。
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RawRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "To")]
    pub to: String,
    #[serde(rename = "Project", default)]
    pub project: String,
    #[serde(rename = "Activity", default)]
    pub activity: String,
    #[serde(rename = "Description", default)]
    pub description: String,
}

/// Kimaiへ送信できる状態に変換した1行。
#[derive(Clone, Debug, PartialEq)]
pub struct SubmissionEntry {
    pub date: String,
    pub from: String,
    pub to: String,
    pub begin: String,
    pub end: String,
    pub project: EntityId,
    pub activity: EntityId,
    pub description: String,
}

impl SubmissionEntry {
    /// `POST /api/timesheets`のリクエストボディを作る。
    pub fn payload(&self) -> TimesheetPayload {
        TimesheetPayload {
            begin: self.begin.clone(),
            end: self.end.clone(),
            project: self.project.clone(),
            activity: self.activity.clone(),
            description: self.description.clone(),
        }
    }
}

/// 入力行を`SubmissionEntry`に変換する。
///
/// プロジェクトとアクティビティは事前に解決したものを全行で共有する。
pub struct RowTransformer<'a> {
    project: &'a EntityId,
    activity: &'a EntityId,
    descriptions: &'a DescriptionMapping,
}

impl<'a> RowTransformer<'a> {
    pub fn new(
        project: &'a EntityId,
        activity: &'a EntityId,
        descriptions: &'a DescriptionMapping,
    ) -> Self {
        Self {
            project,
            activity,
            descriptions,
        }
    }

    /// 入力行を変換する。
    ///
    /// 時刻と記述を正規化するだけで失敗しない。
    /// 解釈できない値はそのまま送信し、Kimai側の検証に任せる。
    pub fn transform(&self, row: &RawRow) -> SubmissionEntry {
        let from = normalize_time(&row.from);
        let to = normalize_time(&row.to);

        SubmissionEntry {
            begin: local_timestamp(&row.date, &from),
            end: local_timestamp(&row.date, &to),
            date: row.date.clone(),
            from,
            to,
            project: self.project.clone(),
            activity: self.activity.clone(),
            description: self.descriptions.normalize(&row.description).to_string(),
        }
    }

    /// 入力行を変換し、終了時刻が開始時刻より後であることを検証する。
    ///
    /// 時刻として解釈できない場合は検証せずにそのまま返す。
    pub fn prepare(&self, row: &RawRow) -> Result<SubmissionEntry, ImportError> {
        let entry = self.transform(row);
        if is_ordered(&entry.from, &entry.to) == Some(false) {
            return Err(ImportError::RowParse {
                raw: format!("{:?}", row),
                message: format!("end {} is not after begin {}", entry.to, entry.from),
            });
        }

        Ok(entry)
    }
}

/// CSVから入力行を順に読み込む。
///
/// ヘッダー行を読めない場合はエラーを返す。
/// 各行の解釈に失敗した場合はその行だけ`ImportError::RowParse`となる。
pub fn read_rows<R: Read>(
    reader: R,
) -> Result<impl Iterator<Item = Result<RawRow, ImportError>>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::Headers)
        .flexible(true)
        .from_reader(reader);
    let headers = reader
        .headers()
        .context("Failed to read CSV header")?
        .clone();

    Ok(reader
        .into_byte_records()
        .map(move |record| parse_record(record, &headers)))
}

fn parse_record(
    record: csv::Result<ByteRecord>,
    headers: &StringRecord,
) -> Result<RawRow, ImportError> {
    let record = record.map_err(|error| ImportError::RowParse {
        raw: error
            .position()
            .map(|position| format!("at line {}", position.line()))
            .unwrap_or_default(),
        message: error.to_string(),
    })?;
    let record = StringRecord::from_byte_record(record).map_err(|error| ImportError::RowParse {
        message: error.utf8_error().to_string(),
        raw: lossy_fields(error.into_byte_record()),
    })?;

    record
        .deserialize(Some(headers))
        .map_err(|error| ImportError::RowParse {
            raw: record.iter().collect::<Vec<_>>().join(","),
            message: error.to_string(),
        })
}

fn lossy_fields(record: ByteRecord) -> String {
    record
        .iter()
        .map(String::from_utf8_lossy)
        .collect::<Vec<_>>()
        .join(",")
}

use std::env;
use std::path::PathBuf;

use crate::datetime::normalize_time;
use crate::error::ImportError;

pub const DEFAULT_KIMAI_URL: &str = "https://external-staff-time.outeraspect.com/";
pub const DEFAULT_CSV_FILE: &str = "kimai_research_july15_31_2025.csv";
pub const DEFAULT_FROM_TIME: &str = "09:00:00";

/// 環境変数から読み込んだ設定。
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub base_url: String,
    pub token: String,
    pub csv_file: PathBuf,
    pub dry_run: bool,
    /// `HH:MM:SS`に正規化済みの開始時刻。one-shotでのみ利用する。
    pub from_time: String,
    pub description_map: Option<PathBuf>,
}

impl Config {
    /// 環境変数から設定を読み込む。
    ///
    /// `KIMAI_TOKEN`が設定されていない場合はエラーを返す。
    pub fn from_env() -> Result<Self, ImportError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 指定された関数で値を引いて設定を組み立てる。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ImportError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let token = value("KIMAI_TOKEN").ok_or(ImportError::MissingConfig("KIMAI_TOKEN"))?;

        Ok(Self {
            base_url: value("KIMAI_URL").unwrap_or_else(|| DEFAULT_KIMAI_URL.to_string()),
            token,
            csv_file: value("CSV_FILE")
                .unwrap_or_else(|| DEFAULT_CSV_FILE.to_string())
                .into(),
            dry_run: value("DRY_RUN")
                .map(|flag| flag.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            from_time: normalize_time(
                &value("FROM_TIME").unwrap_or_else(|| DEFAULT_FROM_TIME.to_string()),
            ),
            description_map: value("DESCRIPTION_MAP").map(PathBuf::from),
        })
    }
}

use std::fmt;

use thiserror::Error;

use crate::kimai::KimaiError;

/// 名前解決の対象となるエンティティの種類。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Project,
    Activity,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Project => write!(f, "Project"),
            EntityKind::Activity => write!(f, "Activity"),
        }
    }
}

/// インポート処理で発生するエラー。
#[derive(Debug, Error)]
pub enum ImportError {
    /// 必須の設定値が環境変数に存在しない。
    #[error("Missing {0} in environment")]
    MissingConfig(&'static str),

    /// プロジェクトまたはアクティビティが見つからない。
    #[error("{kind} not found: {name}")]
    NotFound { kind: EntityKind, name: String },

    /// 入力の1行を解釈できない。
    #[error("Error parsing row {raw}: {message}")]
    RowParse { raw: String, message: String },

    #[error(transparent)]
    Kimai(#[from] KimaiError),
}

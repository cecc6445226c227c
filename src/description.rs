use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use once_cell::sync::Lazy;

/// 旧来の作業内容の記述と、正規化後の記述の対応表。
static DEFAULT_DESCRIPTIONS: Lazy<HashMap<String, String>> = Lazy::new(|| {
    [
        (
            "X account creation",
            "PEP work creating X accounts with email verification and profile completion",
        ),
        (
            "Insta account Creation",
            "PEP work creating Instagram accounts including bio setup and initial posts",
        ),
        (
            "Social hub account creation",
            "PEP creating social hub accounts with linking and cross-platform integration",
        ),
        (
            "X account bio add",
            "PEP work setting up X account bios, headers and verification badges",
        ),
        (
            "Insta account bio add",
            "PEP work configuring Instagram account settings, privacy and content posting",
        ),
        (
            "X account captcha resolve",
            "PEP working X captcha resolution, phone verification and security checks",
        ),
    ]
    .into_iter()
    .map(|(legacy, canonical)| (legacy.to_string(), canonical.to_string()))
    .collect()
});

/// 作業内容の記述を正規化するための対応表。
///
/// 完全一致(大文字小文字を区別する)で検索し、見つからない場合は元の文字列をそのまま返す。
#[derive(Clone, Debug, PartialEq)]
pub struct DescriptionMapping {
    table: HashMap<String, String>,
}

impl Default for DescriptionMapping {
    fn default() -> Self {
        Self {
            table: DEFAULT_DESCRIPTIONS.clone(),
        }
    }
}

impl DescriptionMapping {
    /// JSONオブジェクト形式のファイルから対応表を読み込む。
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read description mapping: {}", path.display()))?;
        let table: HashMap<String, String> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse description mapping: {}", path.display()))?;
        info!(
            "Loaded {} description mappings from {}",
            table.len(),
            path.display()
        );

        Ok(Self { table })
    }

    /// 設定に応じて対応表を読み込む。
    ///
    /// 明示的なパスが指定されていればそれを使う。
    /// 指定がなければユーザー設定ディレクトリのファイルを探し、なければ組み込みの対応表を使う。
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_from(explicit, default_mapping_path())
    }

    /// `fallback`をユーザー設定ディレクトリのファイルの代わりに使って対応表を読み込む。
    fn load_from(explicit: Option<&Path>, fallback: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match fallback {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => {
                debug!("Using built-in description mapping");
                Ok(Self::default())
            }
        }
    }

    /// 記述を正規化する。
    pub fn normalize<'a>(&'a self, original: &'a str) -> &'a str {
        self.table
            .get(original)
            .map(String::as_str)
            .unwrap_or(original)
    }
}

/// ユーザー設定ディレクトリ内の対応表ファイルのパス。
fn default_mapping_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("kimai-import").join("descriptions.json"))
}

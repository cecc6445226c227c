use std::fmt;

use async_trait::async_trait;
use log::debug;
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 検索APIで一度に取得する件数。
pub const SEARCH_PAGE_SIZE: u32 = 100;

/// Kimaiのエンティティを識別するID。
///
/// Kimaiは数値IDを返すが、クライアントとしては不透明な値として扱う。
/// 受け取った型のままシリアライズし直してAPIへ送り返す。
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Number(i64),
    Text(String),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Number(id) => write!(f, "{}", id),
            EntityId::Text(id) => write!(f, "{}", id),
        }
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId::Text(id.to_string())
    }
}

/// Kimai APIのプロジェクト情報。
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Project {
    pub id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
}

/// Kimai APIのアクティビティ情報。
///
/// `project`が`None`のアクティビティは全プロジェクト共通のアクティビティを表す。
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Activity {
    pub id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub project: Option<EntityId>,
}

/// `POST /api/timesheets`に送るリクエストボディ。
///
/// `begin`/`end`はタイムゾーンなしのローカル日時(`YYYY-MM-DDTHH:MM:SS`)。
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimesheetPayload {
    pub begin: String,
    pub end: String,
    pub project: EntityId,
    pub activity: EntityId,
    pub description: String,
}

/// 作成されたタイムシートのレスポンス。
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CreatedTimesheet {
    pub id: EntityId,
}

/// Kimai APIとの通信で発生するエラー。
#[derive(Debug, Error)]
pub enum KimaiError {
    /// 2xx以外のステータスが返された。`body`はレスポンス本文そのもの。
    #[error("Kimai API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Failed to send request to Kimai API at {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to deserialize response from {url}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Kimai APIへの操作を抽象化したtrait。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KimaiRepository {
    /// 名前でプロジェクトを検索する。
    async fn search_projects(&self, term: &str) -> Result<Vec<Project>, KimaiError>;

    /// 名前でアクティビティを検索する。
    ///
    /// `project`を指定した場合はそのプロジェクトに絞り込んで検索する。
    async fn search_activities(
        &self,
        project: Option<EntityId>,
        term: &str,
    ) -> Result<Vec<Activity>, KimaiError>;

    /// タイムシートを作成する。
    async fn create_timesheet(
        &self,
        payload: &TimesheetPayload,
    ) -> Result<CreatedTimesheet, KimaiError>;
}

/// Kimai APIと通信するためのクライアント。
///
/// # Examples
///
/// ```
/// let client = KimaiClient::new("https://kimai.example.com/", "token");
/// let projects = client.search_projects("Research").await.unwrap();
/// ```
pub struct KimaiClient {
    client: Client,
    api_url: String,
    api_token: String,
}

impl KimaiClient {
    /// 新しい`KimaiClient`を返す。
    ///
    /// `base_url`末尾の`/`は取り除いてから`/api`を付与する。
    pub fn new(base_url: &str, api_token: &str) -> Self {
        Self {
            client: Client::new(),
            api_url: format!("{}/api", base_url.trim_end_matches('/')),
            api_token: api_token.to_string(),
        }
    }

    async fn get<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T, KimaiError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.api_url, path);
        debug!("GET {} {:?}", url, query);
        let request = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .header(CONTENT_TYPE, "application/json")
            .query(query);

        read_json(request, url).await
    }
}

/// リクエストを送信し、成功時はJSONをデシリアライズして返す。
async fn read_json<T>(request: reqwest::RequestBuilder, url: String) -> Result<T, KimaiError>
where
    T: for<'de> Deserialize<'de>,
{
    let response = match request.send().await {
        Ok(response) => response,
        Err(source) => return Err(KimaiError::Transport { url, source }),
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(KimaiError::Status { status, body });
    }

    response
        .json::<T>()
        .await
        .map_err(|source| KimaiError::Decode { url, source })
}

#[async_trait]
impl KimaiRepository for KimaiClient {
    async fn search_projects(&self, term: &str) -> Result<Vec<Project>, KimaiError> {
        self.get(
            "/projects",
            &[
                ("term", term.to_string()),
                ("size", SEARCH_PAGE_SIZE.to_string()),
            ],
        )
        .await
    }

    async fn search_activities(
        &self,
        project: Option<EntityId>,
        term: &str,
    ) -> Result<Vec<Activity>, KimaiError> {
        let mut query = Vec::with_capacity(3);
        if let Some(project) = project {
            query.push(("project", project.to_string()));
        }
        query.push(("term", term.to_string()));
        query.push(("size", SEARCH_PAGE_SIZE.to_string()));

        self.get("/activities", &query).await
    }

    async fn create_timesheet(
        &self,
        payload: &TimesheetPayload,
    ) -> Result<CreatedTimesheet, KimaiError> {
        let url = format!("{}/timesheets", self.api_url);
        debug!("POST {} {:?}", url, payload);
        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(payload);

        read_json(request, url).await
    }
}

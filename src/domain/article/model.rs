use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

// 記事エンティティ（articlesテーブルの1行に対応）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// 作成・更新リクエストのボディ
// 必須項目の欠落をデコードエラーではなく検証エラーとして報告するため、全項目をOptionで受ける
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticlePayload {
    pub title: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<String>,
}

// 検証済みの記事データ（idとcreated_atはストアが採番する）
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleDraft {
    pub title: String,
    pub content: String,
    pub author: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// 入力検証エラー
/// いずれもクライアント側の誤りで、ストアを呼び出す前に検出される
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// ボディが読み取れない
    #[error("bad request")]
    UnreadableBody,

    /// JSONとして解釈できない
    #[error("invalid json")]
    InvalidJson,

    /// 必須項目が欠落または空
    #[error("{field} is required")]
    MissingField { field: &'static str },

    /// published_atがRFC3339ではない
    #[error("published_at must be RFC3339")]
    InvalidPublishedAt,

    /// パスのIDが整数ではない
    #[error("invalid article id: {raw}")]
    InvalidId { raw: String },
}

impl ArticlePayload {
    /// リクエストボディのバイト列をデコードする
    pub fn from_json_slice(body: &[u8]) -> Result<Self, ValidationError> {
        serde_json::from_slice(body).map_err(|_| ValidationError::InvalidJson)
    }

    /// 必須項目と日時形式を検証し、ストアに渡せる形に変換する
    pub fn validate(self) -> Result<ArticleDraft, ValidationError> {
        let title = required("title", self.title)?;
        let content = required("content", self.content)?;
        let author = required("author", self.author)?;
        let published_at = parse_published_at(self.published_at.as_deref())?;

        Ok(ArticleDraft {
            title,
            content,
            author,
            published_at,
        })
    }
}

fn required(field: &'static str, value: Option<String>) -> Result<String, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField { field }),
    }
}

/// published_atを解析する
/// 未指定・null・空文字は「公開日時なし」として扱う
/// 日付と時刻の区切りは大文字の `T` のみ受け付け、オフセット付きの値はUTCに正規化する
pub fn parse_published_at(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ValidationError> {
    match raw {
        None | Some("") => Ok(None),
        Some(s) if s.as_bytes().get(10) != Some(&b'T') => Err(ValidationError::InvalidPublishedAt),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| ValidationError::InvalidPublishedAt),
    }
}

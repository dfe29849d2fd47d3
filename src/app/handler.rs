use crate::domain::article::{
    Article, ArticleDraft, ArticlePayload, ArticleStore, StoreError, StoreResult, ValidationError,
};
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::Span;

/// クライアントに返すエラー
///
/// 内部エラーの原因はログにのみ出力し、レスポンスには含めない。
#[derive(Error, Debug)]
pub enum ApiError {
    /// 入力検証エラー（400）
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// 更新対象が存在しない（404）
    #[error("not found")]
    NotFound { id: i64 },

    /// ストアの失敗（500）
    #[error("internal error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

/// 記事APIのリクエストハンドラー
///
/// ストアへの参照・呼び出しごとの上限時間・ログ出力用のスパンを保持し、
/// リクエスト間で可変状態は共有しない。
#[derive(Clone)]
pub struct ArticleHandler {
    store: Arc<dyn ArticleStore>,
    timeout: Duration,
    span: Span,
}

impl ArticleHandler {
    /// 新しいハンドラーを作成
    pub fn new(store: Arc<dyn ArticleStore>, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            span: tracing::info_span!("article_handler", component = "handler"),
        }
    }

    /// ストア呼び出しを上限時間付きで実行する
    /// 期限切れの場合は呼び出し中のFutureを破棄し、クエリを中断する
    async fn bounded<T, F>(&self, operation: &str, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::timeout(operation)),
        }
    }

    /// ストアのエラーをクライアント向けのエラーに変換する
    fn store_failure(&self, message: &str, err: StoreError) -> ApiError {
        match err {
            StoreError::NotFound { id } => {
                tracing::debug!(parent: &self.span, id, "記事が見つかりません");
                ApiError::NotFound { id }
            }
            err @ (StoreError::Query { .. } | StoreError::Timeout { .. }) => {
                tracing::error!(parent: &self.span, error = %err, "{}", message);
                ApiError::Internal
            }
        }
    }
}

/// リクエストボディを検証済みの記事データに変換する
fn parse_body(body: Result<Bytes, BytesRejection>) -> Result<ArticleDraft, ValidationError> {
    let bytes = body.map_err(|_| ValidationError::UnreadableBody)?;
    ArticlePayload::from_json_slice(&bytes)?.validate()
}

fn parse_id(raw: &str) -> Result<i64, ValidationError> {
    raw.parse().map_err(|_| ValidationError::InvalidId {
        raw: raw.to_string(),
    })
}

/// GET /articles
pub async fn list_articles(
    State(handler): State<ArticleHandler>,
) -> Result<Json<Vec<Article>>, ApiError> {
    let articles = handler
        .bounded("記事一覧の取得", handler.store.list_all())
        .await
        .map_err(|e| handler.store_failure("記事一覧の取得に失敗しました", e))?;

    Ok(Json(articles))
}

/// POST /articles
pub async fn create_article(
    State(handler): State<ArticleHandler>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<Article>), ApiError> {
    let draft = parse_body(body)?;

    let article = handler
        .bounded("記事の作成", handler.store.create(&draft))
        .await
        .map_err(|e| handler.store_failure("記事の作成に失敗しました", e))?;

    tracing::info!(parent: &handler.span, id = article.id, "記事を作成しました");
    Ok((StatusCode::CREATED, Json(article)))
}

/// PUT /articles/{id}
pub async fn update_article(
    State(handler): State<ArticleHandler>,
    Path(raw_id): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Article>, ApiError> {
    let id = parse_id(&raw_id)?;
    let draft = parse_body(body)?;

    let article = handler
        .bounded("記事の更新", handler.store.update_by_id(id, &draft))
        .await
        .map_err(|e| handler.store_failure("記事の更新に失敗しました", e))?;

    tracing::info!(parent: &handler.span, id = article.id, "記事を更新しました");
    Ok(Json(article))
}

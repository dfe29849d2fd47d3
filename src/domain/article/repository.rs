use super::model::{Article, ArticleDraft};
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

/// ストア操作のエラー型
///
/// `NotFound` は更新対象の行が存在しないことを表すタグ付きの結果で、
/// それ以外は汎用的な永続化エラーとしてハンドラーに渡されます。
#[derive(Error, Debug)]
pub enum StoreError {
    /// 指定IDの記事が存在しない
    #[error("記事が見つかりません: id={id}")]
    NotFound { id: i64 },

    /// クエリの実行に失敗（接続断・制約違反など）
    #[error("データベースクエリエラー: {operation} - {source}")]
    Query {
        operation: String,
        #[source]
        source: sqlx::Error,
    },

    /// 呼び出し側の期限切れにより中断された
    #[error("データベース操作がタイムアウトしました: {operation}")]
    Timeout { operation: String },
}

impl StoreError {
    /// クエリエラーを作成
    pub fn query<O: Into<String>>(operation: O, source: sqlx::Error) -> Self {
        Self::Query {
            operation: operation.into(),
            source,
        }
    }

    /// タイムアウトエラーを作成
    pub fn timeout<O: Into<String>>(operation: O) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }
}

/// ストアエラーのResult型エイリアス
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// 記事の永続化を担うストアの抽象化トレイト
///
/// 本番用のPostgreSQL実装とテスト用のインメモリ実装を
/// 統一的に扱えるようにするためのインターフェースです。
/// いずれの操作も、返されたFutureが破棄された時点で中断されます。
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// 記事を新規作成し、採番されたidとcreated_atを含む記事を返す
    async fn create(&self, draft: &ArticleDraft) -> StoreResult<Article>;

    /// 全記事をcreated_atの降順で取得する
    async fn list_all(&self) -> StoreResult<Vec<Article>>;

    /// 指定IDの記事のtitle/content/author/published_atを上書きする
    /// created_atは変更しない。該当行がなければ `StoreError::NotFound`
    async fn update_by_id(&self, id: i64, draft: &ArticleDraft) -> StoreResult<Article>;
}

/// `sqlx` の接続プールを使用した本番用のストア実装
///
/// 接続はクエリごとにプールから取得され、クエリ完了またはFutureの破棄で返却されます。
#[derive(Debug, Clone)]
pub struct PgArticleStore {
    pool: PgPool,
}

impl PgArticleStore {
    /// 新しいストアを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArticleStore for PgArticleStore {
    async fn create(&self, draft: &ArticleDraft) -> StoreResult<Article> {
        sqlx::query_as::<_, Article>(
            r#"
            INSERT INTO articles (title, content, author, published_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, content, author, published_at, created_at
            "#,
        )
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(&draft.author)
        .bind(draft.published_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::query("記事の作成", e))
    }

    async fn list_all(&self) -> StoreResult<Vec<Article>> {
        sqlx::query_as::<_, Article>(
            r#"
            SELECT id, title, content, author, published_at, created_at
            FROM articles
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::query("記事一覧の取得", e))
    }

    async fn update_by_id(&self, id: i64, draft: &ArticleDraft) -> StoreResult<Article> {
        let result = sqlx::query_as::<_, Article>(
            r#"
            UPDATE articles
            SET title = $1, content = $2, author = $3, published_at = $4
            WHERE id = $5
            RETURNING id, title, content, author, published_at, created_at
            "#,
        )
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(&draft.author)
        .bind(draft.published_at)
        .bind(id)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(article) => Ok(article),
            Err(sqlx::Error::RowNotFound) => Err(StoreError::NotFound { id }),
            Err(e) => Err(StoreError::query("記事の更新", e)),
        }
    }
}

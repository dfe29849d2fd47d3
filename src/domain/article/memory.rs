use super::model::{Article, ArticleDraft};
use super::repository::{ArticleStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;
use std::time::Duration;

/// テスト用のインメモリストア
///
/// この実装はハンドラーやHTTPサーバーのテスト時にDIされ、
/// データベースなしでPostgreSQL実装と同じ振る舞い（採番・並び順・NotFound）を再現します。
/// 失敗や遅延を注入して、サーバーエラーやタイムアウトの経路も検証できます。
#[derive(Debug, Default)]
pub struct InMemoryArticleStore {
    state: Mutex<MemoryState>,
    /// 全操作を失敗させる場合のエラーメッセージ
    pub error_message: Option<String>,
    /// 各操作の前に挿入する遅延
    pub delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    rows: Vec<Article>,
}

impl InMemoryArticleStore {
    /// 空のストアを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 全操作がエラーを返すストアを作成
    pub fn new_error(error_message: &str) -> Self {
        Self {
            error_message: Some(error_message.to_string()),
            ..Self::default()
        }
    }

    /// 各操作の前に遅延を挿入する
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 保存済みの記事数
    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // テスト中のパニックでロックが汚染されても中身はそのまま使う
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn before_operation(&self, operation: &str) -> StoreResult<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.error_message {
            Some(msg) => Err(StoreError::query(
                operation,
                sqlx::Error::Protocol(format!("モックストアエラー: {}", msg)),
            )),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ArticleStore for InMemoryArticleStore {
    async fn create(&self, draft: &ArticleDraft) -> StoreResult<Article> {
        self.before_operation("記事の作成").await?;

        let mut state = self.lock();
        state.next_id += 1;
        let article = Article {
            id: state.next_id,
            title: draft.title.clone(),
            content: draft.content.clone(),
            author: draft.author.clone(),
            published_at: draft.published_at,
            created_at: Utc::now(),
        };
        state.rows.push(article.clone());
        Ok(article)
    }

    async fn list_all(&self) -> StoreResult<Vec<Article>> {
        self.before_operation("記事一覧の取得").await?;

        let mut rows = self.lock().rows.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn update_by_id(&self, id: i64, draft: &ArticleDraft) -> StoreResult<Article> {
        self.before_operation("記事の更新").await?;

        let mut state = self.lock();
        let row = state
            .rows
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound { id })?;
        row.title = draft.title.clone();
        row.content = draft.content.clone();
        row.author = draft.author.clone();
        row.published_at = draft.published_at;
        Ok(row.clone())
    }
}

use anyhow::{Context, Result};
use article_api::app::{serve, ArticleHandler};
use article_api::domain::article::PgArticleStore;
use article_api::infra::{db::create_pool, logging::init_tracing};
use article_api::types::AppConfig;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // 環境変数を読み込み（.envファイルがあれば使用）
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = AppConfig::from_env().context("設定の読み込みに失敗しました")?;

    let pool = create_pool(&config)
        .await
        .context("データベースへの接続に失敗しました")?;

    // ストアとハンドラーは起動時に一度だけ構築し、以降は共有する
    let store = Arc::new(PgArticleStore::new(pool.clone()));
    let handler = ArticleHandler::new(store, config.handler_timeout);

    serve(&config, handler)
        .await
        .context("HTTPサーバーの実行に失敗しました")?;

    pool.close().await;
    tracing::info!("サーバーを終了しました");
    Ok(())
}

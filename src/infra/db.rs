use crate::types::{AppConfig, InfraError, InfraResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// データベース接続プールを作成
/// 接続文字列・最大接続数・接続タイムアウトはAppConfigから取得します
///
/// スキーマの作成は行いません（テーブルは事前に用意されている前提）。
pub async fn create_pool(config: &AppConfig) -> InfraResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(config.db_connect_timeout)
        .connect(&config.database_url)
        .await
        .map_err(InfraError::database_connection)
}

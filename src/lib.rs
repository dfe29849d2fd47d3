//! 記事（article）を作成・一覧・更新するHTTP API
//!
//! - `domain`: 記事エンティティ・入力検証・ストア（PostgreSQL / インメモリ）
//! - `app`: リクエストハンドラーとルーティング・サーバー
//! - `infra`: データベース接続プールとログ出力の初期化
//! - `types`: 設定と共通エラー

pub mod app;
pub mod domain;
pub mod infra;
pub mod types;

//! 型定義モジュール
//!
//! アプリケーション全体で使用される共通的な型定義を管理します。
//! - 設定: 環境変数から構築されるアプリケーション設定と設定エラー
//! - インフラエラー: データベース接続やサーバー起動のエラー

pub mod config;
pub mod infra;

// 便利な再エクスポート
pub use config::{AppConfig, ConfigError, ConfigResult};
pub use infra::{InfraError, InfraResult};

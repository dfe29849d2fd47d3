use tracing_subscriber::EnvFilter;

/// ログ出力（tracing）の初期化
///
/// 環境変数 `RUST_LOG` を優先し、未設定の場合は `info,tower_http=debug` を使う。
/// mainの先頭で一度だけ呼び出すこと。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

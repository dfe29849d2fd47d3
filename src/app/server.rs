use crate::app::handler::{create_article, list_articles, update_article, ArticleHandler};
use crate::types::{AppConfig, InfraError, InfraResult};
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::map_response;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::Router;
use std::future::{Future, IntoFuture};
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

/// リクエスト全体（ボディの読み込みとレスポンス生成を含む）の上限時間
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// シャットダウン時に処理中のリクエストを待つ上限時間
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// 記事APIのルーティングテーブル
pub fn router(handler: ArticleHandler) -> Router {
    Router::new()
        .route("/articles", get(list_articles).post(create_article))
        .route("/articles/{id}", put(update_article))
        .with_state(handler)
}

/// ミドルウェアを含むアプリケーション全体
///
/// リクエストIDの付与・伝播、クライアントIPを含むリクエストのトレース、
/// パニックの500応答への変換、リクエスト全体のタイムアウトを適用する。
pub fn app(handler: ArticleHandler) -> Router {
    app_with_request_timeout(handler, REQUEST_TIMEOUT)
}

pub(crate) fn app_with_request_timeout(
    handler: ArticleHandler,
    request_timeout: Duration,
) -> Router {
    router(handler).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(make_request_span as fn(&Request<Body>) -> Span),
            )
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(CatchPanicLayer::custom(panic_handler as fn(_) -> _))
            .layer(map_response(timeout_as_json))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                request_timeout,
            )),
    )
}

/// リクエストごとのトレース用スパン
fn make_request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    let real_ip = client_ip(request.headers()).unwrap_or_else(|| "-".to_string());

    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
        real_ip = %real_ip,
    )
}

/// プロキシ経由のリクエストで元のクライアントIPを取り出す
///
/// True-Client-IP、X-Real-IP、X-Forwarded-For（先頭の値）の順に参照する。
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header("true-client-ip")
        .or_else(|| header("x-real-ip"))
        .or_else(|| {
            header("x-forwarded-for")
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
        .map(str::to_string)
}

/// タイムアウト時の空の408応答を他のエラーと同じJSON形式にする
async fn timeout_as_json(response: Response) -> Response {
    if response.status() != StatusCode::REQUEST_TIMEOUT {
        return response;
    }
    tracing::warn!("リクエストが上限時間を超えました");
    let body = serde_json::json!({ "error": "request timeout" });
    (StatusCode::REQUEST_TIMEOUT, axum::Json(body)).into_response()
}

fn panic_handler(_err: Box<dyn std::any::Any + Send>) -> axum::response::Response {
    tracing::error!("リクエスト処理中にパニックが発生しました");
    let body = serde_json::json!({ "error": "internal error" });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
}

/// 設定されたアドレスで待ち受け、SIGINT/SIGTERMで停止する
pub async fn serve(config: &AppConfig, handler: ArticleHandler) -> InfraResult<()> {
    let listener = TcpListener::bind(config.http_addr)
        .await
        .map_err(|e| InfraError::io(format!("{} での待ち受け", config.http_addr), e))?;

    serve_with_shutdown(listener, handler, shutdown_signal()).await
}

/// 指定のリスナーでサーバーを起動し、`shutdown` の完了で停止を開始する
///
/// 停止開始後は処理中のリクエストを `SHUTDOWN_GRACE` まで待ち、それを過ぎたら打ち切る。
pub async fn serve_with_shutdown<S>(
    listener: TcpListener,
    handler: ArticleHandler,
    shutdown: S,
) -> InfraResult<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let addr = listener
        .local_addr()
        .map_err(|e| InfraError::io("待ち受けアドレスの取得", e))?;
    tracing::info!(%addr, "サーバーを起動します");

    let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
    let graceful = async move {
        shutdown.await;
        tracing::info!("サーバーを停止しています...");
        let _ = started_tx.send(());
    };

    let server = axum::serve(listener, app(handler))
        .with_graceful_shutdown(graceful)
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            return result.map_err(|e| InfraError::io("HTTPサーバーの実行", e));
        }
        _ = started_rx => {}
    }

    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(result) => {
            result.map_err(|e| InfraError::io("HTTPサーバーの停止", e))?;
            tracing::info!("サーバーを停止しました");
        }
        Err(_) => {
            tracing::warn!("処理中のリクエストが残っているため強制停止します");
        }
    }
    Ok(())
}

/// SIGINT（Ctrl+C）またはSIGTERMを待つ
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+Cハンドラーの登録に失敗しました");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERMハンドラーの登録に失敗しました");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::article::InMemoryArticleStore;
    use axum::http::HeaderValue;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let store = Arc::new(InMemoryArticleStore::new());
        app(ArticleHandler::new(store, Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn test_request_id_is_added_to_response() {
        let response = test_app()
            .oneshot(Request::get("/articles").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let request = Request::get("/articles")
            .header("x-request-id", "req-123")
            .body(Body::empty())
            .unwrap();
        let response = test_app().oneshot(request).await.unwrap();

        assert_eq!(response.headers()["x-request-id"], "req-123");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = test_app()
            .oneshot(Request::get("/unknown").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let response = test_app()
            .oneshot(Request::delete("/articles/1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_request_timeout_returns_json_408() {
        let store = Arc::new(InMemoryArticleStore::new().with_delay(Duration::from_millis(500)));
        let handler = ArticleHandler::new(store, Duration::from_secs(5));
        let app = app_with_request_timeout(handler, Duration::from_millis(50));

        let response = app
            .oneshot(Request::get("/articles").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert!(response.headers().contains_key("x-request-id"));

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({"error": "request timeout"}));
    }

    mod real_ip {
        use super::*;

        fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
            let mut map = HeaderMap::new();
            for (name, value) in pairs {
                map.insert(*name, HeaderValue::from_static(*value));
            }
            map
        }

        #[test]
        fn test_no_proxy_headers() {
            assert_eq!(client_ip(&HeaderMap::new()), None);
        }

        #[test]
        fn test_header_precedence() {
            let all = headers(&[
                ("true-client-ip", "203.0.113.1"),
                ("x-real-ip", "203.0.113.2"),
                ("x-forwarded-for", "203.0.113.3"),
            ]);
            assert_eq!(client_ip(&all).as_deref(), Some("203.0.113.1"));

            let real = headers(&[("x-real-ip", "203.0.113.2"), ("x-forwarded-for", "203.0.113.3")]);
            assert_eq!(client_ip(&real).as_deref(), Some("203.0.113.2"));
        }

        #[test]
        fn test_forwarded_for_uses_first_hop() {
            let map = headers(&[("x-forwarded-for", " 198.51.100.7 , 10.0.0.1, 10.0.0.2")]);
            assert_eq!(client_ip(&map).as_deref(), Some("198.51.100.7"));
        }

        #[test]
        fn test_blank_values_are_ignored() {
            let map = headers(&[("x-real-ip", "  "), ("x-forwarded-for", "198.51.100.7")]);
            assert_eq!(client_ip(&map).as_deref(), Some("198.51.100.7"));
        }
    }

    #[tokio::test]
    async fn test_shutdown_completes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let store = Arc::new(InMemoryArticleStore::new());
        let handler = ArticleHandler::new(store, Duration::from_secs(5));

        let result = serve_with_shutdown(listener, handler, async {}).await;
        assert!(result.is_ok());
    }
}

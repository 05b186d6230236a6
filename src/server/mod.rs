//! HTTP front end: serves the candlestick document for one fixed query.

pub mod error;
mod routes;

use std::sync::{Arc, Mutex, PoisonError};

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::axis::AxisValues;
use crate::chart::{ChartTemplate, KlineChart};
use crate::client::{fetch_axis_value, Client};
use crate::db::pool::DbPool;
use crate::error::ChartError;

pub use error::ApiError;

pub const DEFAULT_ADDR: &str = ":8081";

/// Anything that can run the chart query. Called from the blocking pool,
/// possibly from several requests at once.
pub trait AxisSource: Send + Sync + 'static {
    fn fetch_axis_value(&self, sql: &str) -> Result<AxisValues, ChartError>;
}

impl AxisSource for DbPool {
    fn fetch_axis_value(&self, sql: &str) -> Result<AxisValues, ChartError> {
        let mut conn = self
            .get()
            .map_err(|e| ChartError::connection("check out pooled connection", e))?;
        fetch_axis_value(&mut **conn, sql)
    }
}

// Requests queue on the lock.
impl AxisSource for Mutex<Client> {
    fn fetch_axis_value(&self, sql: &str) -> Result<AxisValues, ChartError> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fetch_axis_value(sql)
    }
}

/// What `GET /` renders.
#[derive(Debug, Clone)]
pub enum ChartSource {
    /// Query on every request and build the chart from the template.
    Default(ChartTemplate),
    /// Render this chart as-is; no database access.
    Prebuilt(KlineChart),
}

impl Default for ChartSource {
    fn default() -> Self {
        Self::Default(ChartTemplate::default())
    }
}

pub struct ServerState {
    source: Arc<dyn AxisSource>,
    query: Arc<str>,
    chart: ChartSource,
}

/// A self-contained chart server. Each instance owns its router, so several
/// can run in one process.
pub struct ChartServer {
    router: Router,
}

impl ChartServer {
    pub fn new(source: Arc<dyn AxisSource>, query: impl Into<String>, chart: ChartSource) -> Self {
        let state = Arc::new(ServerState {
            source,
            query: Arc::from(query.into()),
            chart,
        });
        let router = routes::routes()
            .layer(TraceLayer::new_for_http())
            .with_state(state);
        Self { router }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until Ctrl+C.
    pub async fn serve(self, addr: &str) -> std::io::Result<()> {
        self.serve_with_shutdown(addr, shutdown_signal()).await
    }

    pub async fn serve_with_shutdown<F>(self, addr: &str, signal: F) -> std::io::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = resolve_addr(addr);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("candlestick chart listening on http://{}", listener.local_addr()?);
        axum::serve(listener, self.router)
            .with_graceful_shutdown(signal)
            .await
    }
}

/// `""` means the default address, and a bare `:port` binds every interface.
pub fn resolve_addr(addr: &str) -> String {
    let addr = addr.trim();
    let addr = if addr.is_empty() { DEFAULT_ADDR } else { addr };
    match addr.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => addr.to_string(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install Ctrl+C handler: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, gracefully stopping…");
}

/// Blocking convenience: build a runtime and serve `query` until Ctrl+C.
///
/// With `prebuilt` set, that chart is served as-is and `source` is only used
/// by `/api/axis`.
pub fn serve_chart(
    source: Arc<dyn AxisSource>,
    query: &str,
    addr: &str,
    prebuilt: Option<KlineChart>,
) -> std::io::Result<()> {
    let chart = prebuilt.map_or_else(ChartSource::default, ChartSource::Prebuilt);
    let server = ChartServer::new(source, query, chart);
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(server.serve(addr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::OhlcTuple;
    use crate::chart::{ChartStyle, Overlay};
    use crate::value::Scalar;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    struct StubSource {
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl AxisSource for StubSource {
        fn fetch_axis_value(&self, _sql: &str) -> Result<AxisValues, ChartError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ChartError::Schema {
                    found: 4,
                    required: 5,
                });
            }
            Ok(AxisValues {
                x_axis: vec!["2022-05-18".into(), "2022-05-19".into()],
                y_axis: vec![
                    OhlcTuple([
                        Scalar::Float(156.35),
                        Scalar::Float(158.45),
                        Scalar::Float(156.75),
                        Scalar::Float(157.25),
                    ]),
                    OhlcTuple([
                        Scalar::Float(159.15),
                        Scalar::Float(158.10),
                        Scalar::Float(157.20),
                        Scalar::Float(156.40),
                    ]),
                ],
            })
        }
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, String) {
        let resp = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_default_chart_queries_per_request() {
        let source = StubSource::new(false);
        let server = ChartServer::new(source.clone(), "SELECT ...", ChartSource::default());

        let resp = server
            .router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let ctype = resp.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(ctype.starts_with("text/html"));

        let (_, body) = get(server.router(), "/").await;
        assert!(body.contains("2022-05-19"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_decode_failure_is_400_without_chart() {
        let server = ChartServer::new(StubSource::new(true), "SELECT ...", ChartSource::default());
        let (status, body) = get(server.router(), "/").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert!(json["error"].as_str().unwrap().starts_with("schema_error"));
        assert!(!body.contains("echarts"));
    }

    #[tokio::test]
    async fn test_prebuilt_chart_skips_database() {
        let source = StubSource::new(true);
        let chart = KlineChart::new(ChartStyle {
            title: "Prebuilt".into(),
            ..ChartStyle::default()
        });
        let server = ChartServer::new(source.clone(), "SELECT ...", ChartSource::Prebuilt(chart));
        let (status, body) = get(server.router(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Prebuilt"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_template_overlays_rendered() {
        let template = ChartTemplate::default().with_overlay(Overlay::Sma(2));
        let server = ChartServer::new(StubSource::new(false), "q", ChartSource::Default(template));
        let (_, body) = get(server.router(), "/").await;
        assert!(body.contains("SMA(2)"));
    }

    #[tokio::test]
    async fn test_api_axis_json() {
        let server = ChartServer::new(StubSource::new(false), "q", ChartSource::default());
        let (status, body) = get(server.router(), "/api/axis").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["x_axis"], serde_json::json!(["2022-05-18", "2022-05-19"]));
        assert_eq!(
            json["y_axis"][1],
            serde_json::json!([159.15, 158.10, 157.20, 156.40])
        );
    }

    #[tokio::test]
    async fn test_health() {
        let server = ChartServer::new(StubSource::new(true), "q", ChartSource::default());
        let (status, body) = get(server.router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_servers_are_isolated() {
        let a = ChartServer::new(StubSource::new(false), "q", ChartSource::default());
        let b = ChartServer::new(StubSource::new(true), "q", ChartSource::default());
        assert_eq!(get(a.router(), "/").await.0, StatusCode::OK);
        assert_eq!(get(b.router(), "/").await.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_graceful_shutdown() {
        let server = ChartServer::new(StubSource::new(false), "q", ChartSource::default());
        server
            .serve_with_shutdown("127.0.0.1:0", async {})
            .await
            .unwrap();
    }

    #[test]
    fn test_resolve_addr() {
        assert_eq!(resolve_addr(""), "0.0.0.0:8081");
        assert_eq!(resolve_addr(":9000"), "0.0.0.0:9000");
        assert_eq!(resolve_addr("127.0.0.1:8081"), "127.0.0.1:8081");
    }
}

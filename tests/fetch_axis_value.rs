#![cfg(feature = "sqlite")]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use sql_candlestick::{
    ChartError, ChartServer, ChartSource, Client, ConnectionSpec, DriverRegistry, Scalar, SQLITE,
};

fn tmp_db_path(tag: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("sqlcandle_it_{tag}_{nanos}.db"))
}

struct TempDb(PathBuf);

impl TempDb {
    fn with_candles(tag: &str) -> Self {
        let path = tmp_db_path(tag);
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE candle_data (
                date DATE NOT NULL,
                open REAL,
                close REAL,
                high REAL,
                low REAL
            );
            INSERT INTO candle_data VALUES ('2022-05-18', 156.35, 158.45, 156.75, 157.25);
            INSERT INTO candle_data VALUES ('2022-05-19', 159.15, 158.10, 157.20, 156.40);
            "#,
        )
        .unwrap();
        Self(path)
    }

    fn dsn(&self) -> String {
        self.0.to_string_lossy().into_owned()
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

const QUERY: &str = "SELECT date, open, close, high, low FROM candle_data ORDER BY date ASC";

#[test]
fn candle_scenario_through_public_api() {
    let db = TempDb::with_candles("scenario");
    let mut client = Client::open(SQLITE, &db.dsn()).unwrap();

    let axis = client.fetch_axis_value(QUERY).unwrap();
    assert_eq!(axis.x_axis, vec!["2022-05-18", "2022-05-19"]);
    assert_eq!(axis.y_axis.len(), 2);
    assert_eq!(
        axis.y_axis[1].values(),
        &[
            Scalar::Float(159.15),
            Scalar::Float(158.10),
            Scalar::Float(157.20),
            Scalar::Float(156.40),
        ]
    );
}

#[test]
fn date_column_renders_as_iso_date() {
    let db = TempDb::with_candles("dates");
    let mut client = Client::open(SQLITE, &db.dsn()).unwrap();
    let axis = client
        .fetch_axis_value("SELECT date, open, close, high, low FROM candle_data LIMIT 1")
        .unwrap();
    let expected = Scalar::Date(NaiveDate::from_ymd_opt(2022, 5, 18).unwrap()).to_string();
    assert_eq!(axis.x_axis[0], expected);
}

#[test]
fn zero_rows_give_empty_axes() {
    let db = TempDb::with_candles("empty");
    let mut client = Client::open(SQLITE, &db.dsn()).unwrap();
    let axis = client
        .fetch_axis_value("SELECT date, open, close, high, low FROM candle_data WHERE open < 0")
        .unwrap();
    assert!(axis.x_axis.is_empty());
    assert!(axis.y_axis.is_empty());
}

#[test]
fn four_columns_is_schema_error() {
    let db = TempDb::with_candles("narrow");
    let mut client = Client::open(SQLITE, &db.dsn()).unwrap();
    let err = client
        .fetch_axis_value("SELECT date, open, close, high FROM candle_data")
        .unwrap_err();
    assert!(matches!(err, ChartError::Schema { found: 4, required: 5 }));
}

#[test]
fn missing_parameters_fail_before_connecting() {
    assert!(matches!(Client::open(SQLITE, ""), Err(ChartError::Config(_))));
    assert!(matches!(Client::open("", "x.db"), Err(ChartError::Config(_))));

    let spec = ConnectionSpec::new("oracle", "x").unwrap();
    let err = Client::connect(&DriverRegistry::builtin(), &spec).unwrap_err();
    assert!(matches!(err, ChartError::Config(_)));
}

#[tokio::test]
async fn mutex_client_serves_chart() {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    let db = TempDb::with_candles("serve");
    let client = Client::open(SQLITE, &db.dsn()).unwrap();
    let server = ChartServer::new(Arc::new(Mutex::new(client)), QUERY, ChartSource::default());

    let resp = server
        .router()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("\"2022-05-19\""));
    assert!(html.contains("Candle stick chart"));
}

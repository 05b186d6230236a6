use std::sync::Arc;
use std::time::Duration;

use r2d2::{ManageConnection, Pool};

use crate::client::ConnectionSpec;
use crate::db::{DbConnection, DriverRegistry};
use crate::error::ChartError;

pub type DbPool = Pool<DriverManager>;

/// r2d2 manager over any registered driver.
pub struct DriverManager {
    registry: Arc<DriverRegistry>,
    spec: ConnectionSpec,
}

impl DriverManager {
    /// Fails with [`ChartError::Config`] when the driver is unknown, so the
    /// pool never starts dialing a backend that cannot exist.
    pub fn new(registry: Arc<DriverRegistry>, spec: ConnectionSpec) -> Result<Self, ChartError> {
        registry.factory(spec.driver())?;
        Ok(Self { registry, spec })
    }
}

impl ManageConnection for DriverManager {
    type Connection = Box<dyn DbConnection>;
    type Error = ChartError;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let factory = self.registry.factory(self.spec.driver())?;
        (**factory)(self.spec.dsn())
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.ping()
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Create a connection pool for `spec`.
///
/// Every checkout is probed with the backend's ping. Building the pool waits
/// up to `connect_timeout` for the first connection.
pub fn open_pool(
    registry: Arc<DriverRegistry>,
    spec: ConnectionSpec,
    max_size: u32,
    connect_timeout: Duration,
) -> Result<DbPool, ChartError> {
    let driver = spec.driver().to_string();
    let manager = DriverManager::new(registry, spec)?;
    let pool = Pool::builder()
        .max_size(max_size.max(1))
        .connection_timeout(connect_timeout)
        .test_on_check_out(true)
        .build(manager)
        .map_err(|e| ChartError::connection(format!("open {driver} pool"), e))?;
    tracing::info!(driver = %driver, max_size, "connection pool ready");
    Ok(pool)
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::client::fetch_axis_value;
    use std::path::PathBuf;

    fn tmp_db_path(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("sqlcandle_pool_{tag}_{nanos}.db"))
    }

    fn seed(path: &PathBuf) {
        let conn = rusqlite::Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE k (t TEXT, o REAL, c REAL, h REAL, l REAL);
             INSERT INTO k VALUES ('a', 1.0, 2.0, 3.0, 0.5);
             INSERT INTO k VALUES ('b', 2.0, 3.0, 4.0, 1.5);",
        )
        .unwrap();
    }

    #[test]
    fn test_pool_serves_queries() {
        let path = tmp_db_path("serves");
        seed(&path);
        let spec = ConnectionSpec::new("sqlite", path.to_string_lossy()).unwrap();
        let pool = open_pool(
            Arc::new(DriverRegistry::builtin()),
            spec,
            2,
            Duration::from_secs(2),
        )
        .unwrap();

        let mut conn = pool.get().unwrap();
        let axis = fetch_axis_value(&mut **conn, "SELECT * FROM k ORDER BY t").unwrap();
        assert_eq!(axis.x_axis, vec!["a", "b"]);
        drop(conn);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_unknown_driver_rejected_before_pooling() {
        let spec = ConnectionSpec::new("oracle", "whatever").unwrap();
        let err = open_pool(
            Arc::new(DriverRegistry::builtin()),
            spec,
            1,
            Duration::from_millis(100),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ChartError::Config(_)));
    }
}

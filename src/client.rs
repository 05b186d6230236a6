use std::fmt;

use crate::axis::{self, AxisValues};
use crate::db::{DbConnection, DriverRegistry};
use crate::decode::decode;
use crate::error::ChartError;

/// Driver identifier plus DSN. Both are required; nothing is opened here.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSpec {
    driver: String,
    dsn: String,
}

impl ConnectionSpec {
    pub fn new(driver: impl Into<String>, dsn: impl Into<String>) -> Result<Self, ChartError> {
        let driver = driver.into().trim().to_string();
        let dsn = dsn.into().trim().to_string();
        if driver.is_empty() {
            return Err(ChartError::Config("database driver name missing".to_string()));
        }
        if dsn.is_empty() {
            return Err(ChartError::Config("data source name missing".to_string()));
        }
        Ok(Self { driver, dsn })
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }
}

// The DSN usually carries a password.
impl fmt::Debug for ConnectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSpec")
            .field("driver", &self.driver)
            .field("dsn", &"<redacted>")
            .finish()
    }
}

/// Open a connection for `spec` and probe it.
///
/// Configuration problems surface as [`ChartError::Config`] before the driver
/// factory is invoked.
pub fn open_connection(
    registry: &DriverRegistry,
    spec: &ConnectionSpec,
) -> Result<Box<dyn DbConnection>, ChartError> {
    let factory = registry.factory(spec.driver())?;
    let mut conn = (**factory)(spec.dsn())?;
    conn.ping()?;
    tracing::info!(driver = spec.driver(), "database connection ready");
    Ok(conn)
}

/// Run `sql` on an open connection and fold the result into axis data.
pub fn fetch_axis_value(conn: &mut dyn DbConnection, sql: &str) -> Result<AxisValues, ChartError> {
    let rows = decode(conn, sql)?;
    Ok(axis::build(rows))
}

/// A single probed database connection. Dropping it closes the connection.
///
/// `Client` does no locking of its own; share it behind a `Mutex` or use
/// [`open_pool`](crate::db::pool::open_pool) when serving concurrent requests.
pub struct Client {
    conn: Box<dyn DbConnection>,
}

impl Client {
    /// Connect with the built-in drivers.
    pub fn open(driver: &str, dsn: &str) -> Result<Self, ChartError> {
        let spec = ConnectionSpec::new(driver, dsn)?;
        Self::connect(&DriverRegistry::builtin(), &spec)
    }

    pub fn connect(registry: &DriverRegistry, spec: &ConnectionSpec) -> Result<Self, ChartError> {
        open_connection(registry, spec).map(|conn| Self { conn })
    }

    /// Wrap a connection that is already open. No probe is performed.
    pub fn from_connection(conn: Box<dyn DbConnection>) -> Self {
        Self { conn }
    }

    pub fn driver(&self) -> &str {
        self.conn.driver()
    }

    pub fn ping(&mut self) -> Result<(), ChartError> {
        self.conn.ping()
    }

    pub fn fetch_axis_value(&mut self, sql: &str) -> Result<AxisValues, ChartError> {
        fetch_axis_value(self.conn.as_mut(), sql)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").field("driver", &self.driver()).finish()
    }
}

pub mod pool;

#[cfg(feature = "clickhouse")]
pub mod clickhouse;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::decode::{ColumnDescriptor, RawRow};
use crate::error::ChartError;

// ── Driver identifiers ───────────────────────────────────────────────────

pub const CLICKHOUSE: &str = "clickhouse";
pub const POSTGRES: &str = "postgres";
pub const MYSQL: &str = "mysql";
pub const SQLITE: &str = "sqlite";

/// Receives the result of one query execution.
///
/// Backends call [`RowSink::columns`] exactly once, before touching any row,
/// and stop (releasing their cursor) as soon as either method returns an error.
pub trait RowSink {
    fn columns(&mut self, columns: &[ColumnDescriptor]) -> Result<(), ChartError>;
    fn row(&mut self, row: RawRow) -> Result<(), ChartError>;
}

/// A live handle to one database backend.
///
/// Implementations map their native column types onto
/// [`ScalarKind`](crate::value::ScalarKind) and scan every value into the
/// matching [`Scalar`](crate::value::Scalar) variant.
pub trait DbConnection: Send {
    /// Driver identifier this handle was opened with.
    fn driver(&self) -> &str;

    /// Liveness probe.
    fn ping(&mut self) -> Result<(), ChartError>;

    /// Run `sql` verbatim and stream its result into `sink`.
    fn execute(&mut self, sql: &str, sink: &mut dyn RowSink) -> Result<(), ChartError>;
}

/// Opens an unprobed connection from a DSN.
pub type DriverFactory =
    Arc<dyn Fn(&str) -> Result<Box<dyn DbConnection>, ChartError> + Send + Sync>;

/// Maps driver identifiers to connection factories.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: BTreeMap<String, DriverFactory>,
}

impl DriverRegistry {
    /// An empty registry; see [`DriverRegistry::builtin`] for the usual one.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every backend compiled into this build.
    pub fn builtin() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "clickhouse")]
        registry.register(CLICKHOUSE, clickhouse::open);
        #[cfg(feature = "postgres")]
        registry.register(POSTGRES, postgres::open);
        #[cfg(feature = "mysql")]
        registry.register(MYSQL, mysql::open);
        #[cfg(feature = "sqlite")]
        registry.register(SQLITE, sqlite::open);
        registry
    }

    /// Add or replace a driver.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&str) -> Result<Box<dyn DbConnection>, ChartError> + Send + Sync + 'static,
    {
        self.drivers.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.drivers.keys().map(String::as_str)
    }

    /// Look up a driver without opening anything.
    pub fn factory(&self, name: &str) -> Result<&DriverFactory, ChartError> {
        self.drivers.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.names().collect();
            ChartError::Config(format!(
                "unsupported driver {name:?} (known: {})",
                known.join(", ")
            ))
        })
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::StaticConnection;
    use super::*;

    #[test]
    fn test_builtin_knows_compiled_backends() {
        let registry = DriverRegistry::builtin();
        #[cfg(feature = "sqlite")]
        assert!(registry.contains(SQLITE));
        #[cfg(feature = "postgres")]
        assert!(registry.contains(POSTGRES));
        #[cfg(feature = "mysql")]
        assert!(registry.contains(MYSQL));
        #[cfg(feature = "clickhouse")]
        assert!(registry.contains(CLICKHOUSE));
    }

    #[test]
    fn test_unknown_driver_is_config_error() {
        let registry = DriverRegistry::new();
        let err = registry.factory("oracle").err().unwrap();
        assert!(matches!(err, ChartError::Config(_)));
        assert!(err.to_string().contains("oracle"));
    }

    #[test]
    fn test_register_custom_driver() {
        let mut registry = DriverRegistry::new();
        registry.register("static", |_dsn: &str| {
            Ok(Box::new(StaticConnection::new(&["t"], vec![])) as Box<dyn DbConnection>)
        });
        let factory = registry.factory("static").unwrap();
        let conn = (**factory)("anything").unwrap();
        assert_eq!(conn.driver(), "static");
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["static"]);
    }
}

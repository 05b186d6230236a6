use thiserror::Error;

/// Boxed underlying cause carried by connection and query failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Every failure the connection, decoding, and axis layers can report.
///
/// None of these are retried internally; the caller decides what to do.
#[derive(Debug, Error)]
pub enum ChartError {
    /// Missing or unusable connection parameters. Raised before any I/O.
    #[error("config_error: {0}")]
    Config(String),

    #[error("connection_error: {context}: {source}")]
    Connection {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("query_error: {0}")]
    Query(#[source] BoxError),

    #[error("metadata_error: {0}")]
    Metadata(#[source] BoxError),

    /// The result set cannot supply a category plus four OHLC values.
    #[error("schema_error: query returned {found} column(s), at least {required} are required")]
    Schema { found: usize, required: usize },

    #[error("scan_error: row {row}, column {column:?}: {source}")]
    Scan {
        row: usize,
        column: String,
        #[source]
        source: BoxError,
    },
}

impl ChartError {
    pub fn connection(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Connection {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn query(source: impl Into<BoxError>) -> Self {
        Self::Query(source.into())
    }

    pub fn metadata(source: impl Into<BoxError>) -> Self {
        Self::Metadata(source.into())
    }

    pub fn scan(row: usize, column: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Scan {
            row,
            column: column.into(),
            source: source.into(),
        }
    }

    /// Short machine-readable tag, used in logs and HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Connection { .. } => "connection",
            Self::Query(_) => "query",
            Self::Metadata(_) => "metadata",
            Self::Schema { .. } => "schema",
            Self::Scan { .. } => "scan",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_names_both_counts() {
        let err = ChartError::Schema { found: 4, required: 5 };
        assert_eq!(
            err.to_string(),
            "schema_error: query returned 4 column(s), at least 5 are required"
        );
        assert_eq!(err.kind(), "schema");
    }

    #[test]
    fn connection_error_keeps_its_cause() {
        let err = ChartError::connection("ping sqlite", "database is locked");
        assert!(err.to_string().contains("ping sqlite"));
        assert!(std::error::Error::source(&err).is_some());
    }
}

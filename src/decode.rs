use crate::db::{DbConnection, RowSink};
use crate::error::ChartError;
use crate::value::{Scalar, ScalarKind};

/// Time/category column plus open, close, high, low.
pub const MIN_COLUMNS: usize = 5;

/// Metadata for one result column, valid for a single query execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Type name as the backend reported it (`FLOAT8`, `Nullable(Float64)`, ...).
    pub type_name: String,
    pub kind: ScalarKind,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, kind: ScalarKind) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            kind,
        }
    }
}

/// One scanned result row, one value per column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRow(Vec<Scalar>);

impl RawRow {
    pub fn new(values: Vec<Scalar>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Scalar> {
        self.0.get(idx)
    }

    pub fn values(&self) -> &[Scalar] {
        &self.0
    }

    pub fn into_values(self) -> Vec<Scalar> {
        self.0
    }
}

/// Reject result sets too narrow to form a candlestick.
pub fn check_schema(columns: &[ColumnDescriptor]) -> Result<(), ChartError> {
    if columns.len() < MIN_COLUMNS {
        return Err(ChartError::Schema {
            found: columns.len(),
            required: MIN_COLUMNS,
        });
    }
    if columns.len() > MIN_COLUMNS {
        let ignored: Vec<&str> = columns[MIN_COLUMNS..].iter().map(|c| c.name.as_str()).collect();
        tracing::debug!("ignoring {} extra column(s): {}", ignored.len(), ignored.join(", "));
    }
    Ok(())
}

/// Collects rows after the schema check passes.
#[derive(Debug, Default)]
struct RowCollector {
    width: Option<usize>,
    rows: Vec<RawRow>,
}

impl RowSink for RowCollector {
    fn columns(&mut self, columns: &[ColumnDescriptor]) -> Result<(), ChartError> {
        check_schema(columns)?;
        self.width = Some(columns.len());
        Ok(())
    }

    fn row(&mut self, row: RawRow) -> Result<(), ChartError> {
        let width = self
            .width
            .ok_or_else(|| ChartError::metadata("backend sent a row before reporting columns"))?;
        if row.len() != width {
            return Err(ChartError::metadata(format!(
                "row {} has {} value(s) but the result set declared {} column(s)",
                self.rows.len(),
                row.len(),
                width
            )));
        }
        self.rows.push(row);
        Ok(())
    }
}

/// Execute `sql` and decode every row, in the order the engine returned them.
///
/// Fails with [`ChartError::Schema`] before reading any row when the result
/// has fewer than [`MIN_COLUMNS`] columns, and with [`ChartError::Metadata`]
/// when the backend never reports its columns. No partial result is returned
/// on error.
pub fn decode(conn: &mut dyn DbConnection, sql: &str) -> Result<Vec<RawRow>, ChartError> {
    let mut collector = RowCollector::default();
    conn.execute(sql, &mut collector)?;
    if collector.width.is_none() {
        return Err(ChartError::metadata("backend reported no columns"));
    }
    tracing::debug!(
        driver = conn.driver(),
        rows = collector.rows.len(),
        "decoded result set"
    );
    Ok(collector.rows)
}

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

use crate::db::{DbConnection, RowSink, SQLITE};
use crate::decode::{ColumnDescriptor, RawRow};
use crate::error::ChartError;
use crate::value::{parse_timestamp, Scalar, ScalarKind, ValueError};

/// SQLite handle. The DSN is a file path, `:memory:`, or a `file:` URI.
pub struct SqliteConnection {
    conn: Connection,
}

/// Open an existing database read-only. A missing file is a connection error
/// rather than a fresh empty database.
pub fn open(dsn: &str) -> Result<Box<dyn DbConnection>, ChartError> {
    let in_memory = dsn == ":memory:" || dsn.contains("mode=memory");
    let mode = if in_memory {
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
    } else {
        OpenFlags::SQLITE_OPEN_READ_ONLY
    };
    let flags = mode | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI;
    let conn = Connection::open_with_flags(dsn, flags)
        .map_err(|e| ChartError::connection(format!("open sqlite {dsn}"), e))?;
    Ok(Box::new(SqliteConnection { conn }))
}

impl SqliteConnection {
    /// Wrap a connection the caller already opened (and possibly populated).
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }
}

/// Map a declared column type to a scan target, following SQLite's affinity
/// rules with date/time names singled out. Expression columns have no
/// declared type and decode from their storage class.
pub fn kind_for_decl_type(decl: Option<&str>) -> ScalarKind {
    let Some(decl) = decl else {
        return ScalarKind::Opaque;
    };
    let t = decl.to_ascii_uppercase();
    if t.contains("TIMESTAMP") || t.contains("DATETIME") {
        ScalarKind::Timestamp
    } else if t.contains("DATE") {
        ScalarKind::Date
    } else if t.contains("BOOL") {
        ScalarKind::Boolean
    } else if t.contains("INT") {
        ScalarKind::Integer
    } else if t.contains("CHAR") || t.contains("CLOB") || t.contains("TEXT") {
        ScalarKind::Text
    } else if t.contains("REAL")
        || t.contains("FLOA")
        || t.contains("DOUB")
        || t.contains("NUMERIC")
        || t.contains("DECIMAL")
    {
        ScalarKind::Float
    } else {
        ScalarKind::Opaque
    }
}

/// Scan one value into the variant its column kind asks for.
///
/// Declared types are only hints in SQLite: a `DATE` column holding a time
/// of day decodes as a timestamp instead of losing the time.
pub fn scan_value(kind: ScalarKind, value: ValueRef<'_>) -> Result<Scalar, ValueError> {
    match value {
        ValueRef::Null => Ok(Scalar::Null),
        ValueRef::Integer(v) if kind == ScalarKind::Date && v % 86_400 != 0 => {
            Scalar::from_i64(ScalarKind::Timestamp, v)
        }
        ValueRef::Integer(v) => Scalar::from_i64(kind, v),
        ValueRef::Real(v) => Scalar::from_f64(kind, v),
        ValueRef::Text(bytes) => match kind {
            ScalarKind::Opaque => std::str::from_utf8(bytes)
                .map(|s| Scalar::Text(s.to_string()))
                .map_err(|_| ValueError::Utf8),
            ScalarKind::Date => Scalar::parse_bytes(kind, bytes).or_else(|err| {
                std::str::from_utf8(bytes)
                    .ok()
                    .and_then(parse_timestamp)
                    .map(Scalar::Timestamp)
                    .ok_or(err)
            }),
            _ => Scalar::parse_bytes(kind, bytes),
        },
        ValueRef::Blob(bytes) => match kind {
            ScalarKind::Opaque => Ok(Scalar::Bytes(bytes.to_vec())),
            ScalarKind::Text => Scalar::parse_bytes(kind, bytes),
            _ => Err(ValueError::Mismatch {
                kind,
                found: "blob",
            }),
        },
    }
}

impl DbConnection for SqliteConnection {
    fn driver(&self) -> &str {
        SQLITE
    }

    fn ping(&mut self) -> Result<(), ChartError> {
        self.conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(|e| ChartError::connection("ping sqlite", e))
    }

    fn execute(&mut self, sql: &str, sink: &mut dyn RowSink) -> Result<(), ChartError> {
        let mut stmt = self.conn.prepare(sql).map_err(ChartError::query)?;

        let columns: Vec<ColumnDescriptor> = stmt
            .columns()
            .iter()
            .map(|c| {
                let decl = c.decl_type();
                ColumnDescriptor::new(c.name(), decl.unwrap_or(""), kind_for_decl_type(decl))
            })
            .collect();
        sink.columns(&columns)?;

        let mut rows = stmt.query([]).map_err(ChartError::query)?;
        let mut idx = 0usize;
        while let Some(row) = rows.next().map_err(ChartError::query)? {
            let mut values = Vec::with_capacity(columns.len());
            for (i, col) in columns.iter().enumerate() {
                let raw = row.get_ref(i).map_err(ChartError::metadata)?;
                let value = scan_value(col.kind, raw)
                    .map_err(|e| ChartError::scan(idx, col.name.as_str(), e))?;
                values.push(value);
            }
            sink.row(RawRow::new(values))?;
            idx += 1;
        }
        Ok(())
    }
}

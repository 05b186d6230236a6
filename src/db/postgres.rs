use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use postgres::types::{FromSql, Type};
use postgres::{Client, NoTls, Row};
use rust_decimal::Decimal;

use crate::db::{DbConnection, RowSink, POSTGRES};
use crate::decode::{ColumnDescriptor, RawRow};
use crate::error::{BoxError, ChartError};
use crate::value::{Scalar, ScalarKind};

/// Blocking PostgreSQL handle. The DSN is a libpq-style key/value string or a
/// `postgres://` URL. Must not be used from inside an async runtime thread.
pub struct PostgresConnection {
    client: Client,
}

pub fn open(dsn: &str) -> Result<Box<dyn DbConnection>, ChartError> {
    let client =
        Client::connect(dsn, NoTls).map_err(|e| ChartError::connection("connect postgres", e))?;
    Ok(Box::new(PostgresConnection { client }))
}

/// Scan target for a statement column type.
pub fn kind_for_type(ty: &Type) -> ScalarKind {
    match *ty {
        Type::BOOL => ScalarKind::Boolean,
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => ScalarKind::Integer,
        Type::FLOAT4 | Type::FLOAT8 => ScalarKind::Float,
        Type::NUMERIC => ScalarKind::Decimal,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => ScalarKind::Text,
        Type::DATE => ScalarKind::Date,
        Type::TIMESTAMP | Type::TIMESTAMPTZ => ScalarKind::Timestamp,
        _ => ScalarKind::Opaque,
    }
}

/// Raw wire bytes for types without a static mapping.
struct RawValue(Vec<u8>);

impl<'a> FromSql<'a> for RawValue {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(Self(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn get<'a, T, F>(row: &'a Row, idx: usize, wrap: F) -> Result<Scalar, postgres::Error>
where
    T: FromSql<'a>,
    F: FnOnce(T) -> Scalar,
{
    Ok(row.try_get::<_, Option<T>>(idx)?.map_or(Scalar::Null, wrap))
}

fn scan_value(row: &Row, idx: usize, ty: &Type, kind: ScalarKind) -> Result<Scalar, postgres::Error> {
    match (kind, ty) {
        (ScalarKind::Boolean, _) => get::<bool, _>(row, idx, Scalar::Bool),
        (ScalarKind::Integer, &Type::INT2) => get::<i16, _>(row, idx, |v| Scalar::Int(v.into())),
        (ScalarKind::Integer, &Type::INT4) => get::<i32, _>(row, idx, |v| Scalar::Int(v.into())),
        (ScalarKind::Integer, &Type::OID) => get::<u32, _>(row, idx, |v| Scalar::Int(v.into())),
        (ScalarKind::Integer, _) => get::<i64, _>(row, idx, Scalar::Int),
        (ScalarKind::Float, &Type::FLOAT4) => get::<f32, _>(row, idx, |v| Scalar::Float(v.into())),
        (ScalarKind::Float, _) => get::<f64, _>(row, idx, Scalar::Float),
        (ScalarKind::Decimal, _) => get::<Decimal, _>(row, idx, Scalar::Decimal),
        (ScalarKind::Text, _) => get::<String, _>(row, idx, Scalar::Text),
        (ScalarKind::Date, _) => get::<NaiveDate, _>(row, idx, Scalar::Date),
        (ScalarKind::Timestamp, &Type::TIMESTAMPTZ) => {
            get::<DateTime<Utc>, _>(row, idx, |v| Scalar::Timestamp(v.naive_utc()))
        }
        (ScalarKind::Timestamp, _) => get::<NaiveDateTime, _>(row, idx, Scalar::Timestamp),
        (ScalarKind::Opaque, _) => get::<RawValue, _>(row, idx, |v| Scalar::Bytes(v.0)),
    }
}

impl DbConnection for PostgresConnection {
    fn driver(&self) -> &str {
        POSTGRES
    }

    fn ping(&mut self) -> Result<(), ChartError> {
        self.client
            .simple_query("SELECT 1")
            .map(|_| ())
            .map_err(|e| ChartError::connection("ping postgres", e))
    }

    fn execute(&mut self, sql: &str, sink: &mut dyn RowSink) -> Result<(), ChartError> {
        let stmt = self.client.prepare(sql).map_err(ChartError::query)?;

        let types: Vec<Type> = stmt.columns().iter().map(|c| c.type_().clone()).collect();
        let columns: Vec<ColumnDescriptor> = stmt
            .columns()
            .iter()
            .map(|c| ColumnDescriptor::new(c.name(), c.type_().name(), kind_for_type(c.type_())))
            .collect();
        sink.columns(&columns)?;

        let rows = self.client.query(&stmt, &[]).map_err(ChartError::query)?;
        for (idx, row) in rows.iter().enumerate() {
            let mut values = Vec::with_capacity(columns.len());
            for (i, (col, ty)) in columns.iter().zip(&types).enumerate() {
                let value = scan_value(row, i, ty, col.kind)
                    .map_err(|e| ChartError::scan(idx, col.name.as_str(), e))?;
                values.push(value);
            }
            sink.row(RawRow::new(values))?;
        }
        Ok(())
    }
}

use std::io::{BufRead, BufReader};
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Url;
use serde_json::Value;

use crate::db::{DbConnection, RowSink, CLICKHOUSE};
use crate::decode::{ColumnDescriptor, RawRow};
use crate::error::ChartError;
use crate::value::{Scalar, ScalarKind, ValueError};

/// Output format requested through the `default_format` setting, so the query
/// text itself is sent untouched. The first two lines carry names and types.
const FORMAT: &str = "JSONCompactEachRowWithNamesAndTypes";
const DEFAULT_HTTP_PORT: u16 = 8123;
const DEFAULT_HTTPS_PORT: u16 = 8443;
const PING_TIMEOUT: Duration = Duration::from_secs(10);
/// Sent when the DSN carries a password but no user name.
const DEFAULT_USER: &str = "default";

/// ClickHouse reached over its HTTP interface.
///
/// DSN: `http(s)://[user[:password]@]host[:port]/[?database=db&setting=value]`.
/// `clickhouse://` is accepted as an alias for `http://`.
pub struct ClickhouseConnection {
    http: Client,
    endpoint: Url,
    user: Option<String>,
    password: Option<String>,
}

pub fn open(dsn: &str) -> Result<Box<dyn DbConnection>, ChartError> {
    ClickhouseConnection::new(dsn).map(|conn| Box::new(conn) as Box<dyn DbConnection>)
}

impl ClickhouseConnection {
    pub fn new(dsn: &str) -> Result<Self, ChartError> {
        let (endpoint, user, password) = parse_endpoint(dsn)?;
        // Queries run as long as the server lets them; only the ping has a deadline.
        let http = Client::builder()
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| ChartError::connection("build clickhouse http client", e))?;
        Ok(Self {
            http,
            endpoint,
            user,
            password,
        })
    }
}

/// Split a DSN into the bare endpoint and its credentials.
fn parse_endpoint(dsn: &str) -> Result<(Url, Option<String>, Option<String>), ChartError> {
    let normalized = match dsn.strip_prefix("clickhouse://") {
        Some(rest) => format!("http://{rest}"),
        None => dsn.to_string(),
    };
    let mut url = Url::parse(&normalized)
        .map_err(|e| ChartError::Config(format!("invalid clickhouse dsn: {e}")))?;

    let default_port = match url.scheme() {
        "http" => DEFAULT_HTTP_PORT,
        "https" => DEFAULT_HTTPS_PORT,
        other => {
            return Err(ChartError::Config(format!(
                "unsupported clickhouse scheme {other:?}; use http://host:{DEFAULT_HTTP_PORT}"
            )))
        }
    };
    if url.port().is_none() && url.set_port(Some(default_port)).is_err() {
        return Err(ChartError::Config(format!("clickhouse dsn has no host: {dsn}")));
    }

    let password = url.password().map(str::to_string);
    let user = Some(url.username().to_string())
        .filter(|u| !u.is_empty())
        .or_else(|| password.as_ref().map(|_| DEFAULT_USER.to_string()));
    // Both setters only fail for URLs that cannot carry credentials, which
    // were rejected above.
    let _ = url.set_username("");
    let _ = url.set_password(None);

    Ok((url, user, password))
}

/// Scan target for a ClickHouse type name; `Nullable(..)` and
/// `LowCardinality(..)` wrappers are looked through.
pub fn kind_for_type(type_name: &str) -> ScalarKind {
    let mut t = type_name.trim();
    while let Some(inner) = ["Nullable(", "LowCardinality("]
        .iter()
        .find_map(|p| t.strip_prefix(p).and_then(|r| r.strip_suffix(')')))
    {
        t = inner;
    }

    if t.starts_with("Float") {
        ScalarKind::Float
    } else if t.starts_with("Int") || t.starts_with("UInt") {
        ScalarKind::Integer
    } else if t.starts_with("Decimal") {
        ScalarKind::Decimal
    } else if t == "Bool" {
        ScalarKind::Boolean
    } else if t.starts_with("DateTime") {
        ScalarKind::Timestamp
    } else if t == "Date" || t == "Date32" {
        ScalarKind::Date
    } else if t.starts_with("String")
        || t.starts_with("FixedString")
        || t.starts_with("Enum")
        || t == "UUID"
    {
        ScalarKind::Text
    } else {
        ScalarKind::Opaque
    }
}

/// Scan one JSON cell. 64-bit integers arrive quoted and go through the
/// textual path like every other string.
pub fn scan_value(kind: ScalarKind, value: Value) -> Result<Scalar, ValueError> {
    match value {
        Value::Null => Ok(Scalar::Null),
        Value::Bool(b) => match kind {
            ScalarKind::Boolean | ScalarKind::Opaque => Ok(Scalar::Bool(b)),
            ScalarKind::Integer => Ok(Scalar::Int(i64::from(b))),
            _ => Err(ValueError::Mismatch {
                kind,
                found: "boolean",
            }),
        },
        Value::Number(n) => {
            if kind == ScalarKind::Decimal {
                Scalar::parse(kind, &n.to_string())
            } else if let Some(i) = n.as_i64() {
                Scalar::from_i64(kind, i)
            } else if let Some(f) = n.as_f64().filter(|_| !n.is_u64()) {
                Scalar::from_f64(kind, f)
            } else {
                Err(ValueError::Invalid {
                    kind,
                    text: n.to_string(),
                })
            }
        }
        Value::String(s) => Scalar::parse(kind, &s),
        other @ (Value::Array(_) | Value::Object(_)) => match kind {
            ScalarKind::Text | ScalarKind::Opaque => Ok(Scalar::Text(other.to_string())),
            _ => Err(ValueError::Mismatch {
                kind,
                found: if other.is_array() { "array" } else { "object" },
            }),
        },
    }
}

fn read_header<I>(lines: &mut I, what: &str) -> Result<Vec<String>, ChartError>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    let line = lines
        .next()
        .ok_or_else(|| ChartError::metadata(format!("clickhouse response has no {what} header")))?
        .map_err(ChartError::metadata)?;
    serde_json::from_str(&line).map_err(|e| {
        ChartError::metadata(format!("unreadable clickhouse {what} header {line:?}: {e}"))
    })
}

/// Decode a `JSONCompactEachRowWithNamesAndTypes` body.
pub fn decode_stream<R: BufRead>(reader: R, sink: &mut dyn RowSink) -> Result<(), ChartError> {
    let mut lines = reader.lines();
    let names = read_header(&mut lines, "names")?;
    let types = read_header(&mut lines, "types")?;
    if names.len() != types.len() {
        return Err(ChartError::metadata(format!(
            "clickhouse returned {} names but {} types",
            names.len(),
            types.len()
        )));
    }

    let columns: Vec<ColumnDescriptor> = names
        .into_iter()
        .zip(types)
        .map(|(name, ty)| {
            let kind = kind_for_type(&ty);
            ColumnDescriptor::new(name, ty, kind)
        })
        .collect();
    sink.columns(&columns)?;

    let mut idx = 0usize;
    for line in lines {
        let line = line.map_err(ChartError::query)?;
        if line.trim().is_empty() {
            continue;
        }
        // Errors raised after the headers were flushed show up inline.
        let cells: Vec<Value> = serde_json::from_str(&line)
            .map_err(|_| ChartError::query(format!("clickhouse: {}", line.trim())))?;
        if cells.len() != columns.len() {
            return Err(ChartError::metadata(format!(
                "row {idx} has {} value(s), expected {}",
                cells.len(),
                columns.len()
            )));
        }
        let values = columns
            .iter()
            .zip(cells)
            .map(|(col, cell)| {
                scan_value(col.kind, cell).map_err(|e| ChartError::scan(idx, col.name.as_str(), e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        sink.row(RawRow::new(values))?;
        idx += 1;
    }
    Ok(())
}

impl ClickhouseConnection {
    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.user {
            Some(user) => req.basic_auth(user, self.password.as_ref()),
            None => req,
        }
    }

    fn ping_request(&self) -> Result<RequestBuilder, ChartError> {
        let url = self
            .endpoint
            .join("/ping")
            .map_err(|e| ChartError::connection("ping clickhouse", e))?;
        Ok(self.http.get(url).timeout(PING_TIMEOUT))
    }

    fn query_request(&self, sql: &str) -> RequestBuilder {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("default_format", FORMAT);
        self.authed(self.http.post(url).body(sql.to_string()))
    }
}

impl DbConnection for ClickhouseConnection {
    fn driver(&self) -> &str {
        CLICKHOUSE
    }

    fn ping(&mut self) -> Result<(), ChartError> {
        let resp = self
            .ping_request()?
            .send()
            .map_err(|e| ChartError::connection("ping clickhouse", e))?;
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        if status.is_success() && body.trim() == "Ok." {
            Ok(())
        } else {
            Err(ChartError::connection(
                "ping clickhouse",
                format!("unexpected reply {status}: {}", body.trim()),
            ))
        }
    }

    fn execute(&mut self, sql: &str, sink: &mut dyn RowSink) -> Result<(), ChartError> {
        let resp = self
            .query_request(sql)
            .send()
            .map_err(ChartError::query)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(ChartError::query(format!("clickhouse returned {status}: {}", body.trim())));
        }
        decode_stream(BufReader::new(resp), sink)
    }
}

//! Turn the result of an arbitrary SQL query into a candlestick chart.
//!
//! The first five result columns are read positionally: a category (usually a
//! date or timestamp) followed by the four OHLC values. Column types are
//! discovered at run time, so any query shape works as long as it has at
//! least five columns.

pub mod axis;
pub mod chart;
pub mod client;
pub mod config;
pub mod db;
pub mod decode;
pub mod error;
pub mod indicators;
pub mod server;
pub mod value;

pub use axis::{build, AxisValues, OhlcTuple};
pub use chart::{ChartStyle, ChartTemplate, KlineChart, Overlay};
pub use client::{fetch_axis_value, open_connection, Client, ConnectionSpec};
pub use db::pool::{open_pool, DbPool};
pub use db::{DbConnection, DriverRegistry, RowSink, CLICKHOUSE, MYSQL, POSTGRES, SQLITE};
pub use decode::{decode, ColumnDescriptor, RawRow};
pub use error::ChartError;
pub use server::{serve_chart, AxisSource, ChartServer, ChartSource};
pub use value::{Scalar, ScalarKind};

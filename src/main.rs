use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sql_candlestick::chart::{ChartTemplate, Overlay};
use sql_candlestick::config::ServeConfig;
use sql_candlestick::db::pool::open_pool;
use sql_candlestick::server::{AxisSource, ChartServer, ChartSource};
use sql_candlestick::DriverRegistry;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Every flag overrides the matching SQLCANDLE_* environment variable.
#[derive(Parser)]
#[command(
    name = "sql-candlestick",
    version,
    about = "Serve a candlestick chart built from a SQL query"
)]
struct Cli {
    /// Database driver: clickhouse, postgres, mysql or sqlite
    #[arg(long)]
    driver: Option<String>,

    /// Data source name for the driver
    #[arg(long)]
    dsn: Option<String>,

    /// Query returning time, open, close, high, low as its first five columns
    #[arg(long, conflicts_with = "query_file")]
    query: Option<String>,

    /// Read the query from a file
    #[arg(long)]
    query_file: Option<PathBuf>,

    /// Listen address; a bare ":port" binds all interfaces
    #[arg(long)]
    addr: Option<String>,

    /// Maximum pooled database connections
    #[arg(long)]
    pool_size: Option<u32>,

    /// Run the query once at startup and serve that chart on every request
    #[arg(long)]
    prebuilt: bool,

    /// Overlay a simple moving average of the close over N candles
    #[arg(long, value_name = "N")]
    sma: Option<usize>,

    /// Overlay an exponential moving average of the close over N candles
    #[arg(long, value_name = "N")]
    ema: Option<usize>,

    /// ECharts theme ("white" for none)
    #[arg(long)]
    theme: Option<String>,

    /// Page and chart title
    #[arg(long)]
    title: Option<String>,
}

impl Cli {
    fn apply(self, cfg: &mut ServeConfig) -> anyhow::Result<()> {
        if let Some(path) = &self.query_file {
            let sql = std::fs::read_to_string(path)
                .with_context(|| format!("read query file {}", path.display()))?;
            cfg.query = Some(sql);
        }
        if self.query.is_some() {
            cfg.query = self.query;
        }
        if self.driver.is_some() {
            cfg.driver = self.driver;
        }
        if self.dsn.is_some() {
            cfg.dsn = self.dsn;
        }
        if let Some(addr) = self.addr {
            cfg.addr = addr;
        }
        if let Some(n) = self.pool_size {
            cfg.pool_size = n;
        }
        if let Some(theme) = self.theme {
            cfg.theme = theme;
        }
        if let Some(title) = self.title {
            cfg.title = title;
        }
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let prebuilt = cli.prebuilt;
    let overlays: Vec<Overlay> = cli
        .sma
        .map(Overlay::Sma)
        .into_iter()
        .chain(cli.ema.map(Overlay::Ema))
        .collect();

    let mut cfg = ServeConfig::from_env();
    cli.apply(&mut cfg)?;

    let spec = cfg.connection_spec().context("database connection settings")?;
    let query = cfg.query().context("chart query")?.to_string();

    // Blocking drivers connect here, outside any async runtime.
    let pool = open_pool(
        Arc::new(DriverRegistry::builtin()),
        spec,
        cfg.pool_size,
        cfg.connect_timeout(),
    )
    .context("open database pool")?;
    let source: Arc<dyn AxisSource> = Arc::new(pool);

    let template = overlays
        .into_iter()
        .fold(ChartTemplate::new(cfg.chart_style()), ChartTemplate::with_overlay);

    let chart = if prebuilt {
        let axis = source
            .fetch_axis_value(&query)
            .context("prebuild chart")?;
        tracing::info!(points = axis.len(), "chart prebuilt");
        ChartSource::Prebuilt(template.build(axis))
    } else {
        ChartSource::Default(template)
    };

    let server = ChartServer::new(source, query, chart);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start tokio runtime")?;
    runtime
        .block_on(server.serve(&cfg.addr))
        .with_context(|| format!("serve on {}", cfg.addr))?;
    Ok(())
}

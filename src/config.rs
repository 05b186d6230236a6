use std::time::Duration;

use crate::chart::ChartStyle;
use crate::client::ConnectionSpec;
use crate::error::ChartError;
use crate::server::DEFAULT_ADDR;

/// Server configuration derived from `SQLCANDLE_*` environment variables.
///
/// Command-line flags are applied on top by the binary.
#[derive(Debug, Clone, PartialEq)]
pub struct ServeConfig {
    pub driver: Option<String>,
    /// Usually carries credentials; never logged.
    pub dsn: Option<String>,
    pub query: Option<String>,
    pub addr: String,
    pub pool_size: u32,
    pub connect_timeout_ms: u64,
    pub theme: String,
    pub title: String,
}

struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn opt_str(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn str(&self, name: &str, default: &str) -> String {
        self.opt_str(name).unwrap_or_else(|| default.to_string())
    }

    fn u32(&self, name: &str, default: u32) -> u32 {
        (self.lookup)(name)
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(default)
    }

    fn u64(&self, name: &str, default: u64) -> u64 {
        (self.lookup)(name)
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(default)
    }
}

impl ServeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let env = Env { lookup };
        let style = ChartStyle::default();
        Self {
            driver: env.opt_str("SQLCANDLE_DRIVER"),
            dsn: env.opt_str("SQLCANDLE_DSN"),
            query: env.opt_str("SQLCANDLE_QUERY"),
            addr: env.str("SQLCANDLE_ADDR", DEFAULT_ADDR),
            pool_size: env.u32("SQLCANDLE_POOL_SIZE", 4),
            connect_timeout_ms: env.u64("SQLCANDLE_CONNECT_TIMEOUT_MS", 5_000),
            theme: env.str("SQLCANDLE_THEME", &style.theme),
            title: env.str("SQLCANDLE_TITLE", &style.title),
        }
    }

    pub fn connection_spec(&self) -> Result<ConnectionSpec, ChartError> {
        ConnectionSpec::new(
            self.driver.clone().unwrap_or_default(),
            self.dsn.clone().unwrap_or_default(),
        )
    }

    pub fn query(&self) -> Result<&str, ChartError> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| {
                ChartError::Config("no query given; set SQLCANDLE_QUERY or pass --query".to_string())
            })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.max(1))
    }

    pub fn chart_style(&self) -> ChartStyle {
        ChartStyle {
            page_title: self.title.clone(),
            title: self.title.clone(),
            theme: self.theme.clone(),
            ..ChartStyle::default()
        }
    }
}

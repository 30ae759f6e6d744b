//! Server configuration.
//!
//! Everything an instance needs is carried explicitly in [`ServerConfig`],
//! including the log sink used for panic reports, which defaults to a
//! tracing-backed sink rather than any global mutable state.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::core::{Error, Result};
use crate::template::TemplateEngine;

/// Destination for panic reports and flush failures: a formatted line per
/// incident.
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Default sink: forwards to `tracing` at ERROR level with target
/// `"recovery"`.
pub fn default_log_sink() -> LogSink {
    Arc::new(|message: &str| tracing::error!(target: "recovery", "{}", message))
}

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Listen address.
    pub addr: SocketAddr,
    /// Number of accept loop workers. 0 = auto-detect from CPU cores.
    pub num_workers: usize,
    /// Sink receiving panic reports from the recovery middleware.
    pub log_sink: LogSink,
    /// Template engine exposed through `Context::render`, if any.
    pub template: Option<Arc<dyn TemplateEngine>>,
}

impl ServerConfig {
    /// Create a configuration listening on `addr` with defaults everywhere
    /// else (auto-detected workers, tracing log sink, no template engine).
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            num_workers: 0,
            log_sink: default_log_sink(),
            template: None,
        }
    }

    /// Set the number of accept loop workers (0 = auto-detect).
    pub fn with_workers(mut self, num: usize) -> Self {
        self.num_workers = num;
        self
    }

    /// Replace the log sink.
    pub fn with_log_sink(mut self, sink: LogSink) -> Self {
        self.log_sink = sink;
        self
    }

    /// Attach a template engine.
    pub fn with_template_engine(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
        self.template = Some(engine);
        self
    }

    /// Load configuration from environment variables.
    ///
    /// `LISTEN_ADDR` (default `0.0.0.0:8080`) and `WEB_WORKERS` (default 0,
    /// auto-detect) are recognized.
    pub fn from_env() -> Result<Self> {
        let addr_raw = env_or("LISTEN_ADDR", "0.0.0.0:8080");
        let addr: SocketAddr = addr_raw.parse().map_err(|e| Error::Config {
            key: "LISTEN_ADDR".into(),
            message: format!("'{}': {}", addr_raw, e),
        })?;

        let workers_raw = env_or("WEB_WORKERS", "0");
        let num_workers: usize = workers_raw.parse().map_err(|e| Error::Config {
            key: "WEB_WORKERS".into(),
            message: format!("'{}': {}", workers_raw, e),
        })?;

        Ok(Self::new(addr).with_workers(num_workers))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(
            "0.0.0.0:8080"
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 8080))),
        )
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("addr", &self.addr)
            .field("num_workers", &self.num_workers)
            .field("template", &self.template.is_some())
            .finish()
    }
}

/// Get environment variable with default value.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

//! Access logging middleware.
//!
//! Emits one structured event per request at INFO level with target
//! `"access"`, after the rest of the chain has produced the pending
//! response. Attach it globally or to a group with `use_middleware`.

use std::sync::Arc;

use super::{Handler, Middleware};

/// Access log middleware configuration.
#[derive(Clone, Debug)]
pub struct AccessLogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,
    /// Include the matched route pattern in the event.
    pub include_pattern: bool,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include_pattern: true,
        }
    }
}

/// Access logging middleware.
pub struct AccessLogMiddleware {
    config: AccessLogConfig,
}

impl AccessLogMiddleware {
    /// Create with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from configuration.
    pub fn from_config(config: AccessLogConfig) -> Self {
        Self { config }
    }

    /// Create with enabled/disabled state.
    pub fn with_enabled(enabled: bool) -> Self {
        Self {
            config: AccessLogConfig {
                enabled,
                ..Default::default()
            },
        }
    }
}

impl Default for AccessLogMiddleware {
    fn default() -> Self {
        Self {
            config: AccessLogConfig::default(),
        }
    }
}

impl Middleware for AccessLogMiddleware {
    fn name(&self) -> &'static str {
        "access_log"
    }

    fn wrap(&self, next: Handler) -> Handler {
        let config = self.config.clone();
        Arc::new(move |ctx| {
            next(ctx);

            if !config.enabled {
                return;
            }

            let status = ctx.response().status().as_u16();
            let pattern = if config.include_pattern {
                ctx.pattern().unwrap_or("-")
            } else {
                "-"
            };
            let ip = ctx
                .request()
                .remote_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_default();

            tracing::info!(
                target: "access",
                method = %ctx.method(),
                path = ctx.path(),
                pattern = pattern,
                status = status,
                bytes = ctx.response().body_len() as u64,
                duration_ms = ctx.elapsed_ms(),
                ip = ip.as_str(),
                host = ctx.request().host().unwrap_or("-"),
                "{} {} {}",
                ctx.method(),
                ctx.path(),
                status
            );
        })
    }
}

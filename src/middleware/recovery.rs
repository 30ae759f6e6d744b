//! Panic recovery middleware (internal, always outermost).

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use http::StatusCode;

use super::{Handler, Middleware};
use crate::config::LogSink;
use crate::core::static_bodies;

/// Catches panics from anything below it in the chain.
///
/// On a panic the client gets a 500 with a fixed, safe-to-disclose body;
/// the panic payload and a captured backtrace go to the configured log sink
/// only. The panic never propagates past this layer.
pub(crate) struct RecoveryMiddleware {
    sink: LogSink,
}

impl RecoveryMiddleware {
    pub(crate) fn new(sink: LogSink) -> Self {
        Self { sink }
    }
}

impl Middleware for RecoveryMiddleware {
    fn name(&self) -> &'static str {
        "recovery"
    }

    fn wrap(&self, next: Handler) -> Handler {
        let sink = Arc::clone(&self.sink);
        Arc::new(move |ctx| {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| next(ctx))) {
                ctx.set_status(StatusCode::INTERNAL_SERVER_ERROR);
                ctx.set_body(static_bodies::INTERNAL_ERROR.clone());

                let trace = Backtrace::force_capture();
                sink(&format!(
                    "recovered from panic while handling {} {}: {}\nTraceback:\n{}",
                    ctx.method(),
                    ctx.path(),
                    panic_message(payload.as_ref()),
                    trace
                ));

                // The unwind skipped the flush middleware's commit; finish it
                // here so the 500 still reaches the client. Context::flush
                // stays the single write point and ignores repeat calls.
                if let Err(e) = ctx.flush() {
                    tracing::error!(error = %e, "failed to flush panic response");
                }
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic payload"
    }
}

//! Response flush middleware (internal, innermost of the internal pair).

use std::sync::Arc;

use super::{Handler, Middleware};

/// Commits the pending response after the rest of the chain returns.
///
/// Runs as the inner of the two internal layers, so every route (the
/// synthetic not-found handler included) gets its response written without
/// any handler having to think about it. A flush I/O failure is fatal for the
/// request: headers may already be on the wire, so it is logged and not
/// retried.
pub(crate) struct FlushMiddleware;

impl Middleware for FlushMiddleware {
    fn name(&self) -> &'static str {
        "flush"
    }

    fn wrap(&self, next: Handler) -> Handler {
        Arc::new(move |ctx| {
            next(ctx);
            if let Err(e) = ctx.flush() {
                tracing::error!(
                    error = %e,
                    method = %ctx.method(),
                    path = ctx.path(),
                    "failed to flush response"
                );
            }
        })
    }
}

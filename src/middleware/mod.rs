//! Middleware: pure decorators composed around a terminal handler.
//!
//! A middleware takes the next handler and returns a new handler: code
//! before calling `next` runs on the way in, code after runs on the way out.
//!
//! ```text
//! Request → Recovery → Flush → user A → user B → Handler
//!                                                   ↓
//! Response ← Recovery ← Flush ← user A ← user B ←──┘
//! ```
//!
//! User middleware attaches to route groups; the framework always wraps the
//! composed result in its internal pair (panic recovery outermost, response
//! flush inside it) so a response is produced exactly once even when user
//! code panics or forgets to finalize.
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_web::middleware::{from_fn, Handler};
//! use std::sync::Arc;
//!
//! let timing = from_fn(|next: Handler| -> Handler {
//!     Arc::new(move |ctx| {
//!         let start = std::time::Instant::now();
//!         next(ctx);
//!         tracing::debug!(elapsed_us = start.elapsed().as_micros() as u64, "handled");
//!     })
//! });
//! ```

mod chain;
mod flush;
mod recovery;

pub mod access_log;

pub use access_log::AccessLogMiddleware;
pub use chain::{build_chain, compose};
pub(crate) use flush::FlushMiddleware;
pub(crate) use recovery::RecoveryMiddleware;

use std::sync::Arc;

use crate::core::Context;

/// Terminal request handler.
///
/// Handlers return nothing; they communicate through [`Context`] mutation
/// (status, headers, body) only.
pub type Handler = Arc<dyn Fn(&mut Context) + Send + Sync>;

/// Build a [`Handler`] from a closure.
pub fn handler_fn<F>(f: F) -> Handler
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A composable request/response decorator.
///
/// Implementations must be stateless beyond closed-over configuration: the
/// same middleware value wraps many chains and runs on many requests
/// concurrently.
pub trait Middleware: Send + Sync {
    /// Name used in logs and debugging.
    fn name(&self) -> &'static str {
        "middleware"
    }

    /// Wrap the next handler, returning the decorated handler.
    fn wrap(&self, next: Handler) -> Handler;
}

struct FnMiddleware<F> {
    f: F,
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(Handler) -> Handler + Send + Sync,
{
    fn name(&self) -> &'static str {
        "fn"
    }

    fn wrap(&self, next: Handler) -> Handler {
        (self.f)(next)
    }
}

/// Build a [`Middleware`] from a decorator closure.
pub fn from_fn<F>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    Arc::new(FnMiddleware { f })
}

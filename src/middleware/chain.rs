//! Chain composition.

use std::sync::Arc;

use super::{Handler, Middleware};

/// Compose a middleware list around a handler.
///
/// Declaration order is execution order: the first middleware in the slice
/// ends up outermost. Composition wraps right-to-left, so the last
/// middleware is applied to the handler first.
pub fn compose(handler: Handler, middleware: &[Arc<dyn Middleware>]) -> Handler {
    let mut handler = handler;
    for mw in middleware.iter().rev() {
        handler = mw.wrap(handler);
    }
    handler
}

/// Build the full chain for one request.
///
/// Group middleware wraps the terminal handler first; the internal list then
/// wraps the result, which keeps recovery and flush outermost no matter what
/// the user registered.
pub fn build_chain(
    handler: Handler,
    group: &[Arc<dyn Middleware>],
    internal: &[Arc<dyn Middleware>],
) -> Handler {
    compose(compose(handler, group), internal)
}

//! Core types for the request/response lifecycle.
//!
//! This module provides the fundamental types threaded through routing and
//! the middleware chain:
//!
//! - [`Request`] - buffered HTTP request abstraction
//! - [`Response`] - pending response mutated by handlers
//! - [`Context`] - per-request state and responder API
//! - [`ResponseWriter`] / [`BufferedWriter`] - the transport write seam
//! - [`Error`] - core error types
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_web::core::Context;
//! use http::StatusCode;
//!
//! fn handle(ctx: &mut Context) {
//!     let id = ctx.param("id").unwrap_or("unknown").to_string();
//!     ctx.text(StatusCode::OK, format!("user {}", id));
//! }
//! ```

mod context;
mod error;
mod request;
mod response;

pub use context::Context;
pub use error::{Error, Result};
pub use request::Request;
pub use response::{BufferedWriter, Response, ResponseWriter};

pub(crate) use response::static_bodies;

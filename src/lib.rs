//! tokio_web - Embeddable HTTP router and middleware pipeline for Tokio.
//!
//! This crate provides a method-keyed routing trie, group-scoped middleware
//! composition, and a per-request context, hosted on hyper for HTTP/1.1 and
//! HTTP/2.
//!
//! # Features
//!
//! - **Trie routing**: static segments, `:name` parameters, and greedy
//!   `*name` trailing wildcards, with static > param > wildcard priority
//!   and conflict detection at registration time
//! - **Route groups**: hierarchical prefixes with inherited, independently
//!   extensible middleware lists
//! - **Onion middleware**: pure decorators composed around the handler,
//!   with framework recovery and flush layers always outermost
//! - **Panic safety**: a panicking handler becomes a 500 with a safe body;
//!   the panic detail goes to a configurable log sink
//! - **Collaborator seams**: sessions, template rendering, and sandboxed
//!   static files plug in behind small traits
//!
//! # Architecture
//!
//! A request flows through a fixed lifecycle: context creation → trie
//! lookup → parameter binding → group middleware resolution → chain
//! execution → exactly-once response flush. Routes and groups are written
//! during setup only and served lock-free behind `Arc`.
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_web::{Server, ServerConfig};
//! use http::StatusCode;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     tokio_web::logging::init("my-service");
//!
//!     let mut server = Server::new(ServerConfig::from_env().expect("config"));
//!     server.get("/user/:id", |ctx| {
//!         let id = ctx.param("id").unwrap_or("unknown").to_string();
//!         ctx.json(StatusCode::OK, &serde_json::json!({ "id": id })).ok();
//!     }).expect("route");
//!
//!     server.run().await
//! }
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod config;
pub mod core;
pub mod group;
pub mod logging;
pub mod middleware;
pub mod router;
pub mod server;
pub mod session;
pub mod static_files;
pub mod template;

// Re-exports for convenience
pub use config::{LogSink, ServerConfig};
pub use core::Context;
pub use group::RouteGroup;
pub use middleware::{Handler, Middleware};
pub use server::Server;
pub use static_files::StaticFileHandler;

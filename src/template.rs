//! Template engine contract.
//!
//! Rendering is a collaborator concern: the framework defines the seam and
//! wires a configured engine into `Context::render`, but ships no template
//! language of its own. Engines are free to keep parsed templates cached
//! internally; `render` takes `&self` and must be callable concurrently.

use bytes::Bytes;

use crate::core::{Context, Result};

/// Renders a named template with dynamic data into response bytes.
pub trait TemplateEngine: Send + Sync {
    /// Render `template` with `data`.
    ///
    /// The context is provided for engines that vary output by request
    /// (locale headers, matched pattern); most implementations can ignore
    /// it. Failures surface as [`crate::core::Error::Render`].
    fn render(&self, ctx: &Context, template: &str, data: &serde_json::Value) -> Result<Bytes>;
}

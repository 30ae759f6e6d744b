//! Static file serving from a sandboxed root directory.
//!
//! Register under a trailing wildcard and hand the bound parameter name to
//! the handler:
//!
//! ```rust,ignore
//! let assets = StaticFileHandler::new("./public", "filepath")?
//!     .with_cache(256, 64 * 1024);
//! server.handle(Method::GET, "/assets/*filepath", move |ctx| assets.serve(ctx))?;
//! ```
//!
//! Requests resolving outside the root (dot-dot segments, symlink escapes)
//! are answered 404 without disclosing why.

use std::collections::{HashMap, VecDeque};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use bytes::Bytes;
use http::StatusCode;

use crate::core::{static_bodies, Context, Error, Result};

/// Small bounded file cache, FIFO eviction.
struct FileCache {
    max_entries: usize,
    max_file_size: usize,
    inner: RwLock<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    map: HashMap<String, Bytes>,
    order: VecDeque<String>,
}

impl FileCache {
    fn new(max_entries: usize, max_file_size: usize) -> Self {
        Self {
            max_entries,
            max_file_size,
            inner: RwLock::new(CacheInner::default()),
        }
    }

    fn get(&self, key: &str) -> Option<Bytes> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .map
            .get(key)
            .cloned()
    }

    fn put(&self, key: &str, data: &Bytes) {
        if data.len() > self.max_file_size || self.max_entries == 0 {
            return;
        }
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if inner.map.contains_key(key) {
            return;
        }
        if inner.map.len() >= self.max_entries {
            if let Some(evicted) = inner.order.pop_front() {
                inner.map.remove(&evicted);
            }
        }
        inner.map.insert(key.to_string(), data.clone());
        inner.order.push_back(key.to_string());
    }
}

/// Serves files below a fixed root, looked up via a wildcard parameter.
pub struct StaticFileHandler {
    root: PathBuf,
    param_key: String,
    cache: Option<FileCache>,
}

impl StaticFileHandler {
    /// Create a handler rooted at `root`, reading the relative path from
    /// the wildcard parameter named `param_key`.
    ///
    /// The root must exist; it is canonicalized once here so the per-request
    /// sandbox check is a plain prefix comparison.
    pub fn new(root: impl AsRef<Path>, param_key: impl Into<String>) -> Result<Self> {
        let root = root.as_ref().canonicalize()?;
        Ok(Self {
            root,
            param_key: param_key.into(),
            cache: None,
        })
    }

    /// Enable caching of up to `max_entries` files of at most
    /// `max_file_size` bytes each.
    pub fn with_cache(mut self, max_entries: usize, max_file_size: usize) -> Self {
        self.cache = Some(FileCache::new(max_entries, max_file_size));
        self
    }

    /// Serve the file named by the bound wildcard parameter into the
    /// pending response.
    pub fn serve(&self, ctx: &mut Context) {
        let Some(rel) = ctx.param(&self.param_key).map(|s| s.to_string()) else {
            ctx.set_status(StatusCode::NOT_FOUND);
            ctx.set_body(static_bodies::NOT_FOUND.clone());
            return;
        };

        match self.load(&rel) {
            Ok(data) => {
                let mime = mime_guess::from_path(&rel).first_or_octet_stream();
                ctx.set_status(StatusCode::OK);
                ctx.set_header("content-type", mime.essence_str());
                ctx.set_body(data);
            }
            Err(Error::Io(e)) if e.kind() == ErrorKind::NotFound => {
                ctx.set_status(StatusCode::NOT_FOUND);
                ctx.set_body(static_bodies::NOT_FOUND.clone());
            }
            Err(Error::Custom(_)) => {
                // Sandbox escape attempt looks like any other miss.
                ctx.set_status(StatusCode::NOT_FOUND);
                ctx.set_body(static_bodies::NOT_FOUND.clone());
            }
            Err(e) => {
                tracing::error!(error = %e, file = rel.as_str(), "failed to read static file");
                ctx.set_status(StatusCode::INTERNAL_SERVER_ERROR);
                ctx.set_body(static_bodies::INTERNAL_ERROR.clone());
            }
        }
    }

    fn load(&self, rel: &str) -> Result<Bytes> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(rel) {
                return Ok(hit);
            }
        }

        // Canonicalize resolves dot-dot segments and symlinks, so the
        // prefix check below is authoritative.
        let resolved = self.root.join(rel).canonicalize()?;
        if !resolved.starts_with(&self.root) {
            return Err(Error::Custom(format!("path escapes root: {}", rel)));
        }
        if resolved.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                ErrorKind::NotFound,
                "is a directory",
            )));
        }

        let data = Bytes::from(std::fs::read(&resolved)?);
        if let Some(cache) = &self.cache {
            cache.put(rel, &data);
        }
        Ok(data)
    }
}

//! Route groups: a path prefix combined with a middleware scope.
//!
//! Groups form a tree built at setup time. A child group inherits its
//! parent's middleware list at creation and can extend it independently
//! afterwards; the prefix is fixed once created. At dispatch time a request
//! picks the single most specific group whose prefix covers its path, so
//! middleware added to `/v1` never runs for `/v2`.

use std::sync::Arc;

use http::Method;

use crate::core::{Context, Error, Result};
use crate::middleware::Middleware;
use crate::server::Server;

/// One registered group: prefix plus its middleware list.
pub(crate) struct GroupEntry {
    pub(crate) prefix: String,
    pub(crate) middleware: Vec<Arc<dyn Middleware>>,
}

impl GroupEntry {
    /// The implicit root group: empty prefix, matches every path.
    pub(crate) fn root() -> Self {
        Self {
            prefix: String::new(),
            middleware: Vec::new(),
        }
    }

    /// Whether this group's prefix covers `path`, on segment boundaries:
    /// `/v1` covers `/v1` and `/v1/users` but not `/v12/users`.
    pub(crate) fn matches(&self, path: &str) -> bool {
        if self.prefix.is_empty() {
            return true;
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// Builder handle for registering routes and middleware under a prefix.
///
/// Groups only exist during setup; they borrow the server mutably and write
/// into its route trie and group table.
pub struct RouteGroup<'a> {
    server: &'a mut Server,
    index: usize,
}

impl<'a> RouteGroup<'a> {
    pub(crate) fn new(server: &'a mut Server, index: usize) -> Self {
        Self { server, index }
    }

    /// The full prefix of this group.
    pub fn prefix(&self) -> &str {
        &self.server.group_entry(self.index).prefix
    }

    /// Append middleware to this group's list.
    ///
    /// Order matters: middleware declared first runs outermost. Must happen
    /// before the server starts serving traffic.
    pub fn use_middleware(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.server
            .group_entry_mut(self.index)
            .middleware
            .push(middleware);
        self
    }

    /// Create a child group under `prefix`, inheriting the current
    /// middleware list.
    pub fn group(&mut self, prefix: &str) -> Result<RouteGroup<'_>> {
        let index = create_child_group(self.server, self.index, prefix)?;
        Ok(RouteGroup::new(self.server, index))
    }

    /// Register a handler for an arbitrary method under this group.
    pub fn handle<F>(&mut self, method: Method, pattern: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        let full = self.join_pattern(pattern);
        self.server
            .router_mut()
            .add(method, &full, Arc::new(handler))
    }

    /// Register a GET handler.
    pub fn get<F>(&mut self, pattern: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.handle(Method::GET, pattern, handler)
    }

    /// Register a POST handler.
    pub fn post<F>(&mut self, pattern: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.handle(Method::POST, pattern, handler)
    }

    /// Register a PUT handler.
    pub fn put<F>(&mut self, pattern: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.handle(Method::PUT, pattern, handler)
    }

    /// Register a DELETE handler.
    pub fn delete<F>(&mut self, pattern: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.handle(Method::DELETE, pattern, handler)
    }

    /// Join the group prefix with a route pattern.
    ///
    /// `"/"` on a non-root group registers the bare prefix itself. Anything
    /// else is concatenated and re-validated by the trie.
    fn join_pattern(&self, pattern: &str) -> String {
        let prefix = &self.server.group_entry(self.index).prefix;
        if prefix.is_empty() {
            return pattern.to_string();
        }
        if pattern == "/" {
            return prefix.clone();
        }
        format!("{}{}", prefix, pattern)
    }
}

/// Validate a prefix and append the child entry, inheriting the parent's
/// middleware. Returns the new group's index.
pub(crate) fn create_child_group(
    server: &mut Server,
    parent: usize,
    prefix: &str,
) -> Result<usize> {
    validate_prefix(prefix)?;
    let entry = server.group_entry(parent);
    let joined = format!("{}{}", entry.prefix, prefix);
    let inherited = entry.middleware.clone();
    Ok(server.push_group(GroupEntry {
        prefix: joined,
        middleware: inherited,
    }))
}

fn validate_prefix(prefix: &str) -> Result<()> {
    let malformed = |reason: &str| Error::MalformedPattern {
        pattern: prefix.to_string(),
        reason: reason.to_string(),
    };

    if prefix.is_empty() {
        return Err(malformed("group prefix must not be empty"));
    }
    if !prefix.starts_with('/') {
        return Err(malformed("group prefix must begin with '/'"));
    }
    if prefix.len() > 1 && prefix.ends_with('/') {
        return Err(malformed("group prefix must not end with '/'"));
    }
    if prefix == "/" {
        return Err(malformed("group prefix '/' is implicit; register on the server directly"));
    }
    if prefix[1..].split('/').any(str::is_empty) {
        return Err(malformed("group prefix must not contain empty segments"));
    }
    Ok(())
}

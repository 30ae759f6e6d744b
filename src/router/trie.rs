//! Segment trie with per-method roots.

use std::collections::HashMap;

use http::Method;

use crate::core::{Error, Result};
use crate::middleware::Handler;

/// A single path segment in the trie.
///
/// A node owns its literal children (keys unique), at most one parameter
/// child, and at most one wildcard child. It carries a handler only when a
/// registered route terminates here; `/user` and `/user/login` can both hold
/// handlers independently.
#[derive(Default)]
struct Node {
    children: HashMap<String, Node>,
    param: Option<Box<Node>>,
    wildcard: Option<Box<Node>>,
    /// Binding name when this node is a param or wildcard child.
    name: Option<String>,
    handler: Option<Handler>,
    /// Full pattern registered at this node, for observability.
    pattern: Option<String>,
}

impl Node {
    fn bound(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    fn count_handlers(&self) -> usize {
        let mut count = usize::from(self.handler.is_some());
        count += self.children.values().map(Node::count_handlers).sum::<usize>();
        if let Some(param) = self.param.as_deref() {
            count += param.count_handlers();
        }
        if let Some(wildcard) = self.wildcard.as_deref() {
            count += wildcard.count_handlers();
        }
        count
    }
}

/// Result of a successful route lookup.
pub struct RouteMatch<'a> {
    /// The registered handler.
    pub handler: &'a Handler,
    /// The pattern the route was registered under.
    pub pattern: &'a str,
    /// Parameters bound during the walk, keyed by name.
    pub params: HashMap<String, String>,
}

/// Route forest: one trie root per HTTP method, created lazily on first
/// registration for that method.
///
/// Writes happen during setup only; serving reads through `&self` and never
/// mutates the trees.
#[derive(Default)]
pub struct Router {
    trees: HashMap<Method, Node>,
}

impl Router {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` + `pattern`.
    ///
    /// Fails with [`Error::MalformedPattern`] when the pattern is invalid and
    /// [`Error::RouteConflict`] when it collides with an existing
    /// registration (same endpoint twice, or a second parameter name under
    /// the same parent).
    pub fn add(&mut self, method: Method, pattern: &str, handler: Handler) -> Result<()> {
        validate(pattern)?;

        let conflict = || Error::RouteConflict {
            method: method.to_string(),
            pattern: pattern.to_string(),
        };

        let mut node = self.trees.entry(method.clone()).or_default();

        if pattern != "/" {
            for segment in pattern[1..].split('/') {
                node = if let Some(name) = segment.strip_prefix(':') {
                    // One param child per parent; re-adding the same name is
                    // idempotent, a different name is a conflict.
                    if let Some(existing) = node.param.as_deref() {
                        if existing.name.as_deref() != Some(name) {
                            return Err(conflict());
                        }
                    }
                    &mut **node.param.get_or_insert_with(|| Box::new(Node::bound(name)))
                } else if let Some(name) = segment.strip_prefix('*') {
                    if let Some(existing) = node.wildcard.as_deref() {
                        if existing.name.as_deref() != Some(name) {
                            return Err(conflict());
                        }
                    }
                    &mut **node.wildcard.get_or_insert_with(|| Box::new(Node::bound(name)))
                } else {
                    node.children.entry(segment.to_string()).or_default()
                };
            }
        }

        if node.handler.is_some() {
            return Err(conflict());
        }
        node.handler = Some(handler);
        node.pattern = Some(pattern.to_string());
        Ok(())
    }

    /// Look up a handler for `method` + `path`.
    ///
    /// Walks segments with priority static > param > wildcard, first match
    /// wins, no backtracking. A wildcard binds the remaining path verbatim
    /// and terminates the walk. Returns None when no method tree exists, a
    /// segment has no matching child, the path contains an empty segment,
    /// or the final node carries no handler.
    pub fn find(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        let root = self.trees.get(method)?;
        let mut params = HashMap::new();

        if path == "/" {
            let handler = root.handler.as_ref()?;
            return Some(RouteMatch {
                handler,
                pattern: root.pattern.as_deref().unwrap_or("/"),
                params,
            });
        }

        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }

        let mut node = root;
        for (idx, segment) in segments.iter().enumerate() {
            if let Some(child) = node.children.get(*segment) {
                node = child;
            } else if let Some(child) = node.param.as_deref() {
                if let Some(name) = child.name.as_deref() {
                    params.insert(name.to_string(), (*segment).to_string());
                }
                node = child;
            } else if let Some(child) = node.wildcard.as_deref() {
                if let Some(name) = child.name.as_deref() {
                    params.insert(name.to_string(), segments[idx..].join("/"));
                }
                node = child;
                break;
            } else {
                return None;
            }
        }

        let handler = node.handler.as_ref()?;
        Some(RouteMatch {
            handler,
            pattern: node.pattern.as_deref().unwrap_or_default(),
            params,
        })
    }

    /// Number of registered routes across all methods.
    pub fn route_count(&self) -> usize {
        self.trees.values().map(Node::count_handlers).sum()
    }
}

fn validate(pattern: &str) -> Result<()> {
    let malformed = |reason: &str| Error::MalformedPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    if pattern.is_empty() {
        return Err(malformed("must not be empty"));
    }
    if !pattern.starts_with('/') {
        return Err(malformed("must begin with '/'"));
    }
    if pattern == "/" {
        return Ok(());
    }
    if pattern.ends_with('/') {
        return Err(malformed("must not end with '/'"));
    }

    let segments: Vec<&str> = pattern[1..].split('/').collect();
    for (idx, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return Err(malformed("must not contain empty segments"));
        }
        if *segment == ":" {
            return Err(malformed("parameter segment is missing a name"));
        }
        if *segment == "*" {
            return Err(malformed("wildcard segment is missing a name"));
        }
        if segment.starts_with('*') && idx != segments.len() - 1 {
            return Err(malformed("wildcard must be the final segment"));
        }
    }
    Ok(())
}

//! Method-keyed routing trie.
//!
//! One trie per HTTP method, built at setup time and read-only while
//! serving. Patterns support three segment kinds:
//!
//! ```text
//! Syntax     Kind
//! literal    static segment, exact match
//! :name      named parameter, matches one segment
//! *name      trailing wildcard, greedily matches the rest of the path
//! ```
//!
//! Lookup priority within a node is static > param > wildcard, first match
//! wins, no backtracking. Registration problems (malformed patterns,
//! conflicting routes) fail loudly at setup; lookup itself never errors, a
//! miss is just `None`.

mod trie;

pub use trie::{RouteMatch, Router};

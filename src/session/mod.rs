//! Session collaborators: storage, propagation, and a manager facade.
//!
//! Three seams, kept separate so each can be swapped independently:
//!
//! - [`SessionStore`] decides where session data lives (memory, Redis, ...).
//! - [`Propagator`] decides how the session id travels between client and
//!   server (cookies by default).
//! - [`SessionManager`] glues the two together and caches the resolved
//!   session in the request context so repeated lookups within one request
//!   hit the store once.
//!
//! The API is synchronous to match the middleware chain; stores doing real
//! I/O should keep their own pooling underneath.

pub mod cookie;
pub mod memory;

use std::sync::Arc;

use uuid::Uuid;

use crate::core::{Context, Result};

/// One session: an id plus key/value data.
pub trait Session: Send + Sync + std::fmt::Debug {
    /// Get the value stored under `key`. A missing key is an error, not an
    /// empty string.
    fn get(&self, key: &str) -> Result<String>;

    /// Store `value` under `key`.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// The opaque session id.
    fn id(&self) -> String;
}

/// Manages all sessions, keyed by opaque id.
pub trait SessionStore: Send + Sync {
    /// Create a session under `id`.
    fn generate(&self, id: &str) -> Result<Arc<dyn Session>>;

    /// Extend the lifetime of the session under `id`.
    fn refresh(&self, id: &str) -> Result<()>;

    /// Drop the session under `id`. Removing an absent session is not an
    /// error.
    fn remove(&self, id: &str) -> Result<()>;

    /// Fetch the session under `id`.
    fn retrieve(&self, id: &str) -> Result<Arc<dyn Session>>;
}

/// Moves session ids between requests and responses.
pub trait Propagator: Send + Sync {
    /// Attach `id` to the pending response.
    fn inject(&self, id: &str, ctx: &mut Context) -> Result<()>;

    /// Extract the session id from the request.
    fn extract(&self, ctx: &Context) -> Result<String>;

    /// Instruct the client to forget the session id.
    fn remove(&self, ctx: &mut Context) -> Result<()>;
}

/// Facade combining a store and a propagator.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    propagator: Arc<dyn Propagator>,
    /// Key under which the resolved session is cached in the context.
    context_key: String,
}

impl SessionManager {
    /// Create a manager. `context_key` names the context slot used for
    /// per-request session caching.
    pub fn new(
        store: Arc<dyn SessionStore>,
        propagator: Arc<dyn Propagator>,
        context_key: impl Into<String>,
    ) -> Self {
        Self {
            store,
            propagator,
            context_key: context_key.into(),
        }
    }

    /// Create a fresh session with a random id and attach it to the
    /// response.
    pub fn create_session(&self, ctx: &mut Context) -> Result<Arc<dyn Session>> {
        let id = Uuid::new_v4().to_string();
        let session = self.store.generate(&id)?;
        self.propagator.inject(&id, ctx)?;
        ctx.set(&self.context_key, session.clone());
        Ok(session)
    }

    /// Resolve the request's session: context cache first, then the
    /// propagator + store. The result is cached back into the context.
    pub fn retrieve_session(&self, ctx: &Context) -> Result<Arc<dyn Session>> {
        if let Some(cached) = ctx.get::<Arc<dyn Session>>(&self.context_key) {
            return Ok((*cached).clone());
        }
        let id = self.propagator.extract(ctx)?;
        let session = self.store.retrieve(&id)?;
        ctx.set(&self.context_key, session.clone());
        Ok(session)
    }

    /// Extend the current session's lifetime and re-attach its id to the
    /// response.
    pub fn refresh_session(&self, ctx: &mut Context) -> Result<Arc<dyn Session>> {
        let session = self.retrieve_session(ctx)?;
        self.store.refresh(&session.id())?;
        self.propagator.inject(&session.id(), ctx)?;
        Ok(session)
    }

    /// Destroy the current session on both ends: store and client.
    pub fn delete_session(&self, ctx: &mut Context) -> Result<()> {
        let id = self.propagator.extract(ctx)?;
        self.store.remove(&id)?;
        self.propagator.remove(ctx)?;
        ctx.remove(&self.context_key);
        Ok(())
    }
}

//! Cookie-based session id propagation.

use super::Propagator;
use crate::core::{Context, Error, Result};

/// Carries the session id in a response cookie and reads it back from the
/// request's Cookie header.
pub struct CookiePropagator {
    cookie_name: String,
    /// Attributes appended to every Set-Cookie value.
    attributes: String,
}

impl CookiePropagator {
    /// Create a propagator writing cookies named `cookie_name` with the
    /// default attributes `Path=/; HttpOnly`.
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            attributes: "Path=/; HttpOnly".to_string(),
        }
    }

    /// Replace the cookie attributes (expiry, domain, SameSite, ...).
    pub fn with_attributes(mut self, attributes: impl Into<String>) -> Self {
        self.attributes = attributes.into();
        self
    }
}

impl Propagator for CookiePropagator {
    fn inject(&self, id: &str, ctx: &mut Context) -> Result<()> {
        ctx.response_mut().append_header(
            "set-cookie",
            format!("{}={}; {}", self.cookie_name, id, self.attributes),
        );
        Ok(())
    }

    fn extract(&self, ctx: &Context) -> Result<String> {
        let header = ctx
            .request()
            .cookies()
            .ok_or_else(|| Error::Session("no cookie header".into()))?;

        for pair in header.split(';') {
            let pair = pair.trim();
            if let Some((name, value)) = pair.split_once('=') {
                if name == self.cookie_name {
                    return Ok(value.to_string());
                }
            }
        }
        Err(Error::Session(format!(
            "session cookie not found: {}",
            self.cookie_name
        )))
    }

    fn remove(&self, ctx: &mut Context) -> Result<()> {
        // Max-Age=0 invalidates the cookie client-side.
        ctx.response_mut().append_header(
            "set-cookie",
            format!("{}=; Max-Age=0; {}", self.cookie_name, self.attributes),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BufferedWriter, Request};
    use bytes::Bytes;
    use http::{HeaderMap, Method};

    fn context_with_cookie(cookie: Option<&str>) -> Context {
        let mut headers = HeaderMap::new();
        if let Some(value) = cookie {
            headers.insert("cookie", value.parse().unwrap());
        }
        let request = Request::new(Method::GET, "/".parse().unwrap(), headers, Bytes::new());
        Context::new(request, BufferedWriter::new())
    }

    #[test]
    fn test_inject_sets_cookie_with_attributes() {
        let propagator = CookiePropagator::new("sessid");
        let mut ctx = context_with_cookie(None);

        propagator.inject("abc123", &mut ctx).unwrap();
        assert_eq!(
            ctx.response().header("set-cookie"),
            Some("sessid=abc123; Path=/; HttpOnly")
        );
    }

    #[test]
    fn test_extract_finds_cookie_among_others() {
        let propagator = CookiePropagator::new("sessid");
        let ctx = context_with_cookie(Some("theme=dark; sessid=abc123; lang=en"));
        assert_eq!(propagator.extract(&ctx).unwrap(), "abc123");
    }

    #[test]
    fn test_extract_missing_cookie_fails() {
        let propagator = CookiePropagator::new("sessid");

        let ctx = context_with_cookie(None);
        assert!(propagator.extract(&ctx).is_err());

        let ctx = context_with_cookie(Some("theme=dark"));
        assert!(propagator.extract(&ctx).is_err());
    }

    #[test]
    fn test_remove_expires_cookie() {
        let propagator = CookiePropagator::new("sessid");
        let mut ctx = context_with_cookie(None);

        propagator.remove(&mut ctx).unwrap();
        let cookie = ctx.response().header("set-cookie").unwrap();
        assert!(cookie.starts_with("sessid=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn test_custom_attributes() {
        let propagator =
            CookiePropagator::new("sessid").with_attributes("Path=/; Secure; SameSite=Lax");
        let mut ctx = context_with_cookie(None);

        propagator.inject("xyz", &mut ctx).unwrap();
        assert_eq!(
            ctx.response().header("set-cookie"),
            Some("sessid=xyz; Path=/; Secure; SameSite=Lax")
        );
    }
}

use std::time::Duration;

use http::Method;

use super::csp::CspPolicy;
use super::Middleware;
use crate::config::Config;
use crate::context::RequestContext;
use crate::server::{ParsedRequest, WireResponse};

/// Standard security response headers.
///
/// GET responses gain the full header set, including a
/// `Content-Security-Policy` carrying the per-response nonce. Write methods
/// (POST/PUT/DELETE) have the content-rendering headers stripped instead
/// (they answer API calls, not rendered documents) unless disabled through
/// `server.security_headers.strip_on_write`. The whole middleware is gated
/// by `server.security_headers.enabled`.
pub struct SecurityHeadersMiddleware {
    enabled: bool,
    strip_on_write: bool,
    policy: CspPolicy,
}

impl SecurityHeadersMiddleware {
    pub fn new(enabled: bool, strip_on_write: bool, policy: CspPolicy) -> Self {
        Self {
            enabled,
            strip_on_write,
            policy,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let enabled = config.get::<bool>("server.security_headers.enabled", true);
        let strip_on_write = config.get::<bool>("server.security_headers.strip_on_write", true);
        let policy = CspPolicy::parse(&config.get::<String>(
            "server.csp",
            "default-src 'self'".to_string(),
        ));
        Self::new(enabled, strip_on_write, policy)
    }
}

impl Middleware for SecurityHeadersMiddleware {
    fn after(
        &self,
        ctx: &RequestContext,
        req: &ParsedRequest,
        res: &mut WireResponse,
        _latency: Duration,
    ) {
        if !self.enabled {
            return;
        }
        if req.method == Method::GET {
            res.set_header("X-Content-Type-Options", "nosniff".to_string());
            res.set_header("X-Frame-Options", "SAMEORIGIN".to_string());
            res.set_header("X-XSS-Protection", "1; mode=block".to_string());
            res.set_header(
                "Content-Security-Policy",
                self.policy.render_with_nonce(ctx.nonce.as_str()),
            );
        } else if self.strip_on_write
            && (req.method == Method::POST
                || req.method == Method::PUT
                || req.method == Method::DELETE)
        {
            res.remove_header("Content-Security-Policy");
            res.remove_header("X-XSS-Protection");
        }
    }
}

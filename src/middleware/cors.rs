use std::time::Duration;

use http::Method;

use super::Middleware;
use crate::context::RequestContext;
use crate::server::{ParsedRequest, WireBody, WireResponse};

/// Thin CORS shim gated by `server.cors`.
///
/// Answers preflight OPTIONS requests and stamps allow headers on
/// responses. Policy mechanics (origin validation, credential rules) belong
/// to the host application; this shim only keeps browser clients functional
/// against the adapter's default deployment.
pub struct CorsMiddleware {
    allowed_origins: Vec<String>,
    allowed_headers: Vec<String>,
    allowed_methods: Vec<Method>,
}

impl CorsMiddleware {
    pub fn new(
        allowed_origins: Vec<String>,
        allowed_headers: Vec<String>,
        allowed_methods: Vec<Method>,
    ) -> Self {
        Self {
            allowed_origins,
            allowed_headers,
            allowed_methods,
        }
    }
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".into()],
            allowed_headers: vec!["Content-Type".into(), "Authorization".into()],
            allowed_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ],
        }
    }
}

impl CorsMiddleware {
    fn apply_headers(&self, res: &mut WireResponse) {
        res.set_header(
            "Access-Control-Allow-Origin",
            self.allowed_origins.join(", "),
        );
        res.set_header(
            "Access-Control-Allow-Headers",
            self.allowed_headers.join(", "),
        );
        res.set_header(
            "Access-Control-Allow-Methods",
            self.allowed_methods
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        );
    }
}

impl Middleware for CorsMiddleware {
    fn before(&self, _ctx: &RequestContext, req: &mut ParsedRequest) -> Option<WireResponse> {
        if req.method == Method::OPTIONS {
            let mut res = WireResponse::new(204, WireBody::Empty);
            self.apply_headers(&mut res);
            Some(res)
        } else {
            None
        }
    }

    fn after(
        &self,
        _ctx: &RequestContext,
        _req: &ParsedRequest,
        res: &mut WireResponse,
        _latency: Duration,
    ) {
        self.apply_headers(res);
    }
}

//! Global and route-scoped middleware.

mod core;
mod cors;
mod csp;
mod metrics;
mod security_headers;

pub use self::core::{Middleware, MiddlewareError, RouteMiddleware};
pub use self::cors::CorsMiddleware;
pub use self::csp::CspPolicy;
pub use self::metrics::RequestMetrics;
pub use self::security_headers::SecurityHeadersMiddleware;

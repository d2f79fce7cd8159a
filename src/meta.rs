//! Route and controller metadata consumed from the external controller
//! registry.
//!
//! Descriptors are immutable after registration: the binder reads them once
//! at startup to build the route table and the per-route dispatch functions.

use crate::middleware::RouteMiddleware;
use http::Method;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Where a handler argument is resolved from.
///
/// Foreign metadata may carry source kinds this version does not know;
/// those are preserved as [`ParamSource::Unknown`] and resolve to the absent
/// argument rather than failing, so newer registries keep working against
/// older adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamSource {
    /// Parsed JSON request body.
    Body,
    /// Named path parameter.
    Param,
    /// Named query value.
    Query,
    /// The entire query mapping.
    Queries,
    /// Named header, matched case-insensitively.
    Header,
    /// The entire header mapping.
    Headers,
    /// The request object itself.
    Request,
    /// The response slot the handler may write directly.
    Response,
    /// The continuation token.
    Next,
    /// Session object attached to the request.
    Session,
    /// Authenticated user object attached to the request.
    User,
    /// Remote address.
    Ip,
    /// Resolved virtual-host mapping.
    Hosts,
    /// Unrecognized source kind, kept verbatim.
    Unknown(String),
}

impl FromStr for ParamSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "body" => Self::Body,
            "param" => Self::Param,
            "query" => Self::Query,
            "queries" => Self::Queries,
            "header" => Self::Header,
            "headers" => Self::Headers,
            "request" => Self::Request,
            "response" => Self::Response,
            "next" => Self::Next,
            "session" => Self::Session,
            "user" => Self::User,
            "ip" => Self::Ip,
            "hosts" => Self::Hosts,
            other => Self::Unknown(other.to_string()),
        })
    }
}

impl fmt::Display for ParamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Body => "body",
            Self::Param => "param",
            Self::Query => "query",
            Self::Queries => "queries",
            Self::Header => "header",
            Self::Headers => "headers",
            Self::Request => "request",
            Self::Response => "response",
            Self::Next => "next",
            Self::Session => "session",
            Self::User => "user",
            Self::Ip => "ip",
            Self::Hosts => "hosts",
            Self::Unknown(other) => other,
        };
        write!(f, "{s}")
    }
}

/// One declared handler parameter.
///
/// `index` is the argument position the resolved value is placed at. Indices
/// are dense `0..N-1` for `N` declared parameters but descriptors may appear
/// in any order, so the resolver places by index, never by list position.
#[derive(Debug, Clone)]
pub struct ParamDescriptor {
    pub index: usize,
    pub source: ParamSource,
    /// Required for `param`/`query`/`header`, ignored otherwise.
    pub name: Option<String>,
}

impl ParamDescriptor {
    pub fn new(index: usize, source: ParamSource, name: Option<&str>) -> Self {
        Self {
            index,
            source,
            name: name.map(str::to_string),
        }
    }
}

/// Static metadata describing one HTTP endpoint of a controller.
#[derive(Clone)]
pub struct RouteDescriptor {
    pub method: Method,
    /// Path below the controller prefix, `{name}` segments for parameters.
    pub sub_path: String,
    /// Handler method name on the controller.
    pub handler_name: String,
    pub params: Vec<ParamDescriptor>,
    /// Route-scoped middleware, run in order before the handler.
    pub middlewares: Vec<Arc<dyn RouteMiddleware>>,
}

impl RouteDescriptor {
    pub fn new(method: Method, sub_path: &str, handler_name: &str) -> Self {
        Self {
            method,
            sub_path: sub_path.to_string(),
            handler_name: handler_name.to_string(),
            params: Vec::new(),
            middlewares: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Vec<ParamDescriptor>) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_middleware(mut self, mw: Arc<dyn RouteMiddleware>) -> Self {
        self.middlewares.push(mw);
        self
    }

    /// Full route path: controller prefix joined with the sub path,
    /// normalized to a single leading slash and no duplicate separators.
    #[must_use]
    pub fn full_path(&self, prefix: &str) -> String {
        normalize_path(&format!("{}/{}", prefix, self.sub_path))
    }
}

impl fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("method", &self.method)
            .field("sub_path", &self.sub_path)
            .field("handler_name", &self.handler_name)
            .field("params", &self.params)
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}

/// Metadata for one controller: a route prefix, the dependency keys its
/// factory resolves from the provider map, and its routes in declaration
/// order. Declaration order is preserved all the way into the route table and
/// decides precedence when paths overlap.
#[derive(Debug, Clone)]
pub struct ControllerDescriptor {
    pub name: String,
    pub route_prefix: String,
    /// Statically declared provider keys; validated before construction.
    pub dependencies: Vec<String>,
    pub routes: Vec<RouteDescriptor>,
}

impl ControllerDescriptor {
    pub fn new(name: &str, route_prefix: &str) -> Self {
        Self {
            name: name.to_string(),
            route_prefix: route_prefix.to_string(),
            dependencies: Vec::new(),
            routes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_dependencies(mut self, keys: &[&str]) -> Self {
        self.dependencies = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_route(mut self, route: RouteDescriptor) -> Self {
        self.routes.push(route);
        self
    }
}

/// Collapse duplicate separators and guarantee a leading slash; a trailing
/// slash is dropped except for the root path.
#[must_use]
pub fn normalize_path(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 1);
    out.push('/');
    for segment in raw.split('/').filter(|s| !s.is_empty()) {
        if !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(segment);
    }
    out
}

//! Method-specific route table.
//!
//! A linear table of compiled path patterns, scanned in registration order.
//! The adapter never reorders routes: when patterns overlap, the first
//! registered route wins, so precedence is exactly the registration order the
//! binder preserved from the controller registry.

use crate::ids::{route_hash, route_key};
use crate::meta::{ParamDescriptor, RouteDescriptor};
use crate::middleware::RouteMiddleware;
use http::Method;
use regex::Regex;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Maximum number of path/query parameters before heap allocation.
/// Most REST routes have ≤4 path params; no heap on the hot path for those.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Param names use `Arc<str>`: they come from the static route table, so a
/// clone is an O(1) refcount bump. Values are per-request `String`s.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// One bound route: descriptor metadata plus the identity strings computed
/// at bind time.
pub struct RouteEntry {
    pub method: Method,
    /// Normalized full path (controller prefix + sub path).
    pub full_path: String,
    /// Route identity `method::full_path`, lower-cased. Keys interceptor and
    /// after-render registrations.
    pub route_id: String,
    /// Content hash of the route identity, for telemetry correlation.
    pub route_hash: String,
    pub controller: String,
    pub handler_name: String,
    pub params: Vec<ParamDescriptor>,
    pub middlewares: Vec<Arc<dyn RouteMiddleware>>,
}

impl RouteEntry {
    pub fn bind(descriptor: &RouteDescriptor, controller: &str, prefix: &str) -> Self {
        let full_path = descriptor.full_path(prefix);
        let route_id = route_key(&descriptor.method, &full_path);
        let route_hash = route_hash(&route_id);
        Self {
            method: descriptor.method.clone(),
            full_path,
            route_id,
            route_hash,
            controller: controller.to_string(),
            handler_name: descriptor.handler_name.clone(),
            params: descriptor.params.clone(),
            middlewares: descriptor.middlewares.clone(),
        }
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("route_id", &self.route_id)
            .field("controller", &self.controller)
            .field("handler_name", &self.handler_name)
            .finish()
    }
}

/// Result of successfully matching a request path to a route.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<RouteEntry>,
    /// Path parameters extracted from the URL (`{id}` → `("id", "123")`).
    pub path_params: ParamVec,
    /// Query string parameters (populated by the server layer).
    pub query_params: ParamVec,
}

impl RouteMatch {
    /// Get a path parameter by name. Last write wins when duplicate names
    /// exist at different path depths.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Route table matching requests in registration order.
#[derive(Default)]
pub struct Router {
    routes: Vec<(Regex, Vec<Arc<str>>, Arc<RouteEntry>)>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bound route. Order of calls is precedence order.
    pub fn add_route(&mut self, entry: Arc<RouteEntry>) {
        let (regex, param_names) = Self::path_to_regex(&entry.full_path);
        debug!(
            route_id = %entry.route_id,
            controller = %entry.controller,
            handler_name = %entry.handler_name,
            "Route registered"
        );
        self.routes.push((regex, param_names, entry));
    }

    /// Match an HTTP request to a route; `None` results in a 404.
    #[must_use]
    pub fn route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        for (regex, param_names, entry) in &self.routes {
            if entry.method != *method {
                continue;
            }
            if let Some(caps) = regex.captures(path) {
                let mut path_params = ParamVec::new();
                for (i, name) in param_names.iter().enumerate() {
                    if let Some(value) = caps.get(i + 1) {
                        path_params.push((Arc::clone(name), value.as_str().to_string()));
                    }
                }
                return Some(RouteMatch {
                    route: Arc::clone(entry),
                    path_params,
                    query_params: ParamVec::new(),
                });
            }
        }
        None
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Log the loaded table once binding has finished.
    pub fn log_routes(&self) {
        let summary: Vec<String> = self
            .routes
            .iter()
            .take(10)
            .map(|(_, _, e)| format!("{} {}", e.method, e.full_path))
            .collect();
        info!(
            routes_count = self.routes.len(),
            routes_summary = ?summary,
            "Routing table loaded"
        );
    }

    /// Convert a path pattern to a regex and extract parameter names.
    ///
    /// `/users/{id}` becomes `^/users/([^/]+)$` with parameter names
    /// `["id"]`.
    pub(crate) fn path_to_regex(path: &str) -> (Regex, Vec<Arc<str>>) {
        if path == "/" {
            return (
                Regex::new(r"^/$").expect("root path regex is valid"),
                Vec::new(),
            );
        }

        let mut pattern = String::with_capacity(path.len() + 5);
        pattern.push('^');
        let mut param_names: Vec<Arc<str>> = Vec::with_capacity(path.matches('{').count());

        for segment in path.split('/') {
            if segment.starts_with('{') && segment.ends_with('}') {
                let param_name = segment.trim_start_matches('{').trim_end_matches('}');
                pattern.push_str("/([^/]+)");
                param_names.push(Arc::from(param_name));
            } else if !segment.is_empty() {
                pattern.push('/');
                pattern.push_str(segment);
            }
        }

        pattern.push('$');
        let regex = Regex::new(&pattern).expect("path pattern regex is valid");

        (regex, param_names)
    }
}

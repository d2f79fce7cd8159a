use crate::dispatcher::HeaderVec;
use crate::router::ParamVec;
use http::Method;
use may_minihttp::Request;
use serde_json::{json, Value};
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

/// Parsed HTTP request data used by the service layer.
///
/// Everything the dispatch pipeline needs, extracted once from the raw
/// `may_minihttp` request: lowercase headers, cookies, query parameters, the
/// JSON body when one was sent, and the attachment slots (`session`, `user`)
/// that host-application middleware may fill before dispatch.
#[derive(Debug, Clone)]
pub struct ParsedRequest {
    pub method: Method,
    /// Request path with the query string stripped.
    pub path: String,
    /// HTTP headers (lowercase names).
    pub headers: HeaderVec,
    /// Cookies parsed from the Cookie header.
    pub cookies: HeaderVec,
    pub query_params: ParamVec,
    /// Parsed JSON body, when present and valid JSON.
    pub body: Option<Value>,
    /// Session object, attached by host middleware.
    pub session: Option<Value>,
    /// Authenticated user object, attached by host middleware.
    pub user: Option<Value>,
    /// Remote address as reported by forwarding headers.
    pub remote_addr: Option<String>,
}

impl ParsedRequest {
    /// Get a header by name (case-insensitive per RFC 7230).
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name. Last write wins for duplicates.
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the request asked for debug output (`?debug=true`).
    #[must_use]
    pub fn debug_requested(&self) -> bool {
        matches!(self.get_query_param("debug"), Some("true") | Some("1"))
    }

    /// Resolved virtual-host mapping derived from the Host header.
    #[must_use]
    pub fn hosts(&self) -> Option<Value> {
        let host = self.get_header("host")?;
        let (hostname, port) = match host.rsplit_once(':') {
            Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => {
                (name, port.parse::<u16>().ok())
            }
            _ => (host, None),
        };
        Some(json!({
            "host": host,
            "hostname": hostname,
            "port": port,
        }))
    }
}

/// Parse cookies out of the lowercase header list.
#[must_use]
pub fn parse_cookies(headers: &HeaderVec) -> HeaderVec {
    let mut cookies = HeaderVec::new();
    if let Some(raw) = headers
        .iter()
        .find(|(k, _)| k.as_ref() == "cookie")
        .map(|(_, v)| v.as_str())
    {
        for pair in raw.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            if let Some(name) = parts.next() {
                if name.is_empty() {
                    continue;
                }
                let value = parts.next().unwrap_or("").trim().to_string();
                cookies.push((Arc::from(name.trim()), value));
            }
        }
    }
    cookies
}

/// Parse and URL-decode query parameters from a raw path.
#[must_use]
pub fn parse_query_params(raw_path: &str) -> ParamVec {
    let mut params = ParamVec::new();
    if let Some(pos) = raw_path.find('?') {
        let query_str = &raw_path[pos + 1..];
        for (k, v) in url::form_urlencoded::parse(query_str.as_bytes()) {
            params.push((Arc::from(k.as_ref()), v.to_string()));
        }
    }
    params
}

/// Extract everything the adapter needs from a `may_minihttp::Request`.
///
/// Fails only on a method token the `http` crate rejects; the service maps
/// that to a 400.
pub fn parse_request(mut req: Request) -> anyhow::Result<ParsedRequest> {
    let method: Method = req
        .method()
        .parse()
        .map_err(|_| anyhow::anyhow!("unsupported method"))?;
    let raw_path = req.path().to_string();
    let path = raw_path.split('?').next().unwrap_or("/").to_string();

    let headers: HeaderVec = req
        .headers()
        .iter()
        .map(|h| {
            (
                Arc::from(h.name.to_ascii_lowercase().as_str()),
                String::from_utf8_lossy(h.value).to_string(),
            )
        })
        .collect();

    let cookies = parse_cookies(&headers);
    let query_params = parse_query_params(&raw_path);

    let body = {
        let mut body_str = String::new();
        match req.body().read_to_string(&mut body_str) {
            Ok(size) if size > 0 => serde_json::from_str(&body_str).ok(),
            _ => None,
        }
    };

    let remote_addr = headers
        .iter()
        .find(|(k, _)| k.as_ref() == "x-forwarded-for")
        .map(|(_, v)| v.split(',').next().unwrap_or(v).trim().to_string())
        .or_else(|| {
            headers
                .iter()
                .find(|(k, _)| k.as_ref() == "x-real-ip")
                .map(|(_, v)| v.clone())
        });

    debug!(
        method = %method,
        path = %path,
        header_count = headers.len(),
        has_body = body.is_some(),
        "HTTP request parsed"
    );

    Ok(ParsedRequest {
        method,
        path,
        headers,
        cookies,
        query_params,
        body,
        session: None,
        user: None,
        remote_addr,
    })
}

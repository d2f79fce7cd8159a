//! HTTP service glue and server lifecycle on top of `may_minihttp`.

pub mod lifecycle;
pub mod request;
pub mod response;
pub mod service;

pub use lifecycle::{ConnectionSet, ServerLifecycle, TrackedConnection};
pub use request::{parse_cookies, parse_query_params, parse_request, ParsedRequest};
pub use response::{write_json_error, write_wire_response, WireBody, WireResponse};
pub use service::AppService;

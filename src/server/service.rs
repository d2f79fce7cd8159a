use super::request::{parse_request, ParsedRequest};
use super::response::{write_json_error, write_wire_response, WireBody, WireResponse};
use crate::context::RequestContext;
use crate::dispatcher::{Dispatched, Dispatcher, HandlerRequest, SPAN_REQUEST};
use crate::ids::RequestId;
use crate::middleware::Middleware;
use crate::router::Router;
use crate::telemetry::TelemetryRecorder;
use may_minihttp::{HttpService, Request, Response};
use serde_json::json;
use std::io;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// The HTTP service the lifecycle manager mounts on `may_minihttp`.
///
/// Per request: parse, create the request context (id, nonce, route hash),
/// open the `"Request Process"` span, run global middleware, match a route,
/// dispatch, run global `after` middleware over the accumulated response,
/// write it. Requests that never reach the dispatch pipeline (404s, early
/// middleware responses) clear their telemetry here instead.
#[derive(Clone)]
pub struct AppService {
    pub router: Arc<RwLock<Router>>,
    pub dispatcher: Arc<RwLock<Dispatcher>>,
    telemetry: Arc<TelemetryRecorder>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl AppService {
    pub fn new(
        router: Arc<RwLock<Router>>,
        dispatcher: Arc<RwLock<Dispatcher>>,
        telemetry: Arc<TelemetryRecorder>,
    ) -> Self {
        Self {
            router,
            dispatcher,
            telemetry,
            middlewares: Vec::new(),
        }
    }

    /// Install a global middleware. Installation order is execution order.
    pub fn add_middleware(&mut self, mw: Arc<dyn Middleware>) {
        self.middlewares.push(mw);
    }

    fn handle(&self, mut parsed: ParsedRequest) -> (RequestContext, ParsedRequest, WireResponse) {
        let request_id = RequestId::from_header_or_new(parsed.get_header("x-request-id"));
        let ctx = RequestContext::new(
            request_id,
            &parsed.method,
            &parsed.path,
            parsed.debug_requested(),
        );
        self.telemetry.start(SPAN_REQUEST, ctx.request_id);
        debug!(
            request_id = %ctx.request_id,
            route_hash = %ctx.route_hash,
            method = %parsed.method,
            path = %parsed.path,
            "Request context created"
        );

        let mut early: Option<WireResponse> = None;
        for mw in &self.middlewares {
            if early.is_none() {
                early = mw.before(&ctx, &mut parsed);
            }
        }
        if let Some(response) = early {
            debug!(request_id = %ctx.request_id, "Global middleware answered request");
            self.telemetry.clear(ctx.request_id);
            return (ctx, parsed, response);
        }

        let route_opt = {
            let router = self.router.read().unwrap();
            router.route(&parsed.method, &parsed.path)
        };
        let Some(mut route_match) = route_opt else {
            self.telemetry.clear(ctx.request_id);
            let body = json!({
                "error": "Not Found",
                "method": parsed.method.as_str(),
                "path": parsed.path,
            });
            return (ctx, parsed, WireResponse::json(404, body));
        };
        route_match.query_params = parsed.query_params.clone();

        let handler_req = HandlerRequest {
            request_id: ctx.request_id,
            method: parsed.method.clone(),
            path: route_match.route.full_path.clone(),
            path_params: route_match.path_params.clone(),
            query_params: parsed.query_params.clone(),
            headers: parsed.headers.clone(),
            cookies: parsed.cookies.clone(),
            body: parsed.body.clone(),
            session: parsed.session.clone(),
            user: parsed.user.clone(),
            remote_addr: parsed.remote_addr.clone(),
            hosts: parsed.hosts(),
        };

        let dispatched = {
            let dispatcher = self.dispatcher.read().unwrap();
            dispatcher.dispatch(&route_match, handler_req, &ctx)
        };

        let response = match dispatched {
            // middleware failure: the transport's generic error path
            Err(err) => WireResponse::json(err.status(), json!({ "error": err.message() })),
            Ok(Dispatched::Envelope(envelope)) => {
                WireResponse::json(envelope.status, envelope.to_value())
            }
            Ok(Dispatched::Raw(text)) => WireResponse::new(200, WireBody::Text(text)),
            Ok(Dispatched::Direct(Some(direct))) => WireResponse {
                status: direct.status,
                headers: direct.headers,
                body: WireBody::Text(direct.body),
            },
            Ok(Dispatched::Direct(None)) => WireResponse::new(200, WireBody::Empty),
        };
        (ctx, parsed, response)
    }
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let parsed = match parse_request(req) {
            Ok(parsed) => parsed,
            Err(_) => {
                write_json_error(res, 400, json!({ "error": "Bad Request" }));
                return Ok(());
            }
        };

        let (ctx, parsed, mut wire) = self.handle(parsed);

        let latency = ctx.started.elapsed();
        for mw in &self.middlewares {
            mw.after(&ctx, &parsed, &mut wire, latency);
        }

        write_wire_response(res, wire);
        Ok(())
    }
}

//! Positional handler-argument resolution.
//!
//! A pure mapping from `(request, response slot, next, descriptors)` to an
//! ordered argument array. Values are placed by each descriptor's declared
//! index (descriptor order in the metadata may differ) and the array is
//! pre-sized to the maximum declared index + 1, so no descriptor can land
//! out of bounds. Sources that have nothing to offer (a header that was not
//! sent, a session that was never attached, an unknown source kind) resolve
//! to [`HandlerArg::Absent`]; resolution itself never fails.

use crate::dispatcher::{HandlerArg, HandlerRequest, Next, ResponseSlot};
use crate::meta::{ParamDescriptor, ParamSource};
use serde_json::Value;

/// Resolve all declared parameters for one invocation.
#[must_use]
pub fn resolve_args(
    req: &HandlerRequest,
    slot: &ResponseSlot,
    next: &Next,
    descriptors: &[ParamDescriptor],
) -> Vec<HandlerArg> {
    let len = descriptors
        .iter()
        .map(|d| d.index + 1)
        .max()
        .unwrap_or(0);
    let mut args = Vec::with_capacity(len);
    args.resize_with(len, || HandlerArg::Absent);

    for descriptor in descriptors {
        args[descriptor.index] = resolve_one(req, slot, next, descriptor);
    }

    args
}

fn resolve_one(
    req: &HandlerRequest,
    slot: &ResponseSlot,
    next: &Next,
    descriptor: &ParamDescriptor,
) -> HandlerArg {
    let named = |lookup: fn(&HandlerRequest, &str) -> Option<String>| {
        descriptor
            .name
            .as_deref()
            .and_then(|name| lookup(req, name))
            .map_or(HandlerArg::Absent, |v| HandlerArg::Value(Value::String(v)))
    };

    match &descriptor.source {
        ParamSource::Body => req
            .body
            .clone()
            .map_or(HandlerArg::Absent, HandlerArg::Value),
        ParamSource::Param => named(|r, n| r.get_path_param(n).map(str::to_string)),
        ParamSource::Query => named(|r, n| r.get_query_param(n).map(str::to_string)),
        ParamSource::Queries => HandlerArg::Value(req.query_map()),
        ParamSource::Header => named(|r, n| r.get_header(n).map(str::to_string)),
        ParamSource::Headers => HandlerArg::Value(req.header_map()),
        ParamSource::Request => HandlerArg::Request(Box::new(req.clone())),
        ParamSource::Response => HandlerArg::Response(slot.clone()),
        ParamSource::Next => HandlerArg::Next(*next),
        ParamSource::Session => req
            .session
            .clone()
            .map_or(HandlerArg::Absent, HandlerArg::Value),
        ParamSource::User => req
            .user
            .clone()
            .map_or(HandlerArg::Absent, HandlerArg::Value),
        ParamSource::Ip => req
            .remote_addr
            .clone()
            .map_or(HandlerArg::Absent, |ip| {
                HandlerArg::Value(Value::String(ip))
            }),
        ParamSource::Hosts => req
            .hosts
            .clone()
            .map_or(HandlerArg::Absent, HandlerArg::Value),
        ParamSource::Unknown(_) => HandlerArg::Absent,
    }
}

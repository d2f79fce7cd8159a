//! Request dispatch: per-route handler coroutines, the dispatch pipeline,
//! and the response envelope.

mod core;
mod envelope;

pub use self::core::{
    DirectResponse, Dispatched, Dispatcher, HandlerArg, HandlerRef, HandlerRequest,
    HandlerSender, HeaderVec, Invocation, Next, ResponseSlot, MAX_INLINE_HEADERS, SPAN_HANDLER,
    SPAN_REQUEST,
};
pub use self::envelope::ResponseEnvelope;

#![deny(unsafe_code)]

//! Talks to the council backend: conversation CRUD and streamed stage events.

mod backend;
mod http;
mod sse;

pub use backend::{
    BackendError, BackendResult, BackendWorker, BoxFuture, CouncilBackend, CouncilEventStream,
    EventStreamHandle,
};
pub use http::{DEFAULT_BACKEND_URL, HttpCouncilBackend};
pub use sse::SseDecoder;

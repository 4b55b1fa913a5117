//! Middleware response protocol.

mod core;

pub use core::{
    apply_middleware_response, NEXT_HEADER, OVERRIDE_HEADERS, REQUEST_HEADER_PREFIX, REWRITE_HEADER,
};

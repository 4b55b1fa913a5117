//! Phase-based route matching.

mod core;
mod locale;

pub use core::{ContextHeaders, PhaseStatus, Pipeline, RequestContext, MAX_PHASE_CHECKS};

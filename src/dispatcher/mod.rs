//! Output dispatch and the top-level router façade.

mod core;

pub use core::{AssetStore, EdgeRouter, Handler, HandlerRegistry};

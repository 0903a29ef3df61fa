#![allow(clippy::must_use_candidate)]

//! Shared request context and error contracts for Prism
//!
//! Kept free of axum so feature crates can be exercised without an HTTP
//! server in the loop.

mod context;
mod error;

pub use context::{Dispatch, RequestContext, TokenUsage};
pub use error::HttpError;

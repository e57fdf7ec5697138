//! HTTP API for the agent service.
//!
//! ## Endpoints
//!
//! - `GET /` - Service metadata
//! - `GET /health` - Liveness probe (reports whether the agent was constructed)
//! - `POST /agent/run` - Run the agent on one task
//!
//! Every failure, including unknown routes and handler panics, is answered with
//! `{"detail", "error_type"}` and an `X-Error-Type` header.

mod error;
mod routes;
pub mod types;

pub use error::{ApiError, ERROR_TYPE_HEADER};
pub use routes::{router, serve, serve_on, AppState};
pub use types::*;

//! Axum HTTP/WebSocket server for the video processing queue.
//!
//! This crate provides:
//! - The realtime `/ws` endpoint bridging sockets to the job queue
//! - Health, readiness and queue inspection routes
//! - Security headers, request ids and request logging
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;

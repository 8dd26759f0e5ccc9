//! Shared data models for the vexport queue server.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, connections and lifecycle states
//! - Processing parameters, their validation and built-in templates
//! - Source media references and results
//! - WebSocket message schemas

pub mod job;
pub mod media;
pub mod params;
pub mod template;
pub mod ws;

// Re-export common types
pub use job::{ConnectionId, InvalidTransition, Job, JobId, JobState};
pub use media::{JobInputs, JobResult, MediaSource, ResultRef};
pub use params::{parse_hex_color, IntroAnimation, ProcessingParams, Violation};
pub use template::{templates, Template};
pub use ws::{ClientMessage, QueueSnapshot, ServerMessage, ServerMessageType};

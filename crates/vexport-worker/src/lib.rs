//! Queue scheduler and job processors.
//!
//! This crate provides:
//! - `QueueScheduler`: runs queued jobs one at a time with a timeout
//! - `JobProcessor`: the unit of work the scheduler drives
//! - `EffectsProcessor`: FFmpeg effects render returning the file inline
//! - Worker configuration and structured job logging

pub mod config;
pub mod effects;
pub mod error;
pub mod logging;
pub mod processor;
pub mod scheduler;

pub use config::{RenderConfig, WorkerConfig};
pub use effects::EffectsProcessor;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use processor::{JobProcessor, ProcessingRequest};
pub use scheduler::QueueScheduler;

//! Request handlers.

pub mod health;
pub mod queue;
pub mod templates;

pub use health::*;
pub use queue::*;
pub use templates::*;

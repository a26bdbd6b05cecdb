//! Segsplit - split an uploaded video into equal parts and bundle them.
//!
//! Hexagonal Architecture:
//! - domain/: Pure logic (segment planning, timecodes, job state)
//! - ports/: Trait definitions for the engine, the probe and storage
//! - adapters/: ffmpeg child processes, local storage, HTTP
//! - application/: Transcode invoker, split and archive jobs, sessions
//! - config: Environment configuration
//! - events: Job notifications

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod ports;

// Re-exports for convenience
pub use application::session::{Session, SessionRegistry};
pub use config::AppConfig;
pub use error::JobError;

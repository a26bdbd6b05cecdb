//! Domain layer - Pure types and computations.

pub mod jobs;
pub mod media;
pub mod plan;
pub mod timecode;

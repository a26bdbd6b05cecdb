//! Ports - Traits at the process and storage seams.

pub mod probe;
pub mod storage;
pub mod transcoder;

//! Application layer: the job engine, written against the ports.

pub mod archive;
pub mod invoker;
pub mod session;
pub mod split;

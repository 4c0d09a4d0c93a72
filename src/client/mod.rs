//! Blob service clients.
//!
//! The trait lives in [`service`]; [`azure`] is the real client and
//! [`memory`] is the process-local one used for tests and local runs.

pub mod azure;
pub mod memory;
pub mod service;

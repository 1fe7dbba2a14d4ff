//! Infrastructure layer providing external service integrations.
//!
//! This module contains the device-local key/value backends, the per-user
//! fallback store built on them, and the remote admission service clients.

pub mod persistence;
pub mod fallback;
pub mod http;
pub mod loopback;

pub use persistence::*;
pub use fallback::*;
pub use http::*;
pub use loopback::*;

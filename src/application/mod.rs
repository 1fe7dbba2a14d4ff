//! Application layer managing the wizard session and its workflows.
//!
//! This module coordinates between the domain and infrastructure layers and
//! the terminal front end: form state, debounced draft sync, submission and
//! the startup sequence, plus the UI state of the running app.

pub mod clock;
pub mod config;
pub mod notice;
pub mod form_store;
pub mod sync;
pub mod submission;
pub mod bootstrap;
pub mod worker;
pub mod session;
pub mod state;

pub use clock::*;
pub use config::*;
pub use notice::*;
pub use form_store::*;
pub use sync::*;
pub use submission::*;
pub use bootstrap::*;
pub use worker::*;
pub use session::*;
pub use state::*;

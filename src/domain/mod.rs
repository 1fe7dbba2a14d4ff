//! Domain layer: the admission form data model, error taxonomy and the
//! remote service contract.

pub mod models;
pub mod services;
pub mod errors;

pub use models::*;
pub use services::*;
pub use errors::*;

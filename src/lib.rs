//! admitsync - Admission Draft Sync Library
//!
//! Autosave, offline fallback and one-way submission for a multi-step
//! admission form, with a terminal front end built on ratatui.

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
pub use application::*;

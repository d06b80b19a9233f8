//! Shared types for the notification fan-out service

pub mod types;

pub use types::*;

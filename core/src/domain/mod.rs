//! Domain layer containing the business entities of the dispatcher.

pub mod entities;

// Re-export commonly used domain types
pub use entities::*;

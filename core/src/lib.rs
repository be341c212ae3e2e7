//! # Courier Core
//!
//! Domain layer of the verification dispatcher: entities, the error taxonomy,
//! collaborator traits and the dispatch pipeline (code generation, rendering,
//! delivery with retry, verification bookkeeping).

pub mod domain;
pub mod errors;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::*;
pub use errors::*;
pub use services::*;

//! Error handling shared by all routes

pub mod error;

pub use error::{json_error_handler, ApiError};

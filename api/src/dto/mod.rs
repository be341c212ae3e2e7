//! Request and response bodies

pub mod verification;

pub use verification::{CheckRequest, CheckResponse, DispatchRequest, DispatchResponse};

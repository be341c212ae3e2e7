//! Route handlers
//!
//! - `GET /health`
//! - `POST /api/v1/verification/dispatch`
//! - `POST /api/v1/verification/check`

pub mod health;
pub mod verification;

//! Verification record stores

pub mod memory_store;

pub use memory_store::InMemoryVerificationStore;

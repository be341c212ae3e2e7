//! HTTP surface of the Courier dispatcher
//!
//! Exposes dispatch and check endpoints over a [`DeliveryCoordinator`] built at
//! startup from the environment configuration.
//!
//! [`DeliveryCoordinator`]: courier_core::DeliveryCoordinator

pub mod app;
pub mod dto;
pub mod handlers;
pub mod routes;
pub mod telemetry;

pub use app::{build_coordinator, create_app, AppState, Dispatcher};

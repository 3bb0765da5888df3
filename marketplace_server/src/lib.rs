//! # Marketplace server
//! This crate hosts the HTTP surface of the marketplace engine. It is responsible for:
//! * Authenticating customers and store owners from their bearer tokens.
//! * Moving sub-orders through their lifecycle on their behalf.
//! * Receiving payment gateway webhooks and handing them to the reconciler.
//! * Answering review eligibility questions and recording reviews.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhooks/stripe`: Signed payment gateway events.
//! * `/customer/...`: Routes for customers. Requires a bearer token with the `Customer` role.
//! * `/store/...`: Routes for store owners. Requires a bearer token with the `Store` role.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;

//! API Module
//!
//! HTTP handlers and routing for the region cache REST API.
//!
//! # Endpoints
//! - `POST /regions` - Build a region with explicit options
//! - `GET /regions` - List regions
//! - `PUT /regions/:region/entries` - Write and commit a key-value pair
//! - `GET /regions/:region/entries/:key` - Read a value by key
//! - `GET /stats` - Transaction and per-region statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;

//! Request and Response models for the region cache API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{validate_region_name, CreateRegionRequest, PutRequest};
pub use responses::{
    ErrorResponse, GetResponse, HealthResponse, PutResponse, RegionResponse, RegionStatsResponse,
    StatsResponse,
};

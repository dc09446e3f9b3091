//! REST API client module for the school-management service.
//!
//! This module provides the `ApiClient` for communicating with the
//! remote service: the roster, academic catalog, grade registry,
//! attendance/participation events, and the precomputed dashboards.
//!
//! Requests authenticate with a bearer token obtained from the login
//! endpoint. Reads get a bounded retry; mutations are never retried.

pub mod client;
pub mod error;

pub use client::{ApiClient, AsistenciaFilters, ParticipacionFilters};
pub use error::ApiError;

//! Local caching module for offline data access.
//!
//! This module provides the `CacheManager` for storing and retrieving
//! service data locally. Data is cached in JSON format under a canonical
//! `QueryKey` (scope + filter dimensions) and considered stale after 60
//! minutes.
//!
//! Mutations invalidate by predicate over keys: creating, updating, or
//! deleting a record drops every cached read that depended on it.

pub mod manager;

pub use manager::{CacheManager, CachedData, QueryKey, Scope};

// src/models/mod.rs

//! Domain models for the directory proxy.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod course;
mod institution;
mod pagination;

// Re-export all public types
pub use config::{CacheConfig, Config, QueryConfig, ServerConfig, UpstreamConfig};
pub use course::{CourseCatalog, CourseOffering};
pub use institution::{
    Category, ID_PREFIX, Location, NormalizedInstitution, Ownership, RawRecord, scalar_text,
};
pub use pagination::{PageRequest, PaginationInfo, paginate};

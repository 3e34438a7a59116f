// src/lib.rs

//! College directory proxy library
//!
//! Serves a stable, filterable, paginated view of an external college
//! directory whose API pages in fixed blocks of ten, pads with `null`s past
//! the end of data, and fails transiently. Full collections are materialized
//! per state or district and held in a memory-only TTL cache.

pub mod cache;
pub mod error;
pub mod models;
pub mod server;
pub mod services;
pub mod utils;

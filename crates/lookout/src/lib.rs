//! Lookout: person sighting search over archived camera embeddings
//!
//! A query carries reference images, a list of cameras and a time window.
//! Each camera's archived tracks are scanned for records whose embedding
//! lies close enough to the query, and the first and last matching
//! timestamps are reported per camera. Queries run as background tasks that
//! callers wait on for a bounded time.

pub mod archive;
pub mod config;
pub mod embedder;
pub mod error;
pub mod journal;
pub mod matcher;
pub mod server;
pub mod task;
pub mod timestamp;

//! Core data model for objects discovered in a bucket.
//!
//! The downloader only needs an object's key and size.

pub mod object;

//! Download pipeline: store access, enumeration, scheduling and local writes.

pub mod download_service;
pub mod enumerator;
pub mod file_sink;
pub mod gcs_client;
pub mod listing;
pub mod path_mapper;
pub mod scheduler;
pub mod storage_client;

#[cfg(test)]
pub(crate) mod testing;

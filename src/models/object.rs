//! Represents an object (file) found in a bucket.

/// Metadata for a single remote object, as reported by the store listing.
///
/// Only the key and size are carried; the content itself is streamed on
/// demand through [`crate::services::storage_client::StorageClient::open`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Object key (path-like identifier within the bucket).
    pub name: String,

    /// Size in bytes as declared by the store.
    pub size: u64,
}

impl ObjectInfo {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }

    /// Keys ending in `/` are folder placeholders, not downloadable content.
    pub fn is_directory_marker(&self) -> bool {
        self.name.ends_with('/')
    }
}

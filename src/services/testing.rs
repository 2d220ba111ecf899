//! In-memory doubles for the storage client, file sink and listing output.

use super::{
    file_sink::{CopyError, FileSink},
    storage_client::{ByteStream, ObjectInfoStream, StorageClient, StoreError, StoreResult},
};
use crate::models::object::ObjectInfo;
use bytes::Bytes;
use futures::{StreamExt, stream};
use std::{
    collections::{HashMap, HashSet},
    io::{self, Cursor, Write},
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio_util::io::ReaderStream;

pub const MOCK_BUCKET: &str = "bucket";

/// Serves a fixed set of objects from `MOCK_BUCKET`.
#[derive(Default)]
pub struct MockClient {
    objects: Vec<(ObjectInfo, Bytes)>,
    walk_failure_after: Option<usize>,
    failing_reads: HashSet<String>,
    connected: AtomicBool,
    opened: Mutex<Vec<String>>,
}

impl MockClient {
    /// Objects as `(name, declared size, content)`.
    pub fn with_objects<'a>(objects: impl IntoIterator<Item = (&'a str, u64, &'a str)>) -> Self {
        Self {
            objects: objects
                .into_iter()
                .map(|(name, size, content)| {
                    (
                        ObjectInfo::new(name, size),
                        Bytes::copy_from_slice(content.as_bytes()),
                    )
                })
                .collect(),
            ..Self::default()
        }
    }

    /// Three objects beneath `prefix/`, one of them nested.
    pub fn sample() -> Self {
        Self::with_objects([
            ("prefix/foo", 12, "prefix/foo contents"),
            ("prefix/bar", 12, "prefix/bar contents"),
            ("prefix/baz/qux", 12, "prefix/baz/qux contents"),
        ])
    }

    /// End the walk with an error after yielding `count` objects.
    pub fn fail_walk_after(mut self, count: usize) -> Self {
        self.walk_failure_after = Some(count);
        self
    }

    pub fn fail_read(mut self, name: &str) -> Self {
        self.failing_reads.insert(name.to_string());
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl StorageClient for MockClient {
    async fn connect(&mut self) -> StoreResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn walk(&self, bucket: &str, prefix: &str) -> ObjectInfoStream {
        if !self.is_connected() {
            return stream::iter([Err(StoreError::NotConnected)]).boxed();
        }
        let mut items: Vec<StoreResult<ObjectInfo>> = self
            .objects
            .iter()
            .filter(|(info, _)| bucket == MOCK_BUCKET && info.name.starts_with(prefix))
            .map(|(info, _)| Ok(info.clone()))
            .collect();
        if let Some(count) = self.walk_failure_after {
            items.truncate(count);
            items.push(Err(io::Error::other("listing interrupted").into()));
        }
        stream::iter(items).boxed()
    }

    async fn open(&self, bucket: &str, name: &str) -> StoreResult<ByteStream> {
        self.opened.lock().unwrap().push(name.to_string());
        if self.failing_reads.contains(name) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "access denied").into());
        }
        let content = self
            .objects
            .iter()
            .find(|(info, _)| bucket == MOCK_BUCKET && info.name == name)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no such object {name}")))?;
        Ok(ReaderStream::with_capacity(Cursor::new(content), 4).boxed())
    }

    fn close(&self) -> StoreResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Collects copied content in memory and tracks how many copies overlap.
#[derive(Default)]
pub struct MockSink {
    copied: Mutex<HashMap<PathBuf, Vec<u8>>>,
    active: AtomicUsize,
    peak: AtomicUsize,
    delay: Option<Duration>,
}

impl MockSink {
    /// Hold each copy open for `delay` so overlapping copies are observable.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn copied(&self) -> HashMap<PathBuf, Vec<u8>> {
        self.copied.lock().unwrap().clone()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn drain(&self, path: &Path, mut content: ByteStream) -> Result<u64, CopyError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut data = Vec::new();
        while let Some(chunk) = content.next().await {
            let chunk = chunk.map_err(|source| CopyError::ReadStream {
                path: path.to_path_buf(),
                source,
            })?;
            data.extend_from_slice(&chunk);
        }

        let mut copied = self.copied.lock().unwrap();
        if copied.contains_key(path) {
            return Err(CopyError::CreateFile {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::AlreadyExists, "file has already been copied"),
            });
        }
        let written = data.len() as u64;
        copied.insert(path.to_path_buf(), data);
        Ok(written)
    }
}

impl FileSink for MockSink {
    async fn copy_to_file(&self, path: &Path, content: ByteStream) -> Result<u64, CopyError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        let result = self.drain(path, content).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Cloneable in-memory writer for capturing the listing.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

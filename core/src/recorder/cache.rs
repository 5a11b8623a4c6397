//! Binary payload cache
//!
//! Stores deduplicated copies of every byte range moved across the API
//! boundary. Each unique payload gets a stable index that the replay program
//! uses to reference its decoded copy.
//!
//! Lookup is a linear scan over entries of the same length, first match
//! wins. Recordings are short and bounded, so the scan cost is acceptable.

use gpurec_shared::{ByteView, ElementKind};
use xxhash_rust::xxh3::xxh3_64;

/// A stored payload
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Element type the payload is decoded as
    pub kind: ElementKind,
    /// Declared length in elements
    pub len: usize,
    /// Copy of the payload bytes
    pub bytes: Vec<u8>,
    /// xxHash3 of `bytes`, checked before the full comparison
    checksum: u64,
}

/// Deduplicating store of binary payloads
#[derive(Debug, Default)]
pub struct BinaryCache {
    entries: Vec<CacheEntry>,
    /// Bytes offered to the cache, including duplicates
    bytes_seen: u64,
}

impl BinaryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache `count` elements of `source`, starting at element `offset`.
    ///
    /// The absolute byte range accounts for the view's own offset and its
    /// element width. A range running past the end of the view is clamped to
    /// the view.
    pub fn cache(&mut self, source: &ByteView, offset: usize, count: usize) -> usize {
        let offset = offset.min(source.len());
        let count = count.min(source.len() - offset);
        let bytes = source.read_elements(offset, count).unwrap_or_default();
        self.insert(source.kind(), count, bytes)
    }

    /// Cache a whole view
    pub fn cache_view(&mut self, source: &ByteView) -> usize {
        self.cache(source, 0, source.len())
    }

    /// Cache raw bytes as a byte-typed payload
    pub fn cache_bytes(&mut self, bytes: Vec<u8>) -> usize {
        let len = bytes.len();
        self.insert(ElementKind::U8, len, bytes)
    }

    fn insert(&mut self, kind: ElementKind, len: usize, bytes: Vec<u8>) -> usize {
        self.bytes_seen += bytes.len() as u64;
        let checksum = xxh3_64(&bytes);

        let existing = self.entries.iter().position(|entry| {
            entry.kind == kind
                && entry.len == len
                && entry.checksum == checksum
                && entry.bytes == bytes
        });
        if let Some(index) = existing {
            return index;
        }

        self.entries.push(CacheEntry {
            kind,
            len,
            bytes,
            checksum,
        });
        self.entries.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&CacheEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes held by stored entries
    pub fn stored_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.bytes.len() as u64).sum()
    }

    /// Bytes offered to the cache, before deduplication
    pub fn bytes_seen(&self) -> u64 {
        self.bytes_seen
    }
}

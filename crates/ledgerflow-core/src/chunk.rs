//! Bounded-size chunking
//!
//! The bulk store accepts at most [`BATCH_LIMIT`] put-requests per call, so
//! every sequence handed to the bulk writer is split here first.
//!
//! ```rust,ignore
//! let chunker = Chunker::new(25)?;
//! for chunk in chunker.chunks(&requests) {
//!     writer.write_chunk(table, chunk.to_vec()).await;
//! }
//! ```

use crate::error::{Error, Result};

/// Maximum put-requests per bulk-write call
pub const BATCH_LIMIT: usize = 25;

/// Splits sequences into contiguous chunks of at most `limit` items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    limit: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self { limit: BATCH_LIMIT }
    }
}

impl Chunker {
    /// Create a chunker; `limit` must be in `1..=BATCH_LIMIT`
    pub fn new(limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(Error::Config("batch limit must be at least 1".into()));
        }
        if limit > BATCH_LIMIT {
            return Err(Error::Config(format!(
                "batch limit {} exceeds the store maximum of {}",
                limit, BATCH_LIMIT
            )));
        }
        Ok(Self { limit })
    }

    /// Configured chunk size
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Lazily split `items` in order; the last chunk may be shorter
    pub fn chunks<'a, T>(&self, items: &'a [T]) -> std::slice::Chunks<'a, T> {
        items.chunks(self.limit)
    }

    /// Split an owned vector into owned chunks
    pub fn into_chunks<T>(&self, items: Vec<T>) -> impl Iterator<Item = Vec<T>> {
        let limit = self.limit;
        let mut rest = items.into_iter().peekable();
        std::iter::from_fn(move || {
            rest.peek()?;
            Some(rest.by_ref().take(limit).collect())
        })
    }

    /// Number of chunks `len` items produce
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_limit_rejected() {
        assert!(matches!(Chunker::new(0), Err(Error::Config(_))));
    }

    #[test]
    fn test_limit_above_store_maximum_rejected() {
        assert!(matches!(Chunker::new(BATCH_LIMIT + 1), Err(Error::Config(_))));
        assert!(matches!(Chunker::new(100), Err(Error::Config(_))));
        assert_eq!(Chunker::new(BATCH_LIMIT).unwrap().limit(), BATCH_LIMIT);
    }

    #[test]
    fn test_default_limit() {
        assert_eq!(Chunker::default().limit(), BATCH_LIMIT);
    }

    #[test]
    fn test_sixty_items() {
        let items: Vec<u32> = (0..60).collect();
        let sizes: Vec<usize> = Chunker::default().chunks(&items).map(<[u32]>::len).collect();
        assert_eq!(sizes, vec![25, 25, 10]);
    }

    #[test]
    fn test_empty_input() {
        let items: Vec<u32> = Vec::new();
        assert_eq!(Chunker::default().chunks(&items).count(), 0);
        assert_eq!(Chunker::default().into_chunks(items).count(), 0);
    }

    proptest! {
        #[test]
        fn chunks_partition_input(items in proptest::collection::vec(any::<u16>(), 0..300), limit in 1usize..=BATCH_LIMIT) {
            let chunker = Chunker::new(limit).unwrap();
            let chunks: Vec<&[u16]> = chunker.chunks(&items).collect();

            prop_assert_eq!(chunks.len(), items.len().div_ceil(limit));
            prop_assert_eq!(chunks.len(), chunker.chunk_count(items.len()));
            prop_assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= limit));
            prop_assert_eq!(chunks.concat(), items.clone());
        }

        #[test]
        fn owned_chunks_match_borrowed(items in proptest::collection::vec(any::<u16>(), 0..120), limit in 1usize..=BATCH_LIMIT) {
            let chunker = Chunker::new(limit).unwrap();
            let borrowed: Vec<Vec<u16>> = chunker.chunks(&items).map(<[u16]>::to_vec).collect();
            let owned: Vec<Vec<u16>> = chunker.into_chunks(items).collect();
            prop_assert_eq!(borrowed, owned);
        }
    }
}

//! Segment allocation and rollover.
//!
//! The allocator owns the open segment. When the caller decides to roll
//! over, the open segment is written to `s/<id>`, its id is appended to
//! `s/segment_list.txt`, and an empty segment with the next id is opened.
//! Empty segments are never written, so flushed ids are `0, 1, 2, ...` with
//! no gaps.

use crate::dir::ArchiveLayout;
use crate::error::{CoreError, CoreResult};
use crate::segment::{ColumnPositions, Segment, ENTRY_SIZE};
use logvault_codec::StreamCodec;
use logvault_storage::{FileBackend, StorageBackend};
use tracing::debug;

/// A segment that has been written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushedSegment {
    /// Segment id.
    pub id: u64,
    /// Messages in the segment.
    pub message_count: u64,
    /// Uncompressed column bytes.
    pub uncompressed_size: u64,
    /// Bytes on disk.
    pub stored_size: u64,
}

/// Decides which segment receives the next message and writes full ones.
pub struct SegmentAllocator {
    layout: ArchiveLayout,
    codec: Box<dyn StreamCodec>,
    target_size: u64,
    sync: bool,
    current: Segment,
    flushed: Vec<FlushedSegment>,
    segment_list: FileBackend,
}

impl SegmentAllocator {
    /// Creates an allocator whose first segment has id 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment list cannot be created.
    pub fn new(
        layout: ArchiveLayout,
        codec: Box<dyn StreamCodec>,
        target_size: u64,
        sync: bool,
    ) -> CoreResult<Self> {
        let segment_list = FileBackend::create_new(&layout.segment_list_path())?;
        Ok(Self {
            layout,
            codec,
            target_size,
            sync,
            current: Segment::new(0),
            flushed: Vec::new(),
            segment_list,
        })
    }

    /// The open segment.
    #[must_use]
    pub fn current(&self) -> &Segment {
        &self.current
    }

    /// Id of the open segment.
    #[must_use]
    pub fn current_id(&self) -> u64 {
        self.current.id()
    }

    /// Where the next message will land in the open segment.
    #[must_use]
    pub fn positions(&self) -> ColumnPositions {
        self.current.positions()
    }

    /// Whether appending a message with `variable_count` variables would push
    /// a non-empty open segment past the target size.
    #[must_use]
    pub fn would_overflow(&self, variable_count: usize) -> bool {
        let added = (2 + variable_count as u64) * ENTRY_SIZE;
        !self.current.is_empty() && self.current.uncompressed_size() + added > self.target_size
    }

    /// Whether the open segment has reached the target size.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.current.uncompressed_size() >= self.target_size
    }

    /// Appends one encoded message to the open segment.
    pub fn append(&mut self, timestamp: i64, logtype_id: u64, variable_ids: &[u64]) {
        self.current.push_message(timestamp, logtype_id, variable_ids);
    }

    /// Writes the open segment and opens the next one.
    ///
    /// Returns `None` without consuming an id if the open segment is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment cannot be encoded or written.
    pub fn rollover(&mut self) -> CoreResult<Option<FlushedSegment>> {
        if self.current.is_empty() {
            return Ok(None);
        }
        let id = self.current.id();
        let frame = self.current.to_frame(self.codec.as_ref())?;

        let mut backend = FileBackend::create_new(&self.layout.segment_path(id))?;
        backend.append(&frame)?;
        if self.sync {
            backend.sync()?;
        } else {
            backend.flush()?;
        }
        self.segment_list.append(format!("{id}\n").as_bytes())?;
        self.segment_list.flush()?;

        let flushed = FlushedSegment {
            id,
            message_count: self.current.message_count() as u64,
            uncompressed_size: self.current.uncompressed_size(),
            stored_size: frame.len() as u64,
        };
        debug!(
            segment = id,
            messages = flushed.message_count,
            stored = flushed.stored_size,
            "segment rolled over"
        );
        self.flushed.push(flushed);
        self.current = Segment::new(id + 1);
        Ok(Some(flushed))
    }

    /// Writes the final, possibly partial, segment and syncs the list.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment or list cannot be written.
    pub fn finish(&mut self) -> CoreResult<Option<FlushedSegment>> {
        let last = self.rollover()?;
        if self.sync {
            self.segment_list.sync()?;
        }
        Ok(last)
    }

    /// Segments written so far, in id order.
    #[must_use]
    pub fn flushed(&self) -> &[FlushedSegment] {
        &self.flushed
    }

    /// Bytes on disk of every written segment plus the segment list.
    ///
    /// # Errors
    ///
    /// Returns an error if the list size cannot be read.
    pub fn stored_size(&self) -> CoreResult<u64> {
        let segments: u64 = self.flushed.iter().map(|s| s.stored_size).sum();
        Ok(segments + self.segment_list.size()?)
    }
}

impl std::fmt::Debug for SegmentAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentAllocator")
            .field("codec", &self.codec.kind())
            .field("target_size", &self.target_size)
            .field("current", &self.current.id())
            .field("flushed", &self.flushed.len())
            .finish()
    }
}

/// Parses `segment_list.txt`.
///
/// # Errors
///
/// Returns [`CoreError::Corruption`] if a line is not an id or ids
/// are not `0, 1, 2, ...`.
pub fn parse_segment_list(text: &str) -> CoreResult<Vec<u64>> {
    let mut ids = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let id: u64 = line.parse().map_err(|_| {
            CoreError::corruption(format!("segment list line {}: {line:?}", line_no + 1))
        })?;
        if id != ids.len() as u64 {
            return Err(CoreError::corruption(format!(
                "segment list expected id {} but found {id}",
                ids.len()
            )));
        }
        ids.push(id);
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dir::ArchiveDir;
    use logvault_codec::{CodecKind, PassthroughCodec};
    use std::fs;
    use tempfile::tempdir;

    fn allocator(root: &std::path::Path, target: u64) -> (ArchiveDir, SegmentAllocator) {
        let dir = ArchiveDir::create(root).unwrap();
        let alloc =
            SegmentAllocator::new(dir.layout().clone(), Box::new(PassthroughCodec), target, false)
                .unwrap();
        (dir, alloc)
    }

    #[test]
    fn empty_segment_is_not_written() {
        let temp = tempdir().unwrap();
        let (_dir, mut alloc) = allocator(temp.path(), 1024);
        assert!(alloc.finish().unwrap().is_none());
        assert_eq!(alloc.current_id(), 0);
        assert!(!temp.path().join("s/0").exists());
        assert_eq!(fs::read_to_string(temp.path().join("s/segment_list.txt")).unwrap(), "");
    }

    #[test]
    fn rollover_writes_segments_in_order() {
        let temp = tempdir().unwrap();
        let (_dir, mut alloc) = allocator(temp.path(), 4 * ENTRY_SIZE);

        alloc.append(1, 0, &[0]);
        assert!(!alloc.is_full());
        assert!(alloc.would_overflow(0));
        let first = alloc.rollover().unwrap().unwrap();
        assert_eq!(first.id, 0);
        assert_eq!(first.message_count, 1);

        alloc.append(2, 0, &[1, 2]);
        assert!(alloc.is_full());
        alloc.finish().unwrap();

        let list = fs::read_to_string(temp.path().join("s/segment_list.txt")).unwrap();
        assert_eq!(parse_segment_list(&list).unwrap(), vec![0, 1]);
        let segment = Segment::from_frame(1, &fs::read(temp.path().join("s/1")).unwrap()).unwrap();
        assert_eq!(segment.variable_ids(), &[1, 2]);
        assert_eq!(alloc.flushed().len(), 2);
        assert!(alloc.stored_size().unwrap() > 0);
    }

    #[test]
    fn first_message_never_overflows() {
        let temp = tempdir().unwrap();
        let dir = ArchiveDir::create(temp.path()).unwrap();
        let alloc =
            SegmentAllocator::new(dir.layout().clone(), CodecKind::Zstd.build(3), 1, true).unwrap();
        assert!(!alloc.would_overflow(100));
    }

    #[test]
    fn segment_list_gaps_rejected() {
        assert_eq!(parse_segment_list("0\n1\n2\n").unwrap(), vec![0, 1, 2]);
        assert!(parse_segment_list("0\n2\n").is_err());
        assert!(parse_segment_list("1\n").is_err());
        assert!(parse_segment_list("zero\n").is_err());
    }
}

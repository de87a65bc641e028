//! Scatter/gather segment cursor
//!
//! Delivers a corrected block across the segments of a vectored request,
//! starting from any segment and offset within it.

use crate::domain::BlockSink;

/// [`BlockSink`] over a list of mutable segments.
#[derive(Debug)]
pub struct SegmentCursor<'a> {
    segments: Vec<&'a mut [u8]>,
    index: usize,
    offset: usize,
    written: usize,
}

impl<'a> SegmentCursor<'a> {
    pub fn new(segments: Vec<&'a mut [u8]>) -> Self {
        Self {
            segments,
            index: 0,
            offset: 0,
            written: 0,
        }
    }

    /// Begin writing at byte `offset` of segment `index`.
    pub fn starting_at(mut self, index: usize, offset: usize) -> Self {
        self.index = index;
        self.offset = offset;
        self
    }

    /// Bytes handed out so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Current segment index and offset within it.
    pub fn position(&self) -> (usize, usize) {
        (self.index, self.offset)
    }
}

impl BlockSink for SegmentCursor<'_> {
    fn next_segment(&mut self, max_len: usize) -> Option<&mut [u8]> {
        while self
            .segments
            .get(self.index)
            .is_some_and(|segment| self.offset >= segment.len())
        {
            self.index += 1;
            self.offset = 0;
        }

        let start = self.offset;
        let len = (self.segments.get(self.index)?.len() - start).min(max_len);
        self.offset += len;
        self.written += len;
        Some(&mut self.segments[self.index][start..start + len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walks_segments() {
        let mut a = [0u8; 3];
        let mut b = [0u8; 5];
        let mut cursor = SegmentCursor::new(vec![&mut a[..], &mut b[..]]);

        assert_eq!(cursor.next_segment(10).map(|s| s.len()), Some(3));
        let seg = cursor.next_segment(2).unwrap();
        seg.fill(7);
        assert_eq!(cursor.next_segment(10).map(|s| s.len()), Some(3));
        assert!(cursor.next_segment(1).is_none());
        assert_eq!(cursor.written(), 8);
        drop(cursor);
        assert_eq!(b, [7, 7, 0, 0, 0]);
    }

    #[test]
    fn test_starting_offset() {
        let mut a = [0u8; 4];
        let mut b = [0u8; 4];
        let mut cursor = SegmentCursor::new(vec![&mut a[..], &mut b[..]]).starting_at(0, 4);

        cursor.next_segment(2).unwrap().fill(1);
        assert_eq!(cursor.position(), (1, 2));
        drop(cursor);
        assert_eq!(b, [1, 1, 0, 0]);
    }
}

//! Visibility segments shared by the segmented marker and analogue layouts.
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek};
use std::ops::Range;

use crate::cursor::{ByteCursor, RESERVED_WORD};
use crate::error::{Result, TdfError};

/// A contiguous run of frames (or samples) that were actually captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start: usize,
    pub length: usize,
}

impl Segment {
    pub fn range(&self) -> Range<usize> { self.start..self.start + self.length }
}

/// Read `[count i32][reserved 4][(start i32, length i32) * count]` and check
/// every pair against `limit` (frame or sample count).
pub fn read_segments<R: Read + Seek>(cur: &mut ByteCursor<R>, owner: &str, limit: usize) -> Result<Vec<Segment>> {
    let count = cur.read_count("segment count")?;
    cur.skip(RESERVED_WORD)?;
    let raw = cur.read_i32s(count.saturating_mul(2))?;
    raw.chunks_exact(2)
        .enumerate()
        .map(|(index, pair)| {
            let (start, length) = (pair[0], pair[1]);
            let out_of_range = || TdfError::SegmentOutOfRange { owner: owner.to_string(), index, start, length, limit };
            let s = usize::try_from(start).map_err(|_| out_of_range())?;
            let l = usize::try_from(length).map_err(|_| out_of_range())?;
            if s.checked_add(l).is_none_or(|end| end > limit) {
                return Err(out_of_range());
            }
            Ok(Segment { start: s, length: l })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn bytes(values: &[i32]) -> ByteCursor<Cursor<Vec<u8>>> {
        let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        ByteCursor::new(Cursor::new(raw)).unwrap()
    }

    #[test]
    fn reads_pairs_after_reserved_word() {
        let mut c = bytes(&[2, -1, 0, 4, 10, 2]);
        let segs = read_segments(&mut c, "RASI", 12).unwrap();
        assert_eq!(segs, vec![Segment { start: 0, length: 4 }, Segment { start: 10, length: 2 }]);
        assert_eq!(segs[1].range(), 10..12);
        assert_eq!(c.remaining(), 0);
    }

    #[test]
    fn segment_past_limit_is_rejected() {
        let mut c = bytes(&[1, 0, 9, 4]);
        match read_segments(&mut c, "RASI", 12) {
            Err(TdfError::SegmentOutOfRange { owner, index: 0, start: 9, length: 4, limit: 12 }) => assert_eq!(owner, "RASI"),
            other => panic!("unexpected {other:?}"),
        }
        let mut c = bytes(&[1, 0, -1, 2]);
        assert!(matches!(read_segments(&mut c, "x", 12), Err(TdfError::SegmentOutOfRange { .. })));
    }

    #[test]
    fn zero_segments() {
        let mut c = bytes(&[0, 0]);
        assert!(read_segments(&mut c, "x", 3).unwrap().is_empty());
    }
}

//! TDF header validation and block directory walk.
//!
//! Layout (little-endian):
//! `[signature 16][version u32][entries i32][40 reserved]` followed by
//! `entries` descriptors `[type i32][format i32][offset i32][size i32]`, each
//! trailed by [`ENTRY_TRAILER`] bytes we never look at.
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek};
use tracing::debug;

use crate::cursor::ByteCursor;
use crate::error::{Result, TdfError};

/// Reference signature, four LE words rendered as `{:08x}`.
pub const TDF_SIGNATURE: &str = "41604B82CA8411D3ACB60060080C6816";

pub const MARKER_BLOCK_TYPE: i32 = 5;
pub const ANALOGUE_BLOCK_TYPE: i32 = 14;

/// Reserved bytes between the header and the first descriptor (40 bytes).
pub const DIRECTORY_GAP: i64 = 40;
/// Bytes following each 16-byte descriptor: 16 reserved + 256 comment.
pub const ENTRY_TRAILER: i64 = 16 + 256;

/// Marker formats laid out per track with visibility segments.
pub const SEGMENTED_MARKER_FORMATS: [i32; 2] = [1, 2];
/// Marker formats stored as one dense frame matrix.
pub const DENSE_MARKER_FORMATS: [i32; 2] = [3, 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Marker3D,
    Analogue,
    Other(i32),
}

impl From<i32> for BlockKind {
    fn from(code: i32) -> Self {
        match code {
            MARKER_BLOCK_TYPE => BlockKind::Marker3D,
            ANALOGUE_BLOCK_TYPE => BlockKind::Analogue,
            other => BlockKind::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDescriptor {
    pub kind: BlockKind,
    pub format: i32,
    pub offset: i32,
    pub size: i32,
}

/// Result of a directory walk.
#[derive(Debug, Clone)]
pub struct Directory {
    pub version: u32,
    /// Every descriptor in file order.
    pub entries: Vec<BlockDescriptor>,
    marker: Option<BlockDescriptor>,
    analogue: Option<BlockDescriptor>,
    accept_dense: bool,
}

impl Directory {
    /// Walk the header and directory. Only the signature, entry count and
    /// bounds are validated here; block lookups happen on demand.
    pub fn scan<R: Read + Seek>(cur: &mut ByteCursor<R>, accept_dense: bool) -> Result<Self> {
        let found = read_signature(cur)?;
        if !found.eq_ignore_ascii_case(TDF_SIGNATURE) {
            return Err(TdfError::InvalidFormat { expected: TDF_SIGNATURE, found });
        }
        let version = cur.read_u32()?;
        let n_entries = cur.read_i32()?;
        if n_entries <= 0 {
            return Err(TdfError::EmptyFile { entries: n_entries });
        }

        let mut entries = Vec::new();
        let (mut marker, mut analogue) = (None, None);
        let mut gap = DIRECTORY_GAP;
        for i in 0..n_entries {
            cur.skip(gap)?;
            let at = cur.position();
            let d = BlockDescriptor {
                kind: cur.read_i32()?.into(),
                format: cur.read_i32()?,
                offset: cur.read_i32()?,
                size: cur.read_i32()?,
            };
            debug!(entry = i, at, kind = ?d.kind, format = d.format, offset = d.offset, size = d.size, "directory entry");
            match d.kind {
                BlockKind::Marker3D => marker = Some(d),
                BlockKind::Analogue => analogue = Some(d),
                BlockKind::Other(_) => {}
            }
            entries.push(d);
            gap = ENTRY_TRAILER;
        }
        Ok(Self { version, entries, marker, analogue, accept_dense })
    }

    /// The 3D marker descriptor, provided its format is one we accept.
    pub fn marker_block(&self) -> Result<BlockDescriptor> {
        match self.marker {
            Some(d) if self.marker_format_accepted(d.format) => Ok(d),
            Some(d) => Err(TdfError::MissingMarkerData { found: Some(d.format) }),
            None => Err(TdfError::MissingMarkerData { found: None }),
        }
    }

    pub fn analogue_block(&self) -> Result<BlockDescriptor> {
        self.analogue.ok_or(TdfError::MissingAnalogueData)
    }

    /// Both descriptors, marker checked first.
    pub fn required_blocks(&self) -> Result<(BlockDescriptor, BlockDescriptor)> {
        Ok((self.marker_block()?, self.analogue_block()?))
    }

    fn marker_format_accepted(&self, format: i32) -> bool {
        SEGMENTED_MARKER_FORMATS.contains(&format)
            || (self.accept_dense && DENSE_MARKER_FORMATS.contains(&format))
    }
}

fn read_signature<R: Read + Seek>(cur: &mut ByteCursor<R>) -> Result<String> {
    let mut sig = String::with_capacity(32);
    for _ in 0..4 {
        sig.push_str(&format!("{:08x}", cur.read_u32()?));
    }
    Ok(sig)
}

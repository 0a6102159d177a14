//! Export archive for decoded sessions.
//!
//! An archive is a run of checksummed frames `[len u32][crc32 u32][payload]`,
//! the payload being a `bincode`-encoded [`RecordFrame`]. The header frame
//! comes first; marker and analogue frames follow for whichever modalities
//! the session decoded.
use anyhow::{bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use time::OffsetDateTime;

use crate::analogue::AnalogueSeries;
use crate::directory::BlockDescriptor;
use crate::markers::MarkerSeries;
use crate::options::DecodeOptions;
use crate::session::CaptureSession;

pub const ARCHIVE_VERSION: u16 = 1;

/// `len` + `crc32`.
const FRAME_PREFIX: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportHeader {
    pub version: u16,
    pub created_unix_ns: i128,
    pub source: String, // empty for in-memory sources
    pub options: DecodeOptions,
    pub directory: Vec<BlockDescriptor>,
    pub issues: Vec<String>,
}

impl ExportHeader {
    pub fn describe(session: &CaptureSession) -> Self {
        Self {
            version: ARCHIVE_VERSION,
            created_unix_ns: OffsetDateTime::now_utc().unix_timestamp_nanos(),
            source: session.source().map(|p| p.display().to_string()).unwrap_or_default(),
            options: session.options(),
            directory: session.directory().entries.clone(),
            issues: session.issues().iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RecordFrame {
    Header(ExportHeader),
    Markers(MarkerSeries),
    Analogue(AnalogueSeries),
}

/// Appends checksummed frames to `W`.
pub struct ArchiveWriter<W: Write> {
    out: W,
    written: usize,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(out: W) -> Self { Self { out, written: 0 } }

    pub fn push(&mut self, frame: &RecordFrame) -> Result<()> {
        let payload = bincode::serialize(frame)?;
        let len = u32::try_from(payload.len()).context("frame larger than 4 GiB")?;
        let mut prefix = [0u8; FRAME_PREFIX];
        prefix[..4].copy_from_slice(&len.to_le_bytes());
        prefix[4..].copy_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        self.out.write_all(&prefix)?;
        self.out.write_all(&payload)?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize { self.written }

    /// Flush and hand back the sink.
    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Yields frames until a clean end of input; any damage ends iteration with an error.
pub struct ArchiveReader<R: Read> {
    src: R,
    index: usize,
    failed: bool,
}

impl<R: Read> ArchiveReader<R> {
    pub fn new(src: R) -> Self { Self { src, index: 0, failed: false } }

    fn next_frame(&mut self) -> Result<Option<RecordFrame>> {
        let mut prefix = [0u8; FRAME_PREFIX];
        match fill(&mut self.src, &mut prefix)? {
            0 => return Ok(None),
            FRAME_PREFIX => {}
            n => bail!("frame {}: truncated prefix ({n} of {FRAME_PREFIX} bytes)", self.index),
        }
        let len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
        let crc = u32::from_le_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]);

        // Grows with the bytes actually present, never with the declared length.
        let mut payload = Vec::new();
        (&mut self.src).take(len.into()).read_to_end(&mut payload)?;
        ensure!(payload.len() == len as usize, "frame {}: truncated payload ({} of {len} bytes)", self.index, payload.len());
        let actual = crc32fast::hash(&payload);
        ensure!(actual == crc, "CRC mismatch at frame {}: stored {crc:#x}, computed {actual:#x}", self.index);
        let frame = bincode::deserialize(&payload).with_context(|| format!("frame {}: bincode decode", self.index))?;
        self.index += 1;
        Ok(Some(frame))
    }
}

impl<R: Read> Iterator for ArchiveReader<R> {
    type Item = Result<RecordFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed { return None; }
        let item = self.next_frame().transpose();
        self.failed = matches!(item, Some(Err(_)));
        item
    }
}

/// Read until `buf` is full or the source ends; returns the bytes read.
fn fill<R: Read>(src: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut got = 0;
    while got < buf.len() {
        match src.read(&mut buf[got..]) {
            Ok(0) => break,
            Ok(n) => got += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(got)
}

/// A whole archive, split back into its parts.
#[derive(Debug, Clone)]
pub struct Archive {
    pub header: ExportHeader,
    pub markers: Option<MarkerSeries>,
    pub analogue: Option<AnalogueSeries>,
}

/// Write `session` as an archive at `out`, creating parent directories.
pub fn write_archive(out: &Path, session: &CaptureSession) -> Result<()> {
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let file = File::create(out).with_context(|| format!("create {}", out.display()))?;
    let mut w = ArchiveWriter::new(BufWriter::new(file));
    w.push(&RecordFrame::Header(ExportHeader::describe(session)))?;
    if let Some(m) = session.markers() {
        w.push(&RecordFrame::Markers(m.clone()))?;
    }
    if let Some(a) = session.analogue() {
        w.push(&RecordFrame::Analogue(a.clone()))?;
    }
    w.finish()?;
    Ok(())
}

/// Read an archive written by [`write_archive`].
pub fn read_archive(path: &Path) -> Result<Archive> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut frames = ArchiveReader::new(BufReader::new(file));
    let header = match frames.next().transpose()? {
        Some(RecordFrame::Header(h)) if h.version == ARCHIVE_VERSION => h,
        Some(RecordFrame::Header(h)) => bail!("unsupported archive version {}", h.version),
        Some(_) => bail!("archive does not start with a header frame"),
        None => bail!("archive is empty"),
    };
    let mut archive = Archive { header, markers: None, analogue: None };
    for frame in frames {
        match frame? {
            RecordFrame::Markers(m) => archive.markers = Some(m),
            RecordFrame::Analogue(a) => archive.analogue = Some(a),
            RecordFrame::Header(_) => bail!("second header frame in {}", path.display()),
        }
    }
    Ok(archive)
}

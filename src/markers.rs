//! 3D marker block decoder.
//!
//! Block layout at the descriptor offset:
//!
//! ```text
//! [frames i32][rate i32][start f32][tracks i32]
//! [origin f32*3][rotation f32*9 row-major][translation f32*3][reserved 4]
//! formats 1,3: [links i32][reserved 4][(a i32, b i32) * links]
//! formats 1,2: per track [label 256][segments][(x,y,z) f32 per covered frame]
//! formats 3,4: [label 256] * tracks, then frames * tracks * (x,y,z) f32
//! ```
//!
//! The calibration volume is carried through untouched; coordinates are
//! returned exactly as stored.
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek};
use tracing::debug;

use crate::cursor::{ByteCursor, LABEL_LEN, RESERVED_WORD};
use crate::directory::{BlockDescriptor, BlockKind};
use crate::error::{Result, TdfError};
use crate::grid::Grid;
use crate::options::LabelEncoding;
use crate::segment::{read_segments, Segment};
use crate::session::Timeline;

pub type Point3 = [f32; 3];

/// Formats carrying a link (skeleton) table.
const LINKED_FORMATS: [i32; 2] = [1, 3];

/// Smallest possible segmented track: label, segment count, reserved word.
const MIN_SEGMENTED_TRACK: u64 = LABEL_LEN as u64 + 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Segmented,
    Dense,
}

fn layout_of(format: i32) -> Result<Layout> {
    match format {
        1 | 2 => Ok(Layout::Segmented),
        3 | 4 => Ok(Layout::Dense),
        _ => Err(TdfError::UnsupportedSubVariant { kind: BlockKind::Marker3D, format }),
    }
}

/// Calibration volume as stored in the block header.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CalibrationVolume {
    pub origin: [f32; 3],
    /// Rotation as read, row-major.
    pub rotation_raw: [f32; 9],
    pub translation: [f32; 3],
}

impl CalibrationVolume {
    /// Rotation matrix, transposed from the on-disk order (`m[i][j] = raw[3j + i]`).
    pub fn rotation(&self) -> [[f32; 3]; 3] {
        let r = &self.rotation_raw;
        [[r[0], r[3], r[6]], [r[1], r[4], r[7]], [r[2], r[5], r[8]]]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSeries {
    pub format: i32,
    pub frame_rate: f64,
    pub start_time: f64,
    pub labels: Vec<String>,
    /// `frames x tracks`; `None` where the track was not captured.
    pub points: Grid<Point3>,
    /// Visibility segments per track (one full-length segment for dense blocks).
    pub segments: Vec<Vec<Segment>>,
    /// Track index pairs describing a display skeleton.
    pub links: Vec<(i32, i32)>,
    pub calibration: CalibrationVolume,
}

/// Borrowed view of a single track.
pub struct Track<'a> {
    pub index: usize,
    pub label: &'a str,
    pub segments: &'a [Segment],
    series: &'a MarkerSeries,
}

impl Track<'_> {
    /// Position per frame, `None` outside the visibility segments.
    pub fn trajectory(&self) -> impl Iterator<Item = Option<Point3>> + '_ {
        self.series.points.column(self.index)
    }

    /// Fraction of frames in which the track was captured.
    pub fn coverage(&self) -> f64 {
        let frames = self.series.frame_count();
        if frames == 0 { return 0.0; }
        let mut runs: Vec<_> = self.segments.iter().map(Segment::range).collect();
        runs.sort_by_key(|r| r.start);
        let (mut covered, mut reach) = (0, 0);
        for r in runs {
            let from = r.start.max(reach);
            if r.end > from {
                covered += r.end - from;
                reach = r.end;
            }
        }
        covered as f64 / frames as f64
    }
}

impl MarkerSeries {
    pub fn frame_count(&self) -> usize { self.points.rows() }
    pub fn track_count(&self) -> usize { self.points.cols() }

    /// Absolute time of every frame: `start_time + i / frame_rate`.
    pub fn timestamps(&self) -> Timeline { Timeline::new(self.start_time, self.frame_rate, self.frame_count()) }

    /// Value in the flat `frames x 3*tracks` coordinate matrix.
    pub fn coordinate(&self, frame: usize, column: usize) -> Option<f32> {
        self.points.get(frame, column / 3).map(|p| p[column % 3])
    }

    pub fn track(&self, index: usize) -> Option<Track<'_>> {
        let label = self.labels.get(index)?;
        Some(Track { index, label, segments: &self.segments[index], series: self })
    }

    pub fn tracks(&self) -> impl Iterator<Item = Track<'_>> {
        (0..self.track_count()).filter_map(|i| self.track(i))
    }

    /// Index of the track with the given label.
    pub fn find(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }
}

/// Decode the marker block described by `block`.
pub fn decode_markers<R: Read + Seek>(
    cur: &mut ByteCursor<R>,
    block: &BlockDescriptor,
    encoding: LabelEncoding,
) -> Result<MarkerSeries> {
    let layout = layout_of(block.format)?;
    cur.seek_block(block.offset)?;

    let frames = cur.read_count("frame count")?;
    let rate = cur.read_i32()?;
    let start_time = cur.read_f32()? as f64;
    let tracks_at = cur.position();
    let tracks = cur.read_count("track count")?;
    if rate <= 0 {
        return Err(TdfError::InvalidRate { kind: BlockKind::Marker3D, rate });
    }
    if frames.checked_mul(tracks).and_then(|n| n.checked_mul(3)).is_none() {
        return Err(TdfError::InvalidCount { what: "track count", value: tracks as i32, offset: tracks_at });
    }

    let mut calibration = CalibrationVolume::default();
    calibration.origin.copy_from_slice(&cur.read_f32s(3)?);
    calibration.rotation_raw.copy_from_slice(&cur.read_f32s(9)?);
    calibration.translation.copy_from_slice(&cur.read_f32s(3)?);
    cur.skip(RESERVED_WORD)?;

    let links = if LINKED_FORMATS.contains(&block.format) {
        let n = cur.read_count("link count")?;
        cur.skip(RESERVED_WORD)?;
        cur.read_i32s(n.saturating_mul(2))?.chunks_exact(2).map(|p| (p[0], p[1])).collect()
    } else {
        Vec::new()
    };

    let (labels, points, segments) = match layout {
        Layout::Segmented => read_segmented(cur, frames, tracks, encoding)?,
        Layout::Dense => read_dense(cur, frames, tracks, encoding)?,
    };
    debug!(format = block.format, frames, tracks, rate, links = links.len(), "decoded marker block");

    Ok(MarkerSeries { format: block.format, frame_rate: rate as f64, start_time, labels, points, segments, links, calibration })
}

type Payload = (Vec<String>, Grid<Point3>, Vec<Vec<Segment>>);

fn read_segmented<R: Read + Seek>(cur: &mut ByteCursor<R>, frames: usize, tracks: usize, encoding: LabelEncoding) -> Result<Payload> {
    cur.ensure((tracks as u64).saturating_mul(MIN_SEGMENTED_TRACK))?;
    let mut labels = Vec::new();
    let mut points = Grid::absent(frames, tracks);
    let mut all_segments = Vec::new();
    for trk in 0..tracks {
        let label = cur.read_label(encoding)?;
        let segments = read_segments(cur, &label, frames)?;
        for seg in &segments {
            let xyz = cur.read_f32s(seg.length * 3)?;
            for (frame, p) in seg.range().zip(xyz.chunks_exact(3)) {
                points.set(frame, trk, [p[0], p[1], p[2]]);
            }
        }
        labels.push(label);
        all_segments.push(segments);
    }
    Ok((labels, points, all_segments))
}

/// Labels first, then the whole matrix in one read, frame by frame.
fn read_dense<R: Read + Seek>(cur: &mut ByteCursor<R>, frames: usize, tracks: usize, encoding: LabelEncoding) -> Result<Payload> {
    let cells = (frames as u64).saturating_mul(tracks as u64).saturating_mul(12);
    cur.ensure((tracks as u64).saturating_mul(LABEL_LEN as u64).saturating_add(cells))?;
    let labels = (0..tracks).map(|_| cur.read_label(encoding)).collect::<Result<Vec<_>>>()?;
    let values = cur.read_f32s(frames * tracks * 3)?;
    let cells = values.chunks_exact(3).map(|p| [p[0], p[1], p[2]]).collect();
    let full = if frames > 0 { vec![Segment { start: 0, length: frames }] } else { Vec::new() };
    Ok((labels, Grid::from_row_major(frames, tracks, cells), vec![full; tracks]))
}

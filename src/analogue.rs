//! Analogue (general purpose) block decoder.
//!
//! `[signals i32][rate i32][start f32][samples i32][channel map i16 * signals]`
//! followed by either per-signal labels and segments (format 1) or all labels
//! and then the samples interleaved frame by frame (format 2).
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek};
use tracing::debug;

use crate::cursor::{ByteCursor, LABEL_LEN};
use crate::directory::{BlockDescriptor, BlockKind};
use crate::error::{Result, TdfError};
use crate::grid::Grid;
use crate::options::LabelEncoding;
use crate::segment::{read_segments, Segment};
use crate::session::Timeline;

pub const SEGMENTED_ANALOGUE_FORMAT: i32 = 1;
pub const INTERLEAVED_ANALOGUE_FORMAT: i32 = 2;

/// Smallest possible segmented signal: label, segment count, reserved word.
const MIN_SEGMENTED_SIGNAL: u64 = LABEL_LEN as u64 + 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalogueSeries {
    pub format: i32,
    pub sample_rate: f64,
    pub start_time: f64,
    pub labels: Vec<String>,
    /// Hardware channel behind each signal.
    pub channel_map: Vec<i16>,
    /// `signals x samples`.
    pub samples: Grid<f32>,
    pub segments: Vec<Vec<Segment>>,
}

impl AnalogueSeries {
    pub fn signal_count(&self) -> usize { self.samples.rows() }
    pub fn sample_count(&self) -> usize { self.samples.cols() }

    pub fn timestamps(&self) -> Timeline { Timeline::new(self.start_time, self.sample_rate, self.sample_count()) }

    /// Samples of one signal, `None` where it was not recorded.
    pub fn signal(&self, index: usize) -> Option<Vec<Option<f32>>> {
        (index < self.signal_count()).then(|| self.samples.row(index))
    }

    /// Signal index wired to the given hardware channel.
    pub fn by_channel(&self, channel: i16) -> Option<usize> {
        self.channel_map.iter().position(|&c| c == channel)
    }

    pub fn find(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }
}

/// Decode the analogue block described by `block`.
pub fn decode_analogue<R: Read + Seek>(
    cur: &mut ByteCursor<R>,
    block: &BlockDescriptor,
    encoding: LabelEncoding,
) -> Result<AnalogueSeries> {
    if block.format != SEGMENTED_ANALOGUE_FORMAT && block.format != INTERLEAVED_ANALOGUE_FORMAT {
        return Err(TdfError::UnsupportedSubVariant { kind: BlockKind::Analogue, format: block.format });
    }
    cur.seek_block(block.offset)?;

    let signals_at = cur.position();
    let signals = cur.read_count("signal count")?;
    let rate = cur.read_i32()?;
    let start_time = cur.read_f32()? as f64;
    let n_samples = cur.read_count("sample count")?;
    if rate <= 0 {
        return Err(TdfError::InvalidRate { kind: BlockKind::Analogue, rate });
    }
    if signals.checked_mul(n_samples).is_none() {
        return Err(TdfError::InvalidCount { what: "signal count", value: signals as i32, offset: signals_at });
    }
    let channel_map = cur.read_i16s(signals)?;

    let signals_n = signals as u64;
    let mut samples = Grid::absent(signals, n_samples);
    let mut labels = Vec::new();
    let mut segments = Vec::new();
    if block.format == SEGMENTED_ANALOGUE_FORMAT {
        cur.ensure(signals_n.saturating_mul(MIN_SEGMENTED_SIGNAL))?;
        for sig in 0..signals {
            let label = cur.read_label(encoding)?;
            let segs = read_segments(cur, &label, n_samples)?;
            for seg in &segs {
                let values = cur.read_f32s(seg.length)?;
                for (i, v) in seg.range().zip(values) {
                    samples.set(sig, i, v);
                }
            }
            labels.push(label);
            segments.push(segs);
        }
    } else {
        let payload = signals_n.saturating_mul(n_samples as u64).saturating_mul(4);
        cur.ensure(signals_n.saturating_mul(LABEL_LEN as u64).saturating_add(payload))?;
        for _ in 0..signals {
            labels.push(cur.read_label(encoding)?);
        }
        let values = cur.read_f32s(signals * n_samples)?;
        for (k, v) in values.into_iter().enumerate() {
            samples.set(k % signals, k / signals, v);
        }
        let full = if n_samples > 0 { vec![Segment { start: 0, length: n_samples }] } else { Vec::new() };
        segments = vec![full; signals];
    }
    debug!(format = block.format, signals, samples = n_samples, rate, "decoded analogue block");

    Ok(AnalogueSeries { format: block.format, sample_rate: rate as f64, start_time, labels, channel_map, samples, segments })
}

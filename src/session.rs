//! Capture session: one directory scan plus the marker and analogue decodes.
//!
//! Missing modalities do not abort the session. They are logged, kept in
//! [`CaptureSession::issues`], and the corresponding series is `None`.
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::analogue::{decode_analogue, AnalogueSeries};
use crate::cursor::ByteCursor;
use crate::directory::Directory;
use crate::error::{OpenError, Result, TdfError};
use crate::markers::{decode_markers, MarkerSeries};
use crate::options::DecodeOptions;

/// Absolute times `start + i / rate` for `i` in `0..len`, computed on demand.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Timeline {
    pub start: f64,
    pub rate: f64,
    len: usize,
}

impl Timeline {
    pub fn new(start: f64, rate: f64, len: usize) -> Self { Self { start, rate, len } }
    pub fn len(&self) -> usize { self.len }
    pub fn is_empty(&self) -> bool { self.len == 0 }

    pub fn get(&self, i: usize) -> Option<f64> {
        (i < self.len).then(|| self.start + i as f64 / self.rate)
    }

    pub fn last(&self) -> Option<f64> { self.len.checked_sub(1).and_then(|i| self.get(i)) }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        (0..self.len).map(move |i| self.start + i as f64 / self.rate)
    }

    pub fn to_vec(&self) -> Vec<f64> { self.iter().collect() }
}

#[derive(Debug)]
pub struct CaptureSession {
    source: Option<PathBuf>,
    options: DecodeOptions,
    directory: Directory,
    markers: Option<MarkerSeries>,
    marker_times: Timeline,
    analogue: Option<AnalogueSeries>,
    analogue_times: Timeline,
    issues: Vec<TdfError>,
}

impl CaptureSession {
    /// Decode the file at `path`. Each pass opens its own handle.
    pub fn open(path: impl AsRef<Path>, options: DecodeOptions) -> std::result::Result<Self, OpenError> {
        let path = path.as_ref();
        let wrap = |source: TdfError| OpenError { path: path.to_path_buf(), source };
        let open = || ByteCursor::<BufReader<File>>::open(path);
        let mut session = Self::decode(open, options).map_err(wrap)?;
        session.source = Some(path.to_path_buf());
        for issue in &session.issues {
            warn!(path = %path.display(), "{issue}");
        }
        Ok(session)
    }

    /// Decode from an in-memory or otherwise already open source.
    pub fn from_reader<R: Read + Seek>(reader: R, options: DecodeOptions) -> Result<Self> {
        let mut cur = ByteCursor::new(reader)?;
        let session = Self::decode_shared(&mut cur, options)?;
        for issue in &session.issues {
            warn!("{issue}");
        }
        Ok(session)
    }

    fn decode<R: Read + Seek>(mut open: impl FnMut() -> Result<ByteCursor<R>>, options: DecodeOptions) -> Result<Self> {
        let directory = Directory::scan(&mut open()?, options.accept_dense_markers)?;
        debug!(entries = directory.entries.len(), version = directory.version, "scanned directory");
        let markers = recoverable(
            directory.marker_block().and_then(|b| decode_markers(&mut open()?, &b, options.label_encoding)),
        )?;
        let analogue = recoverable(
            directory.analogue_block().and_then(|b| decode_analogue(&mut open()?, &b, options.label_encoding)),
        )?;
        Ok(Self::assemble(options, directory, markers, analogue))
    }

    /// Same passes over a single source, seeking between them.
    fn decode_shared<R: Read + Seek>(cur: &mut ByteCursor<R>, options: DecodeOptions) -> Result<Self> {
        let directory = Directory::scan(cur, options.accept_dense_markers)?;
        let markers = recoverable(directory.marker_block().and_then(|b| decode_markers(cur, &b, options.label_encoding)))?;
        let analogue = recoverable(directory.analogue_block().and_then(|b| decode_analogue(cur, &b, options.label_encoding)))?;
        Ok(Self::assemble(options, directory, markers, analogue))
    }

    fn assemble(
        options: DecodeOptions,
        directory: Directory,
        markers: std::result::Result<MarkerSeries, TdfError>,
        analogue: std::result::Result<AnalogueSeries, TdfError>,
    ) -> Self {
        let mut issues = Vec::new();
        let markers = match markers {
            Ok(m) => Some(m),
            Err(e) => { issues.push(e); None }
        };
        let analogue = match analogue {
            Ok(a) => Some(a),
            Err(e) => { issues.push(e); None }
        };
        Self {
            source: None,
            options,
            directory,
            marker_times: markers.as_ref().map(MarkerSeries::timestamps).unwrap_or_default(),
            analogue_times: analogue.as_ref().map(AnalogueSeries::timestamps).unwrap_or_default(),
            markers,
            analogue,
            issues,
        }
    }

    pub fn source(&self) -> Option<&Path> { self.source.as_deref() }
    pub fn options(&self) -> DecodeOptions { self.options }
    pub fn directory(&self) -> &Directory { &self.directory }
    pub fn markers(&self) -> Option<&MarkerSeries> { self.markers.as_ref() }
    pub fn analogue(&self) -> Option<&AnalogueSeries> { self.analogue.as_ref() }
    /// Absolute time per marker frame (empty without marker data).
    pub fn marker_times(&self) -> Timeline { self.marker_times }
    /// Absolute time per analogue sample (empty without analogue data).
    pub fn analogue_times(&self) -> Timeline { self.analogue_times }
    /// Recoverable failures met while decoding.
    pub fn issues(&self) -> &[TdfError] { &self.issues }

    pub fn into_parts(self) -> (Option<MarkerSeries>, Option<AnalogueSeries>) {
        (self.markers, self.analogue)
    }
}

/// Lift recoverable failures into the inner `Result`, propagate the rest.
fn recoverable<T>(r: Result<T>) -> Result<std::result::Result<T, TdfError>> {
    match r {
        Ok(v) => Ok(Ok(v)),
        Err(e) if e.is_recoverable() => Ok(Err(e)),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_has_constant_step() {
        let t = Timeline::new(2.0, 4.0, 5);
        assert_eq!(t.to_vec(), vec![2.0, 2.25, 2.5, 2.75, 3.0]);
        assert_eq!(t.get(5), None);
        assert_eq!(t.last(), Some(3.0));
        assert!(Timeline::new(0.0, 100.0, 0).is_empty());
        assert_eq!(Timeline::default().last(), None);
    }

    #[test]
    fn huge_timeline_is_not_materialised() {
        let t = Timeline::new(0.0, 100.0, i32::MAX as usize);
        assert_eq!(t.len(), i32::MAX as usize);
        assert_eq!(t.get(100), Some(1.0));
    }

    #[test]
    fn recoverable_splits_error_kinds() {
        assert!(matches!(recoverable::<()>(Err(TdfError::MissingAnalogueData)), Ok(Err(_))));
        assert!(recoverable::<()>(Err(TdfError::EmptyFile { entries: 0 })).is_err());
        assert!(matches!(recoverable(Ok(3)), Ok(Ok(3))));
    }
}

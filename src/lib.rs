//! TDF motion-capture file decoder.
//!
//! This crate reads the binary TDF capture format into in-memory time series:
//!
//! - `directory`: signature check and block directory walk
//! - `markers`: 3D marker trajectories (segmented and dense layouts), link
//!   table and calibration volume
//! - `analogue`: analogue channel samples (segmented and interleaved layouts)
//!   and the hardware channel map
//! - `session`: runs the three passes and derives absolute timestamps
//! - `record`: CRC-framed `bincode` archive of a decoded session
//!
//! Samples that were not captured are `None`, never NaN.
//!
//! ```no_run
//! use tdf_capture::{CaptureSession, DecodeOptions};
//!
//! let session = CaptureSession::open("walk.tdf", DecodeOptions::default())?;
//! if let Some(m) = session.markers() {
//!     println!("{} tracks at {} Hz", m.track_count(), m.frame_rate);
//! }
//! # Ok::<(), tdf_capture::OpenError>(())
//! ```
pub mod analogue;
pub mod cursor;
pub mod directory;
pub mod error;
pub mod grid;
pub mod markers;
pub mod options;
pub mod record;
pub mod segment;
pub mod session;

pub use analogue::AnalogueSeries;
pub use directory::{BlockDescriptor, BlockKind, Directory};
pub use error::{OpenError, Result, TdfError};
pub use markers::{CalibrationVolume, MarkerSeries, Point3};
pub use options::{DecodeOptions, LabelEncoding};
pub use session::{CaptureSession, Timeline};

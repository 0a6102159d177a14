use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tdf_capture::record::{read_archive, write_archive};
use tdf_capture::{CaptureSession, DecodeOptions, TdfError};

const SIGNATURE_WORDS: [u32; 4] = [0x41604B82, 0xCA8411D3, 0xACB60060, 0x080C6816];

/// One block to place after the directory: (type, format, payload).
type Block = (i32, i32, Vec<u8>);

fn i32s(b: &mut Vec<u8>, vs: &[i32]) { for v in vs { b.extend_from_slice(&v.to_le_bytes()); } }
fn f32s(b: &mut Vec<u8>, vs: &[f32]) { for v in vs { b.extend_from_slice(&v.to_le_bytes()); } }
fn label(b: &mut Vec<u8>, name: &str) {
    let mut raw = vec![0u8; 256];
    raw[..name.len()].copy_from_slice(name.as_bytes());
    b.extend(raw);
}

/// Header + directory + blocks, offsets filled in.
fn tdf_file(blocks: &[Block]) -> Vec<u8> {
    let mut b = Vec::new();
    for w in SIGNATURE_WORDS { b.extend_from_slice(&w.to_le_bytes()); }
    b.extend_from_slice(&1u32.to_le_bytes());
    i32s(&mut b, &[blocks.len() as i32]);
    b.extend_from_slice(&[0u8; 40]);
    let mut offset = 64 + blocks.len() * (16 + 272);
    let mut payloads = Vec::new();
    for (i, (kind, format, payload)) in blocks.iter().enumerate() {
        if i > 0 { b.extend_from_slice(&[0u8; 272]); }
        i32s(&mut b, &[*kind, *format, offset as i32, payload.len() as i32]);
        offset += payload.len();
        payloads.extend_from_slice(payload);
    }
    b.extend_from_slice(&[0u8; 272]);
    b.extend(payloads);
    b
}

/// 2 tracks, 3 frames; track 0 seen in frames 0..2, track 1 never.
fn segmented_markers() -> Block {
    let mut b = Vec::new();
    i32s(&mut b, &[3, 100]);
    f32s(&mut b, &[0.0]);
    i32s(&mut b, &[2]);
    f32s(&mut b, &[0.0; 15]);
    i32s(&mut b, &[0]);
    label(&mut b, "LASI");
    i32s(&mut b, &[1, 0, 0, 2]);
    f32s(&mut b, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    label(&mut b, "RASI");
    i32s(&mut b, &[0, 0]);
    (5, 2, b)
}

fn dense_markers() -> Block {
    let mut b = Vec::new();
    i32s(&mut b, &[2, 50]);
    f32s(&mut b, &[1.5]);
    i32s(&mut b, &[1]);
    f32s(&mut b, &[0.0; 15]);
    i32s(&mut b, &[0]);
    label(&mut b, "C7");
    f32s(&mut b, &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
    (5, 4, b)
}

/// 2 signals, 3 samples, interleaved.
fn interleaved_analogue(format: i32) -> Block {
    let mut b = Vec::new();
    i32s(&mut b, &[2, 1000]);
    f32s(&mut b, &[0.0]);
    i32s(&mut b, &[3]);
    for c in [3i16, 7] { b.extend_from_slice(&c.to_le_bytes()); }
    label(&mut b, "EMG1");
    label(&mut b, "EMG2");
    f32s(&mut b, &[10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
    (14, format, b)
}

fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn decodes_markers_and_analogue_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "walk.tdf", &tdf_file(&[(1, 0, vec![0; 8]), segmented_markers(), interleaved_analogue(2)]));

    let s = CaptureSession::open(&path, DecodeOptions::default()).unwrap();
    assert!(s.issues().is_empty());
    assert_eq!(s.source(), Some(path.as_path()));
    assert_eq!(s.directory().entries.len(), 3);

    let m = s.markers().unwrap();
    assert_eq!(m.labels, vec!["LASI", "RASI"]);
    assert_eq!(m.points.get(0, 0), Some([1.0, 2.0, 3.0]));
    assert_eq!(m.points.get(1, 0), Some([4.0, 5.0, 6.0]));
    assert_eq!(m.points.get(2, 0), None);
    assert!(m.track(1).unwrap().trajectory().all(|p| p.is_none()));

    let a = s.analogue().unwrap();
    assert_eq!(a.signal(0).unwrap(), vec![Some(10.0), Some(12.0), Some(14.0)]);
    assert_eq!(a.signal(1).unwrap(), vec![Some(11.0), Some(13.0), Some(15.0)]);
    assert_eq!(a.channel_map, vec![3, 7]);

    assert_eq!(s.marker_times().len(), 3);
    assert_eq!(s.analogue_times().len(), 3);
    for (times, rate) in [(s.marker_times(), 100.0), (s.analogue_times(), 1000.0)] {
        for w in times.to_vec().windows(2) {
            assert!(w[1] > w[0]);
            assert!((w[1] - w[0] - 1.0 / rate).abs() < 1e-12);
        }
    }
}

#[test]
fn missing_analogue_keeps_markers() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "markers_only.tdf", &tdf_file(&[segmented_markers()]));

    let s = CaptureSession::open(&path, DecodeOptions::default()).unwrap();
    assert!(s.analogue().is_none());
    assert!(s.analogue_times().is_empty());
    assert!(matches!(s.issues(), [TdfError::MissingAnalogueData]));
    assert_eq!(s.markers().unwrap().frame_count(), 3);
}

#[test]
fn missing_markers_keeps_analogue() {
    let s = CaptureSession::from_reader(Cursor::new(tdf_file(&[interleaved_analogue(2)])), DecodeOptions::default()).unwrap();
    assert!(s.markers().is_none());
    assert!(matches!(s.issues(), [TdfError::MissingMarkerData { found: None }]));
    assert_eq!(s.analogue().unwrap().sample_count(), 3);
}

#[test]
fn truncated_directory_is_fatal() {
    let blocks: Vec<Block> = (0..5).map(|i| (20 + i, 0, Vec::new())).collect();
    let mut bytes = tdf_file(&blocks);
    bytes.truncate(64 + 4 * 288);
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "cut.tdf", &bytes);

    let err = CaptureSession::open(&path, DecodeOptions::default()).unwrap_err();
    assert!(matches!(err.kind(), TdfError::CorruptFile { .. }));
    assert_eq!(err.path, path);
    assert!(err.to_string().contains("cut.tdf"));
}

#[test]
fn wrong_signature_is_invalid_format() {
    let mut bytes = tdf_file(&[segmented_markers(), interleaved_analogue(2)]);
    bytes[15] = 0;
    let err = CaptureSession::from_reader(Cursor::new(bytes), DecodeOptions::default()).unwrap_err();
    assert!(matches!(err, TdfError::InvalidFormat { .. }));
}

#[test]
fn unsupported_analogue_format_aborts() {
    let err = CaptureSession::from_reader(
        Cursor::new(tdf_file(&[segmented_markers(), interleaved_analogue(5)])),
        DecodeOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, TdfError::UnsupportedSubVariant { format: 5, .. }));
}

#[test]
fn dense_markers_follow_options() {
    let bytes = tdf_file(&[dense_markers(), interleaved_analogue(2)]);
    let s = CaptureSession::from_reader(Cursor::new(bytes.clone()), DecodeOptions::default()).unwrap();
    assert!(s.markers().is_none());
    assert!(matches!(s.issues(), [TdfError::MissingMarkerData { found: Some(4) }]));

    let opts = DecodeOptions { accept_dense_markers: true, ..DecodeOptions::default() };
    let s = CaptureSession::from_reader(Cursor::new(bytes), opts).unwrap();
    let m = s.markers().unwrap();
    assert_eq!(m.points.get(1, 0), Some([2.0, 2.0, 2.0]));
    assert!((s.marker_times().get(1).unwrap() - 1.52).abs() < 1e-6);
    assert!(s.analogue().is_some());
}

#[test]
fn export_archive_round_trips_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "walk.tdf", &tdf_file(&[segmented_markers(), interleaved_analogue(2)]));
    let s = CaptureSession::open(&path, DecodeOptions::default()).unwrap();
    let out = dir.path().join("exports").join("WALK.tdfx");
    write_archive(&out, &s).unwrap();

    let archive = read_archive(&out).unwrap();
    assert_eq!(archive.header.source, path.display().to_string());
    assert_eq!(archive.header.directory.len(), 2);
    assert!(archive.header.created_unix_ns > 0);
    assert_eq!(archive.markers.as_ref(), s.markers());
    assert_eq!(archive.analogue.as_ref(), s.analogue());
}

#[test]
fn export_keeps_issues_of_partial_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let s = CaptureSession::from_reader(Cursor::new(tdf_file(&[segmented_markers()])), DecodeOptions::default()).unwrap();
    let out = dir.path().join("partial.tdfx");
    write_archive(&out, &s).unwrap();

    let archive = read_archive(&out).unwrap();
    assert!(archive.header.source.is_empty());
    assert_eq!(archive.header.issues, vec!["analogue data missing".to_string()]);
    assert!(archive.markers.is_some());
    assert!(archive.analogue.is_none());
}

/// Valid header, one segmented marker entry whose block claims
/// `i32::MAX` frames and tracks but carries nothing else.
#[test]
fn huge_declared_counts_are_corrupt_not_fatal_to_the_process() {
    let mut block = Vec::new();
    i32s(&mut block, &[i32::MAX, 100]);
    f32s(&mut block, &[0.0]);
    i32s(&mut block, &[i32::MAX]);
    f32s(&mut block, &[0.0; 15]);
    i32s(&mut block, &[0]);
    let bytes = tdf_file(&[(5, 2, block)]);
    assert_eq!(bytes.len(), 64 + 288 + 80);

    let err = CaptureSession::from_reader(Cursor::new(bytes), DecodeOptions::default()).unwrap_err();
    assert!(matches!(err, TdfError::CorruptFile { offset: 432, file_len: 432, .. }), "{err}");
}

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossbeam_channel::bounded;
use dotenvy::dotenv;
use std::path::{Path, PathBuf};
use tdf_capture::record::write_archive;
use tdf_capture::{CaptureSession, DecodeOptions, LabelEncoding, OpenError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about = "Decode TDF motion-capture files and summarise markers and analogue channels")]
struct Args {
    /// TDF files to decode; each one is handled on its own thread
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Text encoding of label fields (utf8, latin1)
    #[arg(long, env = "TDF_LABEL_ENCODING", default_value = "utf8")]
    encoding: LabelEncoding,

    /// Accept dense marker blocks (formats 3 and 4)
    #[arg(long, env = "TDF_ACCEPT_DENSE", default_value_t = false)]
    accept_dense: bool,

    /// Print every track and signal label with its coverage
    #[arg(long, default_value_t = false)]
    labels: bool,

    /// Write a CRC-framed archive per input into this directory
    #[arg(long, env = "TDF_EXPORT_DIR")]
    export_dir: Option<PathBuf>,
}

struct Outcome {
    input: PathBuf,
    session: Result<CaptureSession, OpenError>,
    export: Option<Result<PathBuf>>,
}

/// `<STEM>_YYYY_MM_DD.tdfx` inside `dir`, dated with the local calendar day.
fn archive_path(dir: &Path, input: &Path) -> PathBuf {
    let stem = input.file_stem().map(|s| s.to_string_lossy().to_uppercase()).unwrap_or_else(|| "CAPTURE".into());
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    let d = now.date();
    dir.join(format!("{}_{}_{:02}_{:02}.tdfx", stem, d.year(), d.month() as u8, d.day()))
}

fn decode_one(input: PathBuf, options: DecodeOptions, export_dir: Option<&Path>) -> Outcome {
    let session = CaptureSession::open(&input, options);
    let export = match (&session, export_dir) {
        (Ok(s), Some(dir)) => {
            let out = archive_path(dir, &input);
            Some(write_archive(&out, s).map(|_| out).with_context(|| format!("export {}", input.display())))
        }
        _ => None,
    };
    Outcome { input, session, export }
}

fn report(s: &CaptureSession, labels: bool) {
    let dir = s.directory();
    println!("  directory: {} entries (version {})", dir.entries.len(), dir.version);
    if let Some(m) = s.markers() {
        let span = s.marker_times().last().unwrap_or(m.start_time);
        println!(
            "  markers: {} tracks x {} frames @ {} Hz, format {}, t={:.3}..{:.3}s, {} links",
            m.track_count(), m.frame_count(), m.frame_rate, m.format, m.start_time, span, m.links.len()
        );
        if labels {
            for t in m.tracks() {
                println!("    [{:>3}] {:<24} {:>6.1}% ({} segments)", t.index, t.label, t.coverage() * 100.0, t.segments.len());
            }
        }
    }
    if let Some(a) = s.analogue() {
        let span = s.analogue_times().last().unwrap_or(a.start_time);
        println!(
            "  analogue: {} signals x {} samples @ {} Hz, format {}, t={:.3}..{:.3}s",
            a.signal_count(), a.sample_count(), a.sample_rate, a.format, a.start_time, span
        );
        if labels {
            for (i, label) in a.labels.iter().enumerate() {
                let present = a.signal(i).map(|r| r.iter().filter(|v| v.is_some()).count()).unwrap_or(0);
                let pct = if a.sample_count() == 0 { 0.0 } else { present as f64 * 100.0 / a.sample_count() as f64 };
                println!("    [{:>3}] {:<24} ch {:>3} {:>6.1}%", i, label, a.channel_map[i], pct);
            }
        }
    }
    for issue in s.issues() {
        println!("  issue: {issue}");
    }
}

fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();
    let options = DecodeOptions { label_encoding: args.encoding, accept_dense_markers: args.accept_dense };

    let (tx, rx) = bounded::<Outcome>(args.inputs.len());
    let export_dir = args.export_dir.as_deref();
    let mut failed = 0usize;
    std::thread::scope(|scope| {
        for input in args.inputs.iter().cloned() {
            let tx = tx.clone();
            scope.spawn(move || {
                let _ = tx.send(decode_one(input, options, export_dir));
            });
        }
        drop(tx);
        for out in rx {
            println!("{}", out.input.display());
            match &out.session {
                Ok(s) => report(s, args.labels),
                Err(e) => {
                    error!("{e}");
                    failed += 1;
                }
            }
            match out.export {
                Some(Ok(path)) => info!(archive = %path.display(), "exported"),
                Some(Err(e)) => {
                    error!("{e:#}");
                    failed += 1;
                }
                None => {}
            }
        }
    });

    if failed > 0 {
        bail!("{} of {} file(s) failed", failed, args.inputs.len());
    }
    Ok(())
}

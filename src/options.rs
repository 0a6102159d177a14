//! Decode configuration.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Text encoding applied to the fixed-width label fields.
///
/// Capture files travel between machines with different code pages, so the
/// encoding is always chosen explicitly instead of taken from the host locale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelEncoding {
    /// UTF-8, invalid sequences replaced with U+FFFD.
    #[default]
    Utf8,
    /// ISO-8859-1: every byte maps to the code point of the same value.
    Latin1,
}

impl LabelEncoding {
    /// Decode a padded field: cut at the first NUL, drop trailing whitespace.
    pub fn decode(self, raw: &[u8]) -> String {
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let bytes = &raw[..end];
        let text = match self {
            LabelEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            LabelEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        };
        text.trim_end().to_string()
    }
}

impl FromStr for LabelEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(LabelEncoding::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(LabelEncoding::Latin1),
            other => Err(format!("unknown label encoding '{other}' (expected utf8 or latin1)")),
        }
    }
}

impl fmt::Display for LabelEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { LabelEncoding::Utf8 => "utf8", LabelEncoding::Latin1 => "latin1" })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeOptions {
    pub label_encoding: LabelEncoding,
    /// Let the directory scanner hand out dense marker blocks (formats 3/4).
    /// Off by default: only the segmented formats 1/2 count as marker data.
    pub accept_dense_markers: bool,
}

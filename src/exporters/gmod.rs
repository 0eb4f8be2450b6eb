/*!
JSON lip sync output for the Garry's Mod importer.
*/

use std::{convert::Infallible, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    model::{ExportMetadata, LipSyncFrame},
};

use super::Exporter;

/// How the lip sync track is sampled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Granularity {
    /// One entry per phoneme segment.
    #[default]
    Segment,
    /// One entry per animation frame.
    Frame,
}

impl From<&str> for Granularity {
    fn from(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "segment" => Self::Segment,
            "frame" => Self::Frame,
            _ => {
                log::warn!("Unknown granularity {value}, using segment");
                Self::Segment
            }
        }
    }
}

impl From<String> for Granularity {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Granularity> for String {
    fn from(value: Granularity) -> Self {
        value.as_ref().to_string()
    }
}

impl FromStr for Granularity {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl AsRef<str> for Granularity {
    fn as_ref(&self) -> &str {
        match self {
            Granularity::Segment => "segment",
            Granularity::Frame => "frame",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GModEntry {
    Segment {
        start: f64,
        end: f64,
        phoneme: String,
        weight: f64,
    },
    Frame {
        time: f64,
        phoneme: String,
        weight: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GModDocument {
    pub metadata: ExportMetadata,
    pub lip_sync: Vec<GModEntry>,
}

/// Phoneme label used for frames that fall between segments.
pub const NO_PHONEME: &str = "none";

/// Tolerance so a frame landing exactly on the last segment end is still sampled.
const END_TOLERANCE: f64 = 1e-9;

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

#[derive(Debug, Clone)]
pub struct GModExporter {
    pub metadata: ExportMetadata,
    pub fps: u32,
    pub granularity: Granularity,
    /// Add a zero weight entry at the end of every segment.
    pub fade_out: bool,
    entries: Vec<GModEntry>,
}

impl Default for GModExporter {
    fn default() -> Self {
        Self::new(ExportMetadata::default())
    }
}

impl GModExporter {
    pub fn new(metadata: ExportMetadata) -> Self {
        Self {
            metadata,
            fps: 30,
            granularity: Granularity::Segment,
            fade_out: false,
            entries: vec![],
        }
    }

    pub fn entries(&self) -> &[GModEntry] {
        &self.entries
    }

    /// Replace all entries with ones built from `frames`.
    pub fn from_frames(&mut self, frames: &[LipSyncFrame]) -> &mut Self {
        self.entries = match self.granularity {
            Granularity::Segment => segment_entries(frames, self.fade_out),
            Granularity::Frame => frame_entries(frames, self.fps),
        };

        log::debug!(
            "Built {} {} entries",
            self.entries.len(),
            self.granularity.as_ref()
        );

        self
    }

    pub fn document(&self) -> GModDocument {
        GModDocument {
            metadata: self.metadata.clone(),
            lip_sync: self.entries.clone(),
        }
    }
}

fn segment_entries(frames: &[LipSyncFrame], fade_out: bool) -> Vec<GModEntry> {
    let mut r = Vec::with_capacity(frames.len() * if fade_out { 2 } else { 1 });

    for frame in frames {
        r.push(GModEntry::Segment {
            start: frame.start,
            end: frame.end,
            phoneme: frame.phoneme.clone(),
            weight: frame.peak_weight(),
        });

        if fade_out {
            r.push(GModEntry::Segment {
                start: frame.end,
                end: frame.end,
                phoneme: frame.phoneme.clone(),
                weight: 0.0,
            });
        }
    }

    r
}

fn frame_entries(frames: &[LipSyncFrame], fps: u32) -> Vec<GModEntry> {
    let (first, last) = match (frames.first(), frames.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return vec![],
    };
    if fps == 0 {
        log::error!("Cannot sample frames at 0 fps");
        return vec![];
    }

    let total_start = first.start;
    let total_end = last.end;
    let step = 1.0 / fps as f64;

    let mut r = vec![];
    let mut i = 0u64;
    loop {
        let time = total_start + i as f64 * step;
        if time > total_end + END_TOLERANCE {
            break;
        }

        let entry = match frames.iter().find(|f| f.start <= time && time < f.end) {
            Some(f) => GModEntry::Frame {
                time: round4(time),
                phoneme: f.phoneme.clone(),
                weight: f.peak_weight(),
            },
            None => GModEntry::Frame {
                time: round4(time),
                phoneme: NO_PHONEME.to_string(),
                weight: 0.0,
            },
        };
        r.push(entry);

        i += 1;
    }

    r
}

impl Exporter for GModExporter {
    fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.document())?)
    }

    fn default_extension(&self) -> Option<&str> {
        Some("json")
    }
}

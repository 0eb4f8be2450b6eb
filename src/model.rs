pub mod keyframe;
pub mod mapping;

use serde::{Deserialize, Serialize};

pub use keyframe::*;
pub use mapping::PhonemeMapping;

/// A time interval, in seconds, labeled with a speech sound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhonemeSegment {
    pub phoneme: String,
    pub start: f64,
    pub end: f64,
}

impl PhonemeSegment {
    pub fn new(phoneme: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            phoneme: phoneme.into(),
            start,
            end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// One loudness measurement. Produced on a fixed hop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoudnessSample {
    pub time: f64,
    pub amplitude: f64,
}

impl LoudnessSample {
    pub fn new(time: f64, amplitude: f64) -> Self {
        Self { time, amplitude }
    }
}

/// A phoneme segment with its average loudness attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LipSyncFrame {
    pub start: f64,
    pub end: f64,
    pub phoneme: String,
    pub avg_rms: f64,
}

impl LipSyncFrame {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Mouth openness for this frame. Loudness above 0.5 saturates to fully open.
    pub fn peak_weight(&self) -> f64 {
        (self.avg_rms * 2.0).clamp(0.0, 1.0)
    }
}

/// Everything the generator produced for one spoken line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LipSyncData {
    pub phoneme_segments: Vec<PhonemeSegment>,
    pub rms_timeline: Vec<LoudnessSample>,
    pub lip_sync_frames: Vec<LipSyncFrame>,
}

/// Metadata attached to exported files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub version: String,
    pub generator: String,
    pub overlap_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub model_name: Option<String>,
}

impl Default for ExportMetadata {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            generator: crate::generator_tag(),
            overlap_rate: 0.0,
            model_name: None,
        }
    }
}

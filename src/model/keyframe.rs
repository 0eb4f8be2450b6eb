use serde::{Deserialize, Serialize};

/// Weights closer than this are treated as the same key.
pub const WEIGHT_EPSILON: f32 = 1e-6;

/// A target weight for a named morph at an animation frame.
///
/// The frame number is signed so that quantization of slightly negative times
/// survives until encoding, where it is clamped to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MorphKeyframe {
    pub frame_number: i64,
    pub morph_name: String,
    pub weight: f32,
}

impl MorphKeyframe {
    pub fn new(frame_number: i64, morph_name: impl Into<String>, weight: f32) -> Self {
        Self {
            frame_number,
            morph_name: morph_name.into(),
            weight,
        }
    }

    /// The frame number as written to disk.
    pub fn clamped_frame(&self) -> u32 {
        self.frame_number.clamp(0, u32::MAX as i64) as u32
    }
}

/// An append-only list of morph keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MorphTrack {
    keys: Vec<MorphKeyframe>,
}

impl MorphTrack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a key, collapsing it into the previous key when both land on the
    /// same frame and morph.
    ///
    /// Only the last key is checked. A repeat with (almost) the same weight is
    /// dropped, a repeat with a different weight overwrites the last key.
    pub fn add_morph_key(&mut self, frame_number: i64, morph_name: &str, weight: f32) {
        if let Some(last) = self.keys.last_mut() {
            if last.frame_number == frame_number && last.morph_name == morph_name {
                if (last.weight - weight).abs() >= WEIGHT_EPSILON {
                    last.weight = weight;
                }
                return;
            }
        }

        self.keys
            .push(MorphKeyframe::new(frame_number, morph_name, weight));
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Stable sort by frame number, ties keep insertion order.
    pub fn sort_by_frame(&mut self) {
        self.keys.sort_by_key(|k| k.frame_number);
    }

    pub fn keys(&self) -> &[MorphKeyframe] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn into_keys(self) -> Vec<MorphKeyframe> {
        self.keys
    }
}

impl From<Vec<MorphKeyframe>> for MorphTrack {
    fn from(keys: Vec<MorphKeyframe>) -> Self {
        Self { keys }
    }
}

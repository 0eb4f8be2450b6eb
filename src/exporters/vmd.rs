/*!
VMD (Vocaloid Motion Data) output.

Only morph keys are written. The bone, camera, light, self-shadow and IK
sections are present with a count of zero so that animation tools accept the
file. All integers and floats are little-endian, all text is fixed-width
Shift-JIS.
*/

use encoding_rs::SHIFT_JIS;
use serde_json::json;

use crate::{
    error::{Error, Result},
    model::{LipSyncFrame, MorphKeyframe, MorphTrack, PhonemeMapping},
    synth::{self, KeyframeOptions},
};

use super::Exporter;

pub const DEFAULT_HEADER: &str = "Vocaloid Motion Data 0002";
pub const DEFAULT_MODEL_NAME: &str = "SomeModel";

pub const HEADER_LEN: usize = 30;
pub const MODEL_NAME_LEN: usize = 20;
pub const MORPH_NAME_LEN: usize = 15;
/// Size of one morph record: name, frame and weight.
pub const MORPH_RECORD_LEN: usize = MORPH_NAME_LEN + 4 + 4;
/// Size of one bone record: name, frame, position, rotation and interpolation.
const BONE_RECORD_LEN: usize = 15 + 4 + 12 + 16 + 64;

/// Encode `text` as Shift-JIS into exactly `len` bytes.
///
/// Characters without a Shift-JIS form become `?`. Longer text is cut at `len`
/// bytes, shorter text is padded with zeros.
pub fn encode_fixed(text: &str, len: usize) -> Vec<u8> {
    let mut r = Vec::with_capacity(len.max(text.len()));
    let mut buf = [0u8; 4];

    for c in text.chars() {
        let (bytes, _, had_errors) = SHIFT_JIS.encode(c.encode_utf8(&mut buf));
        if had_errors {
            r.push(b'?');
        } else {
            r.extend_from_slice(&bytes);
        }
        if r.len() >= len {
            break;
        }
    }

    r.resize(len, 0);
    r
}

/// Decode a zero-padded Shift-JIS field.
pub fn decode_fixed(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    let (text, _) = SHIFT_JIS.decode_without_bom_handling(&bytes[..end]);

    text.into_owned()
}

/// Write a complete VMD file. `keys` must already be ordered by frame.
pub fn encode_vmd(header: &str, model_name: &str, keys: &[MorphKeyframe]) -> Vec<u8> {
    let mut r =
        Vec::with_capacity(HEADER_LEN + MODEL_NAME_LEN + 24 + keys.len() * MORPH_RECORD_LEN);

    r.extend(encode_fixed(header, HEADER_LEN));
    r.extend(encode_fixed(model_name, MODEL_NAME_LEN));

    // Bones
    r.extend(0u32.to_le_bytes());

    r.extend((keys.len() as u32).to_le_bytes());
    for key in keys {
        r.extend(encode_fixed(&key.morph_name, MORPH_NAME_LEN));
        r.extend(key.clamped_frame().to_le_bytes());
        r.extend(key.weight.to_le_bytes());
    }

    // Camera, light, self shadow, IK
    for _ in 0..4 {
        r.extend(0u32.to_le_bytes());
    }

    r
}

/// Builds morph keys from lip sync frames and writes them as VMD.
#[derive(Debug, Clone)]
pub struct VmdExporter {
    pub header: String,
    pub model_name: String,
    pub mapping: PhonemeMapping,
    pub options: KeyframeOptions,
    track: MorphTrack,
}

impl Default for VmdExporter {
    fn default() -> Self {
        Self::new(DEFAULT_HEADER, DEFAULT_MODEL_NAME, PhonemeMapping::default())
    }
}

impl VmdExporter {
    pub fn new(
        header: impl Into<String>,
        model_name: impl Into<String>,
        mapping: PhonemeMapping,
    ) -> Self {
        Self {
            header: header.into(),
            model_name: model_name.into(),
            mapping,
            options: KeyframeOptions::default(),
            track: MorphTrack::new(),
        }
    }

    pub fn with_options(mut self, options: KeyframeOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace all keys with the ones synthesized from `frames`.
    pub fn from_frames(&mut self, frames: &[LipSyncFrame]) -> &mut Self {
        self.track.clear();
        synth::synthesize_into(&mut self.track, frames, &self.options, &self.mapping);
        self
    }

    pub fn add_morph_key(&mut self, frame_number: i64, morph_name: &str, weight: f32) {
        self.track.add_morph_key(frame_number, morph_name, weight);
    }

    pub fn clear(&mut self) {
        self.track.clear();
    }

    pub fn keys(&self) -> &[MorphKeyframe] {
        self.track.keys()
    }

    fn sorted_keys(&self) -> Vec<MorphKeyframe> {
        let mut track = self.track.clone();
        track.sort_by_frame();
        track.into_keys()
    }

    /// A human readable dump of the file contents. Not loadable by animation tools.
    pub fn debug_json(&self) -> serde_json::Value {
        let keys = self.sorted_keys();
        let empty = || json!({ "Count": 0, "Data": [] });

        json!({
            "Header": {
                "FileSignature": self.header,
                "ModelName": self.model_name,
            },
            "BoneMotion": empty(),
            "Face": {
                "Count": keys.len(),
                "Data": keys
                    .iter()
                    .map(|k| json!({
                        "FrameNo": k.frame_number,
                        "Name": k.morph_name,
                        "Weight": k.weight,
                    }))
                    .collect::<Vec<serde_json::Value>>(),
            },
            "Camera": empty(),
            "Light": empty(),
            "SelfShadow": empty(),
            "IK": empty(),
        })
    }
}

impl Exporter for VmdExporter {
    fn encode(&self) -> Result<Vec<u8>> {
        Ok(encode_vmd(&self.header, &self.model_name, &self.sorted_keys()))
    }
}

/// The parts of a VMD file this crate understands.
#[derive(Debug, Clone, PartialEq)]
pub struct VmdMotion {
    pub header: String,
    pub model_name: String,
    pub morph_keys: Vec<MorphKeyframe>,
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let end = self.pos + len;
        if end > self.data.len() {
            return Err(Error::InvalidVmd(format!(
                "Unexpected end of data while reading {what} at byte {}",
                self.pos
            )));
        }

        let r = &self.data[self.pos..end];
        self.pos = end;

        Ok(r)
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4, what)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn f32(&mut self, what: &str) -> Result<f32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4, what)?);
        Ok(f32::from_le_bytes(buf))
    }
}

impl VmdMotion {
    /// Parse the header, model name and morph section. Bone records are skipped.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = Reader { data, pos: 0 };

        let header = decode_fixed(reader.take(HEADER_LEN, "header")?);
        if !header.starts_with("Vocaloid Motion Data") {
            log::warn!("Unexpected VMD signature: {header}");
        }
        let model_name = decode_fixed(reader.take(MODEL_NAME_LEN, "model name")?);

        let bones = reader.u32("bone count")? as usize;
        let bone_bytes = bones.checked_mul(BONE_RECORD_LEN).ok_or_else(|| {
            Error::InvalidVmd(format!("Bone count {bones} is too large"))
        })?;
        reader.take(bone_bytes, "bone records")?;

        let morphs = reader.u32("morph count")? as usize;
        let mut morph_keys = Vec::with_capacity(morphs.min(data.len() / MORPH_RECORD_LEN));
        for _ in 0..morphs {
            let name = decode_fixed(reader.take(MORPH_NAME_LEN, "morph name")?);
            let frame = reader.u32("morph frame")?;
            let weight = reader.f32("morph weight")?;

            morph_keys.push(MorphKeyframe::new(frame as i64, name, weight));
        }

        Ok(Self {
            header,
            model_name,
            morph_keys,
        })
    }
}

impl From<VmdMotion> for VmdExporter {
    fn from(value: VmdMotion) -> Self {
        let mut r = Self::new(value.header, value.model_name, PhonemeMapping::default());
        r.track = MorphTrack::from(value.morph_keys);

        r
    }
}

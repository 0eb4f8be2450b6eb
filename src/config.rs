/*!
Tool configuration, stored as JSON.

Every field has a default so partial files, and no file at all, are valid.
*/

use std::{collections::HashMap, fs, path::Path};

use paste::paste;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    audio,
    error::{Error, Result},
    exporters::{vmd, GModExporter, Granularity, VmdExporter},
    model::{ExportMetadata, PhonemeMapping},
    synth::KeyframeOptions,
    timing::{OverlapPolicy, DEFAULT_GAP_THRESHOLD},
};

/// Generates builder-style `with_<field>` overrides for nested option fields.
macro_rules! setters {
    ($( [$section:ident, $field:ident, $t:ty] ),+ $(,)?) => {
        $(
            paste! {
                pub fn [<with_ $field>](mut self, value: $t) -> Self {
                    self.$section.$field = value;
                    self
                }
            }
        )+
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingOptions {
    pub rms_threshold: f64,
    pub hop_seconds: f64,
    pub gap_threshold: f64,
    pub overlap_ratio: f64,
    pub overlap_split: f64,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        let overlap = OverlapPolicy::default();

        Self {
            rms_threshold: audio::DEFAULT_RMS_THRESHOLD,
            hop_seconds: audio::DEFAULT_HOP_SECONDS,
            gap_threshold: DEFAULT_GAP_THRESHOLD,
            overlap_ratio: overlap.ratio,
            overlap_split: overlap.split,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub fps: u32,
    pub fade_in: bool,
    pub fade_out: bool,
    pub crossfade_threshold: f64,
    pub min_weight: f32,
    pub header: String,
    pub model_name: String,
    pub granularity: Granularity,
    pub version: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        let keyframes = KeyframeOptions::default();

        Self {
            fps: keyframes.fps,
            fade_in: keyframes.fade_in,
            fade_out: keyframes.fade_out,
            crossfade_threshold: keyframes.crossfade_threshold,
            min_weight: keyframes.min_weight,
            header: vmd::DEFAULT_HEADER.to_string(),
            model_name: vmd::DEFAULT_MODEL_NAME.to_string(),
            granularity: Granularity::default(),
            version: "1.0".to_string(),
        }
    }
}

fn merged_mapping<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<PhonemeMapping, D::Error> {
    let overrides = HashMap::<String, String>::deserialize(deserializer)?;

    Ok(PhonemeMapping::with_overrides(overrides))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LipSyncConfig {
    pub processing_options: ProcessingOptions,
    pub export_options: ExportOptions,
    /// Entries here are layered over the default vowel table.
    #[serde(deserialize_with = "merged_mapping")]
    pub phoneme_mapping: PhonemeMapping,
}

impl LipSyncConfig {
    /// Load a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::warn!("Config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let data = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config = Self::from_json(&data).map_err(|e| match e {
            Error::Json { error, .. } => Error::json(path, error),
            e => e,
        })?;

        log::info!("Loaded config from {}", path.display());

        Ok(config)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(data)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.processing_options;
        let e = &self.export_options;

        if e.fps == 0 {
            return Err(Error::Config("fps must be greater than 0".into()));
        }
        if p.hop_seconds <= 0.0 {
            return Err(Error::Config(format!(
                "hop_seconds must be positive, got {}",
                p.hop_seconds
            )));
        }
        for (name, v) in [
            ("rms_threshold", p.rms_threshold),
            ("gap_threshold", p.gap_threshold),
            ("crossfade_threshold", e.crossfade_threshold),
        ] {
            if v < 0.0 {
                return Err(Error::Config(format!("{name} must not be negative, got {v}")));
            }
        }
        for (name, v) in [
            ("overlap_ratio", p.overlap_ratio),
            ("overlap_split", p.overlap_split),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(Error::Config(format!("{name} must be within [0, 1], got {v}")));
            }
        }

        Ok(())
    }

    setters!(
        [processing_options, rms_threshold, f64],
        [processing_options, hop_seconds, f64],
        [processing_options, gap_threshold, f64],
        [processing_options, overlap_ratio, f64],
        [processing_options, overlap_split, f64],
        [export_options, fps, u32],
        [export_options, fade_in, bool],
        [export_options, fade_out, bool],
        [export_options, crossfade_threshold, f64],
        [export_options, min_weight, f32],
        [export_options, header, String],
        [export_options, model_name, String],
        [export_options, granularity, Granularity],
        [export_options, version, String],
    );

    pub fn mapping(&self) -> &PhonemeMapping {
        &self.phoneme_mapping
    }

    pub fn keyframe_options(&self) -> KeyframeOptions {
        let e = &self.export_options;

        KeyframeOptions {
            fps: e.fps,
            fade_in: e.fade_in,
            fade_out: e.fade_out,
            crossfade_threshold: e.crossfade_threshold,
            min_weight: e.min_weight,
        }
    }

    pub fn overlap_policy(&self) -> OverlapPolicy {
        OverlapPolicy::new(self.processing_options.overlap_ratio)
            .with_split(self.processing_options.overlap_split)
    }

    pub fn export_metadata(&self) -> ExportMetadata {
        ExportMetadata {
            version: self.export_options.version.clone(),
            overlap_rate: self.processing_options.overlap_ratio,
            model_name: Some(self.export_options.model_name.clone()),
            ..Default::default()
        }
    }

    pub fn vmd_exporter(&self) -> VmdExporter {
        VmdExporter::new(
            self.export_options.header.clone(),
            self.export_options.model_name.clone(),
            self.phoneme_mapping.clone(),
        )
        .with_options(self.keyframe_options())
    }

    pub fn gmod_exporter(&self) -> GModExporter {
        let mut r = GModExporter::new(self.export_metadata());
        r.fps = self.export_options.fps;
        r.granularity = self.export_options.granularity;
        r.fade_out = self.export_options.fade_out;

        r
    }
}

/*!
Runs the timing stages for one spoken line and keeps the result around for
later edits.
*/

use std::path::Path;

use crate::{
    audio::{self, Audio},
    config::LipSyncConfig,
    error::Result,
    exporters,
    model::{LipSyncData, LipSyncFrame, LoudnessSample, PhonemeSegment},
    phonemes::{self, EvenSplit, PhonemeSource, TimelineEdits},
    timing,
};

/// Segments used when there is no text to align.
const DUMMY_SEGMENTS: [(&str, f64, f64); 3] = [("a", 0.0, 1.0), ("i", 1.0, 2.0), ("u", 2.0, 3.0)];

pub struct LipSyncGenerator {
    config: LipSyncConfig,
    source: Box<dyn PhonemeSource + Send + Sync>,
    data: LipSyncData,
}

impl Default for LipSyncGenerator {
    fn default() -> Self {
        Self::new(LipSyncConfig::default())
    }
}

impl LipSyncGenerator {
    pub fn new(config: LipSyncConfig) -> Self {
        Self {
            config,
            source: Box::new(EvenSplit),
            data: LipSyncData::default(),
        }
    }

    /// Use a different phoneme aligner.
    pub fn with_source(mut self, source: impl PhonemeSource + Send + Sync + 'static) -> Self {
        self.source = Box::new(source);
        self
    }

    pub fn config(&self) -> &LipSyncConfig {
        &self.config
    }

    pub fn data(&self) -> &LipSyncData {
        &self.data
    }

    pub fn into_data(self) -> LipSyncData {
        self.data
    }

    pub fn frames(&self) -> &[LipSyncFrame] {
        &self.data.lip_sync_frames
    }

    /// Align `text` against `audio` and build the lip sync frames.
    ///
    /// Text that is empty after normalization falls back to a fixed a/i/u
    /// sequence.
    pub fn generate(&mut self, audio: &Audio, text: &str) -> &LipSyncData {
        let text = phonemes::normalize_text(text);
        log::debug!("Normalized text: {text}");

        if text.is_empty() {
            log::warn!("No text given, using dummy a/i/u segments");
            return self.generate_dummy(audio);
        }

        let segments = self.source.segments(&text, audio.duration());

        self.generate_from_segments(audio, segments)
    }

    /// Build lip sync frames from already aligned segments.
    pub fn generate_from_segments(
        &mut self,
        audio: &Audio,
        segments: Vec<PhonemeSegment>,
    ) -> &LipSyncData {
        if segments.is_empty() {
            log::warn!("No phoneme segments, output will be empty");
        }

        let segments =
            timing::smooth_segments(segments, self.config.processing_options.gap_threshold);
        let timeline = self.timeline(audio);

        self.store(segments, timeline)
    }

    fn generate_dummy(&mut self, audio: &Audio) -> &LipSyncData {
        let segments = DUMMY_SEGMENTS
            .iter()
            .map(|(p, start, end)| PhonemeSegment::new(*p, *start, *end))
            .collect();
        let timeline = self.timeline(audio);

        self.store(segments, timeline)
    }

    fn timeline(&self, audio: &Audio) -> Vec<LoudnessSample> {
        let p = &self.config.processing_options;

        audio::rms_timeline(
            &audio.samples,
            audio.sample_rate,
            p.hop_seconds,
            p.rms_threshold,
        )
    }

    fn store(
        &mut self,
        segments: Vec<PhonemeSegment>,
        timeline: Vec<LoudnessSample>,
    ) -> &LipSyncData {
        let frames = timing::merge_loudness(&segments, &timeline);
        let frames = timing::ease_overlaps(frames, self.config.overlap_policy());

        log::info!(
            "Generated {} lip sync frames from {} loudness samples",
            frames.len(),
            timeline.len()
        );

        self.data = LipSyncData {
            phoneme_segments: segments,
            rms_timeline: timeline,
            lip_sync_frames: frames,
        };

        &self.data
    }

    /// Replace the stored segments with hand edited ones and rebuild the frames
    /// against the stored loudness timeline.
    ///
    /// An empty segment list keeps the current segments, so edits can change
    /// only the overlap rate.
    pub fn apply_timeline_edits(&mut self, edits: TimelineEdits) -> &LipSyncData {
        if !edits.segments.is_empty() {
            let mut segments = edits.segments;
            segments.sort_by(|a, b| a.start.total_cmp(&b.start));
            self.data.phoneme_segments = segments;
        }

        if let Some(rate) = edits.overlap_rate {
            log::info!("Overlap ratio updated to {rate}");
            self.config.processing_options.overlap_ratio = rate.clamp(0.0, 1.0);
        }

        let frames = timing::merge_loudness(&self.data.phoneme_segments, &self.data.rms_timeline);
        self.data.lip_sync_frames = timing::ease_overlaps(frames, self.config.overlap_policy());

        &self.data
    }

    /// Load edits from a timeline editor file and apply them.
    pub fn apply_timeline_file(&mut self, path: &Path) -> Result<&LipSyncData> {
        let edits = phonemes::load_timeline(path)?;

        Ok(self.apply_timeline_edits(edits))
    }

    /// Write all intermediate data as pretty JSON.
    pub fn dump(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(&self.data)?;
        exporters::write_atomic(path, &data)?;

        log::info!("Dumped lip sync data to {}", path.display());

        Ok(())
    }
}

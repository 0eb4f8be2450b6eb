/*!
Morph keyframe synthesis.

Every [LipSyncFrame] becomes up to three keys on its mapped morph: a closed
key where the phoneme starts, a peak at its midpoint, and a closing key at its
end. When the next phoneme follows closely, the closing key only drops to
`min_weight` so the two shapes crossfade instead of snapping shut.
*/

use crate::model::{LipSyncFrame, MorphTrack, PhonemeMapping};

/// Gap used for the last frame, which has no successor.
const NO_SUCCESSOR_GAP: f64 = 999_999.0;

#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeOptions {
    pub fps: u32,
    pub fade_in: bool,
    pub fade_out: bool,
    /// Silence, in seconds, below which a phoneme crossfades into the next one.
    pub crossfade_threshold: f64,
    /// Weight the closing key keeps while crossfading.
    pub min_weight: f32,
}

impl Default for KeyframeOptions {
    fn default() -> Self {
        Self {
            fps: 30,
            fade_in: true,
            fade_out: true,
            crossfade_threshold: 0.1,
            min_weight: 0.0,
        }
    }
}

/// Quantize a time to an animation frame.
pub fn frame_at(seconds: f64, fps: u32) -> i64 {
    (seconds * fps as f64).floor() as i64
}

/// Build the morph track for `frames`.
pub fn synthesize(
    frames: &[LipSyncFrame],
    options: &KeyframeOptions,
    mapping: &PhonemeMapping,
) -> MorphTrack {
    let mut track = MorphTrack::new();
    synthesize_into(&mut track, frames, options, mapping);
    track
}

/// Append the keys for `frames` to `track`.
pub fn synthesize_into(
    track: &mut MorphTrack,
    frames: &[LipSyncFrame],
    options: &KeyframeOptions,
    mapping: &PhonemeMapping,
) {
    let mut ordered = frames.iter().collect::<Vec<&LipSyncFrame>>();
    ordered.sort_by(|a, b| a.start.total_cmp(&b.start));

    let min_weight = options.min_weight.clamp(0.0, 1.0);

    for (i, frame) in ordered.iter().enumerate() {
        let morph = mapping.resolve(&frame.phoneme);

        let start_f = frame_at(frame.start, options.fps);
        let mid_f = frame_at((frame.start + frame.end) * 0.5, options.fps);
        let end_f = frame_at(frame.end, options.fps);

        let gap = match ordered.get(i + 1) {
            Some(next) => next.start - frame.end,
            None => NO_SUCCESSOR_GAP,
        };

        if options.fade_in {
            track.add_morph_key(start_f, morph, 0.0);
        }

        track.add_morph_key(mid_f, morph, frame.peak_weight() as f32);

        if options.fade_out {
            if gap < options.crossfade_threshold {
                track.add_morph_key(end_f, morph, min_weight);
            } else {
                track.add_morph_key(end_f, morph, 0.0);
            }
        }
    }

    log::debug!(
        "Synthesized {} morph keys from {} frames",
        track.len(),
        frames.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MorphKeyframe;

    fn frame(p: &str, start: f64, end: f64, avg_rms: f64) -> LipSyncFrame {
        LipSyncFrame {
            start,
            end,
            phoneme: p.to_string(),
            avg_rms,
        }
    }

    fn options(min_weight: f32) -> KeyframeOptions {
        KeyframeOptions {
            fps: 30,
            fade_in: true,
            fade_out: true,
            crossfade_threshold: 0.1,
            min_weight,
        }
    }

    fn approx(keys: &[MorphKeyframe], expected: &[(i64, &str, f32)]) {
        assert_eq!(keys.len(), expected.len(), "{keys:?}");
        for (k, (frame, name, weight)) in keys.iter().zip(expected) {
            assert_eq!(k.frame_number, *frame);
            assert_eq!(k.morph_name, *name);
            assert!((k.weight - weight).abs() < 1e-6, "{k:?}");
        }
    }

    #[test]
    fn frame_quantization_floors() {
        assert_eq!(frame_at(0.0, 30), 0);
        assert_eq!(frame_at(0.1, 30), 3);
        assert_eq!(frame_at(0.099, 30), 2);
        assert_eq!(frame_at(0.2, 30), 6);
    }

    #[test]
    fn long_gap_closes_fully() {
        let track = synthesize(
            &[frame("a", 0.0, 0.2, 0.4), frame("i", 0.5, 0.7, 0.1)],
            &options(0.2),
            &PhonemeMapping::default(),
        );

        approx(
            &track.keys()[..3],
            &[(0, "a", 0.0), (3, "a", 0.8), (6, "a", 0.0)],
        );
    }

    #[test]
    fn short_gap_crossfades_to_min_weight() {
        let track = synthesize(
            &[frame("a", 0.0, 0.2, 0.4), frame("i", 0.25, 0.45, 0.1)],
            &options(0.2),
            &PhonemeMapping::default(),
        );

        approx(
            &track.keys()[..3],
            &[(0, "a", 0.0), (3, "a", 0.8), (6, "a", 0.2)],
        );
    }

    #[test]
    fn last_frame_always_closes() {
        let track = synthesize(
            &[frame("o", 0.0, 0.2, 0.9)],
            &options(0.3),
            &PhonemeMapping::default(),
        );

        approx(track.keys(), &[(0, "o", 0.0), (3, "o", 1.0), (6, "o", 0.0)]);
    }

    #[test]
    fn fades_can_be_disabled() {
        let mut opts = options(0.0);
        opts.fade_in = false;
        opts.fade_out = false;

        let track = synthesize(
            &[frame("a", 0.0, 0.2, 0.4)],
            &opts,
            &PhonemeMapping::default(),
        );

        approx(track.keys(), &[(3, "a", 0.8)]);
    }

    #[test]
    fn collapsed_frames_are_deduplicated() {
        // Everything lands on frame 0 at 30fps.
        let track = synthesize(
            &[frame("a", 0.0, 0.02, 0.0)],
            &options(0.0),
            &PhonemeMapping::default(),
        );

        approx(track.keys(), &[(0, "a", 0.0)]);
    }

    #[test]
    fn unmapped_phoneme_uses_fallback() {
        let mapping = PhonemeMapping::with_overrides([("_fallback", "ん")]);
        let track = synthesize(&[frame("k", 0.0, 0.2, 0.1)], &options(0.0), &mapping);

        assert!(track.keys().iter().all(|k| k.morph_name == "ん"));
    }

    #[test]
    fn weights_stay_in_bounds() {
        let frames = (0..20)
            .map(|i| {
                let start = i as f64 * 0.11;
                frame("a", start, start + 0.1, i as f64 * 0.1)
            })
            .collect::<Vec<LipSyncFrame>>();
        let track = synthesize(&frames, &options(2.0), &PhonemeMapping::default());

        assert!(!track.is_empty());
        assert!(track.keys().iter().all(|k| (0.0..=1.0).contains(&k.weight)));
    }
}

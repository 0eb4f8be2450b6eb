use crate::model::{LipSyncFrame, LoudnessSample, PhonemeSegment};

/// Attach the average loudness inside each segment.
///
/// One cursor walks `timeline` forward only. For each segment every sample with
/// `time < end` is consumed, and those with `time >= start` are averaged.
/// `segments` must be ordered by start time, otherwise samples belonging to a
/// later-listed earlier segment have already been consumed and are skipped.
/// Segments without samples get an `avg_rms` of 0.
pub fn merge_loudness(
    segments: &[PhonemeSegment],
    timeline: &[LoudnessSample],
) -> Vec<LipSyncFrame> {
    let mut frames = Vec::with_capacity(segments.len());
    let mut cursor = 0;

    for segment in segments {
        let mut sum = 0.0;
        let mut count = 0usize;

        while let Some(sample) = timeline.get(cursor) {
            if sample.time >= segment.end {
                break;
            }
            if sample.time >= segment.start {
                sum += sample.amplitude;
                count += 1;
            }
            cursor += 1;
        }

        let avg_rms = if count > 0 { sum / count as f64 } else { 0.0 };
        if count == 0 {
            log::debug!(
                "No loudness samples in {} [{:.3}, {:.3})",
                segment.phoneme,
                segment.start,
                segment.end
            );
        }

        frames.push(LipSyncFrame {
            start: segment.start,
            end: segment.end,
            phoneme: segment.phoneme.clone(),
            avg_rms,
        });
    }

    frames
}

use crate::model::PhonemeSegment;

/// Sort segments by start time and close short silences between neighbours.
///
/// A gap `g` with `0 < g < gap_threshold` is closed by moving both boundaries
/// to their midpoint. The moved segment is then compared against its own
/// successor, so chains of short gaps collapse in one pass. Touching or
/// overlapping neighbours and long gaps are left alone.
pub fn smooth_segments(
    mut segments: Vec<PhonemeSegment>,
    gap_threshold: f64,
) -> Vec<PhonemeSegment> {
    if segments.len() < 2 {
        return segments;
    }

    segments.sort_by(|a, b| a.start.total_cmp(&b.start));

    for i in 0..segments.len() - 1 {
        let gap = segments[i + 1].start - segments[i].end;
        if gap > 0.0 && gap < gap_threshold {
            let mid = 0.5 * (segments[i].end + segments[i + 1].start);
            segments[i].end = mid;
            segments[i + 1].start = mid;
        }
    }

    segments
}

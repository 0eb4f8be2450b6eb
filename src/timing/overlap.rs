use crate::model::LipSyncFrame;

/// How to pull consecutive frames into each other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapPolicy {
    /// Fraction, in `[0, 1]`, of each frame's duration it should reach back into
    /// its predecessor.
    pub ratio: f64,
    /// Share, in `[0, 1]`, of the resulting collision paid by trimming the
    /// previous frame's end. The same amount delays the current frame's start.
    pub split: f64,
}

impl Default for OverlapPolicy {
    fn default() -> Self {
        Self {
            ratio: 0.2,
            split: 0.5,
        }
    }
}

impl OverlapPolicy {
    pub fn new(ratio: f64) -> Self {
        Self {
            ratio,
            ..Default::default()
        }
    }

    pub fn with_split(mut self, split: f64) -> Self {
        self.split = split;
        self
    }
}

/// Start every frame after the first slightly early so mouth shapes blend.
///
/// Each frame keeps its duration when it is placed. When the early start would
/// collide with the previous frame, the collision (capped at the overlap time)
/// is scaled by [OverlapPolicy::split] and that amount is taken off the
/// previous frame's end and added back to the current start.
pub fn ease_overlaps(mut frames: Vec<LipSyncFrame>, policy: OverlapPolicy) -> Vec<LipSyncFrame> {
    if frames.len() < 2 || policy.ratio <= 0.0 {
        return frames;
    }

    let ratio = policy.ratio.min(1.0);
    let split = policy.split.clamp(0.0, 1.0);

    for i in 1..frames.len() {
        let (done, rest) = frames.split_at_mut(i);
        let prev = &mut done[i - 1];
        let cur = &mut rest[0];

        let base_duration = cur.duration();
        let overlap_time = base_duration * ratio;
        let mut new_start = cur.start - overlap_time;

        if new_start < prev.end {
            let delta = prev.end - new_start;
            let shift = delta.min(overlap_time) * split;

            prev.end -= shift;
            new_start += shift;
        }

        cur.start = new_start;
        cur.end = new_start + base_duration;
    }

    frames
}

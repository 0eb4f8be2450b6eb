/*!
Timing reconciliation between phoneme boundaries and the loudness timeline.

The stages must run in order: [smooth_segments], then [merge_loudness], then
[ease_overlaps]. The loudness merger walks the timeline with a forward-only
cursor, so it needs segments ordered by start time, which only holds before
overlaps are introduced.
*/

mod merge;
mod overlap;
mod smooth;

pub use merge::merge_loudness;
pub use overlap::{ease_overlaps, OverlapPolicy};
pub use smooth::smooth_segments;

/// Default gap, in seconds, below which adjacent segments are pulled together.
pub const DEFAULT_GAP_THRESHOLD: f64 = 0.05;

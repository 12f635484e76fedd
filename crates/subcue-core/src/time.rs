#![forbid(unsafe_code)]

//! Frame timing: millisecond timestamps versus video frame boundaries.
//!
//! [`Timecodes`] holds the presentation timestamp of every video frame plus
//! the indexes of the keyframes among them. It is supplied by the playback
//! collaborator once a video is loaded; without it every alignment is the
//! identity and frame arithmetic is unavailable.
//!
//! # Frame arithmetic
//!
//! Shifting by `n` frames walks `n` frame *boundaries* from an origin that may
//! sit between two frames:
//!
//! ```text
//!   pts:      0    40    80   120   160        (25 fps)
//!   origin:            ^ 90
//!   +1 frame  ───────────────►120
//!   -1 frame  ─────────►80
//!   +0 frame  ─────────►80 (the frame on screen at 90)
//! ```
//!
//! # Invariants
//!
//! 1. `pts` is sorted ascending.
//! 2. Every keyframe index is `< pts.len()`; keyframes are sorted ascending.
//! 3. Results of shifts and alignments are always members of `pts` (or the
//!    input itself when the table is empty).

use std::fmt;

/// Errors raised while building a timecode table.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimeError {
    /// Frame timestamps decrease somewhere.
    #[error("frame timestamps are not sorted (frame {index})")]
    Unsorted { index: usize },
    /// A keyframe refers past the last frame.
    #[error("keyframe index {index} is out of range ({frames} frames)")]
    KeyframeOutOfRange { index: usize, frames: usize },
    /// Frame rate must be finite and positive.
    #[error("invalid frame rate: {0}")]
    InvalidFps(f64),
    /// Frame-based arithmetic was requested without timecodes.
    #[error("timecode information is not available")]
    NoTimecodes,
    /// Keyframe-based arithmetic was requested without keyframes.
    #[error("keyframe information is not available")]
    NoKeyframes,
}

/// Frame presentation timestamps plus keyframe positions.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Timecodes {
    pts: Vec<i64>,
    keyframes: Vec<usize>,
}

impl fmt::Debug for Timecodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timecodes")
            .field("frames", &self.pts.len())
            .field("keyframes", &self.keyframes.len())
            .field("first", &self.pts.first())
            .field("last", &self.pts.last())
            .finish()
    }
}

impl Timecodes {
    /// Build a table from explicit timestamps and keyframe indexes.
    pub fn new(pts: Vec<i64>, mut keyframes: Vec<usize>) -> Result<Self, TimeError> {
        if let Some(index) = pts.windows(2).position(|w| w[0] > w[1]) {
            return Err(TimeError::Unsorted { index: index + 1 });
        }
        keyframes.sort_unstable();
        keyframes.dedup();
        if let Some(&index) = keyframes.iter().find(|&&k| k >= pts.len()) {
            return Err(TimeError::KeyframeOutOfRange {
                index,
                frames: pts.len(),
            });
        }
        Ok(Self { pts, keyframes })
    }

    /// Constant frame rate table with `frame_count` frames; frame 0 is the
    /// only keyframe.
    pub fn from_fps(fps: f64, frame_count: usize) -> Result<Self, TimeError> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(TimeError::InvalidFps(fps));
        }
        let pts = (0..frame_count)
            .map(|i| (i as f64 * 1000.0 / fps).round() as i64)
            .collect::<Vec<_>>();
        let keyframes = if pts.is_empty() { Vec::new() } else { vec![0] };
        Ok(Self { pts, keyframes })
    }

    /// Replace the keyframe set.
    pub fn with_keyframes(self, keyframes: Vec<usize>) -> Result<Self, TimeError> {
        Self::new(self.pts, keyframes)
    }

    /// Number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pts.len()
    }

    /// Whether the table has no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pts.is_empty()
    }

    /// All frame timestamps.
    #[must_use]
    pub fn pts(&self) -> &[i64] {
        &self.pts
    }

    /// Keyframe indexes into [`pts`](Self::pts).
    #[must_use]
    pub fn keyframes(&self) -> &[usize] {
        &self.keyframes
    }

    /// Timestamp of the 0-based frame `index`.
    #[must_use]
    pub fn frame_time(&self, index: usize) -> Option<i64> {
        self.pts.get(index).copied()
    }

    /// Index of the frame on screen at `ms` (the last frame starting at or
    /// before it, clamped to the first frame).
    #[must_use]
    pub fn frame_index(&self, ms: i64) -> usize {
        self.pts.partition_point(|&p| p <= ms).saturating_sub(1)
    }

    /// Timestamp of the 1-based frame `number`, clamped into range.
    pub fn frame_number(&self, number: i64) -> Result<i64, TimeError> {
        let len = self.pts.len();
        if len == 0 {
            return Err(TimeError::NoTimecodes);
        }
        let idx = clamp_ordinal(number, len);
        Ok(self.pts[idx])
    }

    /// Timestamp of the 1-based keyframe `number`, clamped into range.
    pub fn keyframe_number(&self, number: i64) -> Result<i64, TimeError> {
        if self.pts.is_empty() {
            return Err(TimeError::NoTimecodes);
        }
        if self.keyframes.is_empty() {
            return Err(TimeError::NoKeyframes);
        }
        let idx = clamp_ordinal(number, self.keyframes.len());
        Ok(self.pts[self.keyframes[idx]])
    }

    /// Snap `ms` to whichever neighbouring frame boundary is closer. Ties go to
    /// the earlier frame.
    #[must_use]
    pub fn align_to_near_frame(&self, ms: i64) -> i64 {
        if self.pts.is_empty() {
            return ms;
        }
        let last = self.pts.len() - 1;
        let before = self.pts.partition_point(|&p| p <= ms).saturating_sub(1);
        let after = self.pts.partition_point(|&p| p < ms).min(last);
        let (a, b) = (self.pts[before], self.pts[after]);
        if (a - ms).abs() <= (b - ms).abs() { a } else { b }
    }

    /// Snap `ms` down to the frame on screen at that time.
    #[must_use]
    pub fn align_to_prev_frame(&self, ms: i64) -> i64 {
        if self.pts.is_empty() {
            return ms;
        }
        self.pts[self.frame_index(ms)]
    }

    /// Snap `ms` up to the first frame starting at or after it.
    #[must_use]
    pub fn align_to_next_frame(&self, ms: i64) -> i64 {
        if self.pts.is_empty() {
            return ms;
        }
        let idx = self.pts.partition_point(|&p| p < ms).min(self.pts.len() - 1);
        self.pts[idx]
    }

    /// Move `delta` frame boundaries away from `origin`.
    pub fn shift_frames(&self, origin: i64, delta: i64) -> Result<i64, TimeError> {
        if self.pts.is_empty() {
            return Err(TimeError::NoTimecodes);
        }
        Ok(walk(&self.pts, origin, delta))
    }

    /// Move `delta` keyframes away from `origin`.
    pub fn shift_keyframes(&self, origin: i64, delta: i64) -> Result<i64, TimeError> {
        if self.keyframes.is_empty() {
            return Err(TimeError::NoKeyframes);
        }
        let candidates = self
            .keyframes
            .iter()
            .map(|&k| self.pts[k])
            .collect::<Vec<_>>();
        Ok(walk(&candidates, origin, delta))
    }
}

fn clamp_ordinal(number: i64, len: usize) -> usize {
    let upper = i64::try_from(len).unwrap_or(i64::MAX);
    usize::try_from(number.clamp(1, upper) - 1).unwrap_or(0)
}

/// Walk `delta` entries through the sorted `source` starting at `origin`.
///
/// Non-negative deltas count from the first entry greater than `origin`
/// (`delta == 0` lands on the entry at or before it); negative deltas count
/// back from the first entry not less than `origin`.
fn walk(source: &[i64], origin: i64, delta: i64) -> i64 {
    let start = if delta >= 0 {
        source.partition_point(|&p| p <= origin) as i64 + delta - 1
    } else {
        source.partition_point(|&p| p < origin) as i64 + delta
    };
    let max = source.len() as i64 - 1;
    source[start.clamp(0, max) as usize]
}

/// Render milliseconds as `h:mm:ss.mmm` for log messages and prompts.
#[must_use]
pub fn format_ms(ms: i64) -> String {
    let sign = if ms < 0 { "-" } else { "" };
    let ms = ms.unsigned_abs();
    let (h, rem) = (ms / 3_600_000, ms % 3_600_000);
    let (m, rem) = (rem / 60_000, rem % 60_000);
    let (s, frac) = (rem / 1000, rem % 1000);
    format!("{sign}{h}:{m:02}:{s:02}.{frac:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fps25() -> Timecodes {
        Timecodes::from_fps(25.0, 100).unwrap()
    }

    #[test]
    fn from_fps_builds_even_grid() {
        let tc = fps25();
        assert_eq!(tc.len(), 100);
        assert_eq!(tc.frame_time(0), Some(0));
        assert_eq!(tc.frame_time(1), Some(40));
        assert_eq!(tc.frame_time(99), Some(3960));
        assert_eq!(tc.keyframes(), &[0]);
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            Timecodes::new(vec![0, 50, 40], vec![]),
            Err(TimeError::Unsorted { index: 2 })
        );
        assert!(matches!(
            Timecodes::new(vec![0, 40], vec![2]),
            Err(TimeError::KeyframeOutOfRange { index: 2, frames: 2 })
        ));
        assert_eq!(Timecodes::from_fps(-1.0, 10), Err(TimeError::InvalidFps(-1.0)));
        assert!(Timecodes::from_fps(0.0, 10).is_err());
        assert!(Timecodes::from_fps(f64::NAN, 10).is_err());
    }

    #[test]
    fn align_near_picks_closest_boundary() {
        let tc = fps25();
        assert_eq!(tc.align_to_near_frame(0), 0);
        assert_eq!(tc.align_to_near_frame(19), 0);
        assert_eq!(tc.align_to_near_frame(20), 0);
        assert_eq!(tc.align_to_near_frame(21), 40);
        assert_eq!(tc.align_to_near_frame(1010), 1000);
        assert_eq!(tc.align_to_near_frame(-50), 0);
        assert_eq!(tc.align_to_near_frame(99_999), 3960);
    }

    #[test]
    fn align_prev_and_next() {
        let tc = fps25();
        assert_eq!(tc.align_to_prev_frame(79), 40);
        assert_eq!(tc.align_to_prev_frame(80), 80);
        assert_eq!(tc.align_to_next_frame(41), 80);
        assert_eq!(tc.align_to_next_frame(40), 40);
    }

    #[test]
    fn alignment_without_timecodes_is_identity() {
        let tc = Timecodes::default();
        assert_eq!(tc.align_to_near_frame(1234), 1234);
        assert_eq!(tc.align_to_prev_frame(1234), 1234);
        assert_eq!(tc.align_to_next_frame(1234), 1234);
        assert_eq!(tc.shift_frames(0, 1), Err(TimeError::NoTimecodes));
    }

    #[test]
    fn shift_frames_from_boundary() {
        let tc = fps25();
        assert_eq!(tc.shift_frames(1000, 10).unwrap(), 1400);
        assert_eq!(tc.shift_frames(1000, -10).unwrap(), 600);
        assert_eq!(tc.shift_frames(1000, 0).unwrap(), 1000);
    }

    #[test]
    fn shift_frames_between_boundaries() {
        let tc = fps25();
        assert_eq!(tc.shift_frames(90, 1).unwrap(), 120);
        assert_eq!(tc.shift_frames(90, -1).unwrap(), 80);
        assert_eq!(tc.shift_frames(90, 0).unwrap(), 80);
    }

    #[test]
    fn shift_frames_clamps() {
        let tc = fps25();
        assert_eq!(tc.shift_frames(0, -5).unwrap(), 0);
        assert_eq!(tc.shift_frames(3900, 500).unwrap(), 3960);
    }

    #[test]
    fn frame_numbers_are_one_based_and_clamped() {
        let tc = fps25();
        assert_eq!(tc.frame_number(1).unwrap(), 0);
        assert_eq!(tc.frame_number(2).unwrap(), 40);
        assert_eq!(tc.frame_number(0).unwrap(), 0);
        assert_eq!(tc.frame_number(1000).unwrap(), 3960);
    }

    #[test]
    fn keyframes() {
        let tc = fps25().with_keyframes(vec![0, 25, 50]).unwrap();
        assert_eq!(tc.keyframe_number(2).unwrap(), 1000);
        assert_eq!(tc.shift_keyframes(1000, 1).unwrap(), 2000);
        assert_eq!(tc.shift_keyframes(1500, -1).unwrap(), 1000);
        assert_eq!(tc.shift_keyframes(1500, 0).unwrap(), 1000);
    }

    #[test]
    fn frame_index_clamps_before_start() {
        let tc = fps25();
        assert_eq!(tc.frame_index(-10), 0);
        assert_eq!(tc.frame_index(39), 0);
        assert_eq!(tc.frame_index(40), 1);
    }

    #[test]
    fn format_ms_renders_hours() {
        assert_eq!(format_ms(0), "0:00:00.000");
        assert_eq!(format_ms(3_723_004), "1:02:03.004");
        assert_eq!(format_ms(-1500), "-0:00:01.500");
    }
}

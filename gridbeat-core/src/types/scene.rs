//! Scenes: fixed-width boolean step grids
//!
//! A scene stores one pattern (a fixed-length row of booleans) per track.
//! Every row in a scene has exactly the scene's step count; rows are added
//! as all-false when tracks grow and are never removed.

use crate::error::SequencerError;

/// One complete set of per-track step patterns, switchable as a unit.
#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    patterns: Vec<Vec<bool>>,
    step_count: usize,
}

impl Scene {
    /// Create a scene with `track_count` all-false patterns of length
    /// `step_count`.
    pub fn new(track_count: usize, step_count: usize) -> Self {
        Self {
            patterns: vec![vec![false; step_count]; track_count],
            step_count,
        }
    }

    /// The pattern for one track.
    pub fn pattern(&self, track: usize) -> Result<&[bool], SequencerError> {
        self.patterns
            .get(track)
            .map(Vec::as_slice)
            .ok_or(SequencerError::InvalidTrackIndex {
                index: track,
                count: self.patterns.len(),
            })
    }

    /// Replace one track's pattern in place.
    ///
    /// The replacement must have exactly the scene's step count.
    pub fn set_pattern(&mut self, track: usize, pattern: Vec<bool>) -> Result<(), SequencerError> {
        if pattern.len() != self.step_count {
            return Err(SequencerError::LengthMismatch {
                expected: self.step_count,
                got: pattern.len(),
            });
        }
        let count = self.patterns.len();
        let slot = self
            .patterns
            .get_mut(track)
            .ok_or(SequencerError::InvalidTrackIndex { index: track, count })?;
        *slot = pattern;
        Ok(())
    }

    /// Whether one step of one track is active.
    pub fn is_active(&self, track: usize, step: usize) -> Result<bool, SequencerError> {
        let row = self.pattern(track)?;
        row.get(step)
            .copied()
            .ok_or(SequencerError::InvalidStepIndex {
                index: step,
                count: self.step_count,
            })
    }

    /// Set one step of one track.
    pub fn set_step(
        &mut self,
        track: usize,
        step: usize,
        active: bool,
    ) -> Result<(), SequencerError> {
        if step >= self.step_count {
            return Err(SequencerError::InvalidStepIndex {
                index: step,
                count: self.step_count,
            });
        }
        let count = self.patterns.len();
        let row = self
            .patterns
            .get_mut(track)
            .ok_or(SequencerError::InvalidTrackIndex { index: track, count })?;
        row[step] = active;
        Ok(())
    }

    /// Append one all-false pattern for a newly created track.
    pub fn add_track(&mut self) {
        self.patterns.push(vec![false; self.step_count]);
    }

    pub fn track_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }
}

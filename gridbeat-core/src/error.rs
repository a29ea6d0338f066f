use thiserror::Error;

/// Contract-violation errors reported by the sequencer core.
///
/// None of these occur under correct UI-driven usage; they are surfaced as
/// explicit values (never panics, never silently swallowed) so the
/// orchestrating layer can make them loud.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequencerError {
    /// A track index past the end of the track list (or a scene's row count).
    #[error("track index {index} out of range ({count} tracks)")]
    InvalidTrackIndex { index: usize, count: usize },

    /// A scene index past the end of the scene bank.
    #[error("scene index {index} out of range ({count} scenes)")]
    InvalidSceneIndex { index: usize, count: usize },

    /// A step index at or past the step count.
    #[error("step index {index} out of range ({count} steps)")]
    InvalidStepIndex { index: usize, count: usize },

    /// A pattern write whose length differs from the scene's step count.
    #[error("pattern length {got} does not match step count {expected}")]
    LengthMismatch { expected: usize, got: usize },

    /// An operation that needs a current scene before any scene exists.
    #[error("no scene selected")]
    NoSceneSelected,

    /// A non-positive tempo. The clock assumes a validated BPM.
    #[error("tempo must be positive, got {0} BPM")]
    InvalidTempo(u32),

    /// A tick delivered while the transport is stopped. The step cursor
    /// only advances in the running state.
    #[error("sequencer is not running")]
    NotRunning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SequencerError::LengthMismatch { expected: 16, got: 8 };
        assert_eq!(
            format!("{}", err),
            "pattern length 8 does not match step count 16"
        );
        let err = SequencerError::InvalidTempo(0);
        assert_eq!(format!("{}", err), "tempo must be positive, got 0 BPM");
    }
}

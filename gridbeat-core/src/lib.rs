//! # Gridbeat Core
//!
//! Pure state machine for a drum-machine style step sequencer: a fixed
//! 16-step loop, any number of tracks, and scenes (alternate step patterns)
//! that can be swapped as a unit.
//!
//! This crate has no threads, no timers and no audio dependencies. Playback
//! timing lives in the `gridbeat` crate; here a "tick" is just a method call
//! (`Sequencer::tick`), which makes every timing-free property of the
//! sequencer deterministic and unit-testable.
//!
//! ## Modules
//!
//! - `types`: tracks, scenes, the scene bank, and the `Sequencer` state
//!   machine itself.
//! - `error`: the `SequencerError` taxonomy for contract violations
//!   (out-of-range indices, pattern length mismatches, missing scene,
//!   non-positive tempo).

pub mod error;
pub mod types;

// Re-export commonly used types for convenience
pub use error::SequencerError;
pub use types::{SampleRef, Scene, SceneBank, Sequencer, StepFrame, SwitchOutcome, Track, Trigger};
pub use types::sequencer::{DEFAULT_BPM, STEP_COUNT};

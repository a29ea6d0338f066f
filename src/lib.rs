//! # Gridbeat
//!
//! Playback engine for a drum-machine style step sequencer: a 16-step loop
//! advanced at a tempo-derived 16th-note interval, per-track sample
//! triggering, and live scene switching that always lands on the loop
//! boundary while playing.
//!
//! The state machine itself lives in the `gridbeat-core` crate and is pure.
//! This crate adds the timing runtime around it:
//!
//! - `audio::clock`: the step clock thread that fires one tick per step.
//! - `audio::engine`: the `SequencerEngine`, a command/event surface whose
//!   engine thread is the sole owner of the sequencer; plug in a
//!   `SamplePlayer` for audio and subscribe to `EngineEvent`s for rendering.
//!
//! The graphical surface and actual sample decoding/playback are external
//! collaborators; nothing in this crate touches an audio device.

pub mod audio;

// Re-export commonly used types for convenience
pub use audio::clock::{step_interval_ms, StepClock, StepTick};
pub use audio::engine::{EngineEvent, SamplePlayer, SequencerEngine};
pub use gridbeat_core::{
    SampleRef, Scene, SceneBank, Sequencer, SequencerError, StepFrame, SwitchOutcome, Track,
    Trigger, DEFAULT_BPM, STEP_COUNT,
};

// gridbeat-core/src/types/mod.rs

pub mod bank;
pub mod scene;
pub mod sequencer;
pub mod track;

pub use bank::SceneBank;
pub use scene::Scene;
pub use sequencer::{Sequencer, StepFrame, SwitchOutcome, Trigger};
pub use track::{SampleRef, Track};

pub mod clock;
pub mod engine;

pub use clock::{step_interval_ms, StepClock, StepTick, STEPS_PER_BEAT};
pub use engine::{EngineEvent, SamplePlayer, SequencerEngine};

//! Tracks and sample handles
//!
//! A `Track` is an ordered list of attached samples plus a volume scalar.
//! The sequencer only ever stores and forwards sample handles; decoding and
//! actual playback belong to the audio layer.

use std::fmt;

/// Opaque handle to a playable sound owned by the audio layer.
///
/// Carries only an identifier and the display name supplied at attachment
/// time. Cheap to clone; triggering forwards it untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleRef {
    id: u64,
    name: String,
}

impl SampleRef {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for SampleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{})", self.name, self.id)
    }
}

/// One sequencer lane: a name, its attached samples in insertion order, and
/// a volume in `[0.0, 1.0]`.
///
/// Tracks are identified by the 0-based index assigned at creation and are
/// never removed or reordered during a session.
#[derive(Clone, Debug)]
pub struct Track {
    name: String,
    samples: Vec<SampleRef>,
    volume: f32,
}

impl Track {
    /// Create an empty track at full volume.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            samples: Vec::new(),
            volume: 1.0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a sample. No de-duplication, no count limit.
    pub fn attach_sample(&mut self, sample: SampleRef) {
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[SampleRef] {
        &self.samples
    }

    /// The sample that fires on an active step, if any is attached.
    ///
    /// Triggering always uses the first attachment; later ones are kept but
    /// not layered or rotated.
    pub fn first_sample(&self) -> Option<&SampleRef> {
        self.samples.first()
    }

    /// Set the volume, silently clamped into `[0.0, 1.0]`. Never errors.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }
}

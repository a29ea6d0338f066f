//! The sequencer state machine
//!
//! Composes tracks and the scene bank, advances the step cursor one tick at
//! a time, and runs the scene-switch protocol: a switch requested while
//! stopped applies immediately; one requested while running is recorded in a
//! single pending slot and resolved on the last step of the loop, so the
//! scene never changes mid-bar.
//!
//! This type knows nothing about time. The caller (a clock-driven engine, or
//! a test) invokes [`Sequencer::tick`] once per step and acts on the returned
//! [`StepFrame`].

use crate::error::SequencerError;
use crate::types::bank::SceneBank;
use crate::types::track::{SampleRef, Track};

/// Number of steps in the loop: one bar of 16th notes.
pub const STEP_COUNT: usize = 16;

/// Tempo used before the caller sets one.
pub const DEFAULT_BPM: u32 = 120;

/// One sample trigger produced by a tick.
#[derive(Clone, Debug, PartialEq)]
pub struct Trigger {
    /// Index of the track that fired.
    pub track: usize,
    /// The track's first attached sample.
    pub sample: SampleRef,
    /// The track's volume at trigger time, already clamped to `[0.0, 1.0]`.
    pub volume: f32,
}

/// Everything one tick produced, for the audio and UI layers to act on.
#[derive(Clone, Debug)]
pub struct StepFrame {
    /// The step that just played.
    pub step: usize,
    /// The step before it (wrapping), so a playhead renderer can clear the
    /// old column without tracking state itself.
    pub previous_step: usize,
    /// Per-track active flags at `step`, indexed by track.
    pub active: Vec<bool>,
    /// Triggers for tracks that were active and had a sample attached.
    pub triggers: Vec<Trigger>,
    /// Scene index a pending switch resolved to, if this tick was the last
    /// step of the loop and a switch was queued.
    pub switched_scene: Option<usize>,
}

/// How a scene-switch request was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// Applied immediately (the sequencer was stopped).
    Applied(usize),
    /// Recorded; will apply on the last step of the current loop.
    Deferred(usize),
}

/// The sequencer: tracks, scenes, step cursor, tempo, and the pending-switch
/// slot.
#[derive(Clone, Debug)]
pub struct Sequencer {
    tracks: Vec<Track>,
    scenes: SceneBank,
    current_step: usize,
    bpm: u32,
    running: bool,
    pending_switch: Option<usize>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            scenes: SceneBank::new(),
            current_step: 0,
            bpm: DEFAULT_BPM,
            running: false,
            pending_switch: None,
        }
    }

    // --- tracks ---

    /// Create a track named `Track N` and grow every scene to match.
    /// Returns the new track's index. Allowed while running; the new track
    /// is silent until its pattern is written.
    pub fn add_track(&mut self) -> usize {
        let name = format!("Track {}", self.tracks.len() + 1);
        self.tracks.push(Track::new(name));
        self.scenes.on_track_added();
        self.tracks.len() - 1
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn track(&self, index: usize) -> Result<&Track, SequencerError> {
        self.tracks.get(index).ok_or(SequencerError::InvalidTrackIndex {
            index,
            count: self.tracks.len(),
        })
    }

    pub fn attach_sample(&mut self, track: usize, sample: SampleRef) -> Result<(), SequencerError> {
        let count = self.tracks.len();
        self.tracks
            .get_mut(track)
            .ok_or(SequencerError::InvalidTrackIndex { index: track, count })?
            .attach_sample(sample);
        Ok(())
    }

    /// Set a track's volume (clamped into `[0.0, 1.0]` by the track).
    pub fn set_track_volume(&mut self, track: usize, volume: f32) -> Result<(), SequencerError> {
        let count = self.tracks.len();
        self.tracks
            .get_mut(track)
            .ok_or(SequencerError::InvalidTrackIndex { index: track, count })?
            .set_volume(volume);
        Ok(())
    }

    // --- tempo ---

    pub fn set_bpm(&mut self, bpm: u32) -> Result<(), SequencerError> {
        if bpm == 0 {
            return Err(SequencerError::InvalidTempo(bpm));
        }
        self.bpm = bpm;
        Ok(())
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    // --- scenes ---

    /// Create a new empty scene sized to the current track count, append it
    /// and make it current. Returns the new index.
    pub fn add_scene(&mut self) -> usize {
        self.scenes.add_scene(self.tracks.len(), STEP_COUNT)
    }

    pub fn scenes(&self) -> &SceneBank {
        &self.scenes
    }

    /// The current scene's pattern for one track.
    pub fn pattern(&self, track: usize) -> Result<&[bool], SequencerError> {
        self.scenes.current_scene()?.pattern(track)
    }

    /// Replace one track's pattern in the current scene.
    pub fn set_pattern(&mut self, track: usize, pattern: Vec<bool>) -> Result<(), SequencerError> {
        self.scenes.current_scene_mut()?.set_pattern(track, pattern)
    }

    /// Set one step of one track in the current scene.
    pub fn set_step(
        &mut self,
        track: usize,
        step: usize,
        active: bool,
    ) -> Result<(), SequencerError> {
        self.scenes.current_scene_mut()?.set_step(track, step, active)
    }

    /// Request a switch to scene `index`.
    ///
    /// The index is validated now in both cases. Stopped: the switch applies
    /// immediately. Running: only the pending slot is written; the switch
    /// resolves inside the tick that plays the last step of the loop. A
    /// second request before then overwrites the first (last-writer-wins).
    pub fn request_switch(&mut self, index: usize) -> Result<SwitchOutcome, SequencerError> {
        self.scenes.check_index(index)?;
        if self.running {
            self.pending_switch = Some(index);
            Ok(SwitchOutcome::Deferred(index))
        } else {
            self.scenes.switch(index)?;
            Ok(SwitchOutcome::Applied(index))
        }
    }

    /// The scene index a deferred switch will resolve to, if one is queued.
    pub fn pending_switch(&self) -> Option<usize> {
        self.pending_switch
    }

    // --- transport ---

    /// Enter the running state. Fails when no scene exists yet; idempotent
    /// otherwise.
    pub fn start(&mut self) -> Result<(), SequencerError> {
        if self.scenes.is_empty() {
            return Err(SequencerError::NoSceneSelected);
        }
        self.running = true;
        Ok(())
    }

    /// Leave the running state and reset the step cursor.
    ///
    /// A queued scene switch is honored at this earliest opportunity rather
    /// than dropped: it is applied before the reset, and the applied scene
    /// index is returned so the caller can announce it. Idempotent.
    pub fn stop(&mut self) -> Option<usize> {
        let applied = match self.pending_switch.take() {
            // Index was validated when the request was recorded and scenes
            // are never removed, so this switch cannot fail.
            Some(index) => self.scenes.switch(index).ok().map(|_| index),
            None => None,
        };
        self.running = false;
        self.current_step = 0;
        applied
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The step the next tick will play. Always in `[0, STEP_COUNT)`.
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Play one step: collect triggers for active tracks with samples,
    /// resolve a pending scene switch when this is the last step of the
    /// loop, then advance the cursor modulo [`STEP_COUNT`].
    ///
    /// Only legal while running; a tick delivered to a stopped sequencer is
    /// rejected with [`SequencerError::NotRunning`] and moves nothing.
    pub fn tick(&mut self) -> Result<StepFrame, SequencerError> {
        if !self.running {
            return Err(SequencerError::NotRunning);
        }
        let step = self.current_step;
        let scene = self.scenes.current_scene()?;

        let mut active = Vec::with_capacity(self.tracks.len());
        let mut triggers = Vec::new();
        for (index, track) in self.tracks.iter().enumerate() {
            let on = scene.is_active(index, step)?;
            active.push(on);
            if on {
                if let Some(sample) = track.first_sample() {
                    triggers.push(Trigger {
                        track: index,
                        sample: sample.clone(),
                        volume: track.volume(),
                    });
                }
            }
        }

        let mut switched_scene = None;
        if step == STEP_COUNT - 1 {
            if let Some(index) = self.pending_switch.take() {
                self.scenes.switch(index)?;
                switched_scene = Some(index);
            }
        }

        self.current_step = (step + 1) % STEP_COUNT;

        Ok(StepFrame {
            step,
            previous_step: (step + STEP_COUNT - 1) % STEP_COUNT,
            active,
            triggers,
            switched_scene,
        })
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A sequencer with `tracks` tracks and one scene, started.
    fn running_sequencer(tracks: usize) -> Sequencer {
        let mut seq = Sequencer::new();
        for _ in 0..tracks {
            seq.add_track();
        }
        seq.add_scene();
        seq.start().unwrap();
        seq
    }

    #[test]
    fn test_add_track_names_and_indices() {
        let mut seq = Sequencer::new();
        assert_eq!(seq.add_track(), 0);
        assert_eq!(seq.add_track(), 1);
        assert_eq!(seq.track(0).unwrap().name(), "Track 1");
        assert_eq!(seq.track(1).unwrap().name(), "Track 2");
        assert!(seq.track(2).is_err());
    }

    #[test]
    fn test_set_bpm_rejects_zero() {
        let mut seq = Sequencer::new();
        assert_eq!(seq.set_bpm(0), Err(SequencerError::InvalidTempo(0)));
        seq.set_bpm(90).unwrap();
        assert_eq!(seq.bpm(), 90);
    }

    #[test]
    fn test_start_requires_a_scene() {
        let mut seq = Sequencer::new();
        seq.add_track();
        assert_eq!(seq.start(), Err(SequencerError::NoSceneSelected));
        seq.add_scene();
        seq.start().unwrap();
        assert!(seq.is_running());
    }

    #[test]
    fn test_step_wraps_after_sixteen_ticks() {
        let mut seq = running_sequencer(1);
        for expected in 0..STEP_COUNT {
            assert_eq!(seq.current_step(), expected);
            let frame = seq.tick().unwrap();
            assert_eq!(frame.step, expected);
            assert!(frame.step < STEP_COUNT);
        }
        assert_eq!(seq.current_step(), 0);
    }

    #[test]
    fn test_previous_step_wraps() {
        let mut seq = running_sequencer(1);
        let frame = seq.tick().unwrap();
        assert_eq!(frame.step, 0);
        assert_eq!(frame.previous_step, STEP_COUNT - 1);
        let frame = seq.tick().unwrap();
        assert_eq!(frame.previous_step, 0);
    }

    #[test]
    fn test_trigger_uses_first_sample_and_current_volume() {
        let mut seq = running_sequencer(2);
        seq.attach_sample(0, SampleRef::new(7, "kick")).unwrap();
        seq.attach_sample(0, SampleRef::new(8, "kick_alt")).unwrap();
        seq.set_track_volume(0, 0.5).unwrap();
        seq.set_step(0, 0, true).unwrap();
        // Track 1 is active but has no sample attached: no trigger.
        seq.set_step(1, 0, true).unwrap();

        let frame = seq.tick().unwrap();
        assert_eq!(frame.active, vec![true, true]);
        assert_eq!(frame.triggers.len(), 1);
        let trigger = &frame.triggers[0];
        assert_eq!(trigger.track, 0);
        assert_eq!(trigger.sample.id(), 7);
        assert_eq!(trigger.volume, 0.5);
    }

    #[test]
    fn test_inactive_steps_produce_no_triggers() {
        let mut seq = running_sequencer(1);
        seq.attach_sample(0, SampleRef::new(1, "kick")).unwrap();
        seq.set_step(0, 0, true).unwrap();

        let frame = seq.tick().unwrap();
        assert_eq!(frame.triggers.len(), 1);
        for _ in 1..STEP_COUNT {
            let frame = seq.tick().unwrap();
            assert!(frame.triggers.is_empty(), "step {} should be silent", frame.step);
        }
    }

    #[test]
    fn test_switch_while_stopped_is_immediate() {
        let mut seq = Sequencer::new();
        seq.add_track();
        seq.add_scene();
        seq.add_scene();
        seq.set_step(0, 0, true).unwrap(); // writes into scene 1

        let outcome = seq.request_switch(0).unwrap();
        assert_eq!(outcome, SwitchOutcome::Applied(0));
        assert_eq!(seq.scenes().current_index(), Some(0));
        // Active read path now serves scene 0's (empty) pattern, no tick
        // required.
        assert!(seq.pattern(0).unwrap().iter().all(|&on| !on));
    }

    #[test]
    fn test_switch_while_running_defers_to_loop_boundary() {
        let mut seq = running_sequencer(1);
        seq.add_scene();
        seq.request_switch(0).unwrap(); // back to scene 0, currently on 1

        // Request arrives at step 0; tick through step 5 and check nothing
        // has changed yet.
        for _ in 0..6 {
            let frame = seq.tick().unwrap();
            assert_eq!(frame.switched_scene, None);
            assert_eq!(seq.scenes().current_index(), Some(1));
        }

        // Steps 6..14: still the old scene.
        while seq.current_step() != STEP_COUNT - 1 {
            assert_eq!(seq.tick().unwrap().switched_scene, None);
        }

        // The tick that plays step 15 resolves the switch.
        let frame = seq.tick().unwrap();
        assert_eq!(frame.step, STEP_COUNT - 1);
        assert_eq!(frame.switched_scene, Some(0));
        assert_eq!(seq.scenes().current_index(), Some(0));
        assert_eq!(seq.pending_switch(), None);
        assert_eq!(seq.current_step(), 0);
    }

    #[test]
    fn test_second_request_overwrites_pending() {
        let mut seq = running_sequencer(1);
        seq.add_scene();
        seq.add_scene(); // scenes 0, 1, 2; current = 2

        seq.request_switch(0).unwrap();
        seq.request_switch(1).unwrap();
        assert_eq!(seq.pending_switch(), Some(1));

        for _ in 0..STEP_COUNT {
            seq.tick().unwrap();
        }
        assert_eq!(seq.scenes().current_index(), Some(1));
    }

    #[test]
    fn test_invalid_switch_request_is_loud_and_harmless() {
        let mut seq = running_sequencer(1);
        seq.add_scene();
        seq.request_switch(0).unwrap();

        let err = seq.request_switch(9).unwrap_err();
        assert_eq!(err, SequencerError::InvalidSceneIndex { index: 9, count: 2 });
        // The earlier pending request survives an invalid one.
        assert_eq!(seq.pending_switch(), Some(0));
    }

    #[test]
    fn test_stop_applies_pending_switch_and_resets() {
        let mut seq = running_sequencer(1);
        seq.add_scene();
        seq.tick().unwrap();
        seq.tick().unwrap();
        seq.request_switch(0).unwrap();

        let applied = seq.stop();
        assert_eq!(applied, Some(0));
        assert_eq!(seq.scenes().current_index(), Some(0));
        assert!(!seq.is_running());
        assert_eq!(seq.current_step(), 0);
        assert_eq!(seq.pending_switch(), None);

        // Stop again: no error, nothing further to apply.
        assert_eq!(seq.stop(), None);
    }

    #[test]
    fn test_add_track_while_scenes_exist_backfills_all() {
        let mut seq = Sequencer::new();
        seq.add_track();
        seq.add_scene();
        seq.set_step(0, 2, true).unwrap();
        seq.add_scene();

        let new_track = seq.add_track();
        assert_eq!(new_track, 1);
        for scene_index in 0..2 {
            let scene = seq.scenes().scene(scene_index).unwrap();
            let row = scene.pattern(new_track).unwrap();
            assert_eq!(row.len(), STEP_COUNT);
            assert!(row.iter().all(|&on| !on));
        }
        // Pre-existing pattern in scene 0 unaltered.
        assert!(seq.scenes().scene(0).unwrap().is_active(0, 2).unwrap());
    }

    #[test]
    fn test_add_scene_sized_to_tracks_and_made_current() {
        let mut seq = Sequencer::new();
        seq.add_track();
        seq.add_track();
        let index = seq.add_scene();
        assert_eq!(index, 0);
        assert_eq!(seq.scenes().current_index(), Some(0));
        assert_eq!(seq.scenes().current_scene().unwrap().track_count(), 2);
    }

    #[test]
    fn test_tick_while_stopped_is_rejected() {
        let mut seq = Sequencer::new();
        seq.add_track();
        seq.add_scene();
        assert_eq!(seq.tick().unwrap_err(), SequencerError::NotRunning);
        assert_eq!(seq.current_step(), 0);

        seq.start().unwrap();
        seq.tick().unwrap();
        seq.stop();

        // Stale ticks after stop move nothing either.
        assert_eq!(seq.tick().unwrap_err(), SequencerError::NotRunning);
        assert_eq!(seq.current_step(), 0);
    }

    #[test]
    fn test_add_scene_while_running_switches_immediately() {
        let mut seq = running_sequencer(1);
        seq.attach_sample(0, SampleRef::new(1, "kick")).unwrap();
        seq.set_pattern(0, vec![true; STEP_COUNT]).unwrap();
        seq.tick().unwrap();
        seq.tick().unwrap(); // mid-bar, cursor at step 2

        let index = seq.add_scene();
        assert_eq!(index, 1);
        assert_eq!(seq.scenes().current_index(), Some(1));

        // The very next tick already reads the new (empty) scene; no loop
        // boundary involved and the cursor keeps its place.
        let frame = seq.tick().unwrap();
        assert_eq!(frame.step, 2);
        assert!(frame.triggers.is_empty());
        assert!(frame.active.iter().all(|&on| !on));
    }
}

//! Sequencer engine: the command/event surface around the state machine
//!
//! `SequencerEngine` is a cheap handle; the sequencer itself lives on a
//! persistent engine thread together with the step clock. Clock ticks and
//! UI-originated commands (play/stop/switch/add-track/...) arrive over two
//! channels and are serialized through one `select!` loop, so the step
//! cursor and the pending-switch slot are only ever touched from one place.
//!
//! Triggers go to the injected [`SamplePlayer`] capability, fire-and-forget.
//! Step and scene-switch notifications are broadcast to subscribers for
//! playhead and scene-highlight rendering.

use crate::audio::clock::{StepClock, StepTick};
use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use gridbeat_core::{SampleRef, Sequencer, SequencerError, SwitchOutcome};
use log::warn;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Playback capability supplied by the audio layer.
///
/// The engine only forwards the opaque sample handle and a volume; decoding
/// and sounding the sample are entirely the implementor's concern, and
/// playback failures never propagate back into sequencer state.
pub trait SamplePlayer: Send {
    /// Fire-and-forget trigger of one sample at the given volume.
    fn play(&mut self, sample: &SampleRef, volume: f32);
}

/// Notifications broadcast to subscribers.
#[derive(Clone, Debug)]
pub enum EngineEvent {
    /// A step just played: its index and the per-track active flags.
    Step { step: usize, active: Vec<bool> },
    /// A scene switch resolved (immediate or deferred) to this index.
    SceneSwitched(usize),
}

/// Commands that can be sent to the engine thread
enum EngineCommand {
    AddTrack(Sender<usize>),
    AttachSample {
        track: usize,
        sample: SampleRef,
        reply: Sender<Result<(), SequencerError>>,
    },
    SetTrackVolume {
        track: usize,
        volume: f32,
        reply: Sender<Result<(), SequencerError>>,
    },
    SetBpm {
        bpm: u32,
        reply: Sender<Result<(), SequencerError>>,
    },
    SetStep {
        track: usize,
        step: usize,
        active: bool,
        reply: Sender<Result<(), SequencerError>>,
    },
    SetPattern {
        track: usize,
        pattern: Vec<bool>,
        reply: Sender<Result<(), SequencerError>>,
    },
    Pattern {
        track: usize,
        reply: Sender<Result<Vec<bool>, SequencerError>>,
    },
    AddScene(Sender<usize>),
    SwitchScene {
        index: usize,
        reply: Sender<Result<(), SequencerError>>,
    },
    CurrentScene(Sender<Option<usize>>),
    Play(Sender<Result<(), SequencerError>>),
    Stop(Sender<()>),
    Subscribe(Sender<EngineEvent>),
    Shutdown,
}

/// Handle to a running sequencer engine.
///
/// All methods are safe to call from any thread; they funnel into the engine
/// thread and return once it has acted. Dropping the handle shuts the engine
/// (and its clock) down.
pub struct SequencerEngine {
    command_tx: Sender<EngineCommand>,
    playing: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SequencerEngine {
    /// Spawn the engine thread around the given playback capability.
    pub fn new(player: Box<dyn SamplePlayer>) -> Self {
        let (command_tx, command_rx) = unbounded();
        let playing = Arc::new(AtomicBool::new(false));
        let playing_clone = playing.clone();

        let thread = thread::spawn(move || {
            EngineLoop::new(player, command_rx, playing_clone).run();
        });

        SequencerEngine {
            command_tx,
            playing,
            thread: Some(thread),
        }
    }

    fn request<T>(&self, build: impl FnOnce(Sender<T>) -> EngineCommand) -> Result<T> {
        let (reply_tx, reply_rx) = bounded(1);
        self.command_tx
            .send(build(reply_tx))
            .map_err(|_| anyhow!("engine thread has shut down"))?;
        reply_rx
            .recv()
            .map_err(|_| anyhow!("engine thread dropped the reply"))
    }

    /// Append a track (named `Track N`) and grow every scene to match.
    /// Returns the new track's index.
    pub fn add_track(&self) -> Result<usize> {
        self.request(EngineCommand::AddTrack)
    }

    /// Attach a sample handle to a track.
    pub fn attach_sample(&self, track: usize, sample: SampleRef) -> Result<()> {
        Ok(self.request(|reply| EngineCommand::AttachSample { track, sample, reply })??)
    }

    /// Set a track's volume, clamped into `[0.0, 1.0]`.
    pub fn set_track_volume(&self, track: usize, volume: f32) -> Result<()> {
        Ok(self.request(|reply| EngineCommand::SetTrackVolume { track, volume, reply })??)
    }

    /// Set the tempo. Takes effect on subsequent ticks without resetting
    /// phase when playing.
    pub fn set_bpm(&self, bpm: u32) -> Result<()> {
        Ok(self.request(|reply| EngineCommand::SetBpm { bpm, reply })??)
    }

    /// Toggle one step of one track in the current scene.
    pub fn set_step(&self, track: usize, step: usize, active: bool) -> Result<()> {
        Ok(self.request(|reply| EngineCommand::SetStep { track, step, active, reply })??)
    }

    /// Replace one track's pattern in the current scene.
    pub fn set_pattern(&self, track: usize, pattern: Vec<bool>) -> Result<()> {
        Ok(self.request(|reply| EngineCommand::SetPattern { track, pattern, reply })??)
    }

    /// Read one track's pattern from the current scene.
    pub fn pattern(&self, track: usize) -> Result<Vec<bool>> {
        Ok(self.request(|reply| EngineCommand::Pattern { track, reply })??)
    }

    /// Create a new empty scene, make it current, return its index.
    pub fn add_scene(&self) -> Result<usize> {
        self.request(EngineCommand::AddScene)
    }

    /// Request a switch to scene `index`: immediate when stopped, deferred
    /// to the loop boundary when playing. The index is validated either way.
    pub fn request_scene_switch(&self, index: usize) -> Result<()> {
        Ok(self.request(|reply| EngineCommand::SwitchScene { index, reply })??)
    }

    /// Index of the current scene, `None` before the first scene exists.
    pub fn current_scene(&self) -> Result<Option<usize>> {
        self.request(EngineCommand::CurrentScene)
    }

    /// Start playback at the current tempo. Idempotent; fails with
    /// `NoSceneSelected` when no scene exists yet.
    pub fn play(&self) -> Result<()> {
        Ok(self.request(EngineCommand::Play)??)
    }

    /// Stop playback, applying any pending scene switch first and resetting
    /// the step cursor. Synchronous: once this returns, no further step
    /// events or triggers are delivered. Idempotent.
    pub fn stop(&self) -> Result<()> {
        self.request(EngineCommand::Stop)
    }

    /// Create a subscriber that receives every [`EngineEvent`].
    pub fn subscribe(&self) -> Result<Receiver<EngineEvent>> {
        let (tx, rx) = unbounded();
        self.command_tx
            .send(EngineCommand::Subscribe(tx))
            .map_err(|_| anyhow!("engine thread has shut down"))?;
        Ok(rx)
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }
}

impl Drop for SequencerEngine {
    fn drop(&mut self) {
        let _ = self.command_tx.send(EngineCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// The engine thread: sole owner of the sequencer and the clock.
struct EngineLoop {
    sequencer: Sequencer,
    clock: StepClock,
    tick_rx: Receiver<StepTick>,
    command_rx: Receiver<EngineCommand>,
    subscribers: Vec<Sender<EngineEvent>>,
    player: Box<dyn SamplePlayer>,
    playing: Arc<AtomicBool>,
}

impl EngineLoop {
    fn new(
        player: Box<dyn SamplePlayer>,
        command_rx: Receiver<EngineCommand>,
        playing: Arc<AtomicBool>,
    ) -> Self {
        let sequencer = Sequencer::new();
        let clock = StepClock::new(sequencer.bpm());
        let tick_rx = clock.subscribe();
        Self {
            sequencer,
            clock,
            tick_rx,
            command_rx,
            subscribers: Vec::new(),
            player,
            playing,
        }
    }

    fn run(&mut self) {
        loop {
            crossbeam_channel::select! {
                recv(self.command_rx) -> cmd => match cmd {
                    Ok(cmd) => {
                        if self.handle_command(cmd) {
                            break;
                        }
                    }
                    Err(_) => break, // All handles dropped
                },
                recv(self.tick_rx) -> tick => match tick {
                    Ok(_) => self.handle_tick(),
                    Err(_) => break,
                },
            }
        }
    }

    fn broadcast(&mut self, event: EngineEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// One step of playback. Each tick runs to completion here before the
    /// next channel message is looked at; the handler never suspends.
    fn handle_tick(&mut self) {
        // A tick can still be queued after stop resolved; ignore it.
        if !self.sequencer.is_running() {
            return;
        }
        match self.sequencer.tick() {
            Ok(frame) => {
                for trigger in &frame.triggers {
                    self.player.play(&trigger.sample, trigger.volume);
                }
                self.broadcast(EngineEvent::Step {
                    step: frame.step,
                    active: frame.active,
                });
                if let Some(index) = frame.switched_scene {
                    self.broadcast(EngineEvent::SceneSwitched(index));
                }
            }
            Err(e) => warn!("tick skipped: {}", e),
        }
    }

    fn handle_command(&mut self, cmd: EngineCommand) -> bool {
        match cmd {
            EngineCommand::AddTrack(reply) => {
                let _ = reply.send(self.sequencer.add_track());
            }
            EngineCommand::AttachSample { track, sample, reply } => {
                let _ = reply.send(self.sequencer.attach_sample(track, sample));
            }
            EngineCommand::SetTrackVolume { track, volume, reply } => {
                let _ = reply.send(self.sequencer.set_track_volume(track, volume));
            }
            EngineCommand::SetBpm { bpm, reply } => {
                let result = self.sequencer.set_bpm(bpm);
                if result.is_ok() {
                    self.clock.set_bpm(bpm);
                }
                let _ = reply.send(result);
            }
            EngineCommand::SetStep { track, step, active, reply } => {
                let _ = reply.send(self.sequencer.set_step(track, step, active));
            }
            EngineCommand::SetPattern { track, pattern, reply } => {
                let _ = reply.send(self.sequencer.set_pattern(track, pattern));
            }
            EngineCommand::Pattern { track, reply } => {
                let _ = reply.send(self.sequencer.pattern(track).map(<[bool]>::to_vec));
            }
            EngineCommand::AddScene(reply) => {
                let index = self.sequencer.add_scene();
                self.broadcast(EngineEvent::SceneSwitched(index));
                let _ = reply.send(index);
            }
            EngineCommand::SwitchScene { index, reply } => {
                let result = match self.sequencer.request_switch(index) {
                    Ok(SwitchOutcome::Applied(applied)) => {
                        self.broadcast(EngineEvent::SceneSwitched(applied));
                        Ok(())
                    }
                    // Deferred: resolved by the tick that plays step 15.
                    Ok(SwitchOutcome::Deferred(_)) => Ok(()),
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            EngineCommand::CurrentScene(reply) => {
                let _ = reply.send(self.sequencer.scenes().current_index());
            }
            EngineCommand::Play(reply) => {
                let was_running = self.sequencer.is_running();
                let result = self.sequencer.start();
                if result.is_ok() {
                    if !was_running {
                        // A tick emitted just before the previous stop can
                        // still be queued; drop it so the fresh loop starts
                        // from the clock's own first tick, not a stale one.
                        for _ in self.tick_rx.try_iter() {}
                    }
                    self.clock.set_bpm(self.sequencer.bpm());
                    self.clock.start();
                    self.playing.store(true, Ordering::Relaxed);
                }
                let _ = reply.send(result);
            }
            EngineCommand::Stop(reply) => {
                // Apply a pending switch before the stop side effects so a
                // queued switch is honored rather than dropped.
                let applied = self.sequencer.stop();
                self.clock.stop();
                self.playing.store(false, Ordering::Relaxed);
                if let Some(index) = applied {
                    self.broadcast(EngineEvent::SceneSwitched(index));
                }
                let _ = reply.send(());
            }
            EngineCommand::Subscribe(tx) => {
                self.subscribers.push(tx);
            }
            EngineCommand::Shutdown => {
                self.clock.stop();
                self.playing.store(false, Ordering::Relaxed);
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullPlayer;

    impl SamplePlayer for NullPlayer {
        fn play(&mut self, _sample: &SampleRef, _volume: f32) {}
    }

    fn engine() -> SequencerEngine {
        SequencerEngine::new(Box::new(NullPlayer))
    }

    #[test]
    fn test_commands_round_trip() {
        let engine = engine();
        assert_eq!(engine.add_track().unwrap(), 0);
        assert_eq!(engine.add_track().unwrap(), 1);
        assert_eq!(engine.add_scene().unwrap(), 0);

        engine.set_step(0, 0, true).unwrap();
        let pattern = engine.pattern(0).unwrap();
        assert!(pattern[0]);
        assert_eq!(pattern.len(), 16);
    }

    #[test]
    fn test_errors_surface_through_the_handle() {
        let engine = engine();
        assert!(engine.play().is_err()); // no scene yet
        assert!(engine.set_bpm(0).is_err());
        assert!(engine.attach_sample(3, SampleRef::new(1, "kick")).is_err());
        engine.add_scene().unwrap();
        assert!(engine.request_scene_switch(5).is_err());
    }

    #[test]
    fn test_switch_while_stopped_is_immediate() {
        let engine = engine();
        engine.add_track().unwrap();
        engine.add_scene().unwrap();
        engine.add_scene().unwrap();
        assert_eq!(engine.current_scene().unwrap(), Some(1));

        engine.request_scene_switch(0).unwrap();
        assert_eq!(engine.current_scene().unwrap(), Some(0));
    }

    #[test]
    fn test_play_stop_idempotent() {
        let engine = engine();
        engine.add_track().unwrap();
        engine.add_scene().unwrap();

        engine.play().unwrap();
        engine.play().unwrap();
        assert!(engine.is_playing());

        engine.stop().unwrap();
        engine.stop().unwrap();
        assert!(!engine.is_playing());
    }
}

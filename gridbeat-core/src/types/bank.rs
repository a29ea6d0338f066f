//! Scene bank: the ordered scene collection and the current-scene cursor
//!
//! The bank is deliberately dumb: `switch` always takes effect immediately.
//! The defer-until-loop-boundary policy for live switching belongs to the
//! `Sequencer`, which decides *when* to call `switch`.

use crate::error::SequencerError;
use crate::types::scene::Scene;

/// Ordered collection of scenes plus the index of the current one.
///
/// Scenes are only ever appended, never removed or reordered, so scene
/// indices are stable for the whole session.
#[derive(Clone, Debug, Default)]
pub struct SceneBank {
    scenes: Vec<Scene>,
    current: Option<usize>,
}

impl SceneBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new empty scene sized `track_count` x `step_count` and make
    /// it current. Returns the new scene's index.
    pub fn add_scene(&mut self, track_count: usize, step_count: usize) -> usize {
        self.scenes.push(Scene::new(track_count, step_count));
        let index = self.scenes.len() - 1;
        self.current = Some(index);
        index
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Index of the current scene, `None` before the first scene exists.
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_scene(&self) -> Result<&Scene, SequencerError> {
        self.current
            .and_then(|index| self.scenes.get(index))
            .ok_or(SequencerError::NoSceneSelected)
    }

    pub fn current_scene_mut(&mut self) -> Result<&mut Scene, SequencerError> {
        match self.current {
            Some(index) => self
                .scenes
                .get_mut(index)
                .ok_or(SequencerError::NoSceneSelected),
            None => Err(SequencerError::NoSceneSelected),
        }
    }

    pub fn scene(&self, index: usize) -> Result<&Scene, SequencerError> {
        self.scenes
            .get(index)
            .ok_or(SequencerError::InvalidSceneIndex {
                index,
                count: self.scenes.len(),
            })
    }

    /// Make `index` the current scene, immediately and unconditionally.
    pub fn switch(&mut self, index: usize) -> Result<(), SequencerError> {
        if index >= self.scenes.len() {
            return Err(SequencerError::InvalidSceneIndex {
                index,
                count: self.scenes.len(),
            });
        }
        self.current = Some(index);
        Ok(())
    }

    /// Validate a scene index without switching to it.
    pub fn check_index(&self, index: usize) -> Result<(), SequencerError> {
        if index >= self.scenes.len() {
            return Err(SequencerError::InvalidSceneIndex {
                index,
                count: self.scenes.len(),
            });
        }
        Ok(())
    }

    /// Grow every scene by one all-false pattern. Called whenever a track is
    /// created so scene widths stay in sync with the track count.
    pub fn on_track_added(&mut self) {
        for scene in &mut self.scenes {
            scene.add_track();
        }
    }
}

//! Pick session: the lifecycle of one hit-test request.
//!
//! ```text
//! Idle → PickDrawRequested → PickDrawing → HitSampled → Resolved → Idle
//! ```
//!
//! Each transition is only legal from its predecessor state. An illegal
//! transition is a usage error: it returns `false` and changes nothing.

use rsg_core::pick::PickNames;
use rsg_core::{CurrentPick, NodeUid, RepositoryRef};
use serde::{Deserialize, Serialize};

use crate::buffer::PickSample;
use crate::resolve::{PickEntry, decode_sample, hover_target, scene_candidates};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PickState {
    #[default]
    Idle,
    PickDrawRequested,
    PickDrawing,
    HitSampled,
    Resolved,
}

#[derive(Debug, Clone, Default)]
pub struct PickSession {
    state: PickState,
    position: (usize, usize),
    sample: Option<PickSample>,
    entry: Option<PickEntry>,
}

impl PickSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PickState {
        self.state
    }

    /// Pointer position of the pending request, in pick-buffer pixels.
    pub fn position(&self) -> (usize, usize) {
        self.position
    }

    /// Ask for a pick at `(x, y)`. Legal from `Idle` or after a finished pick.
    pub fn request(&mut self, x: usize, y: usize) -> bool {
        if !matches!(self.state, PickState::Idle | PickState::Resolved) {
            return false;
        }
        self.position = (x, y);
        self.sample = None;
        self.entry = None;
        self.state = PickState::PickDrawRequested;
        true
    }

    /// The pick pass is about to traverse the graph.
    pub fn begin_draw(&mut self) -> bool {
        self.advance(PickState::PickDrawRequested, PickState::PickDrawing)
    }

    /// The pick pass finished and the buffer was read back around the pointer.
    pub fn sampled(&mut self, sample: Option<PickSample>) -> bool {
        if !self.advance(PickState::PickDrawing, PickState::HitSampled) {
            return false;
        }
        self.sample = sample;
        true
    }

    /// Decode the sample against the name stacks stored by the pick pass.
    ///
    /// Returns the resolved entry, or `None` for "no pick" (and also when
    /// called out of order).
    pub fn resolve(&mut self, names: &mut PickNames) -> Option<&PickEntry> {
        if !self.advance(PickState::HitSampled, PickState::Resolved) {
            return None;
        }
        self.entry = self.sample.as_ref().and_then(|s| decode_sample(s, names));
        self.entry.as_ref()
    }

    pub fn entry(&self) -> Option<&PickEntry> {
        self.entry.as_ref()
    }

    /// Drop any pending request and go back to `Idle`.
    pub fn cancel(&mut self) {
        *self = Self::default();
    }

    fn advance(&mut self, from: PickState, to: PickState) -> bool {
        if self.state != from {
            log::debug!("pick session: ignoring {from:?} → {to:?} while {:?}", self.state);
            return false;
        }
        self.state = to;
        true
    }
}

// ─── Current pick update ─────────────────────────────────────────────────

/// What a resolved pick changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PickUpdate {
    /// The picked path or part differs from before.
    pub changed: bool,
    /// The scene must be redrawn (new target, new part, or pick lost).
    pub redraw: bool,
    /// Scene to notify about the pointer entering it.
    pub over: Option<NodeUid>,
}

/// Fold a resolved entry into the context's current pick.
///
/// A hit only counts if some scene on its path (other than the root) is
/// pickable; otherwise the current pick is dropped.
pub fn update_current_pick(
    current: &mut CurrentPick,
    repo: &RepositoryRef,
    entry: Option<&PickEntry>,
) -> PickUpdate {
    let target = entry.and_then(|e| {
        let candidates = scene_candidates(repo, &e.path);
        hover_target(&candidates).map(|c| (e, c.uid, c.options.notify_over))
    });

    match target {
        Some((e, uid, notify_over)) => {
            let changed = current.set(e.path.clone(), Some(e.part_id), Some(e.min_depth));
            if changed {
                log::debug!("pick moved to scene {uid} part {}", e.part_id);
            }
            PickUpdate {
                changed,
                redraw: changed,
                over: (changed && notify_over).then_some(uid),
            }
        }
        None => {
            let lost = current.clear();
            if lost {
                log::debug!("pick lost");
            }
            PickUpdate {
                changed: lost,
                redraw: lost,
                over: None,
            }
        }
    }
}

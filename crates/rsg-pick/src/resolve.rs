//! Pick resolution: sampled color → node path → event target.
//!
//! Decoding turns the sampled color back into the stored name stack. The
//! path is then matched against the live graph, deepest node first, and a
//! fixed priority policy decides which scene receives the pointer event.

use rsg_core::pick::PickNames;
use rsg_core::{DragChannel, NodeUid, PickOptions, RepositoryRef};
use serde::{Deserialize, Serialize};

use crate::buffer::PickSample;

/// Part id reported when nothing is picked.
pub const NO_PART: u32 = 0x000F_FFFF;

/// A resolved hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickEntry {
    /// Node uids from the root down to the drawable that produced the pixel.
    pub path: Vec<NodeUid>,
    /// Part id local to that drawable.
    pub part_id: u32,
    /// Depth of the sampled fragment.
    pub min_depth: f32,
}

/// Decode a sample into a pick entry.
///
/// Returns `None` for an empty pixel, or if the encoded stack is not
/// available in `names` (out of range or written in an earlier pass).
/// On success the current name stack of `names` holds the loaded path.
pub fn decode_sample(sample: &PickSample, names: &mut PickNames) -> Option<PickEntry> {
    let Some(name) = sample.color.decode() else {
        log::trace!("pick color {:#010x} is empty", sample.color.0);
        return None;
    };
    if !names.load(name.base) {
        log::debug!(
            "pick color {:#010x} names stack {} of {}; ignored",
            sample.color.0,
            name.base,
            names.list.stored()
        );
        return None;
    }
    Some(PickEntry {
        path: names.stack.uids().collect(),
        part_id: name.part,
        min_depth: sample.depth,
    })
}

/// Combine the hits of several passes (e.g. both stereo eyes).
///
/// The first entry is kept unless a later one is strictly nearer.
pub fn merge_entries(entries: impl IntoIterator<Item = PickEntry>) -> Option<PickEntry> {
    entries.into_iter().fold(None, |best, e| match best {
        Some(b) if e.min_depth >= b.min_depth => Some(b),
        _ => Some(e),
    })
}

// ─── Candidates ──────────────────────────────────────────────────────────

/// Interaction state of one scene on a picked path, captured from the live graph.
#[derive(Debug, Clone, PartialEq)]
pub struct PickCandidate {
    pub uid: NodeUid,
    pub is_tool: bool,
    pub options: PickOptions,
    pub drag_enabled: [bool; 4],
    pub anim_drag_enabled: [bool; 4],
}

impl PickCandidate {
    fn drag(&self, channel: Option<DragChannel>) -> bool {
        channel.is_some_and(|c| self.drag_enabled[c.index()])
    }

    fn anim_drag(&self, channel: Option<DragChannel>) -> bool {
        channel.is_some_and(|c| self.anim_drag_enabled[c.index()])
    }
}

/// Scenes along `path`, deepest first. The root (index 0) is never a
/// candidate, nodes that no longer exist or are not scenes are skipped.
pub fn scene_candidates(repo: &RepositoryRef, path: &[NodeUid]) -> Vec<PickCandidate> {
    path.iter()
        .skip(1)
        .rev()
        .filter_map(|&uid| {
            repo.lookup(uid)
                .with(|node| {
                    let scene = node.as_scene()?;
                    Some(PickCandidate {
                        uid,
                        is_tool: node.is_tool(),
                        options: scene.pick,
                        drag_enabled: DragChannel::ALL.map(|c| scene.is_drag_enabled(c)),
                        anim_drag_enabled: DragChannel::ALL.map(|c| scene.is_anim_drag_enabled(c)),
                    })
                })
                .flatten()
        })
        .collect()
}

// ─── Policy ──────────────────────────────────────────────────────────────

/// Pointer events, as seen by pick resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseEventKind {
    /// Pointer moved without a button.
    Over,
    /// Button went down.
    Select,
    /// Pointer moved with a button down.
    Drag,
    /// Button released after a drag.
    DragEnd,
    /// Button released quickly without moving.
    Click,
}

impl MouseEventKind {
    fn is_drag_phase(self) -> bool {
        matches!(self, Self::Select | Self::Drag | Self::DragEnd)
    }
}

/// Why a scene was chosen as event target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PickReason {
    Tool,
    NotifyClick,
    NotifyDrag,
    Drag,
    Pickable,
}

/// Choose the scene that receives `event`.
///
/// Only pickable scenes take part. Scanning deepest first, the winner is:
/// a tool with the drag channel enabled; else the first scene wanting
/// click notification on a click; else the first scene wanting drag
/// notification with the channel enabled (or animated) during a drag
/// phase; else the first drag-enabled scene during a drag phase; else the
/// first pickable scene.
pub fn select_target(
    candidates: &[PickCandidate],
    event: MouseEventKind,
    channel: Option<DragChannel>,
) -> Option<(NodeUid, PickReason)> {
    let mut pickable = None;
    let mut notify_click = None;
    let mut notify_drag = None;
    let mut drag = None;

    for c in candidates.iter().filter(|c| c.options.pickable) {
        pickable.get_or_insert(c.uid);

        if event == MouseEventKind::Click && c.options.notify_click {
            notify_click.get_or_insert(c.uid);
        }

        let drag_enabled = c.drag(channel) || c.anim_drag(channel);
        if event.is_drag_phase() && ((c.options.notify_drag && c.drag(channel)) || c.anim_drag(channel)) {
            notify_drag.get_or_insert(c.uid);
        }
        if event.is_drag_phase() && drag_enabled {
            drag.get_or_insert(c.uid);
        }

        if c.is_tool && drag_enabled {
            return Some((c.uid, PickReason::Tool));
        }
    }

    notify_click
        .map(|u| (u, PickReason::NotifyClick))
        .or(notify_drag.map(|u| (u, PickReason::NotifyDrag)))
        .or(drag.map(|u| (u, PickReason::Drag)))
        .or(pickable.map(|u| (u, PickReason::Pickable)))
}

/// The scene that counts as "under the pointer" for hover highlighting:
/// the deepest pickable one.
pub fn hover_target(candidates: &[PickCandidate]) -> Option<&PickCandidate> {
    candidates.iter().find(|c| c.options.pickable)
}

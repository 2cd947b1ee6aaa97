//! Color-encoded picking.
//!
//! During a pick traversal every composite pushes its uid onto a bounded
//! name stack. Each atomic drawable stores a snapshot of that stack in a
//! bounded stack list and paints itself with a color encoding the
//! snapshot's index (high 12 bits) and a local part id (low 20 bits).
//! Reading back one pixel is enough to recover the full node path.
//!
//! Both bounds saturate silently: a deep graph loses the tail of its
//! path, a crowded frame loses pickability of late drawables, but the
//! traversal itself never fails.

use crate::color::Color;
use crate::id::NodeUid;
use serde::{Deserialize, Serialize};

/// Maximum number of names recorded on the pick name stack.
pub const MAX_PICK_NAME_STACK_LEN: usize = 32;

/// Maximum number of name stacks stored per pick pass.
pub const MAX_PICK_NAME_STACK_LIST_LEN: usize = 4096;

const BASE_MASK: u32 = 0x0000_0FFF;
const PART_MASK: u32 = 0x000F_FFFF;
const BASE_SHIFT: u32 = 20;

// ─── Codec ───────────────────────────────────────────────────────────────

/// A decoded pick color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickName {
    /// Index of the stored name stack.
    pub base: u32,
    /// Part id local to the drawable that produced the pixel.
    pub part: u32,
}

/// A 32-bit pick color as it lands in the framebuffer.
///
/// The base id is stored inverted so that an untouched (all-zero) pixel
/// decodes to the reserved base `0xFFF` and never collides with stack 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PickColor(pub u32);

impl PickColor {
    /// Color of an empty pixel.
    pub const NONE: PickColor = PickColor(0);

    /// Bases at or past the reserved `0xFFF` (overflowed stack list
    /// indexes) encode as the reserved base and decode as nothing picked.
    pub fn encode(base: u32, part: u32) -> Self {
        let value = (BASE_MASK - base.min(BASE_MASK)) << BASE_SHIFT;
        PickColor(value | (part & PART_MASK))
    }

    /// Split into `(base, part)` without validity check.
    pub fn split(self) -> (u32, u32) {
        let base = BASE_MASK - ((self.0 & !PART_MASK) >> BASE_SHIFT);
        (base, self.0 & PART_MASK)
    }

    /// Decode, returning `None` for the reserved base (nothing picked).
    pub fn decode(self) -> Option<PickName> {
        let (base, part) = self.split();
        (base != BASE_MASK).then_some(PickName { base, part })
    }

    /// Framebuffer bytes in memory order (least significant byte = red).
    pub fn to_rgba8(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    pub fn from_rgba8(bytes: [u8; 4]) -> Self {
        PickColor(u32::from_le_bytes(bytes))
    }

    /// The material color to draw with.
    pub fn to_color(self) -> Color {
        Color::from_rgba8(self.to_rgba8())
    }

    /// Read back a material color emitted by [`PickColor::to_color`].
    pub fn from_color(color: &Color) -> Self {
        Self::from_rgba8(color.to_rgba8())
    }
}

// ─── Name stack ──────────────────────────────────────────────────────────

/// Path of uids from the root down to the node being applied.
///
/// The counter keeps counting past capacity so that every pop matches a
/// push even when names were dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickNameStack {
    names: [u32; MAX_PICK_NAME_STACK_LEN],
    count: usize,
}

impl Default for PickNameStack {
    fn default() -> Self {
        Self {
            names: [0; MAX_PICK_NAME_STACK_LEN],
            count: 0,
        }
    }
}

impl PickNameStack {
    pub fn push(&mut self, uid: NodeUid) {
        if self.count < MAX_PICK_NAME_STACK_LEN {
            self.names[self.count] = uid.raw();
        }
        self.count += 1;
    }

    pub fn pop(&mut self) {
        self.count = self.count.saturating_sub(1);
    }

    /// Pushes minus pops, including names that did not fit.
    pub fn depth(&self) -> usize {
        self.count
    }

    pub fn is_saturated(&self) -> bool {
        self.count > MAX_PICK_NAME_STACK_LEN
    }

    /// The recorded part of the path, root first.
    pub fn names(&self) -> &[u32] {
        &self.names[..self.count.min(MAX_PICK_NAME_STACK_LEN)]
    }

    pub fn uids(&self) -> impl DoubleEndedIterator<Item = NodeUid> + '_ {
        self.names().iter().map(|&raw| NodeUid::from_raw(raw))
    }

    pub fn clear(&mut self) {
        self.count = 0;
    }
}

// ─── Stack list ──────────────────────────────────────────────────────────

/// Snapshots of the name stack, one per atomic drawable of a pick pass.
#[derive(Debug, Clone, Default)]
pub struct PickNameStackList {
    slots: Vec<PickNameStack>,
    next: usize,
}

impl PickNameStackList {
    /// Store a snapshot and return its index. When the list is full the
    /// index still advances (so overflow is observable) but nothing is written.
    pub fn store(&mut self, stack: &PickNameStack) -> u32 {
        if self.next < MAX_PICK_NAME_STACK_LIST_LEN {
            if self.next < self.slots.len() {
                self.slots[self.next].clone_from(stack);
            } else {
                self.slots.push(stack.clone());
            }
        }
        let idx = self.next;
        self.next += 1;
        idx as u32
    }

    /// The snapshot at `idx`, if it was written during this pass.
    pub fn get(&self, idx: u32) -> Option<&PickNameStack> {
        let idx = idx as usize;
        if idx >= MAX_PICK_NAME_STACK_LIST_LEN || idx >= self.next {
            return None;
        }
        self.slots.get(idx)
    }

    /// Number of store calls this pass, including overflowing ones.
    pub fn stored(&self) -> usize {
        self.next
    }

    pub fn is_overflowed(&self) -> bool {
        self.next > MAX_PICK_NAME_STACK_LIST_LEN
    }

    /// Forget all snapshots. Slot storage is kept for the next pass.
    pub fn reset(&mut self) {
        self.next = 0;
    }
}

// ─── Pick name state ─────────────────────────────────────────────────────

/// Name stack plus stack list, as carried by the apply context.
#[derive(Debug, Clone, Default)]
pub struct PickNames {
    pub stack: PickNameStack,
    pub list: PickNameStackList,
}

impl PickNames {
    /// Start a new pick pass.
    pub fn init(&mut self) {
        self.stack.clear();
        self.list.reset();
    }

    pub fn push(&mut self, uid: NodeUid) {
        self.stack.push(uid);
        if self.stack.depth() == MAX_PICK_NAME_STACK_LEN + 1 {
            log::warn!("pick name stack saturated at {MAX_PICK_NAME_STACK_LEN} names; deeper nodes are not pickable by path");
        }
    }

    pub fn pop(&mut self) {
        self.stack.pop();
    }

    /// Snapshot the current stack; returns the index to encode in the pick color.
    pub fn store(&mut self) -> u32 {
        let idx = self.list.store(&self.stack);
        if idx as usize == MAX_PICK_NAME_STACK_LIST_LEN {
            log::warn!("pick name stack list full ({MAX_PICK_NAME_STACK_LIST_LEN}); remaining drawables are not pickable");
        }
        idx
    }

    /// Replace the current stack with snapshot `idx`.
    /// Returns `false` and leaves the current stack untouched if `idx` is out of range.
    pub fn load(&mut self, idx: u32) -> bool {
        match self.list.get(idx) {
            Some(stored) => {
                self.stack = stored.clone();
                true
            }
            None => false,
        }
    }
}

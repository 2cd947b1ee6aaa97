//! Per-traversal state threaded through every `apply` call.
//!
//! One [`ApplyContext`] lives for the whole life of a view and is reused
//! from frame to frame. It carries the transform stack counters, the
//! pick name stacks, the animation clock, the current-pick record and the
//! draw sink the drawables emit into.

use crate::color::Color;
use crate::draw::{DrawCall, DrawSink, NullSink};
use crate::id::NodeUid;
use crate::pick::{PickColor, PickNames};
use std::cell::RefCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

/// What a traversal is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplyMode {
    /// Render for display.
    Draw,
    /// Render pick colors for hit-testing.
    Pick,
}

// ─── Frame stack ─────────────────────────────────────────────────────────

/// The three matrix stacks a node may push onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackKind {
    ModelView,
    Projection,
    Texture,
}

impl StackKind {
    pub const ALL: [StackKind; 3] = [StackKind::ModelView, StackKind::Projection, StackKind::Texture];

    fn slot(self) -> usize {
        match self {
            StackKind::ModelView => 0,
            StackKind::Projection => 1,
            StackKind::Texture => 2,
        }
    }
}

/// Depth counters of the matrix stacks plus the active clip planes.
///
/// Pops on an empty stack are ignored, so unbalanced scripts can never
/// drive a counter negative.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStack {
    depth: [u32; 3],
    clip_planes: Vec<[f64; 4]>,
}

/// Snapshot of the stacks, used to restore them after a node or a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMark {
    depth: [u32; 3],
    clip_planes: Vec<[f64; 4]>,
    pick_names: usize,
}

impl FrameStack {
    /// Push and return the new depth.
    pub fn push(&mut self, kind: StackKind) -> u32 {
        let d = &mut self.depth[kind.slot()];
        *d += 1;
        *d
    }

    /// Pop and return the new depth. Returns 0 if the stack was already empty.
    pub fn pop(&mut self, kind: StackKind) -> u32 {
        let d = &mut self.depth[kind.slot()];
        *d = d.saturating_sub(1);
        *d
    }

    pub fn depth(&self, kind: StackKind) -> u32 {
        self.depth[kind.slot()]
    }

    pub fn push_clip_plane(&mut self, plane: [f64; 4]) -> usize {
        self.clip_planes.push(plane);
        self.clip_planes.len()
    }

    pub fn pop_clip_plane(&mut self) -> Option<[f64; 4]> {
        self.clip_planes.pop()
    }

    pub fn clip_planes(&self) -> &[[f64; 4]] {
        &self.clip_planes
    }

    pub fn is_empty(&self) -> bool {
        self.depth == [0; 3] && self.clip_planes.is_empty()
    }

    /// Drain every stack.
    pub fn clean(&mut self) {
        self.depth = [0; 3];
        self.clip_planes.clear();
    }

    /// Restore the exact state recorded in `mark`, undoing extra pushes
    /// and extra pops alike.
    fn unwind_to(&mut self, mark: &FrameMark) {
        self.depth = mark.depth;
        self.clip_planes.clone_from(&mark.clip_planes);
    }
}

// ─── Passes and time ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StereoEye {
    #[default]
    Mono,
    Left,
    Right,
}

/// Where in the frame the current traversal sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderPass {
    pub first: bool,
    pub last: bool,
    /// This is the transparency pass.
    pub transparency: bool,
    /// Translucent geometry waits for the transparency pass. When unset,
    /// everything is drawn in whatever pass is running.
    pub defer_translucent: bool,
    pub eye: StereoEye,
}

impl RenderPass {
    /// Whether geometry of this opacity belongs in this pass.
    pub fn accepts(&self, opaque: bool) -> bool {
        !self.defer_translucent || opaque != self.transparency
    }
}

impl Default for RenderPass {
    fn default() -> Self {
        Self {
            first: true,
            last: true,
            transparency: false,
            defer_translucent: false,
            eye: StereoEye::Mono,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnimationClock {
    /// Animation is running for this frame.
    pub animate: bool,
    /// Set by nodes that want another frame.
    pub need_animate: bool,
    pub time: f64,
    pub time_step: f64,
    /// Time base of pick-highlight animations.
    pub pick_time: f64,
}

impl AnimationClock {
    /// Exchange `time` and `pick_time`, so a highlight sub-scene animates
    /// on its own clock and the frame clock comes back on the second swap.
    pub fn swap_pick_time(&mut self) {
        std::mem::swap(&mut self.time, &mut self.pick_time);
    }
}

// ─── Current pick ────────────────────────────────────────────────────────

/// The node path currently under the pointer, as last resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrentPick {
    uids: Vec<NodeUid>,
    /// Part id of the picked drawable, `None` when nothing is picked.
    pub part_id: Option<u32>,
    /// Depth of the picked fragment.
    pub min_depth: Option<f32>,
    draw_flags: Vec<bool>,
}

impl CurrentPick {
    /// Replace the picked path. Returns `true` if the path or part changed.
    ///
    /// The depth follows every hit, but a new target starts from its own
    /// depth rather than from the previous target's.
    pub fn set(&mut self, uids: Vec<NodeUid>, part_id: Option<u32>, min_depth: Option<f32>) -> bool {
        if self.uids == uids && self.part_id == part_id {
            self.min_depth = min_depth;
            return false;
        }
        self.draw_flags = vec![false; uids.len()];
        self.uids = uids;
        self.part_id = part_id;
        self.min_depth = min_depth;
        true
    }

    /// Forget the pick. Returns `true` if something was picked.
    pub fn clear(&mut self) -> bool {
        self.set(Vec::new(), None, None)
    }

    /// Same path and part as `other`, whatever the depths.
    pub fn same_target(&self, other: &CurrentPick) -> bool {
        self.uids == other.uids && self.part_id == other.part_id
    }

    pub fn uids(&self) -> &[NodeUid] {
        &self.uids
    }

    pub fn is_empty(&self) -> bool {
        self.uids.is_empty()
    }

    pub fn is_picked(&self, uid: NodeUid) -> bool {
        self.uids.contains(&uid)
    }

    /// Whether the highlight of `uid` was already drawn this frame.
    /// `None` if `uid` is not picked.
    pub fn pick_drawn(&self, uid: NodeUid) -> Option<bool> {
        let i = self.uids.iter().position(|&u| u == uid)?;
        Some(self.draw_flags[i])
    }

    /// First picked entry among `uids`, with its drawn flag.
    pub fn first_picked_of(&self, uids: &[NodeUid]) -> Option<(NodeUid, bool)> {
        self.uids
            .iter()
            .zip(&self.draw_flags)
            .find(|(u, _)| uids.contains(*u))
            .map(|(&u, &drawn)| (u, drawn))
    }

    pub fn flag_pick_draw(&mut self, uid: NodeUid) {
        for (u, flag) in self.uids.iter().zip(self.draw_flags.iter_mut()) {
            if *u == uid {
                *flag = true;
            }
        }
    }

    pub fn reset_pick_draw_flags(&mut self) {
        self.draw_flags.fill(false);
    }
}

// ─── Context ─────────────────────────────────────────────────────────────

pub struct ApplyContext {
    pub mode: ApplyMode,
    pub frame: FrameStack,
    pub pass: RenderPass,
    pub clock: AnimationClock,
    pub names: PickNames,
    pub current_pick: CurrentPick,
    pub current_color: Color,
    /// Shader currently bound by a state node. Not owned.
    pub current_shader: Option<NodeUid>,
    /// Render target currently bound by a state node. Not owned.
    pub current_render_target: Option<NodeUid>,
    sink: Rc<RefCell<dyn DrawSink>>,
}

impl Default for ApplyContext {
    fn default() -> Self {
        Self::new(Rc::new(RefCell::new(NullSink)))
    }
}

impl fmt::Debug for ApplyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplyContext")
            .field("mode", &self.mode)
            .field("frame", &self.frame)
            .field("pass", &self.pass)
            .field("pick_depth", &self.names.stack.depth())
            .finish_non_exhaustive()
    }
}

impl ApplyContext {
    pub fn new(sink: Rc<RefCell<dyn DrawSink>>) -> Self {
        Self {
            mode: ApplyMode::Draw,
            frame: FrameStack::default(),
            pass: RenderPass::default(),
            clock: AnimationClock::default(),
            names: PickNames::default(),
            current_pick: CurrentPick::default(),
            current_color: Color::WHITE,
            current_shader: None,
            current_render_target: None,
            sink,
        }
    }

    pub fn set_sink(&mut self, sink: Rc<RefCell<dyn DrawSink>>) {
        self.sink = sink;
    }

    pub fn sink(&self) -> Rc<RefCell<dyn DrawSink>> {
        Rc::clone(&self.sink)
    }

    pub fn is_pick(&self) -> bool {
        self.mode == ApplyMode::Pick
    }

    /// Emit one draw call into the current sink.
    pub fn draw(&mut self, call: &DrawCall) {
        self.sink.borrow_mut().draw(call);
    }

    /// Snapshot the current name stack and return the pick color for `part`.
    pub fn pick_color(&mut self, part: u32) -> PickColor {
        let base = self.names.store();
        PickColor::encode(base, part)
    }

    /// Record the current stack depths.
    pub fn mark(&self) -> FrameMark {
        FrameMark {
            depth: self.frame.depth,
            clip_planes: self.frame.clip_planes.clone(),
            pick_names: self.names.stack.depth(),
        }
    }

    /// Bring every stack back to `mark`.
    pub fn unwind_to(&mut self, mark: &FrameMark) {
        self.frame.unwind_to(mark);
        while self.names.stack.depth() > mark.pick_names {
            self.names.pop();
        }
    }

    /// Open a scope that restores the stacks to their current state when dropped,
    /// whether the scope body returned normally or bailed out with an error.
    pub fn frame_scope(&mut self) -> FrameScope<'_> {
        let mark = self.mark();
        FrameScope { ctx: self, mark }
    }

    /// Prepare the context for a new traversal in `mode`.
    pub fn begin(&mut self, mode: ApplyMode, pass: RenderPass) {
        self.mode = mode;
        self.pass = pass;
        self.frame.clean();
        self.names.init();
        self.clock.need_animate = false;
        self.current_color = Color::WHITE;
        self.current_shader = None;
        self.current_render_target = None;
    }

    /// Drain every stack after a traversal.
    pub fn clean(&mut self) {
        if !self.frame.is_empty() {
            log::trace!("draining unbalanced frame stack {:?}", self.frame);
        }
        self.frame.clean();
        self.names.stack.clear();
        self.current_shader = None;
        self.current_render_target = None;
    }
}

/// Restores the context's stacks to the state they had when the scope was opened.
pub struct FrameScope<'a> {
    ctx: &'a mut ApplyContext,
    mark: FrameMark,
}

impl Deref for FrameScope<'_> {
    type Target = ApplyContext;

    fn deref(&self) -> &ApplyContext {
        self.ctx
    }
}

impl DerefMut for FrameScope<'_> {
    fn deref_mut(&mut self) -> &mut ApplyContext {
        self.ctx
    }
}

impl Drop for FrameScope<'_> {
    fn drop(&mut self) {
        self.ctx.unwind_to(&self.mark);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_on_empty_stack_stays_at_zero() {
        let mut frame = FrameStack::default();
        assert_eq!(frame.pop(StackKind::Texture), 0);
        assert_eq!(frame.push(StackKind::Texture), 1);
        assert_eq!(frame.pop(StackKind::Texture), 0);
    }

    #[test]
    fn scope_unwinds_on_drop() {
        let mut ctx = ApplyContext::default();
        ctx.frame.push(StackKind::ModelView);
        {
            let mut scope = ctx.frame_scope();
            scope.frame.push(StackKind::ModelView);
            scope.frame.push(StackKind::Projection);
            scope.frame.push_clip_plane([0.0, 0.0, 1.0, 0.0]);
            scope.names.push(NodeUid::from_raw(7));
        }
        assert_eq!(ctx.frame.depth(StackKind::ModelView), 1);
        assert_eq!(ctx.frame.depth(StackKind::Projection), 0);
        assert!(ctx.frame.clip_planes().is_empty());
        assert_eq!(ctx.names.stack.depth(), 0);
    }

    #[test]
    fn scope_restores_over_popped_stacks() {
        let mut ctx = ApplyContext::default();
        ctx.frame.push(StackKind::ModelView);
        ctx.frame.push(StackKind::Texture);
        ctx.frame.push_clip_plane([1.0, 0.0, 0.0, 0.0]);
        {
            let mut scope = ctx.frame_scope();
            scope.frame.pop(StackKind::ModelView);
            scope.frame.pop(StackKind::Texture);
            scope.frame.pop(StackKind::Texture);
            scope.frame.pop_clip_plane();
            scope.frame.push_clip_plane([0.0, 1.0, 0.0, 0.0]);
        }
        assert_eq!(ctx.frame.depth(StackKind::ModelView), 1);
        assert_eq!(ctx.frame.depth(StackKind::Texture), 1);
        assert_eq!(ctx.frame.clip_planes(), &[[1.0, 0.0, 0.0, 0.0]]);
    }

    #[test]
    fn swap_pick_time_exchanges_clocks() {
        let mut clock = AnimationClock {
            time: 2.0,
            pick_time: 0.5,
            ..Default::default()
        };
        clock.swap_pick_time();
        assert_eq!((clock.time, clock.pick_time), (0.5, 2.0));
    }

    #[test]
    fn pick_draw_flags_follow_the_path() {
        let (a, b) = (NodeUid::from_raw(1), NodeUid::from_raw(2));
        let mut pick = CurrentPick::default();
        assert!(pick.set(vec![a, b], Some(0), Some(0.5)));
        assert!(!pick.set(vec![a, b], Some(0), Some(0.4)));
        assert_eq!(pick.min_depth, Some(0.4));

        assert_eq!(pick.pick_drawn(b), Some(false));
        pick.flag_pick_draw(b);
        assert_eq!(pick.pick_drawn(b), Some(true));
        assert_eq!(pick.first_picked_of(&[b]), Some((b, true)));
        pick.reset_pick_draw_flags();
        assert_eq!(pick.pick_drawn(b), Some(false));
        assert_eq!(pick.pick_drawn(NodeUid::from_raw(3)), None);

        assert!(pick.clear());
        assert!(!pick.is_picked(a));
        assert_eq!(pick.min_depth, None);
    }

    #[test]
    fn new_target_replaces_the_depth() {
        let (a, b) = (NodeUid::from_raw(1), NodeUid::from_raw(2));
        let mut pick = CurrentPick::default();
        pick.set(vec![a], Some(0), Some(0.2));
        let before = pick.clone();
        assert!(pick.set(vec![b], Some(0), Some(0.7)));
        assert_eq!(pick.min_depth, Some(0.7));
        assert!(!pick.same_target(&before));

        let moved = pick.clone();
        pick.set(vec![b], Some(0), Some(0.6));
        assert!(pick.same_target(&moved));
    }
}

//! Scenes: composites that take part in pick resolution.
//!
//! A scene is a [`NodeList`] plus interaction state: whether it can be
//! picked, which pointer notifications it wants, and four drag channels
//! that accumulate pointer motion while the scene is being dragged.

use crate::context::{ApplyContext, ApplyMode};
use crate::error::Result;
use crate::list::NodeList;
use crate::node::{NodeBase, SceneNode};
use crate::repository::{Handle, RepositoryRef};
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Which pointer interactions a scene takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PickOptions {
    pub pickable: bool,
    pub notify_click: bool,
    pub notify_over: bool,
    pub notify_drag: bool,
}

/// Pointer button combination selecting a drag channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DragChannel {
    Left,
    CtrlLeft,
    Right,
    CtrlRight,
}

impl DragChannel {
    pub const ALL: [DragChannel; 4] = [
        DragChannel::Left,
        DragChannel::CtrlLeft,
        DragChannel::Right,
        DragChannel::CtrlRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: usize) -> Option<Self> {
        Self::ALL.get(i).copied()
    }
}

/// Clamp box for accumulated drag data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DragRange {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl DragRange {
    pub fn clamp(&self, v: &mut [f32; 3]) {
        for i in 0..3 {
            if v[i] < self.min[i] {
                v[i] = self.min[i];
            } else if v[i] > self.max[i] {
                v[i] = self.max[i];
            }
        }
    }
}

/// One drag channel of a scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragState {
    pub enabled: bool,
    anim_enabled: bool,
    anim_active: bool,
    /// Accumulated drag value.
    pub data: [f32; 3],
    /// Last increment applied to `data`.
    pub step: [f32; 3],
    pub factor: [f32; 3],
    pub range: Option<DragRange>,
    anim_data: [f32; 3],
    /// Per-frame decay of the animated drag velocity.
    pub anim_attenuation: [f32; 3],
}

impl Default for DragState {
    fn default() -> Self {
        Self {
            enabled: false,
            anim_enabled: false,
            anim_active: false,
            data: [0.0; 3],
            step: [0.0; 3],
            factor: [1.0; 3],
            range: None,
            anim_data: [0.0; 3],
            anim_attenuation: [0.9; 3],
        }
    }
}

/// Below this magnitude an animated drag comes to rest.
const ANIM_DRAG_EPSILON: f32 = 1e-4;

impl DragState {
    fn set(&mut self, value: [f32; 3]) {
        self.data = value;
        self.step = [0.0; 3];
        if let Some(range) = &self.range {
            range.clamp(&mut self.data);
        }
    }

    fn add(&mut self, delta: [f32; 3]) {
        for i in 0..3 {
            self.step[i] = delta[i] * self.factor[i];
            self.data[i] += self.step[i];
        }
        if let Some(range) = &self.range {
            range.clamp(&mut self.data);
        }
    }

    fn add_anim(&mut self, delta: [f32; 3]) {
        for i in 0..3 {
            self.anim_data[i] = 0.2 * self.anim_data[i] + 0.8 * delta[i];
        }
        self.anim_active = true;
    }

    fn step_anim(&mut self) -> bool {
        if !self.anim_enabled || !self.anim_active {
            return false;
        }
        let v = self.anim_data;
        self.add(v);
        for i in 0..3 {
            self.anim_data[i] *= self.anim_attenuation[i];
        }
        if self.anim_data.iter().all(|c| c.abs() < ANIM_DRAG_EPSILON) {
            self.anim_data = [0.0; 3];
            self.anim_active = false;
        }
        true
    }
}

/// Passes in which a scene draws its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawFlags {
    pub opaque: bool,
    pub transparent: bool,
    pub pick: bool,
}

impl Default for DrawFlags {
    fn default() -> Self {
        Self {
            opaque: true,
            transparent: true,
            pick: true,
        }
    }
}

impl DrawFlags {
    pub fn allows(&self, mode: ApplyMode, transparency_pass: bool) -> bool {
        match mode {
            ApplyMode::Pick => self.pick,
            ApplyMode::Draw if transparency_pass => self.transparent,
            ApplyMode::Draw => self.opaque,
        }
    }
}

#[derive(Debug)]
pub struct Scene {
    list: NodeList,
    pub pick: PickOptions,
    pub draw: DrawFlags,
    drag: [DragState; 4],
    highlight: Handle,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::with_base(NodeBase::new("scene"))
    }

    pub fn named(name: &str) -> Self {
        Self::with_base(NodeBase::named("scene", name))
    }

    pub(crate) fn with_base(base: NodeBase) -> Self {
        Self {
            list: NodeList::with_base(base),
            pick: PickOptions::default(),
            draw: DrawFlags::default(),
            drag: [DragState::default(); 4],
            highlight: Handle::invalid(),
        }
    }

    pub fn pickable(mut self) -> Self {
        self.pick.pickable = true;
        self
    }

    pub fn list(&self) -> &NodeList {
        &self.list
    }

    pub fn list_mut(&mut self) -> &mut NodeList {
        &mut self.list
    }

    pub fn add(&mut self, child: &Handle) -> bool {
        self.list.add(child)
    }

    // ─── Highlight ───────────────────────────────────────────────────────

    /// Sub-scene drawn once per pass while this scene is under the pointer.
    pub fn set_highlight(&mut self, scene: &Handle) {
        self.highlight = scene.clone();
    }

    pub fn highlight(&self) -> &Handle {
        &self.highlight
    }

    // ─── Drag channels ───────────────────────────────────────────────────

    pub fn drag(&self, channel: DragChannel) -> &DragState {
        &self.drag[channel.index()]
    }

    pub fn drag_mut(&mut self, channel: DragChannel) -> &mut DragState {
        &mut self.drag[channel.index()]
    }

    pub fn enable_drag(&mut self, channel: DragChannel, val: bool) {
        self.drag_mut(channel).enabled = val;
    }

    pub fn is_drag_enabled(&self, channel: DragChannel) -> bool {
        self.drag(channel).enabled
    }

    pub fn is_any_drag_enabled(&self) -> bool {
        self.drag.iter().any(|d| d.enabled)
    }

    /// Toggling animated drag discards any motion still in flight.
    pub fn enable_anim_drag(&mut self, channel: DragChannel, val: bool) {
        let d = self.drag_mut(channel);
        if d.anim_enabled != val {
            d.anim_active = false;
            d.anim_data = [0.0; 3];
        }
        d.anim_enabled = val;
    }

    pub fn is_anim_drag_enabled(&self, channel: DragChannel) -> bool {
        self.drag(channel).anim_enabled
    }

    pub fn is_anim_drag_active(&self, channel: DragChannel) -> bool {
        self.drag(channel).anim_active
    }

    pub fn set_drag_data(&mut self, channel: DragChannel, value: [f32; 3]) {
        self.drag_mut(channel).set(value);
    }

    /// Add a pointer delta, scaled by the channel's factor and clamped to its range.
    pub fn add_to_drag_data(&mut self, channel: DragChannel, delta: [f32; 3]) {
        self.drag_mut(channel).add(delta);
    }

    /// Feed a pointer delta into the animated drag velocity.
    pub fn add_to_anim_drag_data(&mut self, channel: DragChannel, delta: [f32; 3]) {
        self.drag_mut(channel).add_anim(delta);
    }

    /// Advance animated drags by one frame. Returns whether any is still moving.
    pub fn step_anim_drag(&mut self) -> bool {
        self.drag
            .iter_mut()
            .fold(false, |animate, d| d.step_anim() | animate)
    }

    pub fn reset_drag_data(&mut self) {
        for d in &mut self.drag {
            d.data = [0.0; 3];
            d.step = [0.0; 3];
        }
    }

    // ─── Traversal ───────────────────────────────────────────────────────

    fn apply_highlight(&self, ctx: &mut ApplyContext) -> Result<bool> {
        let uid = self.list.uid();
        if !self.pick.pickable || !self.highlight.is_valid() || ctx.current_pick.pick_drawn(uid) != Some(false) {
            return Ok(false);
        }
        ctx.current_pick.flag_pick_draw(uid);
        ctx.clock.swap_pick_time();
        let result = self.highlight.apply(ApplyMode::Draw, ctx);
        ctx.clock.swap_pick_time();
        result.map_err(|e| e.context(format!("applying highlight of scene {uid}")))
    }
}

impl SceneNode for Scene {
    fn base(&self) -> &NodeBase {
        self.list.base()
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        self.list.base_mut()
    }

    fn apply(&mut self, mode: ApplyMode, ctx: &mut ApplyContext) -> Result<bool> {
        if !self.draw.allows(mode, ctx.pass.transparency) {
            return Ok(false);
        }
        let mut animate = false;
        if mode == ApplyMode::Draw && ctx.pass.first && !ctx.pass.transparency {
            animate |= self.step_anim_drag();
        }

        let mut scope = ctx.frame_scope();
        if mode == ApplyMode::Pick {
            scope.names.push(self.list.uid());
        }
        animate |= self.list.apply_children(mode, &mut scope)?;
        if mode == ApplyMode::Draw {
            animate |= self.apply_highlight(&mut scope)?;
        }
        if mode == ApplyMode::Pick {
            scope.names.pop();
        }
        Ok(animate)
    }

    fn duplicate(&self) -> Option<Box<dyn SceneNode>> {
        Some(Box::new(Scene {
            list: self.list.duplicate_with(self.list.base().duplicate()),
            pick: self.pick,
            draw: self.draw,
            drag: self.drag,
            highlight: self.highlight.clone(),
        }))
    }

    fn attached(&mut self, repo: &RepositoryRef) {
        self.list.attach(repo);
    }

    fn as_list(&self) -> Option<&NodeList> {
        Some(&self.list)
    }

    fn as_list_mut(&mut self) -> Option<&mut NodeList> {
        Some(&mut self.list)
    }

    fn as_scene(&self) -> Option<&Scene> {
        Some(self)
    }

    fn as_scene_mut(&mut self) -> Option<&mut Scene> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Repository;

    #[test]
    fn drag_data_is_scaled_and_clamped() {
        let mut scene = Scene::new();
        let ch = DragChannel::Right;
        scene.drag_mut(ch).factor = [2.0, 1.0, 1.0];
        scene.drag_mut(ch).range = Some(DragRange {
            min: [-1.0; 3],
            max: [3.0; 3],
        });

        scene.add_to_drag_data(ch, [1.0, 1.0, 0.0]);
        assert_eq!(scene.drag(ch).data, [2.0, 1.0, 0.0]);
        scene.add_to_drag_data(ch, [1.0, -5.0, 0.0]);
        assert_eq!(scene.drag(ch).data, [3.0, -1.0, 0.0]);
        assert_eq!(scene.drag(DragChannel::Left).data, [0.0; 3]);
    }

    #[test]
    fn animated_drag_decays_to_rest() {
        let mut scene = Scene::new();
        let ch = DragChannel::Left;
        scene.enable_anim_drag(ch, true);
        scene.drag_mut(ch).anim_attenuation = [0.5; 3];
        scene.add_to_anim_drag_data(ch, [1.0, 0.0, 0.0]);
        assert!(scene.is_anim_drag_active(ch));

        let mut frames = 0;
        while scene.step_anim_drag() {
            frames += 1;
            assert!(frames < 64, "animated drag never settled");
        }
        assert!(!scene.is_anim_drag_active(ch));
        assert!(scene.drag(ch).data[0] > 1.0);
    }

    #[test]
    fn draw_flags_gate_passes() {
        let flags = DrawFlags {
            transparent: false,
            ..Default::default()
        };
        assert!(flags.allows(ApplyMode::Draw, false));
        assert!(!flags.allows(ApplyMode::Draw, true));
        assert!(flags.allows(ApplyMode::Pick, false));
    }

    #[test]
    fn duplicate_keeps_interaction_state() {
        let repo = Repository::new();
        let mut scene = Scene::new().pickable();
        scene.enable_drag(DragChannel::CtrlLeft, true);
        let h = repo.insert(scene);
        let copy = repo.copy(&h);
        let enabled = copy
            .with_as::<Scene, _>(|s| s.pick.pickable && s.is_drag_enabled(DragChannel::CtrlLeft))
            .unwrap();
        assert!(enabled);
    }
}

//! Frame driver.
//!
//! A [`View`] owns the repository, the root of the graph, and the apply
//! context, and runs the traversals of a frame:
//!
//! - **display**: the opaque Draw pass, then (if enabled) the transparency
//!   pass, into the display sink.
//! - **pick**: a Pick pass into the software pick target, followed by
//!   sampling around the pointer and resolution of the hit. In stereo, one
//!   pass per eye, and the nearer hit wins.
//! - **mouse**: translation of a pointer event and selection of the scene
//!   that receives it.
//!
//! Every pass runs inside a frame scope and ends with the context drained,
//! so a failing node never leaves stack entries behind for the next pass.

use rsg_core::{
    ApplyContext, ApplyMode, DragChannel, DrawSink, Handle, NodeUid, RenderPass, Repository, SceneError, StereoEye,
    Tool,
};
use rsg_pick::{
    MouseEventKind, PickBuffer, PickEntry, PickReason, PickSession, PickUpdate, merge_entries, scene_candidates,
    select_target, update_current_pick,
};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

use crate::config::{ConfigError, ViewConfig};
use crate::input::{InputEvent, MouseEvent, MouseTranslator};
use crate::requests::{VisChannel, VisRequest};

#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("{pass}: {source}")]
    Pass {
        pass: &'static str,
        #[source]
        source: SceneError,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ViewError {
    /// The scene error behind a failed pass, with nested context stripped.
    pub fn scene_cause(&self) -> Option<&SceneError> {
        match self {
            Self::Pass { source, .. } => Some(source.root_cause()),
            Self::Config(_) => None,
        }
    }
}

/// A pointer event delivered to the scene chosen by pick resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PickEvent {
    pub kind: MouseEventKind,
    pub channel: Option<DragChannel>,
    pub target: NodeUid,
    pub reason: PickReason,
    pub part_id: u32,
    pub x: f32,
    pub y: f32,
}

// ─── View ─────────────────────────────────────────────────────────────────

pub struct View {
    config: ViewConfig,
    repo: Repository,
    root: Handle,
    ctx: ApplyContext,
    display_sink: Rc<RefCell<dyn DrawSink>>,
    pick_buffer: Rc<RefCell<PickBuffer>>,
    session: PickSession,
    input: MouseTranslator,
    last_entry: Option<PickEntry>,
}

impl View {
    pub fn new(config: ViewConfig, display_sink: Rc<RefCell<dyn DrawSink>>) -> Self {
        let pick_buffer = Rc::new(RefCell::new(PickBuffer::new(config.pick_width, config.pick_height)));
        let input = MouseTranslator::new(config.click_max_ms, config.click_max_step_sq);
        Self {
            ctx: ApplyContext::new(Rc::clone(&display_sink)),
            repo: Repository::new(),
            root: Handle::invalid(),
            display_sink,
            pick_buffer,
            session: PickSession::new(),
            input,
            last_entry: None,
            config,
        }
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn root(&self) -> &Handle {
        &self.root
    }

    pub fn set_root(&mut self, root: &Handle) {
        self.root.clone_from(root);
        self.ctx.current_pick.clear();
    }

    pub fn context(&self) -> &ApplyContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut ApplyContext {
        &mut self.ctx
    }

    pub fn pick_buffer(&self) -> Rc<RefCell<PickBuffer>> {
        Rc::clone(&self.pick_buffer)
    }

    /// The hit found by the most recent pick pass, processed or not.
    pub fn last_entry(&self) -> Option<&PickEntry> {
        self.last_entry.as_ref()
    }

    pub fn reshape(&mut self, width: usize, height: usize) {
        self.config.viewport_width = width;
        self.config.viewport_height = height;
    }

    /// Drop the whole graph and every handle to it.
    pub fn reset_scene(&mut self) {
        self.root.clear();
        self.repo.reset();
        self.ctx.current_pick.clear();
        self.session.cancel();
        self.last_entry = None;
    }

    // ─── Passes ──────────────────────────────────────────────────────────

    /// Draw one frame. Returns whether some node wants another frame.
    ///
    /// While animating, the frame clock and the pick clock each advance by
    /// one time step before the frame is drawn.
    pub fn display(&mut self) -> Result<bool, ViewError> {
        if !self.root.is_valid() {
            return Ok(false);
        }
        let clock = &mut self.ctx.clock;
        if clock.animate {
            clock.time += clock.time_step;
            clock.pick_time += clock.time_step;
        }
        self.ctx.set_sink(Rc::clone(&self.display_sink));
        self.display_sink.borrow_mut().begin_frame();

        let two_pass = self.config.draw_transparency;
        let opaque = RenderPass {
            first: true,
            last: !two_pass,
            transparency: false,
            defer_translucent: two_pass,
            eye: StereoEye::Mono,
        };
        let mut animate = self.run_pass(ApplyMode::Draw, opaque, "opaque pass")?;
        if two_pass {
            let transparent = RenderPass {
                first: false,
                last: true,
                transparency: true,
                ..opaque
            };
            animate |= self.run_pass(ApplyMode::Draw, transparent, "transparency pass")?;
        }
        self.ctx.clock.need_animate = animate;
        Ok(animate)
    }

    /// Run a pick pass and resolve the hit under the viewport position `(x, y)`.
    ///
    /// A new pick target restarts the pick clock.
    pub fn pick(&mut self, x: f32, y: f32) -> Result<PickUpdate, ViewError> {
        let (px, py) = self.to_pick_pixel(x, y);
        self.last_entry = if self.config.stereo {
            let offset = self.config.eye_offset;
            let left = self.pick_eye(StereoEye::Left, px.saturating_sub(offset), py)?;
            let right = self.pick_eye(StereoEye::Right, px + offset, py)?;
            merge_entries(left.into_iter().chain(right))
        } else {
            self.pick_eye(StereoEye::Mono, px, py)?
        };

        if !self.config.process_pick_hits {
            return Ok(PickUpdate::default());
        }
        let update = update_current_pick(
            &mut self.ctx.current_pick,
            &self.repo.downgrade(),
            self.last_entry.as_ref(),
        );
        if update.changed {
            self.ctx.clock.pick_time = 0.0;
        }
        Ok(update)
    }

    /// One pick pass for `eye`, sampled at pick pixel `(px, py)`.
    fn pick_eye(&mut self, eye: StereoEye, px: usize, py: usize) -> Result<Option<PickEntry>, ViewError> {
        if !self.session.request(px, py) {
            self.session.cancel();
            self.session.request(px, py);
        }

        self.session.begin_draw();
        self.ctx.set_sink(self.pick_buffer.clone());
        self.pick_buffer.borrow_mut().begin_frame();
        let pass = RenderPass {
            eye,
            ..RenderPass::default()
        };
        let result = self.run_pass(ApplyMode::Pick, pass, "pick pass");
        self.ctx.set_sink(Rc::clone(&self.display_sink));
        if let Err(e) = result {
            self.session.cancel();
            return Err(e);
        }

        let sample = self.pick_buffer.borrow().sample(px, py, self.config.pick_patch);
        self.session.sampled(sample);
        let entry = self.session.resolve(&mut self.ctx.names).cloned();
        log::trace!("{eye:?} eye pick at ({px}, {py}): {entry:?}");
        Ok(entry)
    }

    /// Translate a pointer event and deliver it to the scene under the pointer.
    ///
    /// Hover and button-down re-pick at the pointer; drags, drag ends and
    /// clicks go to whatever was picked on button-down. Drag motion is added
    /// to the target's drag channel. Tools hit by a button event get their
    /// callback invoked.
    pub fn mouse(&mut self, event: &InputEvent) -> Result<Option<PickEvent>, ViewError> {
        let Some(ev) = self.input.translate(event) else {
            return Ok(None);
        };

        match ev.kind {
            MouseEventKind::Over => {
                let update = self.pick(ev.x, ev.y)?;
                return Ok(update.over.map(|target| self.event(&ev, target, PickReason::Pickable)));
            }
            MouseEventKind::Select => {
                self.pick(ev.x, ev.y)?;
            }
            MouseEventKind::Drag | MouseEventKind::DragEnd | MouseEventKind::Click => {}
        }

        let candidates = scene_candidates(&self.repo.downgrade(), self.ctx.current_pick.uids());
        let Some((target, reason)) = select_target(&candidates, ev.kind, ev.channel) else {
            return Ok(None);
        };
        let handle = self.repo.lookup(target);

        if ev.kind == MouseEventKind::Drag
            && let Some(channel) = ev.channel
        {
            handle.with_mut(|node| {
                if let Some(scene) = node.as_scene_mut() {
                    let delta = [ev.dx, ev.dy, 0.0];
                    if scene.is_anim_drag_enabled(channel) {
                        scene.add_to_anim_drag_data(channel, delta);
                    } else if scene.is_drag_enabled(channel) {
                        scene.add_to_drag_data(channel, delta);
                    }
                }
            });
        }

        let event = self.event(&ev, target, reason);
        handle.with_as_mut::<Tool, _>(|tool| tool.notify(event.part_id));
        Ok(Some(event))
    }

    /// Handle every request queued on `channel`, then release waiting posters.
    pub fn process(&mut self, channel: &VisChannel) -> Result<Vec<PickEvent>, ViewError> {
        let _vis = channel.lock_vis();
        let result = self.process_requests(channel.drain());
        channel.complete();
        result
    }

    fn process_requests(&mut self, requests: Vec<VisRequest>) -> Result<Vec<PickEvent>, ViewError> {
        let mut events = Vec::new();
        let mut redraw = false;
        for request in requests {
            match request {
                VisRequest::Redisplay => redraw = true,
                VisRequest::Reshape { width, height } => {
                    self.reshape(width, height);
                    redraw = true;
                }
                VisRequest::Mouse(input) => {
                    let before = self.ctx.current_pick.clone();
                    events.extend(self.mouse(&input)?);
                    redraw |= !before.same_target(&self.ctx.current_pick);
                }
                VisRequest::Key { key, .. } => log::trace!("key {key:?} has no binding"),
                VisRequest::ScriptChanged => {
                    log::debug!("script changed; dropping scene");
                    self.reset_scene();
                    redraw = true;
                }
            }
        }
        if redraw {
            self.display()?;
        }
        Ok(events)
    }

    fn run_pass(&mut self, mode: ApplyMode, pass: RenderPass, name: &'static str) -> Result<bool, ViewError> {
        self.ctx.begin(mode, pass);
        self.ctx.current_pick.reset_pick_draw_flags();
        let result = {
            let mut scope = self.ctx.frame_scope();
            self.root.apply(mode, &mut scope)
        };
        self.ctx.clean();
        result.map_err(|source| {
            log::warn!("{name} failed: {source}");
            ViewError::Pass { pass: name, source }
        })
    }

    fn event(&self, ev: &MouseEvent, target: NodeUid, reason: PickReason) -> PickEvent {
        PickEvent {
            kind: ev.kind,
            channel: ev.channel,
            target,
            reason,
            part_id: self.ctx.current_pick.part_id.unwrap_or(rsg_pick::NO_PART),
            x: ev.x,
            y: ev.y,
        }
    }

    fn to_pick_pixel(&self, x: f32, y: f32) -> (usize, usize) {
        let scale = |v: f32, from: usize, to: usize| {
            if from == 0 {
                return 0;
            }
            (v.max(0.0) * to as f32 / from as f32) as usize
        };
        (
            scale(x, self.config.viewport_width, self.config.pick_width),
            scale(y, self.config.viewport_height, self.config.pick_height),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsg_core::{Color, Primitive, RecordingSink, Scene, VertexList};

    fn view() -> (View, Rc<RefCell<RecordingSink>>) {
        let sink = Rc::new(RefCell::new(RecordingSink::default()));
        let config = ViewConfig {
            pick_width: 16,
            pick_height: 16,
            viewport_width: 16,
            viewport_height: 16,
            ..Default::default()
        };
        (View::new(config, sink.clone()), sink)
    }

    fn square(z: f32, color: Color) -> VertexList {
        VertexList::new(
            Primitive::Quads,
            vec![[0.0, 0.0, z], [8.0, 0.0, z], [8.0, 8.0, z], [0.0, 8.0, z]],
        )
        .with_color(color)
    }

    #[test]
    fn translucent_geometry_waits_for_the_second_pass() {
        let (mut view, sink) = view();
        let root = view.repository().insert(Scene::new());
        let solid = view.repository().insert(square(0.5, Color::BLACK));
        let glass = view.repository().insert(square(0.4, Color::rgba(1.0, 1.0, 1.0, 0.5)));
        root.with_as_mut::<Scene, _>(|s| {
            s.add(&glass);
            s.add(&solid);
        });
        view.set_root(&root);

        view.display().unwrap();
        let depths: Vec<f32> = sink.borrow().calls.iter().map(|c| c.vertices[0][2]).collect();
        assert_eq!(depths, vec![0.5, 0.4]);
        assert_eq!(sink.borrow().frames, 1);
    }

    #[test]
    fn single_pass_draws_in_traversal_order() {
        let (mut view, sink) = view();
        view.config.draw_transparency = false;
        let root = view.repository().insert(Scene::new());
        let glass = view.repository().insert(square(0.4, Color::rgba(1.0, 0.0, 0.0, 0.5)));
        let solid = view.repository().insert(square(0.5, Color::WHITE));
        root.with_as_mut::<Scene, _>(|s| {
            s.add(&glass);
            s.add(&solid);
        });
        view.set_root(&root);

        view.display().unwrap();
        let depths: Vec<f32> = sink.borrow().calls.iter().map(|c| c.vertices[0][2]).collect();
        assert_eq!(depths, vec![0.4, 0.5]);
    }

    #[test]
    fn no_root_draws_nothing() {
        let (mut view, sink) = view();
        assert!(!view.display().unwrap());
        assert!(sink.borrow().calls.is_empty());
    }

    #[test]
    fn pick_pixels_scale_with_the_viewport() {
        let (mut view, _) = view();
        view.reshape(32, 64);
        assert_eq!(view.to_pick_pixel(16.0, 32.0), (8, 8));
        assert_eq!(view.to_pick_pixel(-3.0, 0.0), (0, 0));
    }
}

//! Tools: on-screen widgets (sliders, buttons, gizmos) built as scenes.

use crate::context::{ApplyContext, ApplyMode};
use crate::error::Result;
use crate::id::NodeUid;
use crate::list::NodeList;
use crate::node::{NodeBase, SceneNode};
use crate::repository::RepositoryRef;
use crate::scene::Scene;
use std::any::Any;
use std::fmt;

/// Invoked with the tool's uid and the picked part id when the tool is hit.
pub type ToolCallback = Box<dyn FnMut(NodeUid, u32)>;

/// A pickable scene that always wins pick resolution.
///
/// Tools carry a callback and so cannot be duplicated.
pub struct Tool {
    scene: Scene,
    pub position: [f32; 2],
    pub size: [f32; 2],
    pub text: String,
    callback: Option<ToolCallback>,
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("uid", &self.scene.uid())
            .field("position", &self.position)
            .field("size", &self.size)
            .field("text", &self.text)
            .finish_non_exhaustive()
    }
}

impl Tool {
    pub fn new(text: &str) -> Self {
        let mut scene = Scene::with_base(NodeBase::named("tool", text));
        scene.pick.pickable = true;
        Self {
            scene,
            position: [0.0; 2],
            size: [0.0; 2],
            text: text.to_owned(),
            callback: None,
        }
    }

    pub fn on_event(mut self, callback: impl FnMut(NodeUid, u32) + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Report a hit on `part`. Returns `false` if no callback is installed.
    pub fn notify(&mut self, part: u32) -> bool {
        let uid = self.scene.uid();
        match self.callback.as_mut() {
            Some(cb) => {
                cb(uid, part);
                true
            }
            None => false,
        }
    }
}

impl SceneNode for Tool {
    fn base(&self) -> &NodeBase {
        self.scene.base()
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        self.scene.base_mut()
    }

    fn apply(&mut self, mode: ApplyMode, ctx: &mut ApplyContext) -> Result<bool> {
        self.scene.apply(mode, ctx)
    }

    fn attached(&mut self, repo: &RepositoryRef) {
        self.scene.attached(repo);
    }

    fn as_list(&self) -> Option<&NodeList> {
        self.scene.as_list()
    }

    fn as_list_mut(&mut self) -> Option<&mut NodeList> {
        self.scene.as_list_mut()
    }

    fn as_scene(&self) -> Option<&Scene> {
        Some(&self.scene)
    }

    fn as_scene_mut(&mut self) -> Option<&mut Scene> {
        Some(&mut self.scene)
    }

    fn is_tool(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

//! Leaf state setters.
//!
//! Leaves change context state and draw nothing. They never ask for
//! animation frames.

use crate::color::Color;
use crate::context::{ApplyContext, ApplyMode, StackKind};
use crate::error::Result;
use crate::node::{NodeBase, SceneNode};

/// Which stacks a [`FrameStackNode`] acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTarget {
    All,
    Stack(StackKind),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOp {
    Push(FrameTarget),
    Pop(FrameTarget),
    PushClipPlane([f64; 4]),
    PopClipPlane,
}

/// Pushes or pops matrix stacks or clip planes.
///
/// Applied in both modes, since pick geometry has to land where the drawn
/// geometry does. The enclosing list unwinds whatever is left pushed.
#[derive(Debug, Clone)]
pub struct FrameStackNode {
    base: NodeBase,
    pub op: FrameOp,
}

impl FrameStackNode {
    pub fn new(op: FrameOp) -> Self {
        Self {
            base: NodeBase::new("frame_stack"),
            op,
        }
    }

    pub fn push_all() -> Self {
        Self::new(FrameOp::Push(FrameTarget::All))
    }

    pub fn pop_all() -> Self {
        Self::new(FrameOp::Pop(FrameTarget::All))
    }
}

fn kinds(target: FrameTarget) -> &'static [StackKind] {
    match target {
        FrameTarget::All => &StackKind::ALL,
        FrameTarget::Stack(StackKind::ModelView) => &[StackKind::ModelView],
        FrameTarget::Stack(StackKind::Projection) => &[StackKind::Projection],
        FrameTarget::Stack(StackKind::Texture) => &[StackKind::Texture],
    }
}

impl SceneNode for FrameStackNode {
    crate::node_boilerplate!();

    fn apply(&mut self, _mode: ApplyMode, ctx: &mut ApplyContext) -> Result<bool> {
        match self.op {
            FrameOp::Push(target) => {
                for &kind in kinds(target) {
                    ctx.frame.push(kind);
                }
            }
            FrameOp::Pop(target) => {
                for &kind in kinds(target) {
                    ctx.frame.pop(kind);
                }
            }
            FrameOp::PushClipPlane(plane) => {
                ctx.frame.push_clip_plane(plane);
            }
            FrameOp::PopClipPlane => {
                ctx.frame.pop_clip_plane();
            }
        }
        Ok(false)
    }

    fn duplicate(&self) -> Option<Box<dyn SceneNode>> {
        Some(Box::new(Self {
            base: self.base.duplicate(),
            op: self.op,
        }))
    }
}

/// Sets the current material color. Does nothing while picking: pick
/// colors are owned by the drawables.
#[derive(Debug, Clone)]
pub struct ColorNode {
    base: NodeBase,
    pub color: Color,
}

impl ColorNode {
    pub fn new(color: Color) -> Self {
        Self {
            base: NodeBase::new("color"),
            color,
        }
    }

    pub fn named(name: &str, color: Color) -> Self {
        Self {
            base: NodeBase::named("color", name),
            color,
        }
    }
}

impl SceneNode for ColorNode {
    crate::node_boilerplate!();

    fn apply(&mut self, mode: ApplyMode, ctx: &mut ApplyContext) -> Result<bool> {
        if mode == ApplyMode::Draw {
            ctx.current_color = self.color;
        }
        Ok(false)
    }

    fn duplicate(&self) -> Option<Box<dyn SceneNode>> {
        Some(Box::new(Self {
            base: self.base.duplicate(),
            color: self.color,
        }))
    }
}

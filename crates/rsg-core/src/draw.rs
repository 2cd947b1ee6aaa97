//! Draw calls emitted by drawable nodes.
//!
//! Nodes never talk to a graphics API directly. They hand flat
//! [`DrawCall`]s to whatever [`DrawSink`] the apply context carries:
//! a GPU backend, the off-screen pick target, or a recorder in tests.

use crate::color::Color;
use crate::pick::PickColor;

/// Primitive topology of a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleStrip,
    TriangleFan,
    Quads,
    Polygon,
}

/// One atomic draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub primitive: Primitive,
    /// Material color for the whole call.
    pub color: Color,
    /// Per-vertex pick colors. Set only during a pick pass, in which
    /// case they replace `color` entirely.
    pub pick_colors: Option<Vec<PickColor>>,
    pub lighting: bool,
    pub textured: bool,
    pub vertices: Vec<[f32; 3]>,
}

impl DrawCall {
    pub fn is_pick(&self) -> bool {
        self.pick_colors.is_some()
    }

    /// Color of vertex `i`, as it ends up in the target.
    pub fn vertex_color(&self, i: usize) -> Color {
        match &self.pick_colors {
            Some(colors) => colors
                .get(i)
                .map(|c| c.to_color())
                .unwrap_or_else(|| PickColor::NONE.to_color()),
            None => self.color,
        }
    }
}

/// Receiver of draw calls.
pub trait DrawSink {
    fn draw(&mut self, call: &DrawCall);

    /// Called once before a traversal writes into this sink.
    fn begin_frame(&mut self) {}
}

/// Discards everything. Default sink of a fresh context.
#[derive(Debug, Default)]
pub struct NullSink;

impl DrawSink for NullSink {
    fn draw(&mut self, _call: &DrawCall) {}
}

/// Keeps every call for later inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub calls: Vec<DrawCall>,
    pub frames: usize,
}

impl DrawSink for RecordingSink {
    fn draw(&mut self, call: &DrawCall) {
        self.calls.push(call.clone());
    }

    fn begin_frame(&mut self) {
        self.calls.clear();
        self.frames += 1;
    }
}

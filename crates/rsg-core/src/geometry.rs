//! Vertex list drawable.

use crate::color::Color;
use crate::context::{ApplyContext, ApplyMode};
use crate::draw::{DrawCall, Primitive};
use crate::error::{Result, SceneError};
use crate::node::{NodeBase, SceneNode};
use crate::pick::PickColor;

/// A single draw call's worth of geometry.
///
/// In a pick pass the list is one atomic pickable: it records its place in
/// the graph once and paints every vertex with a pick color made from that
/// record and the vertex's part id.
#[derive(Debug, Clone)]
pub struct VertexList {
    base: NodeBase,
    pub primitive: Primitive,
    vertices: Vec<[f32; 3]>,
    part_ids: Vec<u32>,
    /// Material color. `None` draws with the context's current color.
    pub color: Option<Color>,
    pub lighting: bool,
    pub textured: bool,
}

impl VertexList {
    pub fn new(primitive: Primitive, vertices: Vec<[f32; 3]>) -> Self {
        Self {
            base: NodeBase::new("vertex_list"),
            primitive,
            vertices,
            part_ids: Vec::new(),
            color: None,
            lighting: true,
            textured: false,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.set_name(name);
        self
    }

    /// Per-vertex part ids reported by picking. Vertices without one report 0.
    pub fn with_parts(mut self, part_ids: Vec<u32>) -> Self {
        self.part_ids = part_ids;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn vertices(&self) -> &[[f32; 3]] {
        &self.vertices
    }

    pub fn set_vertices(&mut self, vertices: Vec<[f32; 3]>) {
        self.vertices = vertices;
    }

    pub fn part_id(&self, vertex: usize) -> u32 {
        self.part_ids.get(vertex).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    fn copy_vertices(&self) -> Result<Vec<[f32; 3]>> {
        let mut out = Vec::new();
        out.try_reserve_exact(self.vertices.len())
            .map_err(|_| SceneError::Exhausted {
                what: "vertex buffer",
                requested: self.vertices.len(),
            })?;
        out.extend_from_slice(&self.vertices);
        Ok(out)
    }

    fn draw(&self, ctx: &mut ApplyContext) -> Result<()> {
        let color = self.color.unwrap_or(ctx.current_color);
        if !ctx.pass.accepts(color.is_opaque()) {
            return Ok(());
        }
        let call = DrawCall {
            primitive: self.primitive,
            color,
            pick_colors: None,
            lighting: self.lighting,
            textured: self.textured,
            vertices: self.copy_vertices()?,
        };
        ctx.draw(&call);
        Ok(())
    }

    fn pick(&self, ctx: &mut ApplyContext) -> Result<()> {
        ctx.names.push(self.base.uid);
        let base = ctx.names.store();
        ctx.names.pop();

        let n = self.vertices.len();
        let mut colors = Vec::new();
        colors
            .try_reserve_exact(n)
            .map_err(|_| SceneError::Exhausted {
                what: "pick colors",
                requested: n,
            })?;
        colors.extend((0..n).map(|i| PickColor::encode(base, self.part_id(i))));

        let call = DrawCall {
            primitive: self.primitive,
            color: Color::WHITE,
            pick_colors: Some(colors),
            lighting: false,
            textured: false,
            vertices: self.copy_vertices()?,
        };
        ctx.draw(&call);
        Ok(())
    }
}

impl SceneNode for VertexList {
    crate::node_boilerplate!();

    fn apply(&mut self, mode: ApplyMode, ctx: &mut ApplyContext) -> Result<bool> {
        if self.vertices.is_empty() {
            return Ok(false);
        }
        match mode {
            ApplyMode::Draw => self.draw(ctx),
            ApplyMode::Pick => self.pick(ctx),
        }
        .map_err(|e| e.context(format!("applying vertex list {}", self.base.uid)))?;
        Ok(false)
    }

    fn duplicate(&self) -> Option<Box<dyn SceneNode>> {
        Some(Box::new(Self {
            base: self.base.duplicate(),
            ..self.clone()
        }))
    }
}

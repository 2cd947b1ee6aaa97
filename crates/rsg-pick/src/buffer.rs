//! Off-screen pick target.
//!
//! A small software rasterizer standing in for the GPU back buffer of a
//! pick pass. Vertex x/y are window pixels (origin top-left), z is depth
//! in [0, 1). Every primitive is flat shaded with the color of its
//! provoking vertex, so a pixel carries exactly one pick color.

use rsg_core::draw::{DrawCall, DrawSink, Primitive};
use rsg_core::pick::PickColor;

/// Depth of a cleared pixel. Only fragments strictly nearer are kept.
pub const CLEAR_DEPTH: f32 = 1.0;

/// Half extent of the square read back around the pointer.
pub const SAMPLE_HALF_EXTENT: usize = 2;

/// The nearest fragment found around the pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickSample {
    pub color: PickColor,
    pub depth: f32,
}

#[derive(Debug, Clone)]
pub struct PickBuffer {
    width: usize,
    height: usize,
    colors: Vec<PickColor>,
    depth: Vec<f32>,
}

impl PickBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            colors: vec![PickColor::NONE; width * height],
            depth: vec![CLEAR_DEPTH; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.colors.resize(width * height, PickColor::NONE);
        self.depth.resize(width * height, CLEAR_DEPTH);
        self.clear();
    }

    pub fn clear(&mut self) {
        self.colors.fill(PickColor::NONE);
        self.depth.fill(CLEAR_DEPTH);
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<PickSample> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = y * self.width + x;
        Some(PickSample {
            color: self.colors[i],
            depth: self.depth[i],
        })
    }

    /// Nearest fragment in the `(2 * half + 1)²` patch centred on `(x, y)`.
    ///
    /// The patch is shifted to stay inside the buffer. If nothing was drawn
    /// there, the result is a cleared pixel, whose color decodes as "no pick".
    pub fn sample(&self, x: usize, y: usize, half: usize) -> Option<PickSample> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let span = 2 * half + 1;
        let x0 = x.saturating_sub(half).min(self.width.saturating_sub(span));
        let y0 = y.saturating_sub(half).min(self.height.saturating_sub(span));
        let x1 = (x0 + span).min(self.width);
        let y1 = (y0 + span).min(self.height);

        let mut best: Option<PickSample> = None;
        for py in y0..y1 {
            for px in x0..x1 {
                let Some(s) = self.pixel(px, py) else {
                    continue;
                };
                if best.is_none_or(|b| s.depth < b.depth) {
                    best = Some(s);
                }
            }
        }
        log::trace!("pick sample at ({x}, {y}): {best:?}");
        best
    }

    fn plot(&mut self, x: f32, y: f32, z: f32, color: PickColor) {
        if x < 0.0 || y < 0.0 {
            return;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height {
            return;
        }
        let i = y * self.width + x;
        if z < self.depth[i] {
            self.depth[i] = z;
            self.colors[i] = color;
        }
    }

    /// DDA line. Steps are capped at `width + height`, so a line running far
    /// outside the buffer is plotted sparsely instead of pixel by pixel.
    fn line(&mut self, a: [f32; 3], b: [f32; 3], color: PickColor) {
        if !a.iter().chain(&b).all(|v| v.is_finite()) {
            log::trace!("skipping line with non-finite endpoint {a:?} → {b:?}");
            return;
        }
        let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
        let max_steps = (self.width + self.height).max(1) as f32;
        let steps = dx.abs().max(dy.abs()).ceil().clamp(1.0, max_steps);
        let n = steps as usize;
        for i in 0..=n {
            let t = i as f32 / steps;
            self.plot(
                (a[0] + dx * t).round(),
                (a[1] + dy * t).round(),
                a[2] + (b[2] - a[2]) * t,
                color,
            );
        }
    }

    fn triangle(&mut self, a: [f32; 3], b: [f32; 3], c: [f32; 3], color: PickColor) {
        let area = edge(a, b, c);
        if area.abs() < f32::EPSILON {
            return;
        }
        let min_x = a[0].min(b[0]).min(c[0]).floor().max(0.0);
        let min_y = a[1].min(b[1]).min(c[1]).floor().max(0.0);
        let max_x = a[0].max(b[0]).max(c[0]).ceil().min(self.width as f32);
        let max_y = a[1].max(b[1]).max(c[1]).ceil().min(self.height as f32);

        let mut y = min_y;
        while y < max_y {
            let mut x = min_x;
            while x < max_x {
                let p = [x + 0.5, y + 0.5, 0.0];
                let w0 = edge(b, c, p) / area;
                let w1 = edge(c, a, p) / area;
                let w2 = edge(a, b, p) / area;
                if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                    self.plot(x, y, w0 * a[2] + w1 * b[2] + w2 * c[2], color);
                }
                x += 1.0;
            }
            y += 1.0;
        }
    }
}

/// Twice the signed area of (a, b, p).
fn edge(a: [f32; 3], b: [f32; 3], p: [f32; 3]) -> f32 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

impl DrawSink for PickBuffer {
    fn begin_frame(&mut self) {
        self.clear();
    }

    fn draw(&mut self, call: &DrawCall) {
        let v = &call.vertices;
        let color = |i: usize| match &call.pick_colors {
            Some(colors) => colors.get(i).copied().unwrap_or(PickColor::NONE),
            None => PickColor::from_color(&call.color),
        };
        let n = v.len();

        match call.primitive {
            Primitive::Points => {
                for (i, p) in v.iter().enumerate() {
                    self.plot(p[0].floor(), p[1].floor(), p[2], color(i));
                }
            }
            Primitive::Lines => {
                for i in (0..n.saturating_sub(1)).step_by(2) {
                    self.line(v[i], v[i + 1], color(i + 1));
                }
            }
            Primitive::LineStrip | Primitive::LineLoop => {
                for i in 1..n {
                    self.line(v[i - 1], v[i], color(i));
                }
                if call.primitive == Primitive::LineLoop && n > 2 {
                    self.line(v[n - 1], v[0], color(0));
                }
            }
            Primitive::Triangles => {
                for i in (0..n.saturating_sub(2)).step_by(3) {
                    self.triangle(v[i], v[i + 1], v[i + 2], color(i + 2));
                }
            }
            Primitive::TriangleStrip => {
                for i in 2..n {
                    self.triangle(v[i - 2], v[i - 1], v[i], color(i));
                }
            }
            Primitive::TriangleFan => {
                for i in 2..n {
                    self.triangle(v[0], v[i - 1], v[i], color(i));
                }
            }
            Primitive::Quads => {
                for i in (0..n.saturating_sub(3)).step_by(4) {
                    let c = color(i + 3);
                    self.triangle(v[i], v[i + 1], v[i + 2], c);
                    self.triangle(v[i], v[i + 2], v[i + 3], c);
                }
            }
            Primitive::Polygon => {
                let c = color(0);
                for i in 2..n {
                    self.triangle(v[0], v[i - 1], v[i], c);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsg_core::Color;

    fn pick_call(primitive: Primitive, vertices: Vec<[f32; 3]>, color: PickColor) -> DrawCall {
        let n = vertices.len();
        DrawCall {
            primitive,
            color: Color::WHITE,
            pick_colors: Some(vec![color; n]),
            lighting: false,
            textured: false,
            vertices,
        }
    }

    #[test]
    fn nearer_triangle_wins_regardless_of_order() {
        let mut buf = PickBuffer::new(16, 16);
        let near = PickColor::encode(1, 0);
        let far = PickColor::encode(2, 0);
        let quad = |z| vec![[0.0, 0.0, z], [16.0, 0.0, z], [16.0, 16.0, z], [0.0, 16.0, z]];

        buf.draw(&pick_call(Primitive::Quads, quad(0.2), near));
        buf.draw(&pick_call(Primitive::Quads, quad(0.6), far));

        let s = buf.sample(8, 8, SAMPLE_HALF_EXTENT).unwrap();
        assert_eq!(s.color, near);
        assert!((s.depth - 0.2).abs() < 1e-5, "depth {}", s.depth);
    }

    #[test]
    fn empty_patch_decodes_as_no_pick() {
        let buf = PickBuffer::new(8, 8);
        let s = buf.sample(3, 3, SAMPLE_HALF_EXTENT).unwrap();
        assert_eq!(s.depth, CLEAR_DEPTH);
        assert_eq!(s.color.decode(), None);
    }

    #[test]
    fn patch_finds_geometry_next_to_the_pointer() {
        let mut buf = PickBuffer::new(32, 32);
        let c = PickColor::encode(0, 9);
        buf.draw(&pick_call(Primitive::Points, vec![[11.0, 10.0, 0.5]], c));
        assert_eq!(buf.sample(10, 10, SAMPLE_HALF_EXTENT).unwrap().color, c);
        assert_eq!(buf.sample(20, 20, SAMPLE_HALF_EXTENT).unwrap().color, PickColor::NONE);
    }

    #[test]
    fn patch_is_clamped_at_the_border() {
        let mut buf = PickBuffer::new(8, 8);
        let c = PickColor::encode(3, 1);
        buf.draw(&pick_call(Primitive::Points, vec![[7.0, 7.0, 0.1]], c));
        assert_eq!(buf.sample(100, 100, SAMPLE_HALF_EXTENT).unwrap().color, c);
    }

    #[test]
    fn lines_cover_their_endpoints() {
        let mut buf = PickBuffer::new(16, 4);
        let c = PickColor::encode(4, 2);
        buf.draw(&pick_call(Primitive::Lines, vec![[1.0, 1.0, 0.3], [12.0, 1.0, 0.3]], c));
        assert_eq!(buf.pixel(1, 1).unwrap().color, c);
        assert_eq!(buf.pixel(12, 1).unwrap().color, c);
        assert_eq!(buf.pixel(6, 1).unwrap().color, c);
        assert_eq!(buf.pixel(6, 3).unwrap().color, PickColor::NONE);
    }

    #[test]
    fn far_and_non_finite_lines_stay_bounded() {
        let mut buf = PickBuffer::new(16, 4);
        let c = PickColor::encode(5, 0);
        buf.draw(&pick_call(Primitive::Lines, vec![[0.0, 1.0, 0.3], [1.0e30, 1.0, 0.3]], c));
        assert_eq!(buf.pixel(0, 1).unwrap().color, c);
        assert_eq!(buf.pixel(5, 1).unwrap().color, PickColor::NONE);

        buf.draw(&pick_call(Primitive::Lines, vec![[2.0, 2.0, 0.3], [f32::NAN, 2.0, 0.3]], c));
        buf.draw(&pick_call(Primitive::LineStrip, vec![[3.0, 3.0, 0.3], [f32::INFINITY, 3.0, 0.3]], c));
        assert_eq!(buf.pixel(2, 2).unwrap().color, PickColor::NONE);
        assert_eq!(buf.pixel(3, 3).unwrap().color, PickColor::NONE);
    }

    #[test]
    fn clear_resets_color_and_depth() {
        let mut buf = PickBuffer::new(4, 4);
        buf.draw(&pick_call(Primitive::Points, vec![[1.0, 1.0, 0.1]], PickColor::encode(0, 0)));
        buf.begin_frame();
        assert_eq!(
            buf.pixel(1, 1),
            Some(PickSample {
                color: PickColor::NONE,
                depth: CLEAR_DEPTH
            })
        );
    }
}

use serde::{Deserialize, Serialize};

/// RGBA color. Stored as 4 × f32 [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Build from 8-bit channels.
    pub fn from_rgba8(bytes: [u8; 4]) -> Self {
        Self::rgba(
            f32::from(bytes[0]) / 255.0,
            f32::from(bytes[1]) / 255.0,
            f32::from(bytes[2]) / 255.0,
            f32::from(bytes[3]) / 255.0,
        )
    }

    /// Quantize to 8-bit channels, the way a framebuffer stores them.
    pub fn to_rgba8(&self) -> [u8; 4] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    /// Opaque colors are drawn in the first pass, translucent ones in the
    /// transparency pass.
    pub fn is_opaque(&self) -> bool {
        self.a >= 1.0
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba8_roundtrip_is_exact() {
        let bytes = [0x12, 0xAB, 0x00, 0xFF];
        assert_eq!(Color::from_rgba8(bytes).to_rgba8(), bytes);
    }

    #[test]
    fn translucent_is_not_opaque() {
        assert!(Color::WHITE.is_opaque());
        assert!(!Color::rgba(1.0, 0.0, 0.0, 0.5).is_opaque());
    }
}

use core::fmt;

/// Straight-alpha RGBA color with `f32` channels in `[0, 1]`.
///
/// Produced by `color(r, g, b, a)` literals and consumed by widget
/// `modulate` properties and `Color` theme overrides.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);

    #[inline]
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub const fn transparent() -> Self {
        Self::rgba(0.0, 0.0, 0.0, 0.0)
    }

    /// Builds a color from channel values, clamping each into `[0, 1]`.
    #[inline]
    pub fn clamped(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::rgba(r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0), a.clamp(0.0, 1.0))
    }

    /// Creates a color from straight sRGB bytes.
    #[inline]
    pub fn from_u8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::rgba(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, a as f32 / 255.0)
    }

    /// Quantises back to bytes, rounding to nearest.
    pub fn to_u8(self) -> [u8; 4] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.to_u8();
        write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamped_limits_channels() {
        let c = Color::clamped(2.0, -1.0, 0.5, 1.5);
        assert_eq!(c, Color::rgba(1.0, 0.0, 0.5, 1.0));
    }

    #[test]
    fn display_as_hex() {
        assert_eq!(Color::from_u8(255, 0, 128, 255).to_string(), "#ff0080ff");
    }
}

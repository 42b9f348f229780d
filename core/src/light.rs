//! Punctual lights consumed by compute and lighting passes.

use crate::math::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    Directional,
    Point,
}

/// A light source. Directional lights ignore `position`, point lights ignore `direction`.
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub position: Vec3,
    pub direction: Vec3,
    pub color: [f32; 3],
    pub intensity: f32,
}

impl Light {
    pub fn directional(direction: Vec3) -> Self {
        Self {
            kind: LightKind::Directional,
            position: Vec3::zeros(),
            direction: direction.normalize(),
            color: [1.0, 1.0, 1.0],
            intensity: 1.0,
        }
    }

    pub fn point(position: Vec3) -> Self {
        Self {
            kind: LightKind::Point,
            position,
            direction: Vec3::new(0.0, -1.0, 0.0),
            color: [1.0, 1.0, 1.0],
            intensity: 1.0,
        }
    }

    pub fn with_color(mut self, color: [f32; 3]) -> Self {
        self.color = color;
        self
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }

    /// Colour premultiplied by intensity.
    pub fn radiance(&self) -> [f32; 3] {
        self.color.map(|c| c * self.intensity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radiance_scales_color() {
        let light = Light::point(Vec3::zeros()).with_color([1.0, 0.5, 0.0]).with_intensity(2.0);
        assert_eq!(light.radiance(), [2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_directional_light_is_normalized() {
        let light = Light::directional(Vec3::new(0.0, -3.0, 0.0));
        assert!((light.direction.norm() - 1.0).abs() < 1e-6);
    }
}

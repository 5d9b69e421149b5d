//! Camera state read from the host each frame

use crate::core::types::Vec3;

/// Camera in host-local coordinates (x east, y up, -z north).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// World position in meters
    pub position: Vec3,
    /// Heading in degrees, clockwise from north
    pub heading: f32,
    /// Pitch in degrees, positive nose up
    pub pitch: f32,
    /// Roll in degrees, positive right wing down
    pub roll: f32,
    /// Horizontal field of view in degrees
    pub fov_deg: f32,
    /// Aspect ratio (width / height)
    pub aspect: f32,
    /// Zoom factor; 1.0 is unzoomed
    pub zoom: f32,
}

impl Camera {
    /// Create a new camera looking north
    pub fn new(position: Vec3, fov_deg: f32, aspect: f32) -> Self {
        Self {
            position,
            heading: 0.0,
            pitch: 0.0,
            roll: 0.0,
            fov_deg,
            aspect,
            zoom: 1.0,
        }
    }

    /// Set heading and pitch in degrees
    pub fn with_orientation(mut self, heading: f32, pitch: f32) -> Self {
        self.heading = heading;
        self.pitch = pitch;
        self
    }

    /// Get forward direction
    pub fn forward(&self) -> Vec3 {
        let h = self.heading.to_radians();
        let p = self.pitch.to_radians();
        Vec3::new(h.sin() * p.cos(), p.sin(), -h.cos() * p.cos())
    }

    /// Distance from the camera to a point
    pub fn distance_to(&self, point: Vec3) -> f32 {
        self.position.distance(point)
    }

    /// Half of the diagonal field of view in radians.
    ///
    /// Roll is not modeled, so the cone must cover the screen corners.
    pub fn half_diagonal_fov(&self) -> f32 {
        let half_h = (self.fov_deg.to_radians() * 0.5) / self.zoom.max(f32::EPSILON);
        let aspect = if self.aspect > 0.0 { self.aspect } else { 1.0 };
        let correction = (1.0 + 1.0 / (aspect * aspect)).sqrt();
        (half_h.tan() * correction).atan()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::ZERO, 60.0, 16.0 / 9.0)
    }
}

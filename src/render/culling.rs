//! View-cone culling and per-aircraft distance classification

use glam::Vec3;

use crate::core::Camera;

/// Cone around the camera's forward axis covering the screen diagonal
#[derive(Clone, Copy, Debug)]
pub struct ViewCone {
    pub apex: Vec3,
    pub axis: Vec3,
    /// Half angle in radians
    pub half_angle: f32,
}

impl ViewCone {
    pub fn from_camera(camera: &Camera) -> Self {
        Self {
            apex: camera.position,
            axis: camera.forward().normalize_or_zero(),
            half_angle: camera.half_diagonal_fov(),
        }
    }

    /// Whether a sphere is at least partly inside the cone.
    ///
    /// The sphere widens the cone by its angular radius; a camera inside the
    /// sphere always sees it.
    pub fn contains(&self, center: Vec3, radius: f32) -> bool {
        let offset = center - self.apex;
        let distance = offset.length();
        if distance <= radius || distance <= f32::EPSILON {
            return true;
        }
        let cos = (self.axis.dot(offset) / distance).clamp(-1.0, 1.0);
        let angle = cos.acos();
        angle <= self.half_angle + (radius / distance).atan()
    }
}

/// Thresholds for [`classify`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CullParams {
    /// Beyond this aircraft are dropped from the frame (meters)
    pub max_slot_distance: f32,
    /// Host visibility (meters); beyond it aircraft are culled
    pub visibility: f32,
    /// Bounding sphere radius (meters)
    pub cull_radius: f32,
    /// Altitude separation for shared-slot eligibility (feet)
    pub max_altitude_diff_ft: f64,
}

/// Outcome for an aircraft that stays in the frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Classification {
    pub distance: f32,
    /// Outside the view or beyond visibility: no drawing, no label
    pub cull: bool,
    /// May take a shared multiplayer slot
    pub slot_eligible: bool,
}

/// Classify one aircraft, or `None` if it is too far to matter at all.
///
/// # Arguments
/// * `cone` - Camera view cone
/// * `position` - Aircraft position in local meters
/// * `altitude_diff_ft` - Absolute altitude difference to the user's aircraft
pub fn classify(
    cone: &ViewCone,
    position: Vec3,
    altitude_diff_ft: f64,
    params: &CullParams,
) -> Option<Classification> {
    let distance = cone.apex.distance(position);
    if distance > params.max_slot_distance {
        return None;
    }
    let cull = distance > params.visibility || !cone.contains(position, params.cull_radius);
    let slot_eligible = altitude_diff_ft.abs() <= params.max_altitude_diff_ft;
    Some(Classification {
        distance,
        cull,
        slot_eligible,
    })
}

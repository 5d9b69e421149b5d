//! Draw and host interfaces implemented by the embedding application

use glam::{DVec3, Vec3};

use crate::asset::store::AssetHandle;
use crate::core::Camera;
use crate::csl::package::AttachmentRole;
use crate::render::lights::LightStatus;
use crate::render::registry::PlaneSurfaces;

/// Model placement in local coordinates, angles in degrees
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub pitch: f32,
    pub roll: f32,
    pub heading: f32,
}

/// Receives the batched draw calls of a frame.
///
/// Calls within a batch share a model, texture or part, so implementations
/// can bind state once per batch.
pub trait DrawBackend {
    /// Placement for the next model submitted
    fn submit_transform(&mut self, transform: &Transform);

    /// Host-native model from a numbered aircraft slot
    fn submit_legacy_model(&mut self, index: u32, distance: f32, full: bool, surfaces: &PlaneSurfaces);

    fn submit_geometry_model(
        &mut self,
        geometry: AssetHandle,
        texture: Option<AssetHandle>,
        lit_texture: Option<AssetHandle>,
        distance: f32,
    );

    /// Light points of a geometry model, drawn after all bodies
    fn submit_lights_overlay(&mut self, geometry: AssetHandle, distance: f32, lights: LightStatus);

    fn submit_multipart_instance(
        &mut self,
        part: AssetHandle,
        role: AttachmentRole,
        transform: &Transform,
        lights: LightStatus,
    );

    /// Text next to an aircraft; RGBA color
    fn draw_label(&mut self, _position: Vec3, _text: &str, _color: [f32; 4]) {}
}

/// Per-frame view of the host simulator
pub trait HostView {
    fn camera(&self) -> Camera;
    /// Meteorological visibility in meters
    fn visibility_m(&self) -> f32;
    /// Altitude of the user's aircraft in feet
    fn own_altitude_ft(&self) -> f64;
    /// Monotonic simulator cycle counter
    fn cycle(&self) -> u64;
    /// Geodetic position to local meters
    fn world_to_local(&self, latitude: f64, longitude: f64, elevation_m: f64) -> DVec3;
    /// Aircraft files the host has loaded into its slots, the user's included
    fn host_model_count(&self) -> usize;
}

//! Per-frame render records and the batch lists built from them

use std::collections::BTreeMap;

use glam::Vec3;

use crate::asset::store::AssetHandle;
use crate::csl::package::ModelRef;
use crate::render::backend::Transform;
use crate::render::registry::{PlaneId, PlaneSurfaces};

/// Index of a record in the frame arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub u32);

/// One aircraft for one frame
#[derive(Clone, Debug, PartialEq)]
pub struct RenderRecord {
    pub plane: PlaneId,
    pub transform: Transform,
    pub model: Option<ModelRef>,
    pub distance: f32,
    pub cull: bool,
    pub slot_eligible: bool,
    pub full: bool,
    pub surfaces: PlaneSurfaces,
    pub label: String,
}

impl RenderRecord {
    pub fn position(&self) -> Vec3 {
        self.transform.position
    }
}

/// Records of the current frame, cleared wholesale
#[derive(Debug, Default)]
pub struct FrameArena {
    records: Vec<RenderRecord>,
}

impl FrameArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: RenderRecord) -> RecordId {
        let id = RecordId(self.records.len() as u32);
        self.records.push(record);
        id
    }

    pub fn get(&self, id: RecordId) -> &RenderRecord {
        &self.records[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: RecordId) -> &mut RenderRecord {
        &mut self.records[id.0 as usize]
    }

    pub fn ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        (0..self.records.len() as u32).map(RecordId)
    }

    pub fn records(&self) -> &[RenderRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// Geometry batch key: texture first so texture binds are shared
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryKey {
    pub texture: Option<AssetHandle>,
    pub lit_texture: Option<AssetHandle>,
    pub geometry: AssetHandle,
}

/// Draw lists for one frame, in submission order
#[derive(Debug, Default)]
pub struct Worklists {
    /// Host-native models by slot index; the placeholder shares slot 1
    pub legacy: BTreeMap<u32, Vec<RecordId>>,
    pub geometry: BTreeMap<GeometryKey, Vec<RecordId>>,
    /// Geometry records for the light overlay sub-pass
    pub lights: Vec<(AssetHandle, RecordId)>,
    /// Keyed by model and attachment index
    pub multipart: BTreeMap<(ModelRef, usize), Vec<RecordId>>,
}

impl Worklists {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_legacy(&mut self, index: u32, record: RecordId) {
        self.legacy.entry(index).or_default().push(record);
    }

    pub fn add_geometry(&mut self, key: GeometryKey, record: RecordId) {
        self.geometry.entry(key).or_default().push(record);
        self.lights.push((key.geometry, record));
    }

    pub fn add_part(&mut self, model: ModelRef, attachment: usize, record: RecordId) {
        self.multipart
            .entry((model, attachment))
            .or_default()
            .push(record);
    }

    pub fn len(&self) -> usize {
        self.legacy.values().map(Vec::len).sum::<usize>()
            + self.geometry.values().map(Vec::len).sum::<usize>()
            + self.multipart.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.legacy.clear();
        self.geometry.clear();
        self.lights.clear();
        self.multipart.clear();
    }
}

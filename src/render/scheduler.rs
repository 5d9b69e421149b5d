//! Per-frame aircraft scheduling: gather, cull, prioritize, share slots, draw
//!
//! A frame never blocks. Assets that are not loaded yet are requested and the
//! aircraft is skipped until a later frame finds them ready.

use crate::asset::loader::{is_settled, AssetLoader};
use crate::asset::store::SlotState;
use crate::core::MultiplayerConfig;
use crate::csl::index::PackageIndex;
use crate::csl::package::{AttachmentRole, Model, ModelKind};
use crate::render::backend::{DrawBackend, HostView, Transform};
use crate::render::culling::{classify, CullParams, ViewCone};
use crate::render::registry::{AircraftRegistry, PlaneSurfaces, TransponderMode};
use crate::render::slots::{SharedSlotAllocator, SlotCandidate, SlotChannel};
use crate::render::worklist::{FrameArena, GeometryKey, RecordId, RenderRecord, Worklists};

const FEET_TO_METERS: f64 = 0.3048;

/// Geometry models beyond full detail are submitted at least this far away
/// so the backend picks a distant LOD.
const REDUCED_DETAIL_DISTANCE_M: f32 = 10_000.0;

/// Host slot used for aircraft without a drawable model
const PLACEHOLDER_INDEX: u32 = 1;

/// Scheduler settings
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SchedulerConfig {
    /// Full-detail range at zoom 1.0 (meters)
    pub full_distance_m: f32,
    pub max_full_count: usize,
    pub max_slot_distance_m: f32,
    pub max_slot_altitude_diff_ft: f64,
    pub cull_radius_m: f32,
    pub max_label_distance_m: f32,
    pub draw_labels: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&MultiplayerConfig::default())
    }
}

impl From<&MultiplayerConfig> for SchedulerConfig {
    fn from(config: &MultiplayerConfig) -> Self {
        Self {
            full_distance_m: config.full_distance_m(1.0),
            max_full_count: config.max_full_count,
            max_slot_distance_m: config.max_slot_distance_m,
            max_slot_altitude_diff_ft: config.max_slot_altitude_diff_ft,
            cull_radius_m: config.cull_radius_m,
            max_label_distance_m: config.max_label_distance_m,
            draw_labels: config.draw_labels,
        }
    }
}

/// Counters for one frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Aircraft within slot-sharing range
    pub total: usize,
    pub culled: usize,
    pub full_detail: usize,
    pub full_legacy: usize,
    pub lights_legacy: usize,
    pub geometry: usize,
    pub multipart: usize,
    pub placeholders: usize,
    /// Aircraft skipped because their assets are still loading
    pub unready: usize,
    /// Aircraft moved off a model whose geometry failed
    pub rematched: usize,
    pub slots_used: usize,
    pub labels: usize,
}

/// Frame scheduler; keeps only the lagged slot count and the dump flag
/// between frames.
pub struct RenderScheduler {
    config: SchedulerConfig,
    slots: SharedSlotAllocator,
    dump_requested: bool,
    arena: FrameArena,
    worklists: Worklists,
}

impl RenderScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            slots: SharedSlotAllocator::new(),
            dump_requested: false,
            arena: FrameArena::new(),
            worklists: Worklists::new(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Log every record of the next frame once
    pub fn request_dump(&mut self) {
        self.dump_requested = true;
    }

    /// Host callback right before its 3D world pass
    pub fn before_world_draw(&self, channel: &mut dyn SlotChannel) {
        self.slots.before_world_draw(channel);
    }

    /// Host callback right before its 2D overlay pass
    pub fn before_overlay_draw(&self, channel: &mut dyn SlotChannel) {
        self.slots.before_overlay_draw(channel);
    }

    /// Records of the last frame
    pub fn records(&self) -> &[RenderRecord] {
        self.arena.records()
    }

    /// Run one frame.
    ///
    /// # Arguments
    /// * `host` - Camera, visibility and coordinate conversion for this frame
    /// * `registry` - Remote aircraft and their data providers
    /// * `index` - Loaded packages the aircraft models refer to
    /// * `loader` - Receives requests for assets found missing
    /// * `backend` - Receives the batched draw calls
    /// * `channel` - Host multiplayer slots
    pub fn render_frame(
        &mut self,
        host: &dyn HostView,
        registry: &mut AircraftRegistry,
        index: &PackageIndex,
        loader: &mut AssetLoader,
        backend: &mut dyn DrawBackend,
        channel: &mut dyn SlotChannel,
    ) -> FrameStats {
        self.arena.clear();
        self.worklists.clear();

        let completed = loader.poll();
        if !completed.is_empty() {
            log::trace!("{} asset loads completed", completed.len());
        }

        let mut stats = FrameStats {
            rematched: registry.rematch_failed(index, loader),
            ..Default::default()
        };
        let camera = host.camera();

        self.gather(host, registry, index, &mut stats);
        self.prioritize(camera.zoom, &mut stats);

        let candidates: Vec<SlotCandidate> = self
            .arena
            .records()
            .iter()
            .map(|r| SlotCandidate {
                position: r.position(),
                distance: r.distance,
                slot_eligible: r.slot_eligible,
            })
            .collect();
        stats.slots_used = self.slots.assign(channel, &candidates);

        self.build_worklists(host.host_model_count(), index, loader, &mut stats);
        self.submit(index, backend);

        if self.config.draw_labels {
            let label_distance = host.visibility_m().min(self.config.max_label_distance_m) * camera.zoom;
            stats.labels = self.draw_labels(label_distance, backend);
        }

        if self.dump_requested {
            self.dump(index, &stats);
            self.dump_requested = false;
        }

        log::trace!("Frame: {:?}", stats);
        stats
    }

    fn gather(
        &mut self,
        host: &dyn HostView,
        registry: &mut AircraftRegistry,
        index: &PackageIndex,
        stats: &mut FrameStats,
    ) {
        let cone = ViewCone::from_camera(&host.camera());
        let cycle = host.cycle();
        let own_altitude = host.own_altitude_ft();
        let params = CullParams {
            max_slot_distance: self.config.max_slot_distance_m,
            visibility: host.visibility_m(),
            cull_radius: self.config.cull_radius_m,
            max_altitude_diff_ft: self.config.max_slot_altitude_diff_ft,
        };

        for id in registry.ids() {
            let Some(position) = registry.position(id, cycle) else {
                continue;
            };
            let local = host
                .world_to_local(
                    position.latitude,
                    position.longitude,
                    position.elevation_ft * FEET_TO_METERS,
                )
                .as_vec3();

            let Some(class) = classify(&cone, local, position.elevation_ft - own_altitude, &params) else {
                continue;
            };

            let standby = registry
                .radar(id, cycle)
                .is_some_and(|radar| radar.mode == TransponderMode::Standby);

            let model = registry.get(id).and_then(|plane| plane.model);
            let mut surfaces = registry
                .surfaces(id, cycle)
                .unwrap_or_else(|| PlaneSurfaces::estimated(&position));
            if model
                .and_then(|m| index.model(m))
                .is_some_and(|m| !m.has_gear)
            {
                surfaces.gear = 1.0;
            }

            stats.total += 1;
            if class.cull {
                stats.culled += 1;
            }

            self.arena.push(RenderRecord {
                plane: id,
                transform: Transform {
                    position: local,
                    pitch: position.pitch,
                    roll: position.roll,
                    heading: position.heading,
                },
                model,
                distance: class.distance,
                cull: class.cull,
                slot_eligible: class.slot_eligible && !standby,
                full: false,
                surfaces,
                label: position.label,
            });
        }
    }

    /// Nearest visible aircraft within range get full detail, up to the budget.
    fn prioritize(&mut self, zoom: f32, stats: &mut FrameStats) {
        let full_distance = self.config.full_distance_m * zoom;
        let mut visible: Vec<RecordId> = self
            .arena
            .ids()
            .filter(|&id| !self.arena.get(id).cull)
            .collect();
        visible.sort_by(|&a, &b| {
            self.arena
                .get(a)
                .distance
                .total_cmp(&self.arena.get(b).distance)
                .then(a.cmp(&b))
        });

        for id in visible {
            let record = self.arena.get_mut(id);
            if record.distance < full_distance && stats.full_detail < self.config.max_full_count {
                record.full = true;
                stats.full_detail += 1;
            }
        }
    }

    fn build_worklists(
        &mut self,
        host_model_count: usize,
        index: &PackageIndex,
        loader: &mut AssetLoader,
        stats: &mut FrameStats,
    ) {
        let lists = &mut self.worklists;
        let placeholder_available = host_model_count > PLACEHOLDER_INDEX as usize;

        for id in self.arena.ids() {
            let record = self.arena.get(id);
            if record.cull {
                continue;
            }

            let Some(model_ref) = record.model else {
                if placeholder_available {
                    lists.add_legacy(PLACEHOLDER_INDEX, id);
                    stats.placeholders += 1;
                }
                continue;
            };
            let Some(model) = index.model(model_ref) else {
                continue;
            };

            match model.kind {
                ModelKind::Legacy => match model.legacy_index {
                    Some(slot) if (slot as usize) < host_model_count => {
                        lists.add_legacy(slot, id);
                        if record.full {
                            stats.full_legacy += 1;
                        } else {
                            stats.lights_legacy += 1;
                        }
                    }
                    _ if placeholder_available => {
                        lists.add_legacy(PLACEHOLDER_INDEX, id);
                        stats.placeholders += 1;
                    }
                    _ => {}
                },
                ModelKind::Geometry => match model.geometry.state() {
                    SlotState::Ready(geometry) if textures_settled(model) => {
                        lists.add_geometry(
                            GeometryKey {
                                texture: model.texture.ready(),
                                lit_texture: model.lit_texture.ready(),
                                geometry,
                            },
                            id,
                        );
                        stats.geometry += 1;
                    }
                    SlotState::Failed => {
                        if placeholder_available {
                            lists.add_legacy(PLACEHOLDER_INDEX, id);
                            stats.placeholders += 1;
                        }
                    }
                    _ => {
                        loader.request_model(model);
                        stats.unready += 1;
                    }
                },
                ModelKind::MultiPart => {
                    if loader.request_model(model) > 0 || !model.is_ready() {
                        stats.unready += 1;
                        continue;
                    }
                    let roles = part_roles(model, record.full);
                    for (n, attachment) in model.attachments.iter().enumerate() {
                        if roles.contains(&attachment.role) && attachment.handle.ready().is_some() {
                            lists.add_part(model_ref, n, id);
                        }
                    }
                    stats.multipart += 1;
                }
            }
        }
    }

    fn submit(&self, index: &PackageIndex, backend: &mut dyn DrawBackend) {
        for (&slot, ids) in &self.worklists.legacy {
            for &id in ids {
                let record = self.arena.get(id);
                backend.submit_transform(&record.transform);
                backend.submit_legacy_model(slot, record.distance, record.full, &record.surfaces);
            }
        }

        for (key, ids) in &self.worklists.geometry {
            for &id in ids {
                let record = self.arena.get(id);
                let distance = if record.full {
                    record.distance
                } else {
                    record.distance.max(REDUCED_DETAIL_DISTANCE_M)
                };
                backend.submit_transform(&record.transform);
                backend.submit_geometry_model(key.geometry, key.texture, key.lit_texture, distance);
            }
        }
        for &(geometry, id) in &self.worklists.lights {
            let record = self.arena.get(id);
            backend.submit_transform(&record.transform);
            backend.submit_lights_overlay(geometry, record.distance, record.surfaces.lights);
        }

        for (&(model_ref, n), ids) in &self.worklists.multipart {
            let Some(attachment) = index.model(model_ref).and_then(|m| m.attachments.get(n)) else {
                continue;
            };
            let Some(part) = attachment.handle.ready() else {
                continue;
            };
            for &id in ids {
                let record = self.arena.get(id);
                backend.submit_multipart_instance(
                    part,
                    attachment.role,
                    &record.transform,
                    record.surfaces.lights,
                );
            }
        }
    }

    /// Labels fade from white to yellow-ish with distance.
    fn draw_labels(&self, label_distance: f32, backend: &mut dyn DrawBackend) -> usize {
        let mut drawn = 0;
        for record in self.arena.records() {
            if record.cull || record.label.is_empty() || record.distance >= label_distance {
                continue;
            }
            let ratio = 1.0 - record.distance / label_distance;
            let color = [0.5 + 0.5 * ratio, 0.5 + 0.5 * ratio, 0.5 - 0.5 * ratio, 1.0];
            backend.draw_label(record.position(), &record.label, color);
            drawn += 1;
        }
        drawn
    }

    fn dump(&self, index: &PackageIndex, stats: &FrameStats) {
        log::info!("Frame dump: {:?}", stats);
        for record in self.arena.records() {
            let model = record
                .model
                .and_then(|m| index.model(m))
                .map(|m| m.name.as_str())
                .unwrap_or("<none>");
            log::info!(
                "    plane {} model={} dist={:.0} cull={} slot={} full={} pos={:?}",
                record.plane.0,
                model,
                record.distance,
                record.cull,
                record.slot_eligible,
                record.full,
                record.position()
            );
        }
    }
}

fn textures_settled(model: &Model) -> bool {
    is_settled(&model.texture) && is_settled(&model.lit_texture)
}

/// Parts drawn at a detail level; without a LOW_LOD part the solid stands in.
fn part_roles(model: &Model, full: bool) -> Vec<AttachmentRole> {
    if full {
        return vec![AttachmentRole::Solid, AttachmentRole::Glass, AttachmentRole::Lights];
    }
    let has_low = model
        .attachments
        .iter()
        .any(|a| a.role == AttachmentRole::LowLod);
    if has_low {
        vec![AttachmentRole::LowLod, AttachmentRole::Lights]
    } else {
        vec![AttachmentRole::Solid, AttachmentRole::Lights]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::loader::LoaderConfig;
    use crate::asset::source::{FileAssetSource, SynchronousLoads};
    use crate::asset::store::{AssetHandle, AssetStore};
    use crate::core::Camera;
    use crate::csl::index::DescriptorSource;
    use crate::csl::reference::{AircraftCodes, RelatedTypes};
    use crate::render::lights::LightStatus;
    use crate::render::registry::{
        DataResult, PlaneDataProvider, PlanePosition, PlaneRadar,
    };
    use glam::{DVec3, Vec3};
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Host {
        visibility: f32,
        cycle: u64,
        host_models: usize,
    }

    impl HostView for Host {
        fn camera(&self) -> Camera {
            Camera::default()
        }

        fn visibility_m(&self) -> f32 {
            self.visibility
        }

        fn own_altitude_ft(&self) -> f64 {
            0.0
        }

        fn cycle(&self) -> u64 {
            self.cycle
        }

        /// Latitude is meters north, longitude meters east
        fn world_to_local(&self, latitude: f64, longitude: f64, elevation_m: f64) -> DVec3 {
            DVec3::new(longitude, elevation_m, -latitude)
        }

        fn host_model_count(&self) -> usize {
            self.host_models
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Legacy { index: u32, distance: f32, full: bool, gear: f32 },
        Geometry { texture: Option<AssetHandle>, distance: f32 },
        Lights,
        Part(AttachmentRole),
        Label,
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
        transforms: usize,
    }

    impl DrawBackend for Recorder {
        fn submit_transform(&mut self, _transform: &Transform) {
            self.transforms += 1;
        }

        fn submit_legacy_model(&mut self, index: u32, distance: f32, full: bool, surfaces: &PlaneSurfaces) {
            self.calls.push(Call::Legacy {
                index,
                distance,
                full,
                gear: surfaces.gear,
            });
        }

        fn submit_geometry_model(
            &mut self,
            _geometry: AssetHandle,
            texture: Option<AssetHandle>,
            _lit_texture: Option<AssetHandle>,
            distance: f32,
        ) {
            self.calls.push(Call::Geometry { texture, distance });
        }

        fn submit_lights_overlay(&mut self, _geometry: AssetHandle, _distance: f32, _lights: LightStatus) {
            self.calls.push(Call::Lights);
        }

        fn submit_multipart_instance(
            &mut self,
            _part: AssetHandle,
            role: AttachmentRole,
            _transform: &Transform,
            _lights: LightStatus,
        ) {
            self.calls.push(Call::Part(role));
        }

        fn draw_label(&mut self, _position: Vec3, _text: &str, _color: [f32; 4]) {
            self.calls.push(Call::Label);
        }
    }

    #[derive(Default)]
    struct Slots {
        capacity: usize,
        active: usize,
        written: usize,
    }

    impl SlotChannel for Slots {
        fn capacity(&self) -> usize {
            self.capacity
        }

        fn set_active_count(&mut self, count: usize) {
            self.active = count;
        }

        fn set_position(&mut self, _index: usize, _position: Vec3) {
            self.written += 1;
        }
    }

    struct Fixed {
        position: PlanePosition,
        radar: TransponderMode,
    }

    impl PlaneDataProvider for Fixed {
        fn position(&mut self) -> DataResult<PlanePosition> {
            DataResult::New(self.position.clone())
        }

        fn surfaces(&mut self) -> DataResult<PlaneSurfaces> {
            DataResult::Unavailable
        }

        fn radar(&mut self) -> DataResult<PlaneRadar> {
            DataResult::New(PlaneRadar {
                code: 1200,
                mode: self.radar,
            })
        }
    }

    fn ahead(distance_m: f64, elevation_ft: f64) -> Box<dyn PlaneDataProvider> {
        Box::new(Fixed {
            position: PlanePosition {
                latitude: distance_m,
                elevation_ft,
                label: format!("N{}", distance_m as u32),
                ..Default::default()
            },
            radar: TransponderMode::ModeC,
        })
    }

    fn loader() -> AssetLoader {
        AssetLoader::new(
            LoaderConfig::default(),
            Arc::new(AssetStore::new()),
            Arc::new(FileAssetSource),
            &SynchronousLoads,
        )
        .unwrap()
    }

    fn index_from(dir: &Path, descriptor: &str) -> PackageIndex {
        let sources = vec![DescriptorSource {
            dir: dir.to_path_buf(),
            file: dir.join("xsb_aircraft.txt"),
            content: descriptor.to_string(),
        }];
        let (mut index, _) =
            PackageIndex::from_sources(sources, RelatedTypes::default(), AircraftCodes::default(), 1100);
        index.assign_legacy_indices();
        index
    }

    fn legacy_index() -> PackageIndex {
        index_from(
            Path::new("/csl/legacy"),
            "EXPORT_NAME L\nAIRCRAFT 1000 1200 L:a320.acf\nICAO A320\n",
        )
    }

    fn host() -> Host {
        Host {
            visibility: 50_000.0,
            cycle: 1,
            host_models: 2,
        }
    }

    fn populate(index: &PackageIndex, loader: &mut AssetLoader) -> AircraftRegistry {
        let mut registry = AircraftRegistry::new("A320");
        registry.set_host_model_count(2);
        for i in 0..150 {
            let distance = if i < 60 {
                80.0 * (i + 1) as f64
            } else {
                6000.0 + 100.0 * i as f64
            };
            registry.create(index, loader, "A320", "", "", ahead(distance, 0.0));
        }
        registry
    }

    fn scheduler(max_full_count: usize) -> RenderScheduler {
        RenderScheduler::new(SchedulerConfig {
            max_full_count,
            draw_labels: false,
            ..SchedulerConfig::default()
        })
    }

    #[test]
    fn test_all_in_range_full_within_budget() {
        let index = legacy_index();
        let mut loader = loader();
        let mut registry = populate(&index, &mut loader);
        let mut backend = Recorder::default();
        let mut slots = Slots {
            capacity: 20,
            ..Default::default()
        };

        let stats = scheduler(100).render_frame(&host(), &mut registry, &index, &mut loader, &mut backend, &mut slots);
        assert_eq!(stats.total, 150);
        assert_eq!(stats.culled, 0);
        assert_eq!(stats.full_detail, 60);
        assert_eq!(stats.full_legacy, 60);
        assert_eq!(stats.lights_legacy, 90);
        assert_eq!(backend.transforms, 150);
    }

    #[test]
    fn test_budget_truncates_closest_first() {
        let index = legacy_index();
        let mut loader = loader();
        let mut registry = populate(&index, &mut loader);
        let mut backend = Recorder::default();
        let mut slots = Slots {
            capacity: 20,
            ..Default::default()
        };

        let stats = scheduler(40).render_frame(&host(), &mut registry, &index, &mut loader, &mut backend, &mut slots);
        assert_eq!(stats.full_detail, 40);

        let full_range = SchedulerConfig::default().full_distance_m;
        let in_range_lights_only = backend
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Legacy { distance, full: false, .. } if *distance < full_range))
            .count();
        assert_eq!(in_range_lights_only, 20);

        let farthest_full = backend
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Legacy { distance, full: true, .. } => Some(*distance),
                _ => None,
            })
            .fold(0.0f32, f32::max);
        assert!((farthest_full - 3200.0).abs() < 1.0);
    }

    #[test]
    fn test_slot_count_bounded_by_capacity() {
        let index = legacy_index();
        let mut loader = loader();
        let mut registry = populate(&index, &mut loader);
        let mut backend = Recorder::default();
        let mut slots = Slots {
            capacity: 20,
            ..Default::default()
        };
        let mut scheduler = scheduler(100);

        let stats = scheduler.render_frame(&host(), &mut registry, &index, &mut loader, &mut backend, &mut slots);
        assert_eq!(stats.slots_used, 19);
        assert_eq!(slots.written, 19);

        scheduler.before_world_draw(&mut slots);
        assert_eq!(slots.active, 1);
        scheduler.before_overlay_draw(&mut slots);
        assert_eq!(slots.active, 20);
    }

    #[test]
    fn test_culling_and_slot_eligibility() {
        let index = legacy_index();
        let mut loader = loader();
        let mut registry = AircraftRegistry::new("A320");
        registry.set_host_model_count(2);
        // Behind the camera: culled but still takes a slot
        registry.create(&index, &mut loader, "A320", "", "", ahead(-1000.0, 0.0));
        // Far above: visible, no slot
        registry.create(&index, &mut loader, "A320", "", "", ahead(20_000.0, 6000.0));
        // Standby transponder: visible, no slot
        registry.create(
            &index,
            &mut loader,
            "A320",
            "",
            "",
            Box::new(Fixed {
                position: PlanePosition {
                    latitude: 3000.0,
                    ..Default::default()
                },
                radar: TransponderMode::Standby,
            }),
        );
        // Out of range entirely
        registry.create(&index, &mut loader, "A320", "", "", ahead(200_000.0, 0.0));

        let mut backend = Recorder::default();
        let mut slots = Slots {
            capacity: 20,
            ..Default::default()
        };
        let mut scheduler = scheduler(100);
        let stats = scheduler.render_frame(&host(), &mut registry, &index, &mut loader, &mut backend, &mut slots);

        assert_eq!(stats.total, 3);
        assert_eq!(stats.culled, 1);
        assert_eq!(stats.slots_used, 1);
        assert_eq!(stats.full_legacy + stats.lights_legacy, 2);
        let records = scheduler.records();
        assert!(records[0].cull && records[0].slot_eligible);
        assert!(!records[1].slot_eligible);
        assert!(!records[2].slot_eligible);
    }

    #[test]
    fn test_placeholder_for_unmatched() {
        let index = legacy_index();
        let mut loader = loader();
        let mut registry = AircraftRegistry::new("ZZZZ");
        registry.set_host_model_count(2);
        registry.create(&index, &mut loader, "B744", "", "", ahead(500.0, 0.0));

        let mut backend = Recorder::default();
        let mut slots = Slots {
            capacity: 20,
            ..Default::default()
        };
        let stats = scheduler(100).render_frame(&host(), &mut registry, &index, &mut loader, &mut backend, &mut slots);
        assert_eq!(stats.placeholders, 1);
        assert!(matches!(backend.calls[0], Call::Legacy { index: 1, .. }));

        // Without host slots there is nothing to draw with
        let mut lonely = host();
        lonely.host_models = 1;
        let mut backend = Recorder::default();
        let stats = scheduler(100).render_frame(&lonely, &mut registry, &index, &mut loader, &mut backend, &mut slots);
        assert_eq!(stats.placeholders, 0);
        assert!(backend.calls.is_empty());
    }

    #[test]
    fn test_default_surfaces_and_no_gear() {
        let index = index_from(
            Path::new("/csl/legacy"),
            "EXPORT_NAME L\nAIRCRAFT 1000 1200 L:c172.acf\nICAO C172\nHASGEAR NO\n",
        );
        let mut loader = loader();
        let mut registry = AircraftRegistry::new("C172");
        registry.set_host_model_count(2);
        registry.create(&index, &mut loader, "C172", "", "", ahead(5000.0, 3000.0));

        let mut backend = Recorder::default();
        let mut slots = Slots {
            capacity: 4,
            ..Default::default()
        };
        scheduler(100).render_frame(&host(), &mut registry, &index, &mut loader, &mut backend, &mut slots);
        assert!(matches!(backend.calls[0], Call::Legacy { gear, .. } if gear == 1.0));
    }

    const OBJ7: &str = "I\n700\nOBJ\nnone\ntri\n0 0 0 0 0\n1 0 0 0 0\n0 1 0 0 0\nlight\n0 1 0 11 11 11\nend\n";
    const OBJ8: &str = "I\n800\nOBJ\nPOINT_COUNTS 3 0 0 3\nVT 0 0 0 0 0 1 0 0\nTRIS 0 3\n";

    #[test]
    fn test_geometry_submitted_with_lights_overlay() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("c172.obj"), OBJ7).unwrap();
        let index = index_from(dir.path(), "EXPORT_NAME G\nOBJECT G:c172.obj\nICAO C172\n");
        let mut loader = loader();
        let mut registry = AircraftRegistry::new("C172");
        registry.create(&index, &mut loader, "C172", "", "", ahead(500.0, 0.0));
        registry.create(&index, &mut loader, "C172", "", "", ahead(20_000.0, 0.0));

        let mut backend = Recorder::default();
        let mut slots = Slots {
            capacity: 4,
            ..Default::default()
        };
        let stats = scheduler(100).render_frame(&host(), &mut registry, &index, &mut loader, &mut backend, &mut slots);
        assert_eq!(stats.geometry, 2);
        assert_eq!(
            backend.calls,
            vec![
                Call::Geometry { texture: None, distance: 500.0 },
                Call::Geometry { texture: None, distance: 20_000.0 },
                Call::Lights,
                Call::Lights,
            ]
        );
    }

    #[test]
    fn test_reduced_detail_distance_floor() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("c172.obj"), OBJ7).unwrap();
        let index = index_from(dir.path(), "EXPORT_NAME G\nOBJECT G:c172.obj\nICAO C172\n");
        let mut loader = loader();
        let mut registry = AircraftRegistry::new("C172");
        registry.create(&index, &mut loader, "C172", "", "", ahead(500.0, 0.0));

        let mut backend = Recorder::default();
        let mut slots = Slots::default();
        scheduler(0).render_frame(&host(), &mut registry, &index, &mut loader, &mut backend, &mut slots);
        assert_eq!(backend.calls[0], Call::Geometry { texture: None, distance: 10_000.0 });
    }

    #[test]
    fn test_multipart_parts_by_detail() {
        let dir = TempDir::new().unwrap();
        for name in ["body.obj", "glass.obj", "lights.obj", "low.obj"] {
            std::fs::write(dir.path().join(name), OBJ8).unwrap();
        }
        let index = index_from(
            dir.path(),
            "EXPORT_NAME M\nOBJ8_AIRCRAFT b738\n\
             OBJ8 SOLID YES M:body.obj\nOBJ8 GLASS NO M:glass.obj\n\
             OBJ8 LIGHTS NO M:lights.obj\nOBJ8 LOW_LOD NO M:low.obj\nICAO B738\n",
        );
        let mut loader = loader();
        let mut registry = AircraftRegistry::new("B738");
        registry.create(&index, &mut loader, "B738", "", "", ahead(500.0, 0.0));
        registry.create(&index, &mut loader, "B738", "", "", ahead(30_000.0, 0.0));

        let mut backend = Recorder::default();
        let mut slots = Slots::default();
        let stats = scheduler(100).render_frame(&host(), &mut registry, &index, &mut loader, &mut backend, &mut slots);
        assert_eq!(stats.multipart, 2);

        let count = |role| backend.calls.iter().filter(|c| **c == Call::Part(role)).count();
        assert_eq!(count(AttachmentRole::Solid), 1);
        assert_eq!(count(AttachmentRole::Glass), 1);
        assert_eq!(count(AttachmentRole::Lights), 2);
        assert_eq!(count(AttachmentRole::LowLod), 1);
    }

    #[test]
    fn test_labels_only_when_near_and_visible() {
        let index = legacy_index();
        let mut loader = loader();
        let mut registry = AircraftRegistry::new("A320");
        registry.set_host_model_count(2);
        registry.create(&index, &mut loader, "A320", "", "", ahead(1000.0, 0.0));
        registry.create(&index, &mut loader, "A320", "", "", ahead(9000.0, 0.0));
        registry.create(&index, &mut loader, "A320", "", "", ahead(-1000.0, 0.0));

        let mut scheduler = RenderScheduler::new(SchedulerConfig::default());
        let mut backend = Recorder::default();
        let mut slots = Slots::default();
        let stats = scheduler.render_frame(&host(), &mut registry, &index, &mut loader, &mut backend, &mut slots);
        assert_eq!(stats.labels, 1);
        assert_eq!(backend.calls.iter().filter(|c| **c == Call::Label).count(), 1);
    }

    #[test]
    fn test_dump_flag_is_one_shot() {
        crate::core::logging::try_init_for_tests();
        let index = legacy_index();
        let mut loader = loader();
        let mut registry = populate(&index, &mut loader);
        let mut scheduler = scheduler(100);
        scheduler.request_dump();
        let mut backend = Recorder::default();
        let mut slots = Slots::default();
        scheduler.render_frame(&host(), &mut registry, &index, &mut loader, &mut backend, &mut slots);
        assert!(!scheduler.dump_requested);
    }

    #[test]
    fn test_failed_geometry_rematched_before_drawing() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        std::fs::write(dir.path().join("b").join("c172.obj"), OBJ7).unwrap();
        let sources = [
            ("a", "EXPORT_NAME A\nOBJECT A:missing.obj\nICAO C172\n"),
            ("b", "EXPORT_NAME B\nOBJECT B:c172.obj\nICAO C172\n"),
        ]
        .into_iter()
        .map(|(name, content)| DescriptorSource {
            dir: dir.path().join(name),
            file: dir.path().join(name).join("xsb_aircraft.txt"),
            content: content.to_string(),
        })
        .collect();
        let (index, _) =
            PackageIndex::from_sources(sources, RelatedTypes::default(), AircraftCodes::default(), 1100);

        // A background load of the broken object is still in flight
        let broken = &index.packages()[0].models[0];
        assert!(broken.geometry.try_claim());

        let mut loader = loader();
        let mut registry = AircraftRegistry::new("C172");
        let id = registry.create(&index, &mut loader, "C172", "", "", ahead(500.0, 0.0));
        assert_eq!(registry.get(id).unwrap().model.unwrap().package, 0);

        broken.geometry.resolve(AssetHandle::FAILED);
        let mut backend = Recorder::default();
        let mut slots = Slots::default();
        let mut scheduler = scheduler(100);
        let stats = scheduler.render_frame(&host(), &mut registry, &index, &mut loader, &mut backend, &mut slots);

        assert_eq!(stats.rematched, 1);
        assert_eq!(stats.geometry, 1);
        assert_eq!(stats.placeholders, 0);
        assert_eq!(registry.get(id).unwrap().model.unwrap().package, 1);

        let stats = scheduler.render_frame(&host(), &mut registry, &index, &mut loader, &mut backend, &mut slots);
        assert_eq!(stats.rematched, 0);
    }
}

//! Remote aircraft, their resolved models and cached state
//!
//! State comes from a [`PlaneDataProvider`] per aircraft. Each category is
//! queried at most once per simulator cycle; only fresh data moves the
//! freshness stamp.

use crate::asset::loader::AssetLoader;
use crate::csl::index::PackageIndex;
use crate::csl::matcher::{MatchResult, ModelMatcher};
use crate::csl::package::ModelRef;
use crate::render::lights::LightStatus;

/// Stable aircraft identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaneId(pub u32);

/// Answer of a provider for one data category
#[derive(Clone, Debug, PartialEq)]
pub enum DataResult<T> {
    /// No data, nothing cached is valid
    Unavailable,
    /// The cached value still holds
    Unchanged,
    New(T),
}

/// Geodetic position and attitude
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlanePosition {
    pub latitude: f64,
    pub longitude: f64,
    /// Feet above mean sea level
    pub elevation_ft: f64,
    pub pitch: f32,
    pub roll: f32,
    pub heading: f32,
    pub label: String,
}

/// Control surface and light state, ratios in 0..=1
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlaneSurfaces {
    pub gear: f32,
    pub flaps: f32,
    pub spoilers: f32,
    pub speed_brake: f32,
    pub slats: f32,
    pub wing_sweep: f32,
    pub thrust: f32,
    pub yoke_pitch: f32,
    pub yoke_heading: f32,
    pub yoke_roll: f32,
    pub lights: LightStatus,
}

impl PlaneSurfaces {
    /// Plausible state derived from position alone
    pub fn estimated(position: &PlanePosition) -> Self {
        let low = position.elevation_ft < 70.0;
        Self {
            gear: if low { 1.0 } else { 0.0 },
            flaps: if low { 1.0 } else { 0.0 },
            thrust: if position.pitch > 30.0 { 1.0 } else { 0.6 },
            yoke_pitch: position.pitch / 90.0,
            yoke_heading: position.heading / 180.0,
            yoke_roll: position.roll / 90.0,
            lights: LightStatus::taxi_default(),
            ..Default::default()
        }
    }
}

/// Transponder setting
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransponderMode {
    Standby,
    Mode3A,
    #[default]
    ModeC,
    ModeCLow,
    ModeCIdent,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaneRadar {
    pub code: u16,
    pub mode: TransponderMode,
}

/// Source of live aircraft state, one method per category
pub trait PlaneDataProvider {
    fn position(&mut self) -> DataResult<PlanePosition>;
    fn surfaces(&mut self) -> DataResult<PlaneSurfaces>;
    fn radar(&mut self) -> DataResult<PlaneRadar>;
}

/// One cached data category
#[derive(Clone, Debug)]
pub struct Cached<T> {
    value: Option<T>,
    /// Cycle of the last `New`
    fresh_cycle: Option<u64>,
    /// Cycle of the last provider query
    queried_cycle: Option<u64>,
}

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Self {
            value: None,
            fresh_cycle: None,
            queried_cycle: None,
        }
    }
}

impl<T> Cached<T> {
    /// Query the provider unless already done this cycle, then return the value.
    pub fn refresh<F>(&mut self, cycle: u64, query: F) -> Option<&T>
    where
        F: FnOnce() -> DataResult<T>,
    {
        if self.queried_cycle != Some(cycle) {
            self.queried_cycle = Some(cycle);
            match query() {
                DataResult::New(value) => {
                    self.value = Some(value);
                    self.fresh_cycle = Some(cycle);
                }
                DataResult::Unchanged => {}
                DataResult::Unavailable => self.value = None,
            }
        }
        self.value.as_ref()
    }

    pub fn fresh_cycle(&self) -> Option<u64> {
        self.fresh_cycle
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }
}

/// A registered remote aircraft
pub struct Aircraft {
    pub id: PlaneId,
    pub icao: String,
    pub airline: String,
    pub livery: String,
    pub model: Option<ModelRef>,
    pub livery_accurate: bool,
    provider: Box<dyn PlaneDataProvider>,
    position: Cached<PlanePosition>,
    surfaces: Cached<PlaneSurfaces>,
    radar: Cached<PlaneRadar>,
}

impl Aircraft {
    pub fn position_stamp(&self) -> Option<u64> {
        self.position.fresh_cycle()
    }
}

/// Lifecycle notifications
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistryEvent {
    Created,
    ModelChanged,
    Destroyed,
}

type Observer = Box<dyn FnMut(PlaneId, RegistryEvent)>;

/// All remote aircraft in creation order
pub struct AircraftRegistry {
    planes: Vec<Aircraft>,
    next_id: u32,
    default_icao: String,
    host_model_count: usize,
    observers: Vec<Observer>,
}

impl AircraftRegistry {
    pub fn new(default_icao: impl Into<String>) -> Self {
        Self {
            planes: Vec::new(),
            next_id: 1,
            default_icao: default_icao.into(),
            host_model_count: 0,
            observers: Vec::new(),
        }
    }

    /// Number of aircraft slots the host has loaded, for legacy model matching
    pub fn set_host_model_count(&mut self, count: usize) {
        self.host_model_count = count;
    }

    pub fn default_icao(&self) -> &str {
        &self.default_icao
    }

    /// Type used when an identity matches nothing. Existing aircraft keep their models.
    pub fn set_default_icao(&mut self, icao: impl Into<String>) {
        self.default_icao = icao.into();
    }

    pub fn add_observer<F>(&mut self, observer: F)
    where
        F: FnMut(PlaneId, RegistryEvent) + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    fn notify(&mut self, id: PlaneId, event: RegistryEvent) {
        for observer in &mut self.observers {
            observer(id, event);
        }
    }

    fn resolve(
        &self,
        index: &PackageIndex,
        loader: &mut AssetLoader,
        icao: &str,
        airline: &str,
        livery: &str,
    ) -> Option<MatchResult> {
        let matcher = ModelMatcher::new(index, &self.default_icao)
            .with_host_model_count(self.host_model_count);

        // Inline loads settle inside request_model, so the pick can fail on the spot
        for _ in 0..=index.model_count() {
            let result = matcher.match_model(icao, airline, livery, true)?;
            let model = index.model(result.model)?;
            loader.request_model(model);
            if model.is_usable(self.host_model_count) {
                return Some(result);
            }
            log::debug!("Model {} failed to load, matching {} again", model.name, icao);
        }
        None
    }

    /// Whether an aircraft is bound to a model that can no longer be drawn
    fn is_stale(&self, plane: &Aircraft, index: &PackageIndex) -> bool {
        plane
            .model
            .and_then(|model| index.model(model))
            .is_some_and(|model| !model.is_usable(self.host_model_count))
    }

    /// Re-resolve every aircraft whose model became unusable, such as after
    /// its geometry failed to load. Returns the number of aircraft re-matched.
    pub fn rematch_failed(&mut self, index: &PackageIndex, loader: &mut AssetLoader) -> usize {
        let stale: Vec<(PlaneId, String, String, String)> = self
            .planes
            .iter()
            .filter(|plane| self.is_stale(plane, index))
            .map(|plane| (plane.id, plane.icao.clone(), plane.airline.clone(), plane.livery.clone()))
            .collect();

        for (id, icao, airline, livery) in &stale {
            log::info!("Model of aircraft {} failed, matching {} {} {} again", id.0, icao, airline, livery);
            self.change_model(index, loader, *id, icao, airline, livery);
        }
        stale.len()
    }

    /// Register an aircraft, resolve its model and queue the model's assets.
    pub fn create(
        &mut self,
        index: &PackageIndex,
        loader: &mut AssetLoader,
        icao: &str,
        airline: &str,
        livery: &str,
        provider: Box<dyn PlaneDataProvider>,
    ) -> PlaneId {
        let id = PlaneId(self.next_id);
        self.next_id += 1;

        let result = self.resolve(index, loader, icao, airline, livery);
        if result.is_none() {
            log::debug!("No model for {} {} {}", icao, airline, livery);
        }

        self.planes.push(Aircraft {
            id,
            icao: icao.to_string(),
            airline: airline.to_string(),
            livery: livery.to_string(),
            model: result.map(|r| r.model),
            livery_accurate: result.is_some_and(|r| r.livery_accurate),
            provider,
            position: Cached::default(),
            surfaces: Cached::default(),
            radar: Cached::default(),
        });
        self.notify(id, RegistryEvent::Created);
        id
    }

    pub fn destroy(&mut self, id: PlaneId) -> bool {
        let Some(slot) = self.planes.iter().position(|p| p.id == id) else {
            return false;
        };
        self.planes.remove(slot);
        self.notify(id, RegistryEvent::Destroyed);
        true
    }

    /// Re-identify an aircraft and re-resolve its model.
    pub fn change_model(
        &mut self,
        index: &PackageIndex,
        loader: &mut AssetLoader,
        id: PlaneId,
        icao: &str,
        airline: &str,
        livery: &str,
    ) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        let result = self.resolve(index, loader, icao, airline, livery);
        if let Some(plane) = self.planes.iter_mut().find(|p| p.id == id) {
            plane.icao = icao.to_string();
            plane.airline = airline.to_string();
            plane.livery = livery.to_string();
            plane.model = result.map(|r| r.model);
            plane.livery_accurate = result.is_some_and(|r| r.livery_accurate);
        }
        self.notify(id, RegistryEvent::ModelChanged);
        true
    }

    pub fn get(&self, id: PlaneId) -> Option<&Aircraft> {
        self.planes.iter().find(|p| p.id == id)
    }

    fn get_mut(&mut self, id: PlaneId) -> Option<&mut Aircraft> {
        self.planes.iter_mut().find(|p| p.id == id)
    }

    pub fn ids(&self) -> Vec<PlaneId> {
        self.planes.iter().map(|p| p.id).collect()
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    pub fn position(&mut self, id: PlaneId, cycle: u64) -> Option<PlanePosition> {
        let plane = self.get_mut(id)?;
        let provider = &mut plane.provider;
        plane.position.refresh(cycle, || provider.position()).cloned()
    }

    pub fn surfaces(&mut self, id: PlaneId, cycle: u64) -> Option<PlaneSurfaces> {
        let plane = self.get_mut(id)?;
        let provider = &mut plane.provider;
        plane.surfaces.refresh(cycle, || provider.surfaces()).copied()
    }

    pub fn radar(&mut self, id: PlaneId, cycle: u64) -> Option<PlaneRadar> {
        let plane = self.get_mut(id)?;
        let provider = &mut plane.provider;
        plane.radar.refresh(cycle, || provider.radar()).copied()
    }
}

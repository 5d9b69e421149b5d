//! Remote aircraft registry and per-frame draw scheduling

pub mod lights;
pub mod registry;
pub mod culling;
pub mod slots;
pub mod worklist;
pub mod backend;
pub mod scheduler;

pub use lights::{FlashPattern, LightStatus};
pub use registry::{
    AircraftRegistry, DataResult, PlaneDataProvider, PlaneId, PlanePosition, PlaneRadar, PlaneSurfaces,
    RegistryEvent, TransponderMode,
};
pub use culling::{classify, Classification, CullParams, ViewCone};
pub use slots::{SharedSlotAllocator, SlotCandidate, SlotChannel};
pub use backend::{DrawBackend, HostView, Transform};
pub use scheduler::{FrameStats, RenderScheduler, SchedulerConfig};

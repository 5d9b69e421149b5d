//! Geometry and texture loading

pub mod obj;
pub mod source;
pub mod store;
pub mod loader;

pub use obj::{Geometry, LightKind, LightPoint, Lod};
pub use source::{AssetSource, FileAssetSource, LoadCapability, SynchronousLoads, Texture, ThreadedLoads};
pub use store::{AssetHandle, AssetSlot, AssetStore, SlotState, StoreStats};
pub use loader::{AssetLoader, JobKind, JobResult, LoaderConfig};

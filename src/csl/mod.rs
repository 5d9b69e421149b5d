//! CSL package loading and model matching

pub mod package;
pub mod descriptor;
pub mod reference;
pub mod index;
pub mod matcher;

pub use package::{Attachment, AttachmentRole, MatchLevel, MatchTable, Model, ModelKind, ModelRef, Package};
pub use reference::{AircraftCodeEntry, AircraftCodes, EquipmentCode, RelatedTypes};
pub use index::{DescriptorSource, LoadReport, PackageIdentity, PackageIndex};
pub use matcher::{MatchResult, MatchSource, ModelMatcher};

//! Packages, models and their match tables

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::asset::store::{AssetSlot, SlotState};

/// How a model is drawn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// Host-native aircraft file, drawn by the host from a numbered slot
    Legacy,
    /// Single OBJ7 object with optional textures
    Geometry,
    /// OBJ8 aircraft assembled from separately loaded parts
    MultiPart,
}

/// Draw treatment of one multi-part attachment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttachmentRole {
    Solid,
    Glass,
    Lights,
    LowLod,
}

impl AttachmentRole {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "SOLID" => Some(AttachmentRole::Solid),
            "GLASS" => Some(AttachmentRole::Glass),
            "LIGHTS" => Some(AttachmentRole::Lights),
            "LOW_LOD" => Some(AttachmentRole::LowLod),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttachmentRole::Solid => "SOLID",
            AttachmentRole::Glass => "GLASS",
            AttachmentRole::Lights => "LIGHTS",
            AttachmentRole::LowLod => "LOW_LOD",
        }
    }
}

/// One part of a multi-part model
#[derive(Clone, Debug)]
pub struct Attachment {
    pub file: PathBuf,
    pub role: AttachmentRole,
    pub needs_animation: bool,
    pub handle: Arc<AssetSlot>,
}

impl Attachment {
    pub fn new(file: PathBuf, role: AttachmentRole, needs_animation: bool) -> Self {
        Self {
            file,
            role,
            needs_animation,
            handle: Arc::new(AssetSlot::new()),
        }
    }
}

/// A drawable aircraft model
#[derive(Clone, Debug)]
pub struct Model {
    /// Name for diagnostics (relative path plus texture)
    pub name: String,
    pub kind: ModelKind,
    /// Object or aircraft file; for multi-part models the declared name
    pub path: PathBuf,
    /// Explicit `TEXTURE` path
    pub texture_path: Option<PathBuf>,
    pub geometry: Arc<AssetSlot>,
    pub texture: Arc<AssetSlot>,
    pub lit_texture: Arc<AssetSlot>,
    /// Retractable gear
    pub has_gear: bool,
    /// Identity strings from the last ICAO/AIRLINE/LIVERY line
    pub icao: String,
    pub airline: String,
    pub livery: String,
    /// Host version range of a legacy model
    pub version_range: Option<(i32, i32)>,
    /// Host aircraft slot of a legacy model, starting at 1
    pub legacy_index: Option<u32>,
    pub attachments: Vec<Attachment>,
}

impl Model {
    fn new(name: impl Into<String>, kind: ModelKind, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            kind,
            path,
            texture_path: None,
            geometry: Arc::new(AssetSlot::new()),
            texture: Arc::new(AssetSlot::new()),
            lit_texture: Arc::new(AssetSlot::new()),
            has_gear: true,
            icao: String::new(),
            airline: String::new(),
            livery: String::new(),
            version_range: None,
            legacy_index: None,
            attachments: Vec::new(),
        }
    }

    pub fn legacy(name: impl Into<String>, path: PathBuf, min: i32, max: i32) -> Self {
        let mut model = Self::new(name, ModelKind::Legacy, path);
        model.version_range = Some((min, max));
        model
    }

    pub fn geometry(name: impl Into<String>, path: PathBuf) -> Self {
        Self::new(name, ModelKind::Geometry, path)
    }

    pub fn multi_part(name: impl Into<String>) -> Self {
        let name = name.into();
        let path = PathBuf::from(&name);
        Self::new(name, ModelKind::MultiPart, path)
    }

    /// Whether the matcher may return this model.
    ///
    /// # Arguments
    /// * `host_model_count` - Number of aircraft slots the host has loaded
    pub fn is_usable(&self, host_model_count: usize) -> bool {
        match self.kind {
            ModelKind::Legacy => self
                .legacy_index
                .is_some_and(|index| (index as usize) < host_model_count),
            ModelKind::Geometry => self.geometry.state() != SlotState::Failed,
            ModelKind::MultiPart => true,
        }
    }

    /// All assets needed for drawing are loaded
    pub fn is_ready(&self) -> bool {
        match self.kind {
            ModelKind::Legacy => self.legacy_index.is_some(),
            ModelKind::Geometry => self.geometry.ready().is_some(),
            ModelKind::MultiPart => self
                .attachments
                .iter()
                .all(|a| !matches!(a.handle.state(), SlotState::Unset | SlotState::Pending)),
        }
    }
}

/// Match priority, best first
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatchLevel {
    IcaoAirlineLivery = 0,
    IcaoAirline = 1,
    GroupAirlineLivery = 2,
    GroupAirline = 3,
    Icao = 4,
    Group = 5,
}

impl MatchLevel {
    pub const ALL: [MatchLevel; 6] = [
        MatchLevel::IcaoAirlineLivery,
        MatchLevel::IcaoAirline,
        MatchLevel::GroupAirlineLivery,
        MatchLevel::GroupAirline,
        MatchLevel::Icao,
        MatchLevel::Group,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Key starts with the ICAO type rather than its group
    pub fn uses_icao(self) -> bool {
        matches!(
            self,
            MatchLevel::IcaoAirlineLivery | MatchLevel::IcaoAirline | MatchLevel::Icao
        )
    }

    /// Key carries airline and livery
    pub fn uses_livery(self) -> bool {
        matches!(self, MatchLevel::IcaoAirlineLivery | MatchLevel::GroupAirlineLivery)
    }

    /// Key carries the airline only
    pub fn uses_airline(self) -> bool {
        matches!(self, MatchLevel::IcaoAirline | MatchLevel::GroupAirline)
    }

    /// Build this level's key. Pure.
    pub fn key(self, icao: &str, group: &str, airline: &str, livery: &str) -> String {
        let mut key = String::from(if self.uses_icao() { icao } else { group });
        if self.uses_livery() {
            key.push(' ');
            key.push_str(airline);
            key.push(' ');
            key.push_str(livery);
        }
        if self.uses_airline() {
            key.push(' ');
            key.push_str(airline);
        }
        key
    }
}

/// Non-owning reference to a model: package index and model index
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelRef {
    pub package: usize,
    pub model: usize,
}

/// Identity key -> model index within the owning package
pub type MatchTable = BTreeMap<String, usize>;

/// A loaded package
#[derive(Clone, Debug, Default)]
pub struct Package {
    /// Export identifier
    pub name: String,
    /// Package directory
    pub path: PathBuf,
    pub models: Vec<Model>,
    pub tables: [MatchTable; 6],
}

impl Package {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
            models: Vec::new(),
            tables: Default::default(),
        }
    }

    pub fn table(&self, level: MatchLevel) -> &MatchTable {
        &self.tables[level.index()]
    }

    /// Record `key -> model` unless the key is already taken.
    pub(crate) fn insert_match(&mut self, level: MatchLevel, key: String, model: usize) -> bool {
        debug_assert!(model < self.models.len());
        let table = &mut self.tables[level.index()];
        if table.contains_key(&key) {
            return false;
        }
        table.insert(key, model);
        true
    }

    /// Model a table entry points at, if the entry exists
    pub fn lookup(&self, level: MatchLevel, key: &str) -> Option<(usize, &Model)> {
        let index = *self.table(level).get(key)?;
        self.models.get(index).map(|model| (index, model))
    }
}

//! Package catalogue built from descriptor files
//!
//! Loading runs in two phases. The header phase reads every descriptor's
//! `EXPORT_NAME` and registers it; the body phase parses every descriptor
//! against the full set of identities, so `DEPENDENCY` lines and path
//! prefixes can name any package regardless of directory order.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::asset::loader::AssetLoader;
use crate::asset::obj::normalize_separators;
use crate::core::config::MultiplayerConfig;
use crate::core::Error;
use crate::csl::descriptor::{self, Command, Line};
use crate::csl::package::{Attachment, MatchLevel, Model, ModelKind, ModelRef, Package};
use crate::csl::reference::{AircraftCodes, RelatedTypes};

/// Export name and origin directory of a package
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageIdentity {
    pub name: String,
    pub path: PathBuf,
}

/// Registered package identities in registration order
#[derive(Clone, Debug, Default)]
pub struct IdentityRegistry {
    identities: Vec<PackageIdentity>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an identity. A name already taken is rejected and the
    /// existing registration kept.
    pub fn register(&mut self, identity: PackageIdentity) -> bool {
        if let Some(existing) = self.get(&identity.name) {
            log::warn!(
                "Package name {} already in use by {}, requested by {}",
                identity.name,
                existing.path.display(),
                identity.path.display()
            );
            return false;
        }
        self.identities.push(identity);
        true
    }

    pub fn get(&self, name: &str) -> Option<&PackageIdentity> {
        self.identities.iter().find(|identity| identity.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageIdentity> {
        self.identities.iter()
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Replace a leading package name with that package's directory.
    ///
    /// `PKG:dir\file.obj` and `PKG/dir/file.obj` both resolve. The earliest
    /// registered package whose name matches wins.
    pub fn substitute(&self, token: &str) -> Option<PathBuf> {
        let normalized = normalize_separators(token);
        self.identities.iter().find_map(|identity| {
            let rest = normalized.strip_prefix(identity.name.as_str())?;
            if rest.is_empty() {
                Some(identity.path.clone())
            } else {
                rest.strip_prefix('/')
                    .map(|rest| identity.path.join(rest.trim_start_matches('/')))
            }
        })
    }
}

/// Header phase: the first valid `EXPORT_NAME` of a descriptor.
pub fn parse_header(dir: &Path, content: &str) -> Option<PackageIdentity> {
    descriptor::find_export_name(content).map(|name| PackageIdentity {
        name: name.to_string(),
        path: dir.to_path_buf(),
    })
}

/// Read-only inputs of the body phase
#[derive(Clone, Copy)]
pub struct BodyContext<'a> {
    pub identities: &'a IdentityRegistry,
    pub related: &'a RelatedTypes,
    /// Host version gating legacy `AIRCRAFT` lines
    pub sim_version: i32,
}

/// Problems found while parsing one body
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BodyReport {
    /// Lines skipped for bad arguments
    pub skipped_lines: usize,
    /// Line that stopped processing of the file
    pub aborted_at: Option<usize>,
}

enum Step {
    Continue,
    Skip(String),
    Abort(String),
}

struct BodyParser<'a, 'c> {
    ctx: BodyContext<'c>,
    file: &'a Path,
    package: Package,
}

impl<'a, 'c> BodyParser<'a, 'c> {
    fn resolve_path(&self, token: &str, line: &Line<'_>) -> PathBuf {
        match self.ctx.identities.substitute(token) {
            Some(path) => path,
            None => {
                self.warn(line, &format!("no package found for path '{}', using it as written", token));
                PathBuf::from(normalize_separators(token))
            }
        }
    }

    fn warn(&self, line: &Line<'_>, message: &str) {
        let err = Error::Descriptor {
            file: self.file.to_path_buf(),
            line: line.number,
            message: format!("{} ({})", message, line.text.trim()),
        };
        log::warn!("{}", err);
    }

    fn last_model(&mut self) -> Option<(usize, &mut Model)> {
        let index = self.package.models.len().checked_sub(1)?;
        self.package.models.last_mut().map(|model| (index, model))
    }

    fn apply(&mut self, command: Command<'_>, line: &Line<'_>) -> Step {
        match command {
            Command::ExportName(_) => Step::Continue,
            Command::Dependency(name) => {
                if self.ctx.identities.contains(name) {
                    Step::Continue
                } else {
                    Step::Abort(format!("required package {} not found", name))
                }
            }
            Command::Object(token) => {
                let path = self.resolve_path(token, line);
                let name = normalize_separators(token);
                self.package.models.push(Model::geometry(name, path));
                Step::Continue
            }
            Command::Texture(token) => {
                let path = self.resolve_path(token, line);
                match self.last_model() {
                    Some((_, model)) if model.kind == ModelKind::Geometry => {
                        model.name.push(' ');
                        model.name.push_str(&normalize_separators(token));
                        model.texture_path = Some(path);
                        Step::Continue
                    }
                    _ => Step::Abort("TEXTURE without a preceding OBJECT".into()),
                }
            }
            Command::Aircraft { min, max, path: token } => {
                let version = self.ctx.sim_version;
                if version < min || version > max {
                    log::debug!(
                        "{}:{}: skipping aircraft for versions {}..={}",
                        self.file.display(),
                        line.number,
                        min,
                        max
                    );
                    return Step::Continue;
                }
                let path = self.resolve_path(token, line);
                let name = normalize_separators(token);
                self.package.models.push(Model::legacy(name, path, min, max));
                Step::Continue
            }
            Command::Obj8Aircraft(name) => {
                self.package.models.push(Model::multi_part(name));
                Step::Continue
            }
            Command::Obj8 { role, animate, path: token } => {
                let path = self.resolve_path(token, line);
                match self.last_model() {
                    Some((_, model)) if model.kind == ModelKind::MultiPart => {
                        model.attachments.push(Attachment::new(path, role, animate));
                        Step::Continue
                    }
                    _ => Step::Abort("OBJ8 without a preceding OBJ8_AIRCRAFT".into()),
                }
            }
            Command::HasGear(has_gear) => match self.last_model() {
                Some((_, model)) => {
                    model.has_gear = has_gear;
                    Step::Continue
                }
                None => Step::Abort("HASGEAR before any model".into()),
            },
            Command::Icao(icao) => self.identify(icao, "", None),
            Command::Airline { icao, airline } => self.identify(icao, airline, None),
            Command::Livery { icao, airline, livery } => self.identify(icao, airline, Some(livery)),
        }
    }

    /// ICAO, AIRLINE and LIVERY lines: tag the last model and fill its keys.
    fn identify(&mut self, icao: &str, airline: &str, livery: Option<&str>) -> Step {
        let group = self.ctx.related.group_of(icao).to_string();
        let Some((index, model)) = self.last_model() else {
            return Step::Abort("identity line before any model".into());
        };

        model.icao = icao.to_string();
        if !airline.is_empty() {
            model.airline = airline.to_string();
        }
        if let Some(livery) = livery {
            model.livery = livery.to_string();
        }

        let (icao_level, group_level) = match (airline.is_empty(), livery) {
            (true, _) => (MatchLevel::Icao, MatchLevel::Group),
            (false, None) => (MatchLevel::IcaoAirline, MatchLevel::GroupAirline),
            (false, Some(_)) => (MatchLevel::IcaoAirlineLivery, MatchLevel::GroupAirlineLivery),
        };
        let livery = livery.unwrap_or("");

        self.package
            .insert_match(icao_level, icao_level.key(icao, &group, airline, livery), index);
        if !group.is_empty() {
            self.package
                .insert_match(group_level, group_level.key(icao, &group, airline, livery), index);
        }
        Step::Continue
    }
}

/// Body phase: build a package from its descriptor.
///
/// Pure given the registered identities and the related-types table.
pub fn parse_body(identity: &PackageIdentity, file: &Path, content: &str, ctx: BodyContext<'_>) -> (Package, BodyReport) {
    let mut parser = BodyParser {
        ctx,
        file,
        package: Package::new(identity.name.clone(), identity.path.clone()),
    };
    let mut report = BodyReport::default();

    for line in descriptor::lines(content) {
        let step = match descriptor::parse_command(&line.tokens) {
            Ok(command) => parser.apply(command, &line),
            Err(e) if e.aborts_file() => Step::Abort(e.to_string()),
            Err(e) => Step::Skip(e.to_string()),
        };

        match step {
            Step::Continue => {}
            Step::Skip(message) => {
                parser.warn(&line, &message);
                report.skipped_lines += 1;
            }
            Step::Abort(message) => {
                parser.warn(&line, &format!("{}; ignoring rest of package {}", message, identity.name));
                report.aborted_at = Some(line.number);
                break;
            }
        }
    }

    (parser.package, report)
}

/// Summary of a full load
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Subdirectories examined
    pub directories: usize,
    /// Packages parsed
    pub packages: usize,
    /// Directories whose descriptor has no `EXPORT_NAME`; loaded without a name
    pub missing_header: Vec<PathBuf>,
    /// Export names already registered; the later packages are loaded but
    /// cannot be referenced by name
    pub duplicates: Vec<String>,
    /// Asset jobs queued by the geometry preload
    pub preload_requests: usize,
    /// Packages whose body stopped early
    pub aborted: Vec<String>,
    pub skipped_lines: usize,
    /// Reference tables that could not be read
    pub reference_errors: Vec<String>,
}

impl LoadReport {
    /// Nothing went wrong worth telling the user about
    pub fn is_clean(&self) -> bool {
        self.duplicates.is_empty()
            && self.aborted.is_empty()
            && self.skipped_lines == 0
            && self.reference_errors.is_empty()
    }
}

/// A descriptor read from disk, or supplied directly
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DescriptorSource {
    /// Package directory
    pub dir: PathBuf,
    /// Descriptor file, for messages
    pub file: PathBuf,
    pub content: String,
}

/// All loaded packages plus the reference tables used for matching
#[derive(Debug, Default)]
pub struct PackageIndex {
    packages: Vec<Package>,
    identities: IdentityRegistry,
    related: RelatedTypes,
    codes: AircraftCodes,
}

impl PackageIndex {
    /// Empty index over the given reference tables
    pub fn new(related: RelatedTypes, codes: AircraftCodes) -> Self {
        Self {
            packages: Vec::new(),
            identities: IdentityRegistry::new(),
            related,
            codes,
        }
    }

    /// Load every package below `root` plus both reference tables.
    ///
    /// Problems are logged and collected in the report; loading never stops
    /// because of one bad package. With `preload_geometry` set every model's
    /// assets are queued on `loader`, so broken objects drop out of matching
    /// as soon as their loads fail.
    pub fn load_all(
        root: &Path,
        related_file: &Path,
        equipment_file: &Path,
        config: &MultiplayerConfig,
        loader: &mut AssetLoader,
    ) -> (Self, LoadReport) {
        let mut reference_errors = Vec::new();

        let codes = AircraftCodes::load(equipment_file).unwrap_or_else(|e| {
            log::warn!("Could not read aircraft codes: {}", e);
            reference_errors.push(e.to_string());
            AircraftCodes::default()
        });
        let related = RelatedTypes::load(related_file).unwrap_or_else(|e| {
            log::warn!("Could not read related types: {}", e);
            reference_errors.push(e.to_string());
            RelatedTypes::default()
        });

        let sources = read_descriptors(root, &config.descriptor_file_name);
        let (index, mut report) = Self::from_sources(sources, related, codes, config.sim_version);
        report.reference_errors = reference_errors;

        if config.preload_geometry {
            report.preload_requests = index.request_all(loader);
            log::debug!("Queued {} preload jobs", report.preload_requests);
        }

        log::info!(
            "Loaded {} CSL packages ({} models) from {}",
            report.packages,
            index.model_count(),
            root.display()
        );
        (index, report)
    }

    /// Build from descriptors already in memory, in the given order.
    pub fn from_sources(
        sources: Vec<DescriptorSource>,
        related: RelatedTypes,
        codes: AircraftCodes,
        sim_version: i32,
    ) -> (Self, LoadReport) {
        let mut index = Self::new(related, codes);
        let mut report = LoadReport {
            directories: sources.len(),
            ..Default::default()
        };

        // Header phase
        let headers: Vec<Option<PackageIdentity>> = sources
            .par_iter()
            .map(|source| parse_header(&source.dir, &source.content))
            .collect();

        let mut parsed = Vec::with_capacity(sources.len());
        for (source, header) in sources.iter().zip(headers) {
            let identity = match header {
                Some(identity) => {
                    if !index.identities.register(identity.clone()) {
                        report.duplicates.push(identity.name.clone());
                    }
                    identity
                }
                None => {
                    log::warn!("{} has no EXPORT_NAME, loading it without a name", source.file.display());
                    report.missing_header.push(source.dir.clone());
                    PackageIdentity {
                        name: String::new(),
                        path: source.dir.clone(),
                    }
                }
            };
            parsed.push((source, identity));
        }

        // Body phase
        let ctx = BodyContext {
            identities: &index.identities,
            related: &index.related,
            sim_version,
        };
        let bodies: Vec<(Package, BodyReport)> = parsed
            .par_iter()
            .map(|(source, identity)| parse_body(identity, &source.file, &source.content, ctx))
            .collect();

        for (package, body) in bodies {
            report.skipped_lines += body.skipped_lines;
            if body.aborted_at.is_some() {
                report.aborted.push(package.name.clone());
            }
            log::debug!("Package {}: {} models", package.name, package.models.len());
            index.packages.push(package);
        }
        report.packages = index.packages.len();

        (index, report)
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn package(&self, index: usize) -> Option<&Package> {
        self.packages.get(index)
    }

    pub fn model(&self, model: ModelRef) -> Option<&Model> {
        self.packages.get(model.package)?.models.get(model.model)
    }

    /// Index of the package with this export name
    pub fn find_package(&self, name: &str) -> Option<usize> {
        self.packages.iter().position(|package| package.name == name)
    }

    pub fn identities(&self) -> &IdentityRegistry {
        &self.identities
    }

    pub fn related(&self) -> &RelatedTypes {
        &self.related
    }

    pub fn codes(&self) -> &AircraftCodes {
        &self.codes
    }

    pub fn model_count(&self) -> usize {
        self.packages.iter().map(|package| package.models.len()).sum()
    }

    /// Every model reference in load order
    pub fn model_refs(&self) -> impl Iterator<Item = ModelRef> + '_ {
        self.packages.iter().enumerate().flat_map(|(p, package)| {
            (0..package.models.len()).map(move |m| ModelRef { package: p, model: m })
        })
    }

    /// Number legacy models from 1 in load order.
    ///
    /// Returns the file list the host must load into its aircraft slots;
    /// slot 0 is the user's own aircraft and is left empty.
    pub fn assign_legacy_indices(&mut self) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::new()];
        for model in self.packages.iter_mut().flat_map(|p| p.models.iter_mut()) {
            if model.kind == ModelKind::Legacy {
                model.legacy_index = Some(paths.len() as u32);
                paths.push(model.path.clone());
            }
        }
        paths
    }

    /// Queue geometry for every model so load failures show up before matching.
    pub fn request_all(&self, loader: &mut AssetLoader) -> usize {
        self.packages
            .iter()
            .flat_map(|package| package.models.iter())
            .map(|model| loader.request_model(model))
            .sum()
    }

    /// Log everything the index knows
    pub fn dump(&self) {
        for (n, package) in self.packages.iter().enumerate() {
            log::info!("CSL package {} = {} ({})", n, package.name, package.path.display());
            for (m, model) in package.models.iter().enumerate() {
                log::info!(
                    "    model {} = {} [{:?}] {}",
                    m,
                    model.name,
                    model.kind,
                    model.path.display()
                );
            }
            for level in MatchLevel::ALL {
                log::info!("    table {:?}", level);
                for (key, model) in package.table(level) {
                    log::info!("        {} -> {}", key, model);
                }
            }
        }
    }
}

/// Subdirectories of `root` that carry a descriptor, sorted by name
fn read_descriptors(root: &Path, file_name: &str) -> Vec<DescriptorSource> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Could not read CSL folder {}: {}", root.display(), e);
            return Vec::new();
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            !path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with('.'))
        })
        .collect();
    dirs.sort();

    dirs.into_par_iter()
        .filter_map(|dir| {
            let file = dir.join(file_name);
            match std::fs::read_to_string(&file) {
                Ok(content) => Some(DescriptorSource { dir, file, content }),
                Err(e) => {
                    log::debug!("No descriptor in {}: {}", dir.display(), e);
                    None
                }
            }
        })
        .collect()
}

//! Resolve an aircraft identity to the best available model
//!
//! Six keyed levels are tried best to worst, each across all packages in
//! load order. If none hits, models are compared by equipment and weight
//! category, and finally the default type is tried once.

use crate::csl::index::PackageIndex;
use crate::csl::package::{MatchLevel, ModelKind, ModelRef};
use crate::csl::reference::AircraftCodeEntry;

/// How a model was found
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchSource {
    /// Keyed table hit
    Table(MatchLevel),
    /// Equipment/category fallback pass 1..=5
    Equipment(u8),
}

/// A successful match
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchResult {
    pub model: ModelRef,
    pub source: MatchSource,
    /// The winning level discriminated on airline or livery
    pub livery_accurate: bool,
    /// Found only through the default type
    pub used_default: bool,
}

impl MatchResult {
    pub fn level(&self) -> Option<MatchLevel> {
        match self.source {
            MatchSource::Table(level) => Some(level),
            MatchSource::Equipment(_) => None,
        }
    }
}

/// Read-only matcher over a loaded index
#[derive(Clone, Copy)]
pub struct ModelMatcher<'a> {
    index: &'a PackageIndex,
    default_icao: &'a str,
    host_model_count: usize,
}

impl<'a> ModelMatcher<'a> {
    pub fn new(index: &'a PackageIndex, default_icao: &'a str) -> Self {
        Self {
            index,
            default_icao,
            host_model_count: 0,
        }
    }

    /// Number of aircraft slots the host has loaded; legacy models above it are skipped.
    pub fn with_host_model_count(mut self, count: usize) -> Self {
        self.host_model_count = count;
        self
    }

    fn usable(&self, model: ModelRef) -> bool {
        self.index
            .model(model)
            .is_some_and(|m| m.is_usable(self.host_model_count))
    }

    /// Find the best model for an identity.
    ///
    /// # Arguments
    /// * `icao` - ICAO aircraft type
    /// * `airline` - Operator code, may be empty
    /// * `livery` - Livery code, may be empty
    /// * `allow_default` - Retry once with the default type if nothing matches
    pub fn match_model(
        &self,
        icao: &str,
        airline: &str,
        livery: &str,
        allow_default: bool,
    ) -> Option<MatchResult> {
        let group = self.index.related().group_of(icao);
        log::debug!(
            "Matching icao={} airline={} livery={} group={}",
            icao,
            airline,
            livery,
            group
        );

        if let Some(result) = self.match_tables(icao, group, airline, livery) {
            return Some(result);
        }

        if let Some(result) = self.match_equipment(icao) {
            return Some(result);
        }

        if !allow_default || icao == self.default_icao {
            log::debug!("No model for {}", icao);
            return None;
        }

        self.match_model(self.default_icao, "", "", false)
            .map(|result| MatchResult {
                used_default: true,
                ..result
            })
    }

    fn match_tables(&self, icao: &str, group: &str, airline: &str, livery: &str) -> Option<MatchResult> {
        for level in MatchLevel::ALL {
            let key = level.key(icao, group, airline, livery);
            log::trace!("  level {:?} key '{}'", level, key);

            for (p, package) in self.index.packages().iter().enumerate() {
                let Some((m, model)) = package.lookup(level, &key) else {
                    continue;
                };
                if model.is_usable(self.host_model_count) {
                    log::debug!("  found {} at {:?}", model.name, level);
                    return Some(MatchResult {
                        model: ModelRef { package: p, model: m },
                        source: MatchSource::Table(level),
                        livery_accurate: level.uses_livery() || level.uses_airline(),
                        used_default: false,
                    });
                }
            }
        }
        None
    }

    /// Compare the wanted type's equipment against every ICAO-keyed model.
    fn match_equipment(&self, icao: &str) -> Option<MatchResult> {
        let wanted = self.index.codes().get(icao)?;
        log::debug!(
            "  looking for category {} equipment {}",
            wanted.category,
            wanted.equipment.as_str()
        );

        for pass in 1..=5u8 {
            for (p, package) in self.index.packages().iter().enumerate() {
                for (candidate_icao, &m) in package.table(MatchLevel::Icao) {
                    let model = ModelRef { package: p, model: m };
                    if !self.usable(model) {
                        continue;
                    }
                    let Some(candidate) = self.index.codes().get(candidate_icao) else {
                        continue;
                    };
                    if equipment_matches(pass, wanted, candidate) {
                        log::debug!("  equipment pass {} found {}", pass, candidate_icao);
                        return Some(MatchResult {
                            model,
                            source: MatchSource::Equipment(pass),
                            livery_accurate: false,
                            used_default: false,
                        });
                    }
                }
            }
        }
        None
    }

    /// True if some model matches without the default type
    pub fn is_icao_valid(&self, icao: &str) -> bool {
        self.match_model(icao, "", "", false).is_some()
    }

    /// Kind of the model a result points at
    pub fn kind_of(&self, result: &MatchResult) -> Option<ModelKind> {
        self.index.model(result.model).map(|m| m.kind)
    }
}

/// Pass 1 full code, 2 count and type, 3 count, 4 type, 5 category only.
/// Passes 1..=4 need a complete code on the candidate.
fn equipment_matches(pass: u8, wanted: &AircraftCodeEntry, candidate: &AircraftCodeEntry) -> bool {
    if candidate.category != wanted.category {
        return false;
    }
    if pass == 5 {
        return true;
    }
    if !candidate.equipment.is_complete() {
        return false;
    }
    if matches!(pass, 1 | 2 | 4) && candidate.equipment.engine_type() != wanted.equipment.engine_type() {
        return false;
    }
    if pass <= 3 && candidate.equipment.engine_count() != wanted.equipment.engine_count() {
        return false;
    }
    if pass == 1 && candidate.equipment != wanted.equipment {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::store::AssetHandle;
    use crate::csl::index::DescriptorSource;
    use crate::csl::reference::{AircraftCodes, RelatedTypes};
    use std::path::PathBuf;

    fn index(descriptors: &[(&str, &str)], related: &str, codes: &str) -> PackageIndex {
        let sources = descriptors
            .iter()
            .map(|(dir, content)| DescriptorSource {
                dir: PathBuf::from(dir),
                file: PathBuf::from(dir).join("xsb_aircraft.txt"),
                content: content.to_string(),
            })
            .collect();
        PackageIndex::from_sources(
            sources,
            RelatedTypes::parse(related),
            AircraftCodes::parse(codes),
            1100,
        )
        .0
    }

    fn model_name(index: &PackageIndex, result: Option<MatchResult>) -> Option<String> {
        result.and_then(|r| index.model(r.model)).map(|m| m.name.clone())
    }

    #[test]
    fn test_airline_beats_icao() {
        let index = index(
            &[("/p", "EXPORT_NAME P\nOBJECT P:a.obj\nICAO B738\nOBJECT P:b.obj\nAIRLINE B738 DAL\n")],
            "",
            "",
        );
        let matcher = ModelMatcher::new(&index, "A320");

        let dal = matcher.match_model("B738", "DAL", "", true).unwrap();
        assert_eq!(model_name(&index, Some(dal)).as_deref(), Some("P/b.obj"));
        assert_eq!(dal.level(), Some(MatchLevel::IcaoAirline));
        assert!(dal.livery_accurate);

        let plain = matcher.match_model("B738", "", "", true).unwrap();
        assert_eq!(model_name(&index, Some(plain)).as_deref(), Some("P/a.obj"));
        assert_eq!(plain.level(), Some(MatchLevel::Icao));
        assert!(!plain.livery_accurate);
    }

    #[test]
    fn test_level_beats_package_order() {
        let index = index(
            &[
                ("/a", "EXPORT_NAME A\nOBJECT A:generic.obj\nICAO B738\n"),
                ("/b", "EXPORT_NAME B\nOBJECT B:dal.obj\nLIVERY B738 DAL N1\n"),
            ],
            "",
            "",
        );
        let matcher = ModelMatcher::new(&index, "A320");
        let result = matcher.match_model("B738", "DAL", "N1", false).unwrap();
        assert_eq!(result.model, ModelRef { package: 1, model: 0 });
        assert_eq!(result.level(), Some(MatchLevel::IcaoAirlineLivery));
    }

    #[test]
    fn test_package_order_within_level() {
        let index = index(
            &[
                ("/a", "EXPORT_NAME A\nOBJECT A:x.obj\nICAO C172\n"),
                ("/b", "EXPORT_NAME B\nOBJECT B:y.obj\nICAO C172\n"),
            ],
            "",
            "",
        );
        let matcher = ModelMatcher::new(&index, "A320");
        assert_eq!(matcher.match_model("C172", "", "", false).unwrap().model.package, 0);
    }

    #[test]
    fn test_group_match() {
        let index = index(
            &[("/a", "EXPORT_NAME A\nOBJECT A:x.obj\nAIRLINE B737 UAL\n")],
            "B736 B737 B738\n",
            "",
        );
        let matcher = ModelMatcher::new(&index, "A320");
        let result = matcher.match_model("B738", "UAL", "", false).unwrap();
        assert_eq!(result.level(), Some(MatchLevel::GroupAirline));
        assert!(result.livery_accurate);
    }

    #[test]
    fn test_failed_geometry_skipped() {
        let index = index(
            &[
                ("/a", "EXPORT_NAME A\nOBJECT A:broken.obj\nICAO C172\n"),
                ("/b", "EXPORT_NAME B\nOBJECT B:ok.obj\nICAO C172\n"),
            ],
            "",
            "",
        );
        index.packages()[0].models[0].geometry.resolve(AssetHandle::FAILED);
        let matcher = ModelMatcher::new(&index, "A320");
        assert_eq!(matcher.match_model("C172", "", "", false).unwrap().model.package, 1);
    }

    #[test]
    fn test_legacy_needs_loaded_slot() {
        let mut index = index(
            &[("/a", "EXPORT_NAME A\nAIRCRAFT 0 2000 A:c172.acf\nICAO C172\n")],
            "",
            "",
        );
        assert!(ModelMatcher::new(&index, "A320").match_model("C172", "", "", false).is_none());

        index.assign_legacy_indices();
        let matcher = ModelMatcher::new(&index, "A320");
        assert!(matcher.match_model("C172", "", "", false).is_none());
        let matcher = matcher.with_host_model_count(2);
        let result = matcher.match_model("C172", "", "", false).unwrap();
        assert_eq!(matcher.kind_of(&result), Some(ModelKind::Legacy));
    }

    #[test]
    fn test_equipment_pass_three() {
        let codes = "BOEING\t737-800\tB738\t2J_\tM\n\
                     FOKKER\tF100\tF100\t2T_\tM\n\
                     CESSNA\t172\tC172\t1P_\tL\n";
        let index = index(
            &[("/a", "EXPORT_NAME A\nOBJECT A:c172.obj\nICAO C172\nOBJECT A:f100.obj\nICAO F100\n")],
            "",
            codes,
        );
        let matcher = ModelMatcher::new(&index, "A320");
        let result = matcher.match_model("B738", "", "", false).unwrap();
        assert_eq!(result.source, MatchSource::Equipment(3));
        assert_eq!(model_name(&index, Some(result)).as_deref(), Some("A/f100.obj"));
        assert!(!result.livery_accurate);
    }

    #[test]
    fn test_equipment_exact_first() {
        let codes = "X\tA\tA320\tL2J\tM\nX\tB\tB738\tL2J\tM\nX\tC\tCRJ9\tL2J\tM\n";
        let index = index(
            &[("/a", "EXPORT_NAME A\nOBJECT A:crj.obj\nICAO CRJ9\n")],
            "",
            codes,
        );
        let result = ModelMatcher::new(&index, "ZZZZ").match_model("B738", "", "", true).unwrap();
        assert_eq!(result.source, MatchSource::Equipment(1));
    }

    #[test]
    fn test_category_only_pass() {
        let codes = "X\tA\tB744\tL4J\tH\nX\tB\tC5\t-\tH\n";
        let index = index(&[("/a", "EXPORT_NAME A\nOBJECT A:c5.obj\nICAO C5\n")], "", codes);
        let result = ModelMatcher::new(&index, "ZZZZ").match_model("B744", "", "", false).unwrap();
        assert_eq!(result.source, MatchSource::Equipment(5));
    }

    #[test]
    fn test_default_fallback_once() {
        let index = index(&[("/a", "EXPORT_NAME A\nOBJECT A:a320.obj\nICAO A320\n")], "", "");
        let matcher = ModelMatcher::new(&index, "A320");

        let result = matcher.match_model("ZZZZ", "XYZ", "L1", true).unwrap();
        assert!(result.used_default);
        assert!(!result.livery_accurate);
        assert!(matcher.match_model("ZZZZ", "", "", false).is_none());
        assert!(!matcher.is_icao_valid("ZZZZ"));
        assert!(matcher.is_icao_valid("A320"));

        let missing_default = ModelMatcher::new(&index, "B744");
        assert!(missing_default.match_model("ZZZZ", "", "", true).is_none());
    }

    #[test]
    fn test_match_is_repeatable() {
        let index = index(
            &[
                ("/a", "EXPORT_NAME A\nOBJECT A:1.obj\nICAO B738\nOBJECT A:2.obj\nAIRLINE B738 DAL\n"),
                ("/b", "EXPORT_NAME B\nOBJECT B:1.obj\nLIVERY B738 DAL N1\n"),
            ],
            "B737 B738\n",
            "",
        );
        let matcher = ModelMatcher::new(&index, "A320");
        for query in [("B738", "DAL", "N1"), ("B737", "DAL", ""), ("B738", "", ""), ("XXXX", "", "")] {
            let first = matcher.match_model(query.0, query.1, query.2, true);
            let second = matcher.match_model(query.0, query.1, query.2, true);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_never_returns_worse_level() {
        let index = index(
            &[
                ("/a", "EXPORT_NAME A\nOBJECT A:1.obj\nICAO B738\n"),
                ("/b", "EXPORT_NAME B\nOBJECT B:1.obj\nAIRLINE B738 DAL\n"),
                ("/c", "EXPORT_NAME C\nOBJECT C:1.obj\nLIVERY B738 DAL N1\n"),
            ],
            "",
            "",
        );
        let matcher = ModelMatcher::new(&index, "A320");
        let result = matcher.match_model("B738", "DAL", "N1", false).unwrap();
        for level in MatchLevel::ALL.iter().filter(|l| **l < result.level().unwrap()) {
            let key = level.key("B738", "", "DAL", "N1");
            assert!(index.packages().iter().all(|p| !p.table(*level).contains_key(&key)));
        }
        assert_eq!(result.model.package, 2);
    }
}

//! Related-types and aircraft-code reference tables

use std::collections::HashMap;
use std::path::Path;

use crate::core::{Error, Result};

/// Groups of ICAO types that may stand in for each other
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelatedTypes {
    groups: HashMap<String, String>,
}

impl RelatedTypes {
    /// Each non-`;` line lists mutually related types. The group name is the
    /// space-joined line. A type listed twice belongs to its last line.
    pub fn parse(content: &str) -> Self {
        let mut groups = HashMap::new();
        for line in content.lines().filter(|line| !line.starts_with(';')) {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }
            let group = tokens.join(" ");
            for token in tokens {
                groups.insert(token.to_string(), group.clone());
            }
        }
        Self { groups }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Reference(format!("{}: {}", path.display(), e)))?;
        Ok(Self::parse(&content))
    }

    /// Group of a type, empty if the type is in no group
    pub fn group_of(&self, icao: &str) -> &str {
        self.groups.get(icao).map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Engine layout from an equipment code.
///
/// Codes come in two layouts: `2J_` (count, type, extra) and the ICAO
/// Doc 8643 `L2J` (description, count, type). A leading digit selects the
/// first one.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EquipmentCode(String);

impl EquipmentCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Both engine fields present
    pub fn is_complete(&self) -> bool {
        self.0.chars().count() == 3
    }

    fn char_at(&self, index: usize) -> Option<char> {
        self.0.chars().nth(index)
    }

    fn count_first(&self) -> bool {
        self.char_at(0).is_some_and(|c| c.is_ascii_digit())
    }

    pub fn engine_count(&self) -> Option<char> {
        if !self.is_complete() {
            return None;
        }
        self.char_at(if self.count_first() { 0 } else { 1 })
    }

    pub fn engine_type(&self) -> Option<char> {
        if !self.is_complete() {
            return None;
        }
        self.char_at(if self.count_first() { 1 } else { 2 })
    }
}

/// One row of the aircraft-code table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AircraftCodeEntry {
    pub icao: String,
    pub equipment: EquipmentCode,
    /// Wake turbulence category letter (L, M, H, ...)
    pub category: char,
}

/// ICAO type -> equipment and category
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AircraftCodes {
    entries: HashMap<String, AircraftCodeEntry>,
}

impl AircraftCodes {
    /// Tab-delimited rows; column 3 ICAO, 4 equipment, 5 category.
    /// Shorter rows are skipped and later rows replace earlier ones.
    pub fn parse(content: &str) -> Self {
        let mut entries = HashMap::new();
        for line in content.lines() {
            let columns: Vec<&str> = line
                .split(['\t', '\r', '\n'])
                .filter(|c| !c.is_empty())
                .collect();
            if columns.len() < 5 {
                continue;
            }
            let Some(category) = columns[4].chars().next() else {
                continue;
            };
            let entry = AircraftCodeEntry {
                icao: columns[2].to_string(),
                equipment: EquipmentCode::new(columns[3]),
                category,
            };
            entries.insert(entry.icao.clone(), entry);
        }
        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Reference(format!("{}: {}", path.display(), e)))?;
        Ok(Self::parse(&content))
    }

    pub fn get(&self, icao: &str) -> Option<&AircraftCodeEntry> {
        self.entries.get(icao)
    }

    pub fn insert(&mut self, entry: AircraftCodeEntry) {
        self.entries.insert(entry.icao.clone(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

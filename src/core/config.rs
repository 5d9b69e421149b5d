//! Runtime configuration for the multiplayer renderer

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Meters per nautical mile
pub const METERS_PER_NM: f64 = 1852.0;

/// Feet per statute mile
pub const FEET_PER_MILE: f64 = 5280.0;

/// Top-level configuration, normally read once at startup.
///
/// Every field has a default so partial JSON files are accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiplayerConfig {
    /// ICAO type used when nothing else matches
    pub default_icao: String,
    /// Name of the descriptor file inside each package directory
    pub descriptor_file_name: String,
    /// Host simulator version, gates legacy `AIRCRAFT` lines
    pub sim_version: i32,
    /// Full-detail range in statute miles (scaled by camera zoom)
    pub full_distance_miles: f32,
    /// Maximum number of aircraft drawn at full detail per frame
    pub max_full_count: usize,
    /// Texture resolution setting 0..=5; each step below 5 halves textures once
    pub texture_resolution: u8,
    /// Number of asset worker threads
    pub loader_threads: usize,
    /// Queue geometry for every generic model as soon as the index is built
    pub preload_geometry: bool,
    /// Aircraft beyond this distance are dropped entirely (meters)
    pub max_slot_distance_m: f32,
    /// Altitude difference above which an aircraft does not get a shared slot (feet)
    pub max_slot_altitude_diff_ft: f64,
    /// Bounding radius used for view culling (meters)
    pub cull_radius_m: f32,
    /// Labels are never drawn beyond this distance (meters, before zoom)
    pub max_label_distance_m: f32,
    /// Draw text labels next to aircraft
    pub draw_labels: bool,
}

impl Default for MultiplayerConfig {
    fn default() -> Self {
        Self {
            default_icao: "A320".to_string(),
            descriptor_file_name: "xsb_aircraft.txt".to_string(),
            sim_version: 1100,
            full_distance_miles: 3.0,
            max_full_count: 100,
            texture_resolution: 3,
            loader_threads: 1,
            preload_geometry: true,
            max_slot_distance_m: (40.0 * METERS_PER_NM) as f32,
            max_slot_altitude_diff_ft: 5000.0,
            cull_radius_m: 50.0,
            max_label_distance_m: 5000.0,
            draw_labels: true,
        }
    }
}

impl MultiplayerConfig {
    /// Number of times textures are halved for the configured resolution.
    pub fn texture_derez(&self) -> u8 {
        5u8.saturating_sub(self.texture_resolution.min(5))
    }

    /// Full-detail range in meters for a given camera zoom.
    pub fn full_distance_m(&self, zoom: f32) -> f32 {
        let feet = self.full_distance_miles as f64 * FEET_PER_MILE;
        (feet / 3.2) as f32 * zoom
    }

    /// Save to file (sync)
    pub fn save_sync(&self, path: &Path) -> Result<(), io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, json)
    }

    /// Load from file (sync)
    pub fn load_sync(path: &Path) -> crate::core::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| crate::core::Error::Config(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_derez() {
        let mut config = MultiplayerConfig::default();
        assert_eq!(config.texture_derez(), 2);
        config.texture_resolution = 5;
        assert_eq!(config.texture_derez(), 0);
        config.texture_resolution = 0;
        assert_eq!(config.texture_derez(), 5);
        config.texture_resolution = 9;
        assert_eq!(config.texture_derez(), 0);
    }

    #[test]
    fn test_full_distance_scales_with_zoom() {
        let config = MultiplayerConfig::default();
        let base = config.full_distance_m(1.0);
        assert!((base - 4950.0).abs() < 1.0);
        assert!((config.full_distance_m(2.0) - base * 2.0).abs() < 1.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: MultiplayerConfig =
            serde_json::from_str(r#"{ "max_full_count": 40 }"#).unwrap();
        assert_eq!(config.max_full_count, 40);
        assert_eq!(config.default_icao, "A320");
    }

    #[test]
    fn test_config_persistence() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("cfg").join("multiplayer.json");

        let config = MultiplayerConfig {
            default_icao: "B738".to_string(),
            loader_threads: 2,
            ..Default::default()
        };
        config.save_sync(&path).expect("save failed");

        let loaded = MultiplayerConfig::load_sync(&path).expect("load failed");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_invalid_json() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            MultiplayerConfig::load_sync(&path),
            Err(crate::core::Error::Config(_))
        ));
    }
}

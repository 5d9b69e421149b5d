//! Where geometry and texture bytes come from

use std::path::{Path, PathBuf};

use image::imageops::FilterType;

use crate::asset::obj::{self, Geometry};
use crate::core::{Error, Result};

/// Decoded RGBA8 texture
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Number of times each dimension was halved on load
    pub derez: u8,
    pub rgba: Vec<u8>,
}

/// Loads raw assets. Implementations must be callable from worker threads.
pub trait AssetSource: Send + Sync {
    fn load_geometry(&self, path: &Path) -> Result<Geometry>;

    /// Decode a texture, halving each dimension `derez` times.
    fn load_texture(&self, path: &Path, derez: u8) -> Result<Texture>;

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Reads assets straight from disk
#[derive(Clone, Copy, Debug, Default)]
pub struct FileAssetSource;

impl AssetSource for FileAssetSource {
    fn load_geometry(&self, path: &Path) -> Result<Geometry> {
        obj::load_geometry(path)
    }

    fn load_texture(&self, path: &Path, derez: u8) -> Result<Texture> {
        let decoded = image::open(path).map_err(|e| Error::Texture {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut rgba = decoded.to_rgba8();

        if derez > 0 {
            let shift = u32::from(derez.min(31));
            let width = (rgba.width() >> shift).max(1);
            let height = (rgba.height() >> shift).max(1);
            rgba = image::imageops::resize(&rgba, width, height, FilterType::Triangle);
        }

        Ok(Texture {
            path: path.to_path_buf(),
            width: rgba.width(),
            height: rgba.height(),
            derez,
            rgba: rgba.into_raw(),
        })
    }
}

/// Whether the host lets assets load off the render thread.
///
/// Probed once when the loader is built.
pub trait LoadCapability {
    fn supports_async_load(&self) -> bool;
}

/// Host with background loading support
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadedLoads;

impl LoadCapability for ThreadedLoads {
    fn supports_async_load(&self) -> bool {
        true
    }
}

/// Host that requires loads on the calling thread
#[derive(Clone, Copy, Debug, Default)]
pub struct SynchronousLoads;

impl LoadCapability for SynchronousLoads {
    fn supports_async_load(&self) -> bool {
        false
    }
}

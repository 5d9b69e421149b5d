//! Path-keyed cache of loaded geometry and textures
//!
//! Every key is loaded at most once. A second request for a key that is
//! still being loaded waits for the first one instead of loading again.
//! Texture keys carry the derez level next to the path.

use std::collections::HashMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use crate::asset::obj::Geometry;
use crate::asset::source::Texture;
use crate::core::Result;

/// Dense index into the store, or the failure sentinel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetHandle(i32);

impl AssetHandle {
    /// Load failed; never retried
    pub const FAILED: AssetHandle = AssetHandle(-1);

    pub fn new(id: u32) -> Self {
        Self(id as i32)
    }

    pub fn id(self) -> i32 {
        self.0
    }

    pub fn is_failed(self) -> bool {
        self.0 < 0
    }
}

const SLOT_UNSET: i64 = -3;
const SLOT_PENDING: i64 = -2;
const SLOT_FAILED: i64 = -1;

/// Observed state of a lazy slot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Unset,
    Pending,
    Ready(AssetHandle),
    Failed,
}

/// Lazily resolved handle owned by a model or an attachment.
///
/// Written once by whoever claimed it, read lock-free by the frame path.
#[derive(Debug)]
pub struct AssetSlot(AtomicI64);

impl AssetSlot {
    pub fn new() -> Self {
        Self(AtomicI64::new(SLOT_UNSET))
    }

    pub fn state(&self) -> SlotState {
        match self.0.load(Ordering::Acquire) {
            SLOT_UNSET => SlotState::Unset,
            SLOT_PENDING => SlotState::Pending,
            v if v < 0 => SlotState::Failed,
            v => SlotState::Ready(AssetHandle(v as i32)),
        }
    }

    /// Move from unset to pending. Returns false if someone else got there first.
    pub fn try_claim(&self) -> bool {
        self.0
            .compare_exchange(SLOT_UNSET, SLOT_PENDING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Publish the result of a load
    pub fn resolve(&self, handle: AssetHandle) {
        let value = if handle.is_failed() { SLOT_FAILED } else { handle.0 as i64 };
        self.0.store(value, Ordering::Release);
    }

    /// Handle if the slot holds a successfully loaded asset
    pub fn ready(&self) -> Option<AssetHandle> {
        match self.state() {
            SlotState::Ready(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.state() == SlotState::Failed
    }
}

impl Default for AssetSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters for diagnostics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub geometries: usize,
    pub textures: usize,
    pub failures: usize,
    /// Underlying loads actually performed
    pub loads: usize,
}

#[derive(Clone, Copy, Debug)]
enum Entry {
    Loading,
    Done(AssetHandle),
}

/// Cache key of a namespace; names the file for messages
trait AssetKey: Clone + Eq + Hash {
    fn path(&self) -> &Path;
}

impl AssetKey for PathBuf {
    fn path(&self) -> &Path {
        self
    }
}

/// Textures are cached per resolution, so a full-resolution request never
/// receives a copy decoded at a lower one.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct TextureKey {
    path: PathBuf,
    derez: u8,
}

impl AssetKey for TextureKey {
    fn path(&self) -> &Path {
        &self.path
    }
}

struct NamespaceState<K, T> {
    by_key: HashMap<K, Entry>,
    items: Vec<Arc<T>>,
    failures: usize,
    loads: usize,
}

/// One key namespace with its own lock
struct Namespace<K, T> {
    state: Mutex<NamespaceState<K, T>>,
    finished: Condvar,
}

/// Drops the `Loading` marker of a load that unwound and wakes its waiters,
/// which then load the key themselves.
struct LoadingGuard<'a, K: AssetKey, T> {
    namespace: &'a Namespace<K, T>,
    key: &'a K,
    finished: bool,
}

impl<K: AssetKey, T> Drop for LoadingGuard<'_, K, T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        log::error!("Load of {} panicked", self.key.path().display());
        let mut state = self.namespace.lock();
        state.by_key.remove(self.key);
        drop(state);
        self.namespace.finished.notify_all();
    }
}

impl<K: AssetKey, T> Namespace<K, T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(NamespaceState {
                by_key: HashMap::new(),
                items: Vec::new(),
                failures: 0,
                loads: 0,
            }),
            finished: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, NamespaceState<K, T>> {
        // Loads run unlocked, so a poisoned lock still guards a consistent map
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lookup(&self, key: &K) -> Option<AssetHandle> {
        match self.lock().by_key.get(key) {
            Some(Entry::Done(handle)) => Some(*handle),
            _ => None,
        }
    }

    fn insert(&self, key: K, item: Arc<T>) -> AssetHandle {
        let mut state = self.lock();
        if let Some(Entry::Done(existing)) = state.by_key.get(&key) {
            return *existing;
        }
        let handle = AssetHandle::new(state.items.len() as u32);
        state.items.push(item);
        state.by_key.insert(key, Entry::Done(handle));
        drop(state);
        self.finished.notify_all();
        handle
    }

    fn get(&self, handle: AssetHandle) -> Option<Arc<T>> {
        if handle.is_failed() {
            return None;
        }
        self.lock().items.get(handle.0 as usize).cloned()
    }

    fn get_or_load<F>(&self, key: K, load: F) -> AssetHandle
    where
        F: FnOnce(&Path) -> Result<T>,
    {
        let mut state = self.lock();
        loop {
            match state.by_key.get(&key).copied() {
                Some(Entry::Done(handle)) => return handle,
                Some(Entry::Loading) => {
                    state = self
                        .finished
                        .wait(state)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                }
                None => break,
            }
        }
        state.by_key.insert(key.clone(), Entry::Loading);
        state.loads += 1;
        drop(state);

        let mut guard = LoadingGuard {
            namespace: self,
            key: &key,
            finished: false,
        };
        // The load itself runs unlocked
        let result = load(key.path());
        guard.finished = true;
        drop(guard);

        let mut state = self.lock();
        let handle = match result {
            Ok(item) => {
                let handle = AssetHandle::new(state.items.len() as u32);
                state.items.push(Arc::new(item));
                handle
            }
            Err(e) => {
                log::warn!("Failed to load {}: {}", key.path().display(), e);
                state.failures += 1;
                AssetHandle::FAILED
            }
        };
        state.by_key.insert(key, Entry::Done(handle));
        drop(state);
        self.finished.notify_all();
        handle
    }
}

/// Shared geometry and texture cache
pub struct AssetStore {
    geometry: Namespace<PathBuf, Geometry>,
    textures: Namespace<TextureKey, Texture>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self {
            geometry: Namespace::new(),
            textures: Namespace::new(),
        }
    }

    /// Handle for an already loaded (or failed) geometry path
    pub fn lookup_geometry(&self, path: &Path) -> Option<AssetHandle> {
        self.geometry.lookup(&path.to_path_buf())
    }

    /// Handle for a texture already loaded (or failed) at this derez level
    pub fn lookup_texture(&self, path: &Path, derez: u8) -> Option<AssetHandle> {
        self.textures.lookup(&TextureKey {
            path: path.to_path_buf(),
            derez,
        })
    }

    /// Insert loaded geometry; an existing entry for the path wins and is returned.
    pub fn insert_geometry(&self, path: &Path, geometry: Geometry) -> AssetHandle {
        self.geometry.insert(path.to_path_buf(), Arc::new(geometry))
    }

    /// Insert a decoded texture under its own derez level; an existing entry wins.
    pub fn insert_texture(&self, path: &Path, texture: Texture) -> AssetHandle {
        let key = TextureKey {
            path: path.to_path_buf(),
            derez: texture.derez,
        };
        self.textures.insert(key, Arc::new(texture))
    }

    /// Return the cached handle or run `load` exactly once for this path.
    ///
    /// # Arguments
    /// * `path` - Cache key
    /// * `load` - Called without the lock held, only on a cache miss
    pub fn geometry_or_load<F>(&self, path: &Path, load: F) -> AssetHandle
    where
        F: FnOnce(&Path) -> Result<Geometry>,
    {
        self.geometry.get_or_load(path.to_path_buf(), load)
    }

    /// Texture counterpart of [`AssetStore::geometry_or_load`], keyed by path and derez level
    pub fn texture_or_load<F>(&self, path: &Path, derez: u8, load: F) -> AssetHandle
    where
        F: FnOnce(&Path) -> Result<Texture>,
    {
        let key = TextureKey {
            path: path.to_path_buf(),
            derez,
        };
        self.textures.get_or_load(key, load)
    }

    pub fn geometry(&self, handle: AssetHandle) -> Option<Arc<Geometry>> {
        self.geometry.get(handle)
    }

    pub fn texture(&self, handle: AssetHandle) -> Option<Arc<Texture>> {
        self.textures.get(handle)
    }

    pub fn stats(&self) -> StoreStats {
        let geometry = self.geometry.lock();
        let geometry_stats = (geometry.items.len(), geometry.failures, geometry.loads);
        drop(geometry);
        let textures = self.textures.lock();
        StoreStats {
            geometries: geometry_stats.0,
            textures: textures.items.len(),
            failures: geometry_stats.1 + textures.failures,
            loads: geometry_stats.2 + textures.loads,
        }
    }
}

impl Default for AssetStore {
    fn default() -> Self {
        Self::new()
    }
}

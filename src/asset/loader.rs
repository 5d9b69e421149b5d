//! Bounded background loader for model assets
//!
//! Jobs run FIFO on a small pool. Every job funnels through the
//! [`AssetStore`] so each path is loaded at most once, whether it arrives
//! through the pool or through the synchronous fallback.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;
use tokio::task::{Id, JoinSet};

use crate::asset::obj::insert_before_extension;
use crate::asset::source::{AssetSource, LoadCapability};
use crate::asset::store::{AssetHandle, AssetSlot, AssetStore, SlotState};
use crate::core::config::MultiplayerConfig;
use crate::core::{Error, Result};
use crate::csl::package::{Attachment, Model, ModelKind};

/// Loader settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Pool size
    pub threads: usize,
    /// Texture halvings applied unless full resolution is forced
    pub derez: u8,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { threads: 1, derez: 0 }
    }
}

impl From<&MultiplayerConfig> for LoaderConfig {
    fn from(config: &MultiplayerConfig) -> Self {
        Self {
            threads: config.loader_threads.max(1),
            derez: config.texture_derez(),
        }
    }
}

/// What a job produces
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobKind {
    Geometry,
    BaseTexture,
    LitTexture,
}

/// Texture slots filled from the texture named inside a geometry file
#[derive(Clone, Debug)]
struct EmbeddedTextures {
    base: Arc<AssetSlot>,
    lit: Arc<AssetSlot>,
}

/// A queued load
#[derive(Clone, Debug)]
pub struct LoadJob {
    pub kind: JobKind,
    pub path: PathBuf,
    target: Arc<AssetSlot>,
    embedded: Option<EmbeddedTextures>,
}

impl LoadJob {
    /// Settle every slot this job owns as failed
    fn fail(self) -> JobResult {
        self.target.resolve(AssetHandle::FAILED);
        if let Some(embedded) = &self.embedded {
            embedded.base.resolve(AssetHandle::FAILED);
            embedded.lit.resolve(AssetHandle::FAILED);
        }
        JobResult {
            kind: self.kind,
            path: self.path,
            handle: AssetHandle::FAILED,
        }
    }
}

/// Outcome of one job
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobResult {
    pub kind: JobKind,
    pub path: PathBuf,
    pub handle: AssetHandle,
}

struct Shared {
    store: Arc<AssetStore>,
    source: Arc<dyn AssetSource>,
    derez: u8,
}

impl Shared {
    fn geometry(&self, path: &Path) -> AssetHandle {
        self.store
            .geometry_or_load(path, |p| self.source.load_geometry(p))
    }

    fn texture(&self, path: &Path, derez: u8) -> AssetHandle {
        self.store
            .texture_or_load(path, derez, |p| self.source.load_texture(p, derez))
    }

    fn run(&self, job: LoadJob) -> JobResult {
        let handle = match job.kind {
            JobKind::Geometry => self.geometry(&job.path),
            JobKind::BaseTexture | JobKind::LitTexture => self.texture(&job.path, self.derez),
        };
        job.target.resolve(handle);

        if let Some(embedded) = &job.embedded {
            self.load_embedded(handle, embedded);
        }

        log::trace!("Loaded {:?} {} -> {:?}", job.kind, job.path.display(), handle);
        JobResult {
            kind: job.kind,
            path: job.path,
            handle,
        }
    }

    /// Fill texture slots from the texture the geometry names itself
    fn load_embedded(&self, handle: AssetHandle, embedded: &EmbeddedTextures) {
        let Some(geometry) = self.store.geometry(handle) else {
            embedded.base.resolve(AssetHandle::FAILED);
            embedded.lit.resolve(AssetHandle::FAILED);
            return;
        };

        let base = geometry
            .texture_path()
            .map(|p| self.texture(&p, self.derez))
            .unwrap_or(AssetHandle::FAILED);
        embedded.base.resolve(base);

        let lit = geometry
            .lit_texture_path()
            .filter(|p| self.source.exists(p))
            .map(|p| self.texture(&p, self.derez))
            .unwrap_or(AssetHandle::FAILED);
        embedded.lit.resolve(lit);
    }
}

enum Dispatch {
    Pool {
        request_tx: mpsc::UnboundedSender<LoadJob>,
        result_rx: mpsc::UnboundedReceiver<JobResult>,
        runtime: Runtime,
    },
    Inline {
        completed: VecDeque<JobResult>,
    },
}

/// Asset job queue
pub struct AssetLoader {
    config: LoaderConfig,
    shared: Arc<Shared>,
    dispatch: Dispatch,
    in_flight: Arc<AtomicUsize>,
}

impl AssetLoader {
    /// Create a loader; the capability is probed once here.
    pub fn new(
        config: LoaderConfig,
        store: Arc<AssetStore>,
        source: Arc<dyn AssetSource>,
        capability: &dyn LoadCapability,
    ) -> Result<Self> {
        let shared = Arc::new(Shared {
            store,
            source,
            derez: config.derez,
        });

        let dispatch = if capability.supports_async_load() {
            Self::start_pool(&config, Arc::clone(&shared))?
        } else {
            log::debug!("Async loading unavailable, loading on the calling thread");
            Dispatch::Inline {
                completed: VecDeque::new(),
            }
        };

        Ok(Self {
            config,
            shared,
            dispatch,
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn start_pool(config: &LoaderConfig, shared: Arc<Shared>) -> Result<Dispatch> {
        let threads = config.threads.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(threads)
            .thread_name("csl-loader")
            .build()?;

        let (request_tx, request_rx) = mpsc::unbounded_channel::<LoadJob>();
        let (result_tx, result_rx) = mpsc::unbounded_channel::<JobResult>();

        runtime.spawn(Self::worker_loop(shared, threads, request_rx, result_tx));

        Ok(Dispatch::Pool {
            request_tx,
            result_rx,
            runtime,
        })
    }

    /// Pull jobs FIFO and keep at most `max_concurrent` running
    async fn worker_loop(
        shared: Arc<Shared>,
        max_concurrent: usize,
        mut request_rx: mpsc::UnboundedReceiver<LoadJob>,
        result_tx: mpsc::UnboundedSender<JobResult>,
    ) {
        let mut active = JoinSet::new();
        let mut running: HashMap<Id, LoadJob> = HashMap::new();
        let mut queue: VecDeque<LoadJob> = VecDeque::new();
        let mut open = true;

        loop {
            tokio::select! {
                request = request_rx.recv(), if open => {
                    match request {
                        Some(job) => queue.push_back(job),
                        None => open = false,
                    }
                }

                Some(joined) = active.join_next_with_id(), if !active.is_empty() => {
                    let result = match joined {
                        Ok((id, result)) => {
                            running.remove(&id);
                            Some(result)
                        }
                        Err(e) => {
                            log::error!("Asset load task panicked: {}", e);
                            running.remove(&e.id()).map(LoadJob::fail)
                        }
                    };
                    if let Some(result) = result {
                        let _ = result_tx.send(result);
                    }
                }

                else => {
                    if queue.is_empty() && active.is_empty() {
                        break;
                    }
                }
            }

            while active.len() < max_concurrent {
                let Some(job) = queue.pop_front() else { break };
                let shared = Arc::clone(&shared);
                let task = job.clone();
                let handle = active.spawn_blocking(move || shared.run(task));
                running.insert(handle.id(), job);
            }

            if !open && queue.is_empty() && active.is_empty() {
                break;
            }
        }
    }

    pub fn config(&self) -> LoaderConfig {
        self.config
    }

    pub fn store(&self) -> &Arc<AssetStore> {
        &self.shared.store
    }

    /// True if jobs run on the pool rather than the calling thread
    pub fn is_async(&self) -> bool {
        matches!(self.dispatch, Dispatch::Pool { .. })
    }

    /// Load geometry now, or return the cached handle.
    pub fn load_geometry(&self, path: &Path) -> AssetHandle {
        self.shared.geometry(path)
    }

    /// Load a texture now, or return the cached handle.
    ///
    /// # Arguments
    /// * `path` - Texture file
    /// * `force_full` - Ignore the configured derez
    pub fn load_texture(&self, path: &Path, force_full: bool) -> AssetHandle {
        let derez = if force_full { 0 } else { self.shared.derez };
        self.shared.texture(path, derez)
    }

    /// The lighting-effect texture, loaded once at full resolution
    pub fn load_light_texture(&self, path: &Path) -> AssetHandle {
        self.load_texture(path, true)
    }

    fn enqueue(&mut self, job: LoadJob) -> Result<()> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        match &mut self.dispatch {
            Dispatch::Pool { request_tx, .. } => request_tx.send(job).map_err(|_| {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Error::LoaderShutdown
            }),
            Dispatch::Inline { completed } => {
                completed.push_back(self.shared.run(job));
                Ok(())
            }
        }
    }

    fn enqueue_claimed(&mut self, job: LoadJob) {
        let target = Arc::clone(&job.target);
        if let Err(e) = self.enqueue(job) {
            log::warn!("Dropping load request: {}", e);
            target.resolve(AssetHandle::FAILED);
        }
    }

    /// Queue whatever a model still needs. Returns the number of jobs queued.
    ///
    /// Slots already pending or resolved are left alone, so calling this
    /// every frame for an unready model is cheap.
    pub fn request_model(&mut self, model: &Model) -> usize {
        match model.kind {
            ModelKind::Legacy => 0,
            ModelKind::MultiPart => model
                .attachments
                .iter()
                .map(|attachment| self.request_attachment(attachment))
                .sum(),
            ModelKind::Geometry => self.request_geometry_model(model),
        }
    }

    fn request_geometry_model(&mut self, model: &Model) -> usize {
        let mut queued = 0;
        let explicit_texture = model.texture_path.clone();

        if model.geometry.try_claim() {
            // Without a TEXTURE line the geometry's own texture is used
            let embedded = if explicit_texture.is_none()
                && model.texture.try_claim()
                && model.lit_texture.try_claim()
            {
                Some(EmbeddedTextures {
                    base: Arc::clone(&model.texture),
                    lit: Arc::clone(&model.lit_texture),
                })
            } else {
                None
            };
            self.enqueue_claimed(LoadJob {
                kind: JobKind::Geometry,
                path: model.path.clone(),
                target: Arc::clone(&model.geometry),
                embedded,
            });
            queued += 1;
        }

        if let Some(texture) = explicit_texture {
            if model.texture.try_claim() {
                self.enqueue_claimed(LoadJob {
                    kind: JobKind::BaseTexture,
                    path: texture.clone(),
                    target: Arc::clone(&model.texture),
                    embedded: None,
                });
                queued += 1;
            }

            if model.lit_texture.try_claim() {
                let lit = lit_variant(&texture);
                if self.shared.source.exists(&lit) {
                    self.enqueue_claimed(LoadJob {
                        kind: JobKind::LitTexture,
                        path: lit,
                        target: Arc::clone(&model.lit_texture),
                        embedded: None,
                    });
                    queued += 1;
                } else {
                    model.lit_texture.resolve(AssetHandle::FAILED);
                }
            }
        }

        queued
    }

    /// Queue the geometry of one multi-part attachment
    pub fn request_attachment(&mut self, attachment: &Attachment) -> usize {
        if !attachment.handle.try_claim() {
            return 0;
        }
        self.enqueue_claimed(LoadJob {
            kind: JobKind::Geometry,
            path: attachment.file.clone(),
            target: Arc::clone(&attachment.handle),
            embedded: None,
        });
        1
    }

    /// Drain completed jobs (non-blocking)
    pub fn poll(&mut self) -> Vec<JobResult> {
        let mut results = Vec::new();
        match &mut self.dispatch {
            Dispatch::Pool { result_rx, .. } => {
                while let Ok(result) = result_rx.try_recv() {
                    results.push(result);
                }
            }
            Dispatch::Inline { completed } => results.extend(completed.drain(..)),
        }
        self.in_flight.fetch_sub(results.len(), Ordering::SeqCst);
        results
    }

    /// Jobs queued or running whose results have not been polled yet
    pub fn pending_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Stop accepting jobs and wait for the queue to drain.
    pub fn shutdown(self) {
        if let Dispatch::Pool {
            request_tx, runtime, ..
        } = self.dispatch
        {
            drop(request_tx);
            runtime.shutdown_timeout(std::time::Duration::from_secs(5));
        }
    }
}

/// `body.png` -> `bodyLIT.png`
pub fn lit_variant(path: &Path) -> PathBuf {
    PathBuf::from(insert_before_extension(&path.to_string_lossy(), "LIT"))
}

/// Whether a slot has finished one way or the other
pub fn is_settled(slot: &AssetSlot) -> bool {
    matches!(slot.state(), SlotState::Ready(_) | SlotState::Failed)
}

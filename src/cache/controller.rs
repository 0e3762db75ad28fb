//! Cache Controller Module
//!
//! Install/activate/fetch lifecycle over versioned cache regions.
//!
//! A generation is installed by fetching its whole manifest into a staging
//! set and only then replacing its region, so a failed install leaves the
//! previously active generation untouched. Activation deletes every other
//! region. Fetches are answered cache-first from the active region.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{
    AssetRequest, CacheRegion, CacheStats, CacheStorage, CachedResponse, Destination, Fetcher,
    RequestKey, CACHE_PREFIX, DEFAULT_MANIFEST, ROOT_DOCUMENT,
};
use crate::error::{InventoryError, Result};

// == Generation ==
/// A version tag plus the asset manifest installed for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub version: u32,
    /// Asset paths relative to the asset origin
    pub manifest: Vec<String>,
}

impl Generation {
    pub fn new(version: u32, manifest: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            version,
            manifest: manifest.into_iter().map(Into::into).collect(),
        }
    }

    /// The application's static asset manifest.
    pub fn with_default_manifest(version: u32) -> Self {
        Self::new(version, DEFAULT_MANIFEST.iter().copied())
    }

    /// Region name, `inventory-cache-v<N>`.
    pub fn cache_name(&self) -> String {
        format!("{}{}", CACHE_PREFIX, self.version)
    }
}

// == Controller State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    /// Nothing installed yet
    Idle,
    Installing,
    /// Installed, not yet activated
    Waiting,
    Activating,
    Active,
}

// == Cache Controller ==
pub struct CacheController {
    origin: Url,
    storage: Arc<RwLock<CacheStorage>>,
    fetcher: Arc<dyn Fetcher>,
    state: RwLock<ControllerState>,
    active: RwLock<Option<String>>,
    /// Serializes region file writes. Taken before `storage`.
    persist: Mutex<()>,
}

impl CacheController {
    // == Constructor ==
    /// Creates a controller for assets under `origin`.
    ///
    /// When `storage` remembers an activated region it keeps answering
    /// fetches. Regions installed but never activated stay inactive until
    /// the next activation evicts them.
    pub fn new(origin: Url, storage: CacheStorage, fetcher: Arc<dyn Fetcher>) -> Self {
        let active = storage.active_region().map(str::to_string);
        let state = if active.is_some() {
            ControllerState::Active
        } else {
            ControllerState::Idle
        };

        if let Some(name) = &active {
            info!("Resuming with cache region {}", name);
        }

        Self {
            origin,
            storage: Arc::new(RwLock::new(storage)),
            fetcher,
            state: RwLock::new(state),
            active: RwLock::new(active),
            persist: Mutex::new(()),
        }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub async fn state(&self) -> ControllerState {
        *self.state.read().await
    }

    /// Name of the region currently answering fetches.
    pub async fn active_cache(&self) -> Option<String> {
        self.active.read().await.clone()
    }

    /// Names of every region in storage.
    pub async fn cache_names(&self) -> Vec<String> {
        self.storage.read().await.keys()
    }

    pub async fn stats(&self) -> CacheStats {
        let active = self.active_cache().await;
        self.storage.read().await.stats(active.as_deref())
    }

    // == Install ==
    /// Fetches every manifest entry of `generation` and stores them as its
    /// region.
    ///
    /// Any failed or non-2xx fetch aborts with `Install` before anything
    /// is written. Re-installing a generation replaces only its own region.
    pub async fn install(&self, generation: &Generation) -> Result<()> {
        let name = generation.cache_name();
        *self.state.write().await = ControllerState::Installing;
        info!(
            "Installing {} ({} assets)",
            name,
            generation.manifest.len()
        );

        let installed = match self.install_region(generation).await {
            Ok(region) => {
                let _persist = self.persist.lock().await;
                self.storage.write().await.replace_region(region)
            }
            Err(err) => Err(err),
        };

        match installed {
            Ok(()) => {
                *self.state.write().await = ControllerState::Waiting;
                info!("Installed {}", name);
                Ok(())
            }
            Err(err) => {
                let restored = if self.active_cache().await.is_some() {
                    ControllerState::Active
                } else {
                    ControllerState::Idle
                };
                *self.state.write().await = restored;
                warn!("Install of {} failed, keeping previous generation: {}", name, err);
                Err(err)
            }
        }
    }

    async fn install_region(&self, generation: &Generation) -> Result<CacheRegion> {
        let mut staged = Vec::with_capacity(generation.manifest.len());

        for path in &generation.manifest {
            let url = self
                .origin
                .join(path)
                .map_err(|e| InventoryError::Install(format!("{}: {}", path, e)))?;
            let request = AssetRequest::get(url);

            let response = self
                .fetcher
                .fetch(&request)
                .await
                .map_err(|e| InventoryError::Install(format!("{}: {}", path, e)))?;
            if !response.is_success() {
                return Err(InventoryError::Install(format!(
                    "{} returned status {}",
                    path, response.status
                )));
            }

            debug!("Staged {}", request.url);
            staged.push((request.key(), response));
        }

        Ok(CacheRegion::new(
            generation.cache_name(),
            generation.version,
            staged,
        ))
    }

    // == Activate ==
    /// Makes `generation` the active region and deletes every other region.
    ///
    /// Returns the names of the deleted regions.
    pub async fn activate(&self, generation: &Generation) -> Result<Vec<String>> {
        let name = generation.cache_name();
        let _persist = self.persist.lock().await;
        let mut storage = self.storage.write().await;

        if !storage.has(&name) {
            return Err(InventoryError::Install(format!("{} is not installed", name)));
        }
        storage.set_active(&name)?;

        *self.state.write().await = ControllerState::Activating;

        let stale: Vec<String> = storage.keys().into_iter().filter(|key| *key != name).collect();
        for key in &stale {
            storage.delete(key)?;
            info!("Deleted old cache region {}", key);
        }
        storage.stats_mut().record_evictions(stale.len());

        // Switched while the storage lock is held so no fetch writes into a
        // deleted region
        *self.active.write().await = Some(name.clone());
        *self.state.write().await = ControllerState::Active;

        info!("Activated {}", name);
        Ok(stale)
    }

    /// Installs then activates `generation`.
    pub async fn deploy(&self, generation: &Generation) -> Result<Vec<String>> {
        self.install(generation).await?;
        self.activate(generation).await
    }

    // == Fetch ==
    /// Answers an intercepted request.
    ///
    /// Cross-origin requests, non-GET requests and requests made before any
    /// generation is active go straight to the network. Otherwise the active
    /// region is tried first, then the network (storing 2xx responses), then
    /// the degraded fallbacks.
    pub async fn handle_fetch(&self, request: AssetRequest) -> Result<CachedResponse> {
        if request.url.origin() != self.origin.origin() {
            debug!("Passing through cross-origin {}", request.url);
            return self.fetcher.fetch(&request).await;
        }

        let Some(active) = self.active_cache().await else {
            debug!("No active cache, passing through {}", request.url);
            return self.fetcher.fetch(&request).await;
        };

        if !request.is_get() {
            return self.fetcher.fetch(&request).await;
        }

        let key = request.key();
        if let Some(hit) = self.storage.write().await.match_request(&active, &key) {
            debug!("Cache hit {}", request.url);
            return Ok(hit);
        }

        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                if response.is_success() {
                    self.write_through(&active, key, response.clone()).await;
                }
                Ok(response)
            }
            Err(err) => self.fallback(&active, &request, err).await,
        }
    }

    /// Stores a fetched response in region `active`.
    ///
    /// The entry is staged under the storage lock, written to disk without
    /// it, and only then made visible. A failed write leaves the region as
    /// it was.
    async fn write_through(&self, active: &str, key: RequestKey, response: CachedResponse) {
        let _persist = self.persist.lock().await;

        let pending = {
            let storage = self.storage.read().await;
            // Activation may have moved on while the fetch was in flight
            if self.active_cache().await.as_deref() != Some(active) {
                return;
            }
            storage.stage_put(active, key, response)
        };
        let Some(mut pending) = pending else {
            return;
        };

        if let Err(err) = pending.persist().await {
            warn!("Could not cache entry in {}: {}", active, err);
            return;
        }
        self.storage.write().await.commit_put(pending);
    }

    async fn fallback(
        &self,
        active: &str,
        request: &AssetRequest,
        err: InventoryError,
    ) -> Result<CachedResponse> {
        match request.destination {
            Destination::Document => {
                let root = self
                    .origin
                    .join(ROOT_DOCUMENT)
                    .map_err(|e| InventoryError::Internal(e.to_string()))?;
                let mut storage = self.storage.write().await;
                if let Some(document) = storage.peek(active, &RequestKey::get(&root)).cloned() {
                    storage.stats_mut().record_fallback();
                    warn!("Offline, serving cached {} for {}", ROOT_DOCUMENT, request.url);
                    return Ok(document);
                }
            }
            Destination::Image => {
                self.storage.write().await.stats_mut().record_fallback();
                warn!("Offline, serving placeholder for {}", request.url);
                return Ok(CachedResponse::placeholder_image());
            }
            Destination::Other => {}
        }

        Err(err)
    }
}

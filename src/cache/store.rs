//! Cache Storage Module
//!
//! Named cache regions, one per generation. Regions optionally persist to a
//! directory as `<name>.json` so a restarted process can keep serving
//! offline.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, CachedResponse, RequestKey};
use crate::error::{InventoryError, Result};

// == Cache Region ==
/// The cached responses of one generation.
#[derive(Debug, Clone)]
pub struct CacheRegion {
    pub name: String,
    pub generation: u32,
    pub installed_at: DateTime<Utc>,
    entries: HashMap<RequestKey, CachedResponse>,
}

impl CacheRegion {
    pub fn new(
        name: impl Into<String>,
        generation: u32,
        entries: impl IntoIterator<Item = (RequestKey, CachedResponse)>,
    ) -> Self {
        Self {
            name: name.into(),
            generation,
            installed_at: Utc::now(),
            entries: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, key: &RequestKey) -> Option<&CachedResponse> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// On-disk shape of a region.
#[derive(Debug, Serialize, Deserialize)]
struct RegionFile {
    name: String,
    generation: u32,
    installed_at: DateTime<Utc>,
    entries: Vec<StoredEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: RequestKey,
    response: CachedResponse,
}

impl From<&CacheRegion> for RegionFile {
    fn from(region: &CacheRegion) -> Self {
        Self {
            name: region.name.clone(),
            generation: region.generation,
            installed_at: region.installed_at,
            entries: region
                .entries
                .iter()
                .map(|(key, response)| StoredEntry {
                    key: key.clone(),
                    response: response.clone(),
                })
                .collect(),
        }
    }
}

impl From<RegionFile> for CacheRegion {
    fn from(file: RegionFile) -> Self {
        Self {
            name: file.name,
            generation: file.generation,
            installed_at: file.installed_at,
            entries: file
                .entries
                .into_iter()
                .map(|entry| (entry.key, entry.response))
                .collect(),
        }
    }
}

/// File in the storage directory naming the active region
const ACTIVE_MARKER: &str = "active";

// == Pending Write ==
/// A write-through staged under the storage lock and committed after its
/// region file has been written.
#[derive(Debug)]
pub struct PendingPut {
    region: String,
    installed_at: DateTime<Utc>,
    key: RequestKey,
    response: CachedResponse,
    /// Region snapshot including the new entry, None = memory only
    snapshot: Option<(PathBuf, RegionFile)>,
}

impl PendingPut {
    /// Writes the region snapshot to disk. Runs without the storage lock.
    pub async fn persist(&mut self) -> Result<()> {
        let Some((path, file)) = self.snapshot.take() else {
            return Ok(());
        };

        let contents = tokio::task::spawn_blocking(move || serde_json::to_vec(&file))
            .await
            .map_err(|e| InventoryError::Internal(format!("Region encoding task failed: {}", e)))?
            .map_err(|e| InventoryError::Internal(e.to_string()))?;

        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, contents)
            .await
            .map_err(|e| storage_error(&staging, e))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|e| storage_error(&path, e))
    }
}

// == Cache Storage ==
/// All cache regions plus the controller's statistics.
#[derive(Debug, Default)]
pub struct CacheStorage {
    regions: HashMap<String, CacheRegion>,
    /// Region answering fetches, survives restarts when persisted
    active: Option<String>,
    /// Directory regions are persisted to, None = memory only
    dir: Option<PathBuf>,
    stats: CacheStats,
}

impl CacheStorage {
    // == Constructors ==
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens storage backed by `dir`, loading every region found there.
    ///
    /// Unreadable region files are skipped with a warning.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| storage_error(&dir, e))?;

        let mut regions = HashMap::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| storage_error(&dir, e))? {
            let path = entry.map_err(|e| storage_error(&dir, e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            match load_region(&path) {
                Ok(region) => {
                    debug!("Loaded cache region {} ({} entries)", region.name, region.len());
                    regions.insert(region.name.clone(), region);
                }
                Err(err) => warn!("Skipping cache region file {}: {}", path.display(), err),
            }
        }

        let active = match std::fs::read_to_string(dir.join(ACTIVE_MARKER)) {
            Ok(name) => Some(name.trim().to_string()).filter(|name| regions.contains_key(name)),
            Err(_) => None,
        };

        info!(
            "Cache storage opened with {} regions, active: {:?}",
            regions.len(),
            active
        );
        Ok(Self {
            regions,
            active,
            dir: Some(dir),
            stats: CacheStats::new(),
        })
    }

    // == Regions ==
    /// Names of all regions, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.regions.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn has(&self, name: &str) -> bool {
        self.regions.contains_key(name)
    }

    pub fn region(&self, name: &str) -> Option<&CacheRegion> {
        self.regions.get(name)
    }

    /// The region last marked active, if it still exists.
    pub fn active_region(&self) -> Option<&str> {
        self.active
            .as_deref()
            .filter(|name| self.regions.contains_key(*name))
    }

    /// Marks `name` as the active region and records it next to the region
    /// files.
    pub fn set_active(&mut self, name: &str) -> Result<()> {
        if let Some(dir) = &self.dir {
            let path = dir.join(ACTIVE_MARKER);
            std::fs::write(&path, name).map_err(|e| storage_error(&path, e))?;
        }
        self.active = Some(name.to_string());
        Ok(())
    }

    /// Installs `region`, replacing any region of the same name wholesale.
    pub fn replace_region(&mut self, region: CacheRegion) -> Result<()> {
        self.persist(&region)?;
        debug!("Stored cache region {} ({} entries)", region.name, region.len());
        self.regions.insert(region.name.clone(), region);
        Ok(())
    }

    /// Removes region `name`. Returns whether it existed.
    pub fn delete(&mut self, name: &str) -> Result<bool> {
        let existed = self.regions.remove(name).is_some();
        if let Some(dir) = &self.dir {
            let path = region_path(dir, name);
            if path.exists() {
                std::fs::remove_file(&path).map_err(|e| storage_error(&path, e))?;
            }
        }
        Ok(existed)
    }

    // == Entries ==
    /// Looks up `key` in region `name`, recording a hit or miss.
    pub fn match_request(&mut self, name: &str, key: &RequestKey) -> Option<CachedResponse> {
        let found = self
            .regions
            .get(name)
            .and_then(|region| region.get(key))
            .cloned();

        if found.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        found
    }

    /// Looks up `key` without touching the statistics.
    pub fn peek(&self, name: &str, key: &RequestKey) -> Option<&CachedResponse> {
        self.regions.get(name).and_then(|region| region.get(key))
    }

    /// Stages one entry for an existing region.
    ///
    /// Returns None when the region does not exist, so a region deleted
    /// mid-fetch is never recreated. Nothing changes until
    /// [`CacheStorage::commit_put`].
    pub fn stage_put(
        &self,
        name: &str,
        key: RequestKey,
        response: CachedResponse,
    ) -> Option<PendingPut> {
        let region = self.regions.get(name)?;

        let snapshot = self.dir.as_ref().map(|dir| {
            let mut file = RegionFile::from(region);
            file.entries.retain(|entry| entry.key != key);
            file.entries.push(StoredEntry {
                key: key.clone(),
                response: response.clone(),
            });
            (region_path(dir, name), file)
        });

        Some(PendingPut {
            region: name.to_string(),
            installed_at: region.installed_at,
            key,
            response,
            snapshot,
        })
    }

    /// Applies a persisted write-through to memory.
    ///
    /// Returns false when the region was deleted or reinstalled since the
    /// write was staged.
    pub fn commit_put(&mut self, pending: PendingPut) -> bool {
        let Some(region) = self.regions.get_mut(&pending.region) else {
            return false;
        };
        if region.installed_at != pending.installed_at {
            return false;
        }

        region.entries.insert(pending.key, pending.response);
        self.stats.record_store();
        true
    }

    // == Stats ==
    pub fn stats_mut(&mut self) -> &mut CacheStats {
        &mut self.stats
    }

    /// Current statistics with `total_entries` counted in region `active`.
    pub fn stats(&self, active: Option<&str>) -> CacheStats {
        let mut stats = self.stats.clone();
        let total = active
            .and_then(|name| self.regions.get(name))
            .map(CacheRegion::len)
            .unwrap_or(0);
        stats.set_total_entries(total);
        stats
    }

    fn persist(&self, region: &CacheRegion) -> Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };

        let path = region_path(dir, &region.name);
        let contents = serde_json::to_string(&RegionFile::from(region))
            .map_err(|e| InventoryError::Internal(e.to_string()))?;
        std::fs::write(&path, contents).map_err(|e| storage_error(&path, e))
    }
}

fn region_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.json", name))
}

fn load_region(path: &Path) -> anyhow::Result<CacheRegion> {
    let contents = std::fs::read_to_string(path)?;
    let file: RegionFile = serde_json::from_str(&contents)?;
    Ok(file.into())
}

fn storage_error(path: &Path, err: std::io::Error) -> InventoryError {
    InventoryError::Storage(format!("{}: {}", path.display(), err))
}

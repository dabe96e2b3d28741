use crate::constants::{DEPOT_CACHE_DIR, PLUGIN_DIR};
use crate::error::{PipelineError, Result};
use crate::pipeline::decoder::{CachedManifest, DecodedArtifact};
use crate::types::{AppId, ConfigEntry, ManifestMode, ManifestRecord};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Decoded output of one app id's run, waiting to be persisted.
///
/// The orchestrator builds a fresh staging set per app id.
#[derive(Debug, Default)]
pub struct RecordStaging {
    records: BTreeMap<u32, ManifestRecord>,
    manifests: BTreeMap<String, Vec<u8>>,
}

impl RecordStaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one artifact's records; later artifacts win per depot.
    pub fn absorb(&mut self, decoded: DecodedArtifact) {
        for record in decoded.records {
            self.merge(record);
        }
        if let Some(CachedManifest { file_name, bytes }) = decoded.cached_manifest {
            self.manifests.insert(file_name, bytes);
        }
    }

    pub fn merge(&mut self, record: ManifestRecord) {
        match self.records.get_mut(&record.depot_id) {
            Some(existing) => existing.merge(record),
            None => {
                self.records.insert(record.depot_id, record);
            }
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.manifests.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> Vec<ManifestRecord> {
        self.records.values().cloned().collect()
    }

    pub fn manifests(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.manifests.iter().map(|(n, b)| (n.as_str(), b.as_slice()))
    }
}

/// Writes config entries and depot manifests into the client install.
#[derive(Debug, Clone)]
pub struct ConfigAggregator {
    plugin_dir: PathBuf,
    depot_cache_dir: PathBuf,
}

impl ConfigAggregator {
    pub fn for_client(client_dir: &Path) -> Self {
        Self {
            plugin_dir: client_dir.join(PLUGIN_DIR),
            depot_cache_dir: client_dir.join(DEPOT_CACHE_DIR),
        }
    }

    pub fn entry_path(&self, app_id: &AppId) -> PathBuf {
        self.plugin_dir.join(format!("{}.lua", app_id))
    }

    pub fn depot_cache_dir(&self) -> &Path {
        &self.depot_cache_dir
    }

    /// Replaces the entry for `app_id` with exactly `records`.
    pub fn persist(
        &self,
        app_id: &AppId,
        display_name: Option<&str>,
        records: &[ManifestRecord],
        fixed: bool,
    ) -> Result<PathBuf> {
        let mut merged = RecordStaging::new();
        for record in records {
            merged.merge(record.clone());
        }
        let entry = ConfigEntry {
            app_id: app_id.clone(),
            display_name: display_name.map(str::to_string),
            records: merged.records(),
            mode: ManifestMode::from_flag(fixed),
        };
        self.write_entry(&entry)
    }

    /// Persists a staged run: depot manifests first, then the entry.
    pub fn persist_staged(
        &self,
        app_id: &AppId,
        display_name: Option<&str>,
        staging: &RecordStaging,
        fixed: bool,
    ) -> Result<PathBuf> {
        for (file_name, bytes) in staging.manifests() {
            let path = self.depot_cache_dir.join(file_name);
            write_atomic(&path, bytes).map_err(|source| PipelineError::PersistFailure {
                identifier: app_id.to_string(),
                source,
            })?;
            debug!(manifest = %path.display(), "stored depot manifest");
        }
        self.persist(app_id, display_name, &staging.records(), fixed)
    }

    pub fn write_entry(&self, entry: &ConfigEntry) -> Result<PathBuf> {
        let path = self.entry_path(&entry.app_id);
        write_atomic(&path, render_entry(entry).as_bytes()).map_err(|source| {
            PipelineError::PersistFailure {
                identifier: entry.app_id.to_string(),
                source,
            }
        })?;
        info!("💾 Wrote {} ({} depots)", path.display(), entry.records.len());
        Ok(path)
    }
}

pub fn render_entry(entry: &ConfigEntry) -> String {
    let mut out = String::new();
    let title = entry
        .display_name
        .as_deref()
        .map(|n| n.replace(|c: char| c.is_control(), " "))
        .unwrap_or_else(|| entry.app_id.to_string());
    let _ = writeln!(out, "-- {} ({})", title, entry.mode.as_str());
    let _ = writeln!(out, "addappid({})", entry.app_id);
    for record in &entry.records {
        match &record.decryption_key {
            Some(key) => {
                let _ = writeln!(out, "addappid({}, 1, \"{}\")", record.depot_id, key);
            }
            None => {
                let _ = writeln!(out, "addappid({})", record.depot_id);
            }
        }
    }
    if entry.mode == ManifestMode::Fixed {
        for record in &entry.records {
            if let Some(manifest_id) = &record.manifest_id {
                let _ = writeln!(
                    out,
                    "setManifestid({}, \"{}\", 0)",
                    record.depot_id, manifest_id
                );
            }
        }
    }
    out
}

/// Write to a sibling temp file, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

//! On-disk cache of parsed reports.
//!
//! Entries are keyed by source identifier and validated by a fingerprint of
//! the file text, so an edited report is always re-parsed. The cache file is
//! bincode, compressed with zstd.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::engine::{parse_reports, ParseOptions, ParsedBatch};
use super::schema::ReportSchema;
use super::types::Report;

const COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("cache encoding error: {0}")]
    Codec(#[from] bincode::Error),
}

/// Fingerprint of a report text. `salt` covers parse settings that change
/// the result for identical text.
pub fn fingerprint(text: &str, salt: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    salt.hash(&mut hasher);
    text.len().hash(&mut hasher);
    text.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    fingerprint: u64,
    report: Report,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ReportCache {
    entries: BTreeMap<String, CacheEntry>,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a cache file; a missing file gives an empty cache.
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        let compressed = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e.into()),
        };
        let raw = zstd::stream::decode_all(compressed.as_slice())?;
        let cache: Self = bincode::deserialize(&raw)?;
        log::debug!("Loaded {} cached reports from {}", cache.len(), path.display());
        Ok(cache)
    }

    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        let raw = bincode::serialize(self)?;
        let compressed = zstd::stream::encode_all(raw.as_slice(), COMPRESSION_LEVEL)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, compressed)?;
        log::debug!("Saved {} cached reports to {}", self.len(), path.display());
        Ok(())
    }

    /// Cached report for `source_id`, only if its fingerprint still matches.
    pub fn get(&self, source_id: &str, fingerprint: u64) -> Option<&Report> {
        self.entries
            .get(source_id)
            .filter(|e| e.fingerprint == fingerprint)
            .map(|e| &e.report)
    }

    pub fn insert(&mut self, fingerprint: u64, report: Report) {
        self.entries.insert(
            report.source_id().to_string(),
            CacheEntry { fingerprint, report },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse `inputs`, reusing cached reports whose text is unchanged and
    /// storing freshly parsed ones. Entries for files not in `inputs`, or
    /// whose text changed, are dropped.
    pub fn parse_all(
        &mut self,
        inputs: &[(String, String)],
        schema: &ReportSchema,
        options: &ParseOptions,
        salt: &str,
    ) -> ParsedBatch {
        let mut batch = ParsedBatch::default();
        let mut misses = Vec::new();
        let mut fingerprints = BTreeMap::new();

        let current: BTreeSet<&str> = inputs.iter().map(|(id, _)| id.as_str()).collect();
        let before = self.len();
        self.entries.retain(|id, _| current.contains(id.as_str()));
        if self.len() < before {
            log::debug!("Evicted {} stale cache entries", before - self.len());
        }

        for (id, text) in inputs {
            let fp = fingerprint(text, salt);
            match self.get(id, fp) {
                Some(report) => batch.reports.push(report.clone()),
                None => {
                    self.entries.remove(id);
                    fingerprints.insert(id.as_str(), fp);
                    misses.push((id.clone(), text.clone()));
                }
            }
        }
        log::info!("Parse cache: {} hits, {} misses", batch.reports.len(), misses.len());

        let parsed = parse_reports(&misses, schema, options);
        for report in &parsed.reports {
            if let Some(&fp) = fingerprints.get(report.source_id()) {
                self.insert(fp, report.clone());
            }
        }

        batch.reports.extend(parsed.reports);
        batch.failures = parsed.failures;
        batch.reports.sort_by(|a, b| a.source_id().cmp(b.source_id()));
        batch
    }
}

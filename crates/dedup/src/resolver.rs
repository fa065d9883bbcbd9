//! Canonical-id resolution with ordered fallback strategies.

use std::collections::HashMap;

use tracing::{debug, trace};

use lectern_protocol::types::{CatalogEntry, ItemOutcome, TransferItem};

use crate::MaterialsUpdate;

/// How a record was matched during resolution or patching.
///
/// Order is the resolution precedence: the display-name match is an
/// explicit last resort for first-time transfers that carry no hash yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    ContentHash,
    SourceRef,
    DisplayName,
}

/// Cached mapping for one piece of ingested content.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupEntry {
    pub canonical_id: String,
    pub storage_location: String,
}

/// Patch merged into a caller-visible material record.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialPatch {
    pub match_key: String,
    pub strategy: MatchStrategy,
    pub canonical_id: String,
    pub content_hash: String,
    pub storage_location: String,
}

/// Result of resolving an item before ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRef {
    pub canonical_id: String,
    pub storage_location: Option<String>,
    pub strategy: MatchStrategy,
}

/// Resolves transfer items to canonical identifiers.
///
/// The hash cache is append-only: once a content hash maps to a
/// canonical id, the mapping is never reassigned. Reconciled from full
/// catalog pulls on task completion.
#[derive(Debug, Default)]
pub struct DedupResolver {
    /// content hash → canonical entry.
    by_hash: HashMap<String, DedupEntry>,
    /// source ref → content hash, for items seen in an earlier pass.
    by_source: HashMap<String, String>,
}

impl DedupResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves an item to a known canonical id, if any.
    ///
    /// Precedence: (1) known content hash, (2) previously seen source
    /// ref, (3) display-name match against the caller's records.
    pub fn resolve(
        &self,
        item: &TransferItem,
        materials: &dyn MaterialsUpdate,
    ) -> Option<ResolvedRef> {
        if let Some(hash) = &item.content_hash
            && let Some(entry) = self.by_hash.get(hash)
        {
            return Some(ResolvedRef {
                canonical_id: entry.canonical_id.clone(),
                storage_location: Some(entry.storage_location.clone()),
                strategy: MatchStrategy::ContentHash,
            });
        }

        if let Some(hash) = self.by_source.get(&item.source_ref)
            && let Some(entry) = self.by_hash.get(hash)
        {
            return Some(ResolvedRef {
                canonical_id: entry.canonical_id.clone(),
                storage_location: Some(entry.storage_location.clone()),
                strategy: MatchStrategy::SourceRef,
            });
        }

        let key = materials.find_record(MatchStrategy::DisplayName, &item.display_name)?;
        let canonical_id = materials.canonical_id_of(&key)?;
        trace!(
            item = %item.display_name,
            canonical = %canonical_id,
            "resolved via display-name fallback"
        );
        Some(ResolvedRef {
            canonical_id,
            storage_location: None,
            strategy: MatchStrategy::DisplayName,
        })
    }

    /// Caches the authoritative hash from an ingestion outcome and
    /// propagates the patch to the matching local record.
    ///
    /// The upsert is idempotent: a record that already carries the
    /// outcome's canonical id is left untouched.
    pub fn record(
        &mut self,
        item: &TransferItem,
        outcome: &ItemOutcome,
        materials: &dyn MaterialsUpdate,
    ) {
        self.by_hash
            .entry(outcome.content_hash.clone())
            .or_insert_with(|| DedupEntry {
                canonical_id: outcome.canonical_id.clone(),
                storage_location: outcome.storage_location.clone(),
            });
        self.by_source
            .insert(item.source_ref.clone(), outcome.content_hash.clone());

        let target = self
            .find_target(materials, MatchStrategy::ContentHash, &outcome.content_hash)
            .or_else(|| self.find_target(materials, MatchStrategy::SourceRef, &item.source_ref))
            .or_else(|| {
                self.find_target(materials, MatchStrategy::DisplayName, &item.display_name)
            });

        let Some((key, strategy)) = target else {
            debug!(item = %item.display_name, "no matching record to patch");
            return;
        };

        if materials.canonical_id_of(&key).as_deref() == Some(outcome.canonical_id.as_str()) {
            trace!(key = %key, "record already carries canonical id");
            return;
        }

        materials.apply_patch(&MaterialPatch {
            match_key: key,
            strategy,
            canonical_id: outcome.canonical_id.clone(),
            content_hash: outcome.content_hash.clone(),
            storage_location: outcome.storage_location.clone(),
        });
    }

    /// Patches records from a full catalog pull, covering items
    /// transferred in earlier, now-forgotten sessions.
    ///
    /// Returns the number of records patched.
    pub fn reconcile(&mut self, entries: &[CatalogEntry], materials: &dyn MaterialsUpdate) -> usize {
        let mut patched = 0;
        for entry in entries {
            self.by_hash
                .entry(entry.content_hash.clone())
                .or_insert_with(|| DedupEntry {
                    canonical_id: entry.canonical_id.clone(),
                    storage_location: entry.storage_location.clone(),
                });

            let Some(key) = materials.find_record(MatchStrategy::ContentHash, &entry.content_hash)
            else {
                continue;
            };
            if materials.canonical_id_of(&key).as_deref() == Some(entry.canonical_id.as_str()) {
                continue;
            }
            materials.apply_patch(&MaterialPatch {
                match_key: key,
                strategy: MatchStrategy::ContentHash,
                canonical_id: entry.canonical_id.clone(),
                content_hash: entry.content_hash.clone(),
                storage_location: entry.storage_location.clone(),
            });
            patched += 1;
        }
        debug!(entries = entries.len(), patched, "catalog reconciliation");
        patched
    }

    /// Returns the cached entry for a content hash.
    pub fn lookup_hash(&self, content_hash: &str) -> Option<&DedupEntry> {
        self.by_hash.get(content_hash)
    }

    fn find_target(
        &self,
        materials: &dyn MaterialsUpdate,
        strategy: MatchStrategy,
        value: &str,
    ) -> Option<(String, MatchStrategy)> {
        materials.find_record(strategy, value).map(|k| (k, strategy))
    }
}

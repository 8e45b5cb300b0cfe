use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use super::error::{CacheError, CacheResult};
use crate::constants::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL};
use crate::embedding::{EmbedFailure, EmbedOutcome, EmbeddingVector, ModelIdentity, UnitFailure};
use crate::hashing::Fingerprint;
use crate::text::{TextUnit, UnitId};

type Resolution = Result<Arc<EmbeddingVector>, EmbedFailure>;
type PendingMap = HashMap<Fingerprint, watch::Sender<Option<Resolution>>>;

/// Per-unit results of [`EmbeddingCache::resolve_many`].
pub type Resolved = HashMap<UnitId, Resolution>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Max resolved entries before LRU eviction.
    pub capacity: u64,
    /// Entry lifetime; `None` keeps entries until evicted.
    pub ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            ttl: Some(DEFAULT_CACHE_TTL),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> CacheResult<()> {
        if self.capacity == 0 {
            return Err(CacheError::InvalidConfig {
                reason: "capacity must be greater than zero".to_string(),
            });
        }
        if self.ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(CacheError::InvalidConfig {
                reason: "ttl must be greater than zero when set".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Lookups that attached to another request's in-flight computation.
    pub coalesced: u64,
    pub entries: u64,
    pub pending: usize,
}

/// How a requested unit will be answered.
enum Slot {
    Hit(Arc<EmbeddingVector>),
    /// Claimed by this call.
    Owned(watch::Receiver<Option<Resolution>>),
    /// In flight for another caller.
    Attached(watch::Receiver<Option<Resolution>>),
}

/// Fingerprint-keyed embedding cache.
///
/// Cloning is cheap; clones share entries, pending computations and statistics.
#[derive(Clone)]
pub struct EmbeddingCache {
    model: ModelIdentity,
    entries: Cache<Fingerprint, Arc<EmbeddingVector>>,
    pending: Arc<Mutex<PendingMap>>,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for EmbeddingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingCache")
            .field("model", &self.model)
            .field("entries", &self.entries.entry_count())
            .field("pending", &self.pending_len())
            .finish()
    }
}

impl EmbeddingCache {
    pub fn new(model: ModelIdentity, config: CacheConfig) -> CacheResult<Self> {
        config.validate()?;

        let mut builder = Cache::builder()
            .max_capacity(config.capacity)
            .eviction_policy(EvictionPolicy::lru());
        if let Some(ttl) = config.ttl {
            builder = builder.time_to_live(ttl);
        }

        Ok(Self {
            model,
            entries: builder.build(),
            pending: Arc::new(Mutex::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
        })
    }

    pub fn model(&self) -> &ModelIdentity {
        &self.model
    }

    #[inline]
    pub fn fingerprint(&self, unit: &TextUnit) -> Fingerprint {
        self.model.fingerprint(unit.text())
    }

    /// Looks up a resolved vector without touching statistics.
    pub fn get(&self, unit: &TextUnit) -> Option<Arc<EmbeddingVector>> {
        self.entries.get(&self.fingerprint(unit))
    }

    /// Stores an already computed vector under its own fingerprint.
    pub fn insert(&self, vector: EmbeddingVector) {
        self.entries.insert(vector.fingerprint, Arc::new(vector));
    }

    /// Drops the resolved entry for `unit`. In-flight computations are unaffected.
    pub fn invalidate(&self, unit: &TextUnit) {
        self.entries.invalidate(&self.fingerprint(unit));
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
    }

    /// Resolved entries (eventually consistent, see [`Self::run_pending_tasks`]).
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fingerprints currently being computed.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Applies moka's deferred bookkeeping (evictions, counts).
    pub fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            entries: self.len(),
            pending: self.pending_len(),
        }
    }

    /// Single-unit form of [`Self::resolve_many`].
    pub async fn get_or_compute<F, Fut>(&self, unit: &TextUnit, compute: F) -> Resolution
    where
        F: FnOnce(TextUnit) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<EmbeddingVector, EmbedFailure>> + Send + 'static,
    {
        let id = unit.id().clone();
        let mut resolved = self
            .resolve_many(std::slice::from_ref(unit), move |mut units| async move {
                let mut outcome = EmbedOutcome::default();
                if let Some(unit) = units.pop() {
                    let id = unit.id().clone();
                    match compute(unit).await {
                        Ok(vector) => {
                            outcome.succeeded.insert(id, vector);
                        }
                        Err(failure) => outcome.failed.push(UnitFailure { id, failure }),
                    }
                }
                outcome
            })
            .await;

        resolved.remove(&id).unwrap_or_else(|| {
            Err(EmbedFailure::CacheCoalesceFailure {
                reason: "no result recorded for unit".to_string(),
            })
        })
    }

    /// Resolves every unit from the cache, from in-flight computations, or from one
    /// `compute_batch` call covering all remaining misses.
    ///
    /// `compute_batch` receives one unit per missing fingerprint and runs on a detached
    /// task: dropping this future does not cancel it, and its results still populate
    /// the cache. Units attached to another caller's computation receive that
    /// computation's vector, or its failure as [`EmbedFailure::CacheCoalesceFailure`].
    ///
    /// A computation that ended in [`EmbedFailure::Cancelled`] was cancelled by the caller
    /// that issued it, not by its waiters. Attached units are claimed again and computed
    /// with a fresh clone of this caller's `compute_batch`.
    #[instrument(skip_all, fields(units = units.len(), model = %self.model.name))]
    pub async fn resolve_many<F, Fut>(&self, units: &[TextUnit], compute_batch: F) -> Resolved
    where
        F: FnOnce(Vec<TextUnit>) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = EmbedOutcome> + Send + 'static,
    {
        let (mut resolved, mut orphaned) = self.resolve_round(units, compute_batch.clone()).await;
        while !orphaned.is_empty() {
            debug!(
                orphaned = orphaned.len(),
                "shared computation cancelled by its owner, claiming again"
            );
            let (more, next) = self.resolve_round(&orphaned, compute_batch.clone()).await;
            resolved.extend(more);
            orphaned = next;
        }
        resolved
    }

    /// One claim/attach/wait pass. Also returns attached units whose computation was
    /// cancelled by its owner.
    async fn resolve_round<F, Fut>(
        &self,
        units: &[TextUnit],
        compute_batch: F,
    ) -> (Resolved, Vec<TextUnit>)
    where
        F: FnOnce(Vec<TextUnit>) -> Fut + Send + 'static,
        Fut: Future<Output = EmbedOutcome> + Send + 'static,
    {
        let mut slots: Vec<(&TextUnit, Slot)> = Vec::with_capacity(units.len());
        let mut claimed: Vec<(Fingerprint, TextUnit)> = Vec::new();

        {
            let mut pending = self.pending.lock();
            let mut owned: HashMap<Fingerprint, watch::Receiver<Option<Resolution>>> =
                HashMap::new();

            for unit in units {
                let fp = self.fingerprint(unit);

                if let Some(vector) = self.entries.get(&fp) {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    slots.push((unit, Slot::Hit(vector)));
                    continue;
                }

                self.counters.misses.fetch_add(1, Ordering::Relaxed);

                if let Some(rx) = owned.get(&fp) {
                    slots.push((unit, Slot::Owned(rx.clone())));
                } else if let Some(tx) = pending.get(&fp) {
                    self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                    slots.push((unit, Slot::Attached(tx.subscribe())));
                } else {
                    let (tx, rx) = watch::channel(None);
                    pending.insert(fp, tx);
                    owned.insert(fp, rx.clone());
                    claimed.push((fp, unit.clone()));
                    slots.push((unit, Slot::Owned(rx)));
                }
            }
        }

        if !claimed.is_empty() {
            debug!(claimed = claimed.len(), "issuing upstream computation");

            let publication = Publication {
                pending: Arc::clone(&self.pending),
                claimed: claimed
                    .iter()
                    .map(|(fp, unit)| (*fp, unit.id().clone()))
                    .collect(),
                settled: false,
            };
            let batch: Vec<TextUnit> = claimed.into_iter().map(|(_, unit)| unit).collect();
            let entries = self.entries.clone();

            tokio::spawn(async move {
                let outcome = compute_batch(batch).await;
                publication.settle(outcome, &entries);
            });
        }

        let mut resolved = HashMap::with_capacity(slots.len());
        let mut orphaned = Vec::new();
        for (unit, slot) in slots {
            let result = match slot {
                Slot::Hit(vector) => Ok(vector),
                Slot::Owned(rx) => wait(rx).await,
                Slot::Attached(rx) => match wait(rx).await {
                    Err(EmbedFailure::Cancelled) => {
                        orphaned.push(unit.clone());
                        continue;
                    }
                    other => other.map_err(|f| f.coalesced()),
                },
            };
            resolved.insert(unit.id().clone(), result);
        }
        (resolved, orphaned)
    }
}

async fn wait(mut rx: watch::Receiver<Option<Resolution>>) -> Resolution {
    match rx.wait_for(Option::is_some).await {
        Ok(value) => (*value).clone().unwrap_or_else(|| {
            Err(EmbedFailure::CacheCoalesceFailure {
                reason: "pending slot resolved without a value".to_string(),
            })
        }),
        Err(_) => Err(EmbedFailure::CacheCoalesceFailure {
            reason: "pending computation was dropped".to_string(),
        }),
    }
}

/// Publishes a detached computation's results to the cache and to waiters.
///
/// Dropped without [`Publication::settle`] (the computation panicked or its task was
/// torn down), it resolves every claimed slot with a failure so no waiter hangs.
struct Publication {
    pending: Arc<Mutex<PendingMap>>,
    claimed: Vec<(Fingerprint, UnitId)>,
    settled: bool,
}

impl Publication {
    fn settle(mut self, mut outcome: EmbedOutcome, entries: &Cache<Fingerprint, Arc<EmbeddingVector>>) {
        let mut failures: HashMap<UnitId, EmbedFailure> = outcome
            .failed
            .drain(..)
            .map(|f| (f.id, f.failure))
            .collect();

        let mut resolutions = Vec::with_capacity(self.claimed.len());
        for (fp, id) in &self.claimed {
            let resolution = match outcome.succeeded.remove(id) {
                Some(vector) => {
                    let vector = Arc::new(vector);
                    // Visible before the pending slot disappears.
                    entries.insert(*fp, Arc::clone(&vector));
                    Ok(vector)
                }
                None => Err(failures.remove(id).unwrap_or_else(|| {
                    EmbedFailure::CacheCoalesceFailure {
                        reason: format!("computation returned no result for '{id}'"),
                    }
                })),
            };
            resolutions.push((*fp, resolution));
        }

        let mut pending = self.pending.lock();
        for (fp, resolution) in resolutions {
            if let Some(tx) = pending.remove(&fp) {
                tx.send_replace(Some(resolution));
            }
        }
        self.settled = true;
    }
}

impl Drop for Publication {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        warn!(
            claimed = self.claimed.len(),
            "upstream computation ended without a result"
        );
        let mut pending = self.pending.lock();
        for (fp, _) in &self.claimed {
            if let Some(tx) = pending.remove(fp) {
                tx.send_replace(Some(Err(EmbedFailure::CacheCoalesceFailure {
                    reason: "upstream computation aborted".to_string(),
                })));
            }
        }
    }
}

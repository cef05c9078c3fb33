//! Multi-resolution image cache.
//!
//! Each URL maps to one entry holding up to five decoded tiers. `resolve`
//! never blocks: it returns whatever is loaded now and queues the work needed
//! to do better on a later frame. Fetch results are applied in `pump`, and a
//! periodic `evict` keeps the map bounded by count and idle age.
//!
//! Entries carry an epoch. A job issued for one incarnation of an entry can
//! never write into a later one, even if the URL is evicted and fetched again
//! while the job is in flight.

mod decoded;
mod fetch;
mod retry;
mod tier;

pub use decoded::DecodedImage;
pub use fetch::{
    FetchJob, FetchKind, FetchOutcome, FetchPool, FetchResponse, FetchedImage, ImageFetcher,
};
pub use retry::RetryQueue;
pub use tier::{SizeTier, TierUrlTemplate};

use crate::config::EngineConfig;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Load state of one tier of one entry
#[derive(Debug, Clone, Default)]
pub enum TierSlot {
    #[default]
    Absent,
    Loading,
    Ready(Arc<DecodedImage>),
    /// Gave up after the retry cap; not requested again for this entry
    Failed,
}

impl TierSlot {
    pub fn is_ready(&self) -> bool {
        matches!(self, TierSlot::Ready(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, TierSlot::Loading)
    }
}

#[derive(Debug)]
struct CacheEntry {
    tiers: [TierSlot; SizeTier::COUNT],
    last_access: Instant,
    source_id: Option<String>,
    epoch: u64,
}

impl CacheEntry {
    fn slot(&self, tier: SizeTier) -> &TierSlot {
        &self.tiers[tier.index()]
    }

    fn slot_mut(&mut self, tier: SizeTier) -> &mut TierSlot {
        &mut self.tiers[tier.index()]
    }

    /// The target tier when loaded, else the largest loaded tier
    fn best_ready(&self, target: SizeTier) -> Option<Arc<DecodedImage>> {
        if let TierSlot::Ready(image) = self.slot(target) {
            return Some(Arc::clone(image));
        }
        SizeTier::ALL.iter().rev().find_map(|&tier| match self.slot(tier) {
            TierSlot::Ready(image) => Some(Arc::clone(image)),
            _ => None,
        })
    }

    /// Whether a completion for (`epoch`, `tier`) still has somewhere to land
    fn awaits(&self, epoch: u64, tier: SizeTier) -> bool {
        self.epoch == epoch && self.slot(tier).is_loading()
    }
}

/// Tunables for an [`ImageCache`]
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub capacity: usize,
    pub idle_threshold: Duration,
    pub retry_delay: Duration,
    pub max_tier_retries: Option<u32>,
    pub tier_urls: TierUrlTemplate,
}

impl CacheSettings {
    pub fn from_config(config: &EngineConfig, capacity: usize) -> Self {
        let mut tier_urls = TierUrlTemplate::new(config.tier_url_template.clone());
        for (name, radius) in &config.blurred_tiers {
            match SizeTier::from_name(name) {
                Some(tier) => tier_urls = tier_urls.with_blur(tier, *radius),
                None => warn!("ignoring blur for unknown tier {name:?}"),
            }
        }
        Self {
            capacity,
            idle_threshold: config.idle_threshold,
            retry_delay: config.retry_delay,
            max_tier_retries: config.max_tier_retries,
            tier_urls,
        }
    }
}

/// Which eviction pass ran on a janitor tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPass {
    /// Over capacity: least recently accessed entries removed
    Capacity,
    /// Under capacity: idle entries removed
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionReport {
    pub pass: EvictionPass,
    pub evicted: usize,
    pub remaining: usize,
}

/// What one `pump` call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpReport {
    /// Completions stored in the cache
    pub stored: usize,
    /// Completions discarded because their entry or slot was gone
    pub discarded: usize,
    /// Failures scheduled for retry
    pub failed: usize,
    /// Retries re-issued
    pub retried: usize,
}

pub struct ImageCache {
    entries: HashMap<String, CacheEntry>,
    /// URLs whose base fetch is in flight or backing off
    pending: HashSet<String>,
    pool: FetchPool,
    retries: RetryQueue,
    settings: CacheSettings,
    next_epoch: u64,
}

impl ImageCache {
    pub fn new(pool: FetchPool, settings: CacheSettings) -> Self {
        Self {
            entries: HashMap::new(),
            pending: HashSet::new(),
            pool,
            retries: RetryQueue::new(),
            settings,
            next_epoch: 0,
        }
    }

    /// Best available image for `url` at `requested` pixels per cell.
    ///
    /// Returns `None` until the base fetch has landed. On a hit, requests the
    /// tier covering `requested` if it has not been requested yet and falls
    /// back to the largest loaded tier meanwhile.
    pub fn resolve(&mut self, url: &str, requested: f64, now: Instant) -> Option<Arc<DecodedImage>> {
        let Some(entry) = self.entries.get_mut(url) else {
            self.request_base(url);
            return None;
        };
        entry.last_access = now;

        let target = SizeTier::for_requested_scale(requested);
        if matches!(entry.slot(target), TierSlot::Absent) {
            if let Some(source_id) = &entry.source_id {
                let fetch_url = self.settings.tier_urls.url(source_id, target);
                debug!("requesting {:?} tier of {url} from {fetch_url}", target);
                *entry.slot_mut(target) = TierSlot::Loading;
                self.pool.submit(FetchJob {
                    url: url.to_string(),
                    fetch_url,
                    kind: FetchKind::Tier {
                        tier: target,
                        epoch: entry.epoch,
                        attempt: 1,
                    },
                });
            }
        }

        entry.best_ready(target)
    }

    pub fn record_access(&mut self, url: &str, now: Instant) {
        if let Some(entry) = self.entries.get_mut(url) {
            entry.last_access = now;
        }
    }

    fn request_base(&mut self, url: &str) {
        if !self.pending.insert(url.to_string()) {
            return;
        }
        debug!("fetching {url}");
        self.pool.submit(FetchJob {
            url: url.to_string(),
            fetch_url: url.to_string(),
            kind: FetchKind::Base,
        });
    }

    /// Apply finished fetches and re-issue retries that are due.
    pub fn pump(&mut self, now: Instant) -> PumpReport {
        puffin::profile_function!();

        let mut report = PumpReport::default();
        for outcome in self.pool.drain() {
            self.apply(outcome, now, &mut report);
        }
        while let Some(job) = self.retries.pop_due(now) {
            self.fire_retry(job, &mut report);
        }
        report
    }

    fn apply(&mut self, outcome: FetchOutcome, now: Instant, report: &mut PumpReport) {
        let FetchOutcome { job, result } = outcome;
        match (job.kind, result) {
            (FetchKind::Base, Ok(fetched)) => {
                self.pending.remove(&job.url);
                if self.entries.contains_key(&job.url) {
                    report.discarded += 1;
                    return;
                }
                if fetched.source_id.is_none() {
                    debug!("{} has no source id; only the base image will be used", job.url);
                }
                let mut tiers: [TierSlot; SizeTier::COUNT] = Default::default();
                tiers[SizeTier::Icon.index()] = TierSlot::Ready(Arc::new(fetched.image));
                let epoch = self.next_epoch;
                self.next_epoch += 1;
                self.entries.insert(
                    job.url,
                    CacheEntry {
                        tiers,
                        last_access: now,
                        source_id: fetched.source_id,
                        epoch,
                    },
                );
                report.stored += 1;
            }
            (FetchKind::Base, Err(e)) => {
                warn!("fetch of {} failed: {e}", job.url);
                // Stays pending until the delay passes, so resolve() cannot
                // hammer a failing URL every frame
                self.retries.schedule(job, now + self.settings.retry_delay);
                report.failed += 1;
            }
            (FetchKind::Tier { tier, epoch, attempt }, result) => {
                let Some(entry) = self
                    .entries
                    .get_mut(&job.url)
                    .filter(|entry| entry.awaits(epoch, tier))
                else {
                    trace!("discarding {:?} tier of evicted {}", tier, job.url);
                    report.discarded += 1;
                    return;
                };
                match result {
                    Ok(fetched) => {
                        *entry.slot_mut(tier) = TierSlot::Ready(Arc::new(fetched.image));
                        report.stored += 1;
                    }
                    Err(e) if self.settings.max_tier_retries.is_some_and(|max| attempt >= max) => {
                        warn!(
                            "giving up on {:?} tier of {} after {attempt} attempts: {e}",
                            tier, job.url
                        );
                        *entry.slot_mut(tier) = TierSlot::Failed;
                        report.failed += 1;
                    }
                    Err(e) => {
                        warn!("fetch of {} failed (attempt {attempt}): {e}", job.fetch_url);
                        let retry = FetchJob {
                            kind: FetchKind::Tier {
                                tier,
                                epoch,
                                attempt: attempt + 1,
                            },
                            ..job
                        };
                        self.retries.schedule(retry, now + self.settings.retry_delay);
                        report.failed += 1;
                    }
                }
            }
        }
    }

    fn fire_retry(&mut self, job: FetchJob, report: &mut PumpReport) {
        match job.kind {
            FetchKind::Base => {
                // Requestable again; the next resolve() decides if it is still wanted
                self.pending.remove(&job.url);
            }
            FetchKind::Tier { tier, epoch, .. } => {
                let alive = self
                    .entries
                    .get(&job.url)
                    .is_some_and(|entry| entry.awaits(epoch, tier));
                if !alive {
                    report.discarded += 1;
                    return;
                }
                debug!("retrying {}", job.fetch_url);
                self.pool.submit(job);
                report.retried += 1;
            }
        }
    }

    /// One janitor sweep.
    ///
    /// Over capacity, the least recently accessed entries go until the count
    /// is back at capacity. Otherwise every entry idle past the threshold
    /// goes. Only one pass runs per call.
    pub fn evict(&mut self, now: Instant) -> EvictionReport {
        puffin::profile_function!();

        let capacity = self.settings.capacity;
        let before = self.entries.len();

        let pass = if before > capacity {
            let mut by_age: Vec<(Instant, String)> = self
                .entries
                .iter()
                .map(|(url, entry)| (entry.last_access, url.clone()))
                .collect();
            by_age.sort_unstable_by_key(|(last_access, _)| *last_access);
            for (_, url) in by_age.into_iter().take(before - capacity) {
                self.entries.remove(&url);
            }
            EvictionPass::Capacity
        } else {
            let idle = self.settings.idle_threshold;
            self.entries
                .retain(|_, entry| now.saturating_duration_since(entry.last_access) <= idle);
            EvictionPass::Idle
        };

        let report = EvictionReport {
            pass,
            evicted: before - self.entries.len(),
            remaining: self.entries.len(),
        };
        if report.evicted > 0 {
            debug!("evicted {} image(s) ({:?} pass)", report.evicted, pass);
        }
        report
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    /// Load state of one tier, if the entry exists
    pub fn tier_slot(&self, url: &str, tier: SizeTier) -> Option<&TierSlot> {
        self.entries.get(url).map(|entry| entry.slot(tier))
    }

    pub fn last_access(&self, url: &str) -> Option<Instant> {
        self.entries.get(url).map(|entry| entry.last_access)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.settings.capacity
    }

    /// Base fetches in flight or backing off
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn retries_len(&self) -> usize {
        self.retries.len()
    }

    /// `"<used>/<capacity>"` for the UI chrome
    pub fn occupancy(&self) -> String {
        format!("{}/{}", self.len(), self.capacity())
    }

    pub fn pool(&self) -> &FetchPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut FetchPool {
        &mut self.pool
    }
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("entries", &self.entries.len())
            .field("pending", &self.pending.len())
            .field("retries", &self.retries.len())
            .field("capacity", &self.settings.capacity)
            .field("pool", &self.pool)
            .finish()
    }
}

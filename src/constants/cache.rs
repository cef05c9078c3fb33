//! Image cache constants.

use std::time::Duration;

/// Entries idle longer than this are evicted when under capacity
pub const CACHE_IDLE_THRESHOLD: Duration = Duration::from_secs(10);
/// Delay before retrying a failed fetch
pub const CACHE_RETRY_DELAY: Duration = Duration::from_millis(100);
/// Interval between janitor sweeps
pub const CACHE_JANITOR_INTERVAL: Duration = Duration::from_millis(200);
/// Extra cells per axis added to the visible grid when sizing the cache
pub const CACHE_CAPACITY_MARGIN_CELLS: f64 = 4.0;
/// Entries kept per cell visible at minimum scale
pub const CACHE_ENTRIES_PER_CELL: usize = 5;
/// Worker threads used for fetching and decoding
pub const CACHE_FETCH_WORKERS: usize = 4;
/// Default template for tier-specific image URLs
pub const TIER_URL_TEMPLATE: &str = "https://picsum.photos/id/{id}/{size}";
/// Response header carrying the source id of a fetched image
pub const SOURCE_ID_HEADER: &str = "Picsum-ID";

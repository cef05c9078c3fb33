//! Engine configuration.
//!
//! Every tunable has a default in [`crate::constants`]; a JSON file only needs
//! to name the fields it overrides.

use crate::constants::*;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-frame velocity retention, in (0, 1)
    pub friction: f64,
    /// Upper bound on pixels per grid cell
    pub max_scale: f64,
    /// Overrides the viewport-derived minimum scale
    pub min_scale: Option<f64>,
    /// Overrides the viewport-derived initial scale
    pub start_scale: Option<f64>,
    /// Scale multiplier per wheel zoom tick
    pub zoom_factor: f64,
    /// Whether the input device can hover (enables pointer highlight)
    pub supports_hover: bool,
    /// Idle age after which cache entries are evicted
    #[serde(with = "millis")]
    pub idle_threshold: Duration,
    /// Delay between fetch retries
    #[serde(with = "millis")]
    pub retry_delay: Duration,
    /// Give up on a tier after this many failed attempts; `None` retries forever
    pub max_tier_retries: Option<u32>,
    /// Interval between janitor sweeps
    #[serde(with = "millis")]
    pub janitor_interval: Duration,
    /// Overrides the viewport-derived cache capacity
    pub cache_capacity: Option<usize>,
    /// Fetch worker threads; 0 runs fetches inline on the calling thread
    pub fetch_workers: usize,
    /// Tier URL template with `{id}` and `{size}` placeholders
    pub tier_url_template: String,
    /// Response header holding the image source id
    pub source_id_header: String,
    /// Tiers fetched with a `?blur=N` query, keyed by tier name
    pub blurred_tiers: Vec<(String, u32)>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            friction: CAMERA_FRICTION,
            max_scale: CAMERA_MAX_SCALE,
            min_scale: None,
            start_scale: None,
            zoom_factor: CAMERA_ZOOM_FACTOR,
            supports_hover: true,
            idle_threshold: CACHE_IDLE_THRESHOLD,
            retry_delay: CACHE_RETRY_DELAY,
            max_tier_retries: None,
            janitor_interval: CACHE_JANITOR_INTERVAL,
            cache_capacity: None,
            fetch_workers: CACHE_FETCH_WORKERS,
            tier_url_template: TIER_URL_TEMPLATE.to_string(),
            source_id_header: SOURCE_ID_HEADER.to_string(),
            blurred_tiers: vec![("xs".to_string(), 1), ("s".to_string(), 1)],
        }
    }
}

impl EngineConfig {
    /// Load a config from a JSON file and validate it
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json_str = std::fs::read_to_string(path)?;
        Self::from_json_str(&json_str)
    }

    /// Parse a config from a JSON string and validate it
    pub fn from_json_str(json_str: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.friction > 0.0 && self.friction < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "friction must be in (0, 1), got {}",
                self.friction
            )));
        }
        if !(self.max_scale > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "max_scale must be positive, got {}",
                self.max_scale
            )));
        }
        if let Some(min) = self.min_scale {
            if !(min > 0.0 && min <= self.max_scale) {
                return Err(ConfigError::Invalid(format!(
                    "min_scale must be in (0, max_scale], got {min}"
                )));
            }
        }
        if !(self.zoom_factor > 1.0) {
            return Err(ConfigError::Invalid(format!(
                "zoom_factor must be greater than 1, got {}",
                self.zoom_factor
            )));
        }
        if !self.tier_url_template.contains("{id}") {
            return Err(ConfigError::Invalid(
                "tier_url_template must contain {id}".to_string(),
            ));
        }
        Ok(())
    }
}

/// Scale limits and cache sizing derived from the viewport at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportLimits {
    pub min_scale: f64,
    pub max_scale: f64,
    pub start_scale: f64,
    /// Scale the tap-zoom ease settles on
    pub tap_zoom_target: f64,
    /// Scale at or below which cells are drawn as "zoomed out"
    pub zoomed_out_scale: f64,
    pub cache_capacity: usize,
}

impl ViewportLimits {
    pub fn derive(width: f64, height: f64, config: &EngineConfig) -> Self {
        let wmin = width.min(height).max(1.0);
        let wmax = width.max(height).max(1.0);
        let small_device = wmax <= SMALL_DEVICE_MAX_DIMENSION;

        let max_scale = config.max_scale;
        let min_scale = config
            .min_scale
            .unwrap_or_else(|| {
                if small_device {
                    wmin / SMALL_DEVICE_MIN_SCALE_DIVISOR
                } else {
                    wmin / MIN_SCALE_DIVISOR
                }
            })
            .min(max_scale);
        let start_scale = config
            .start_scale
            .unwrap_or_else(|| {
                if small_device {
                    wmin / SMALL_DEVICE_START_SCALE_DIVISOR
                } else {
                    wmin / START_SCALE_DIVISOR
                }
            })
            .clamp(min_scale, max_scale);

        let cells_x = (wmin / min_scale).ceil() + CACHE_CAPACITY_MARGIN_CELLS;
        let cells_y = (wmax / min_scale).ceil() + CACHE_CAPACITY_MARGIN_CELLS;
        let cache_capacity = config
            .cache_capacity
            .unwrap_or((cells_x * cells_y) as usize * CACHE_ENTRIES_PER_CELL);

        Self {
            min_scale,
            max_scale,
            start_scale,
            tap_zoom_target: (wmin / ZOOM_EASE_TARGET_DIVISOR).clamp(min_scale, max_scale),
            zoomed_out_scale: wmin / ZOOMED_OUT_DIVISOR,
            cache_capacity,
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

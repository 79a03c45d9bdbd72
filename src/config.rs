//! Coordinator configuration.
//!
//! Loading configuration from a file or environment is out of scope; this
//! module only covers *constructing* a validated in-process config value.

use std::time::Duration;

use crate::error::CacheError;

/// Validated settings recognized by the coordinator. Build one with
/// [`CacheConfigBuilder`]; `CacheConfig::validate` runs once, at
/// construction, never per call.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    name: String,
    time_to_live: Duration,
    cache_data_source_misses: bool,
    load_timeout: Duration,
    refresh_tick: Duration,
    batch_size: usize,
    l1_jitter_fraction: f64,
    key_prefix: String,
    eviction_grace_multiplier: f64,
}

impl CacheConfig {
    pub fn builder(name: impl Into<String>) -> CacheConfigBuilder {
        CacheConfigBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn time_to_live(&self) -> Duration {
        self.time_to_live
    }

    pub fn cache_data_source_misses(&self) -> bool {
        self.cache_data_source_misses
    }

    pub fn load_timeout(&self) -> Duration {
        self.load_timeout
    }

    pub fn refresh_tick(&self) -> Duration {
        self.refresh_tick
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn l1_jitter_fraction(&self) -> f64 {
        self.l1_jitter_fraction
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// How far past `time_to_live` an entry remains resident in L2 before
    /// even fallback reads should refuse it. Not part of the external
    /// interface table; chosen so L2 residency meaningfully outlives L1
    /// staleness, giving peers a stale-but-usable fallback while a sick
    /// data source recovers.
    pub fn eviction_grace_multiplier(&self) -> f64 {
        self.eviction_grace_multiplier
    }

    /// The absolute instant after which even a stale L2 entry must be
    /// treated as gone, derived from this config's grace multiplier.
    pub fn eviction_time_for(&self, creation_time: std::time::SystemTime, ttl: Duration) -> std::time::SystemTime {
        let grace = ttl.mul_f64(self.eviction_grace_multiplier.max(1.0));
        creation_time + grace
    }
}

/// Builder for [`CacheConfig`]. Mirrors the `with_*` convention used
/// elsewhere in this crate's construction surfaces.
pub struct CacheConfigBuilder {
    name: String,
    time_to_live: Option<Duration>,
    cache_data_source_misses: bool,
    load_timeout: Duration,
    refresh_tick: Duration,
    batch_size: usize,
    l1_jitter_fraction: f64,
    key_prefix: String,
    eviction_grace_multiplier: f64,
}

impl CacheConfigBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            time_to_live: None,
            cache_data_source_misses: false,
            load_timeout: Duration::from_secs(15),
            refresh_tick: Duration::from_secs(3),
            batch_size: 1000,
            l1_jitter_fraction: 0.05,
            key_prefix: String::new(),
            eviction_grace_multiplier: 3.0,
        }
    }

    /// Required: default TTL applied to synthetic value-less entries.
    pub fn time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }

    pub fn cache_data_source_misses(mut self, cache_misses: bool) -> Self {
        self.cache_data_source_misses = cache_misses;
        self
    }

    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    pub fn refresh_tick(mut self, tick: Duration) -> Self {
        self.refresh_tick = tick;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn l1_jitter_fraction(mut self, fraction: f64) -> Self {
        self.l1_jitter_fraction = fraction;
        self
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn eviction_grace_multiplier(mut self, multiplier: f64) -> Self {
        self.eviction_grace_multiplier = multiplier;
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<CacheConfig, CacheError> {
        if self.name.trim().is_empty() {
            return Err(CacheError::Precondition("cache name must not be empty".into()));
        }
        let time_to_live = self
            .time_to_live
            .ok_or_else(|| CacheError::Precondition("time_to_live is required".into()))?;
        if self.batch_size == 0 {
            return Err(CacheError::Precondition("batch_size must be >= 1".into()));
        }
        if !(0.0..1.0).contains(&self.l1_jitter_fraction) {
            return Err(CacheError::Precondition(
                "l1_jitter_fraction must be in [0, 1)".into(),
            ));
        }
        if self.eviction_grace_multiplier < 1.0 {
            return Err(CacheError::Precondition(
                "eviction_grace_multiplier must be >= 1.0".into(),
            ));
        }

        Ok(CacheConfig {
            name: self.name,
            time_to_live,
            cache_data_source_misses: self.cache_data_source_misses,
            load_timeout: self.load_timeout,
            refresh_tick: self.refresh_tick,
            batch_size: self.batch_size,
            l1_jitter_fraction: self.l1_jitter_fraction,
            key_prefix: self.key_prefix,
            eviction_grace_multiplier: self.eviction_grace_multiplier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_name() {
        let err = CacheConfig::builder("  ")
            .time_to_live(Duration::from_secs(60))
            .build()
            .unwrap_err();
        assert!(matches!(err, CacheError::Precondition(_)));
    }

    #[test]
    fn requires_time_to_live() {
        let err = CacheConfig::builder("widgets").build().unwrap_err();
        assert!(matches!(err, CacheError::Precondition(_)));
    }

    #[test]
    fn defaults_match_external_interface_table() {
        let cfg = CacheConfig::builder("widgets")
            .time_to_live(Duration::from_secs(60))
            .build()
            .unwrap();
        assert_eq!(cfg.load_timeout(), Duration::from_secs(15));
        assert_eq!(cfg.refresh_tick(), Duration::from_secs(3));
        assert_eq!(cfg.batch_size(), 1000);
        assert!((cfg.l1_jitter_fraction() - 0.05).abs() < f64::EPSILON);
        assert_eq!(cfg.key_prefix(), "");
        assert!(!cfg.cache_data_source_misses());
    }

    #[test]
    fn eviction_time_extends_past_ttl() {
        let cfg = CacheConfig::builder("widgets")
            .time_to_live(Duration::from_secs(60))
            .eviction_grace_multiplier(3.0)
            .build()
            .unwrap();
        let now = std::time::SystemTime::UNIX_EPOCH;
        let eviction = cfg.eviction_time_for(now, Duration::from_secs(60));
        assert_eq!(eviction, now + Duration::from_secs(180));
    }
}

//! Engine configuration.
//!
//! Defaults suit a small deployment; the daemon reads overrides from
//! `FUSION_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;

use crate::domain::SubfeedId;
use crate::feeds::FeedClientConfig;
use crate::offset::{DayOffsetCache, FeedTimezone, OffsetError};

/// Errors from loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// A static schedule subfeed and where to fetch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubfeedConfig {
    pub id: SubfeedId,
    pub url: String,
}

/// Configuration for the fusion engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fingerprint every subfeed's schedule must carry.
    pub config_hash: String,

    pub subfeeds: Vec<SubfeedConfig>,

    /// GTFS-RT trip update endpoints.
    pub realtime_urls: Vec<String>,

    /// Time zone of the timetable times.
    pub timezone: FeedTimezone,

    /// Local hour at which each day's UTC offset is sampled.
    pub offset_check_hour: u32,

    /// Dates memoized by the offset cache before it is cleared.
    pub offset_cache_capacity: u64,

    pub static_refresh_secs: u64,
    pub realtime_refresh_secs: u64,

    /// Age (seconds) beyond which the published schedule is reported stale.
    pub stale_threshold_secs: i64,

    pub request_timeout_secs: u64,
    pub max_feed_bytes: u64,

    /// Where the last good schedule is persisted.
    pub persist_dir: PathBuf,
}

impl EngineConfig {
    /// Load configuration from the process environment.
    ///
    /// `FUSION_CONFIG_HASH` and `FUSION_SUBFEEDS` are required; everything
    /// else falls back to the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        config.config_hash = lookup("FUSION_CONFIG_HASH")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("FUSION_CONFIG_HASH"))?;

        let subfeeds = lookup("FUSION_SUBFEEDS").ok_or(ConfigError::Missing("FUSION_SUBFEEDS"))?;
        config.subfeeds = parse_subfeeds(&subfeeds)?;

        if let Some(urls) = lookup("FUSION_REALTIME_URLS") {
            config.realtime_urls = urls
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(tz) = lookup("FUSION_TIMEZONE") {
            config.timezone = FeedTimezone::parse(&tz).map_err(|e| ConfigError::Invalid {
                var: "FUSION_TIMEZONE",
                value: tz.clone(),
                reason: e.to_string(),
            })?;
        }

        if let Some(hour) = lookup("FUSION_OFFSET_CHECK_HOUR") {
            config.offset_check_hour = match hour.trim().parse::<u32>() {
                Ok(h) if h < 24 => h,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "FUSION_OFFSET_CHECK_HOUR",
                        value: hour,
                        reason: "expected an hour from 0 to 23".to_string(),
                    });
                }
            };
        }

        if let Some(dir) = lookup("FUSION_PERSIST_DIR") {
            config.persist_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Set the config hash.
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    /// Add a subfeed.
    pub fn with_subfeed(mut self, id: SubfeedId, url: impl Into<String>) -> Self {
        self.subfeeds.push(SubfeedConfig { id, url: url.into() });
        self
    }

    /// Add a realtime endpoint.
    pub fn with_realtime_url(mut self, url: impl Into<String>) -> Self {
        self.realtime_urls.push(url.into());
        self
    }

    pub fn with_timezone(mut self, timezone: FeedTimezone) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_persist_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.persist_dir = dir.into();
        self
    }

    /// Returns the static refresh interval as a Duration.
    pub fn static_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.static_refresh_secs)
    }

    /// Returns the realtime refresh interval as a Duration.
    pub fn realtime_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.realtime_refresh_secs)
    }

    /// Returns the staleness threshold as a chrono Duration.
    pub fn stale_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stale_threshold_secs)
    }

    /// Build the offset cache these settings describe.
    pub fn offset_cache(&self) -> Result<DayOffsetCache, OffsetError> {
        DayOffsetCache::new(
            self.timezone,
            self.offset_check_hour,
            self.offset_cache_capacity,
        )
    }

    /// Settings for the HTTP feed clients.
    pub fn feed_client_config(&self) -> FeedClientConfig {
        FeedClientConfig::new()
            .with_timeout(self.request_timeout_secs)
            .with_max_bytes(self.max_feed_bytes)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            config_hash: String::new(),
            subfeeds: Vec::new(),
            realtime_urls: Vec::new(),
            timezone: FeedTimezone::Named(Tz::UTC),
            offset_check_hour: 3,
            offset_cache_capacity: 64,
            static_refresh_secs: 6 * 60 * 60,
            realtime_refresh_secs: 30,
            stale_threshold_secs: 24 * 60 * 60,
            request_timeout_secs: 30,
            max_feed_bytes: 50 * 1024 * 1024,
            persist_dir: PathBuf::from("data"),
        }
    }
}

/// Parses `id=url,id=url`.
fn parse_subfeeds(value: &str) -> Result<Vec<SubfeedConfig>, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        var: "FUSION_SUBFEEDS",
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let mut subfeeds: Vec<SubfeedConfig> = Vec::new();
    for entry in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (id, url) = entry
            .split_once('=')
            .ok_or_else(|| invalid("expected id=url"))?;
        let (id, url) = (id.trim(), url.trim());
        if id.is_empty() || url.is_empty() {
            return Err(invalid("expected id=url"));
        }
        if subfeeds.iter().any(|s| s.id.as_str() == id) {
            return Err(invalid("duplicate subfeed id"));
        }
        subfeeds.push(SubfeedConfig {
            id: SubfeedId::new(id),
            url: url.to_string(),
        });
    }

    if subfeeds.is_empty() {
        return Err(invalid("no subfeeds"));
    }
    Ok(subfeeds)
}

//! Snapshot and GTFS-RT HTTP clients.

use std::time::Duration;

use prost::Message;
use tracing::debug;

use crate::domain::{ScheduleStore, SubfeedId};
use crate::realtime::{TripUpdateRecord, records_from_feed};

use super::error::FeedError;

/// Default maximum response size (50 MB).
const DEFAULT_MAX_BYTES: u64 = 50 * 1024 * 1024;

/// Settings shared by the feed clients.
#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Largest response body accepted, in bytes
    pub max_bytes: u64,
}

impl FeedClientConfig {
    pub fn new() -> Self {
        Self {
            timeout_secs: 30,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the response size limit.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn build_http(&self) -> Result<reqwest::Client, FeedError> {
        Ok(reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?)
    }
}

impl Default for FeedClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Client for one subfeed's parsed schedule snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotClient {
    http: reqwest::Client,
    subfeed: SubfeedId,
    url: String,
    max_bytes: u64,
}

impl SnapshotClient {
    pub fn new(
        subfeed: SubfeedId,
        url: impl Into<String>,
        config: &FeedClientConfig,
    ) -> Result<Self, FeedError> {
        Ok(Self {
            http: config.build_http()?,
            subfeed,
            url: url.into(),
            max_bytes: config.max_bytes,
        })
    }

    pub fn subfeed(&self) -> &SubfeedId {
        &self.subfeed
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Download and parse the snapshot.
    pub async fn fetch_snapshot(&self) -> Result<ScheduleStore, FeedError> {
        let response = send_checked(&self.http, &self.url, self.max_bytes).await?;
        let body = response.bytes().await?;
        check_size(body.len() as u64, self.max_bytes)?;

        let store: ScheduleStore =
            serde_json::from_slice(&body).map_err(|e| FeedError::Json {
                message: e.to_string(),
            })?;

        debug!(
            subfeed = %self.subfeed,
            trips = store.trips().len(),
            calendars = store.calendars().len(),
            "fetched schedule snapshot"
        );
        Ok(store)
    }
}

/// Client for a GTFS-RT trip updates endpoint.
#[derive(Debug, Clone)]
pub struct RealtimeClient {
    http: reqwest::Client,
    url: String,
    max_bytes: u64,
}

impl RealtimeClient {
    pub fn new(url: impl Into<String>, config: &FeedClientConfig) -> Result<Self, FeedError> {
        Ok(Self {
            http: config.build_http()?,
            url: url.into(),
            max_bytes: config.max_bytes,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Download and decode the feed.
    pub async fn fetch_feed(&self) -> Result<gtfs_realtime::FeedMessage, FeedError> {
        let response = send_checked(&self.http, &self.url, self.max_bytes).await?;
        let bytes = response.bytes().await?;
        check_size(bytes.len() as u64, self.max_bytes)?;

        Ok(gtfs_realtime::FeedMessage::decode(bytes.as_ref())?)
    }

    /// Download the feed and convert it to trip update records.
    pub async fn fetch_records(&self) -> Result<Vec<TripUpdateRecord>, FeedError> {
        let feed = self.fetch_feed().await?;
        Ok(records_from_feed(&feed))
    }
}

/// Sends a GET request, rejecting error statuses and oversized bodies
/// announced by `Content-Length`.
async fn send_checked(
    http: &reqwest::Client,
    url: &str,
    max_bytes: u64,
) -> Result<reqwest::Response, FeedError> {
    let response = http.get(url).send().await?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FeedError::Api {
            status: status.as_u16(),
            message: body,
        });
    }

    if let Some(len) = response.content_length() {
        check_size(len, max_bytes)?;
    }
    Ok(response)
}

fn check_size(size: u64, max: u64) -> Result<(), FeedError> {
    if size > max {
        return Err(FeedError::TooLarge { size, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = FeedClientConfig::default();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_bytes, 50 * 1024 * 1024);

        let config = config.with_timeout(5).with_max_bytes(1024);
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.max_bytes, 1024);
    }

    #[test]
    fn size_limit_is_inclusive() {
        assert!(check_size(1024, 1024).is_ok());
        assert!(matches!(
            check_size(1025, 1024),
            Err(FeedError::TooLarge {
                size: 1025,
                max: 1024
            })
        ));
    }

    #[test]
    fn clients_keep_their_endpoints() {
        let config = FeedClientConfig::new();
        let snapshot =
            SnapshotClient::new(SubfeedId::new("metro"), "http://localhost/metro.json", &config)
                .unwrap();
        assert_eq!(snapshot.subfeed().as_str(), "metro");
        assert_eq!(snapshot.url(), "http://localhost/metro.json");

        let realtime = RealtimeClient::new("http://localhost/rt.pb", &config).unwrap();
        assert_eq!(realtime.url(), "http://localhost/rt.pb");
    }

    #[test]
    fn decode_error_converts() {
        let bad_bytes: &[u8] = &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F];
        let decode_err = gtfs_realtime::FeedMessage::decode(bad_bytes).unwrap_err();
        let err: FeedError = decode_err.into();
        assert!(matches!(err, FeedError::Decode(_)));
    }
}

//! Download settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root of the JRC CEMS-EFAS satellite-derived flood depth archive.
pub const JRC_DEPTH_MAPS_URL: &str =
    "https://jeodpp.jrc.ec.europa.eu/ftp/jrc-opendata/CEMS-EFAS/European_Satellite-Derived_Flood_Depth_Maps/maps/";

/// Where and how tiles are fetched.
///
/// Each year has an index page at `<base_url><year>/` listing its tiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Archive root; must end with `/`.
    pub base_url: String,

    pub first_year: i32,

    /// Inclusive.
    pub last_year: i32,

    /// Tiles fetched at the same time.
    pub max_concurrent: usize,

    /// Retries after the first attempt, for network errors and 5xx replies.
    pub max_retries: u32,

    /// Delay before the first retry; doubles per retry.
    pub initial_retry_delay_ms: u64,

    pub max_retry_delay_ms: u64,

    pub request_timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            base_url: JRC_DEPTH_MAPS_URL.to_string(),
            first_year: 2015,
            last_year: 2024,
            max_concurrent: 4,
            max_retries: 3,
            initial_retry_delay_ms: 2_000,
            max_retry_delay_ms: 60_000,
            request_timeout_secs: 600,
        }
    }
}

impl DownloadConfig {
    /// Override fields from `FLOOD_DOWNLOAD_*` environment variables that are set.
    pub fn apply_env(&mut self) -> Result<(), String> {
        if let Ok(val) = std::env::var("FLOOD_DOWNLOAD_BASE_URL") {
            self.base_url = val;
        }
        if let Ok(val) = std::env::var("FLOOD_DOWNLOAD_FIRST_YEAR") {
            self.first_year = val
                .parse()
                .map_err(|_| format!("FLOOD_DOWNLOAD_FIRST_YEAR is not a year: '{}'", val))?;
        }
        if let Ok(val) = std::env::var("FLOOD_DOWNLOAD_LAST_YEAR") {
            self.last_year = val
                .parse()
                .map_err(|_| format!("FLOOD_DOWNLOAD_LAST_YEAR is not a year: '{}'", val))?;
        }
        if let Ok(val) = std::env::var("FLOOD_DOWNLOAD_CONCURRENCY") {
            self.max_concurrent = val
                .parse()
                .map_err(|_| format!("FLOOD_DOWNLOAD_CONCURRENCY is not a number: '{}'", val))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.base_url.ends_with('/') {
            return Err(format!("download base_url must end with '/': {}", self.base_url));
        }
        if self.first_year > self.last_year {
            return Err(format!(
                "download first_year {} is after last_year {}",
                self.first_year, self.last_year
            ));
        }
        if self.max_concurrent == 0 {
            return Err("download max_concurrent must be >= 1".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("download request_timeout_secs must be > 0".to_string());
        }
        Ok(())
    }

    pub fn years(&self) -> std::ops::RangeInclusive<i32> {
        self.first_year..=self.last_year
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn initial_retry_delay(&self) -> Duration {
        Duration::from_millis(self.initial_retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_archive() {
        let config = DownloadConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.years().count(), 10);
        assert!(config.base_url.ends_with("/maps/"));
    }

    #[test]
    fn test_validation() {
        let mut config = DownloadConfig {
            base_url: "http://localhost/maps".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.base_url.push('/');
        config.first_year = 2025;
        assert!(config.validate().is_err());

        config.first_year = 2020;
        config.max_concurrent = 0;
        assert!(config.validate().is_err());
    }
}

//! Year-by-year tile acquisition with retry and skip-if-present.
//!
//! Tiles land in `<output_dir>/<year>/<file name>`. A tile whose destination
//! already exists is never requested again, so an interrupted run can simply
//! be restarted. Bodies are streamed into `<file name>.partial` and renamed
//! once complete.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use reqwest::{Client, StatusCode, Url};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::config::DownloadConfig;
use crate::error::{DownloadError, Result};
use crate::index::{file_name, LinkExtractor};

const PARTIAL_SUFFIX: &str = ".partial";

/// What happened to one tile.
#[derive(Debug)]
pub enum TileOutcome {
    Downloaded { path: PathBuf, bytes: u64 },
    AlreadyPresent { path: PathBuf },
    Failed { url: Url, error: DownloadError },
}

/// Result of a whole download run.
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub downloaded: Vec<PathBuf>,
    pub already_present: Vec<PathBuf>,
    pub failed: Vec<(Url, DownloadError)>,
    /// Years whose index page could not be read.
    pub failed_years: Vec<(i32, DownloadError)>,
    pub bytes: u64,
}

impl DownloadReport {
    fn record(&mut self, outcome: TileOutcome) {
        match outcome {
            TileOutcome::Downloaded { path, bytes } => {
                self.bytes += bytes;
                self.downloaded.push(path);
            }
            TileOutcome::AlreadyPresent { path } => self.already_present.push(path),
            TileOutcome::Failed { url, error } => self.failed.push((url, error)),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty() || !self.failed_years.is_empty()
    }
}

/// Fetches tiles listed on the archive's per-year index pages.
pub struct TileDownloader {
    client: Client,
    config: DownloadConfig,
    base: Url,
    links: LinkExtractor,
}

impl TileDownloader {
    pub fn new(config: DownloadConfig) -> Result<Self> {
        config.validate().map_err(DownloadError::Config)?;

        let base = Url::parse(&config.base_url).map_err(|e| DownloadError::InvalidUrl {
            url: config.base_url.clone(),
            message: e.to_string(),
        })?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(std::time::Duration::from_secs(30))
            .pool_max_idle_per_host(config.max_concurrent)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| DownloadError::Request {
                url: config.base_url.clone(),
                source: e,
            })?;

        Ok(Self {
            client,
            config,
            base,
            links: LinkExtractor::new()?,
        })
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Index page of `year`.
    pub fn year_url(&self, year: i32) -> Result<Url> {
        self.base
            .join(&format!("{}/", year))
            .map_err(|e| DownloadError::InvalidUrl {
                url: format!("{}{}/", self.base, year),
                message: e.to_string(),
            })
    }

    /// Tile URLs listed for `year`.
    pub async fn list_year(&self, year: i32) -> Result<Vec<Url>> {
        let url = self.year_url(year)?;
        let response = self.get(&url).await?;
        let html = response.text().await.map_err(|e| DownloadError::Request {
            url: url.to_string(),
            source: e,
        })?;
        Ok(self.links.tif_links(&url, &html))
    }

    /// Download every configured year into `output_dir/<year>/`.
    ///
    /// Per-tile and per-year failures are collected in the report; only an
    /// unusable output directory ends the run early.
    pub async fn run(&self, output_dir: &Path) -> Result<DownloadReport> {
        fs::create_dir_all(output_dir)
            .await
            .map_err(|e| DownloadError::io(output_dir, e))?;

        let mut report = DownloadReport::default();
        for year in self.config.years() {
            info!(year, "Scanning year index");
            let links = match self.list_year(year).await {
                Ok(links) => links,
                Err(e) => {
                    warn!(year, error = %e, "Cannot read year index");
                    report.failed_years.push((year, e));
                    continue;
                }
            };
            debug!(year, tiles = links.len(), "Year index read");

            let year_dir = output_dir.join(year.to_string());
            fs::create_dir_all(&year_dir)
                .await
                .map_err(|e| DownloadError::io(&year_dir, e))?;

            let outcomes: Vec<TileOutcome> = stream::iter(links)
                .map(|url| self.fetch(url, &year_dir))
                .buffer_unordered(self.config.max_concurrent)
                .collect()
                .await;
            for outcome in outcomes {
                report.record(outcome);
            }
        }

        info!(
            downloaded = report.downloaded.len(),
            already_present = report.already_present.len(),
            failed = report.failed.len(),
            failed_years = report.failed_years.len(),
            bytes = report.bytes,
            "Download run finished"
        );
        Ok(report)
    }

    /// Fetch one tile into `dir` unless it is already there.
    #[instrument(skip(self, url, dir), fields(url = %url))]
    pub async fn fetch(&self, url: Url, dir: &Path) -> TileOutcome {
        let name = match file_name(&url) {
            Some(name) => name.to_string(),
            None => {
                let error = DownloadError::InvalidUrl {
                    url: url.to_string(),
                    message: "no file name".to_string(),
                };
                return TileOutcome::Failed { url, error };
            }
        };
        let path = dir.join(&name);

        if fs::try_exists(&path).await.unwrap_or(false) {
            info!(path = %path.display(), "Already downloaded, skipping");
            return TileOutcome::AlreadyPresent { path };
        }

        let partial = dir.join(format!("{}{}", name, PARTIAL_SUFFIX));
        let mut delay = self.config.initial_retry_delay();
        let mut attempt = 0;
        loop {
            match self.stream_to_file(&url, &partial).await {
                Ok(bytes) => {
                    if let Err(e) = fs::rename(&partial, &path).await {
                        return TileOutcome::Failed {
                            url,
                            error: DownloadError::io(&path, e),
                        };
                    }
                    info!(path = %path.display(), bytes, "Downloaded");
                    return TileOutcome::Downloaded { path, bytes };
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        error = %e,
                        retry = attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Download failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, self.config.max_retry_delay());
                }
                Err(e) => {
                    fs::remove_file(&partial).await.ok();
                    warn!(error = %e, "Download failed");
                    return TileOutcome::Failed { url, error: e };
                }
            }
        }
    }

    async fn get(&self, url: &Url) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| DownloadError::Request {
                url: url.to_string(),
                source: e,
            })?;
        match response.status() {
            StatusCode::OK => Ok(response),
            status => Err(DownloadError::Status {
                url: url.to_string(),
                status,
            }),
        }
    }

    /// Stream the body of `url` into `path`, replacing any earlier partial.
    async fn stream_to_file(&self, url: &Url, path: &Path) -> Result<u64> {
        let response = self.get(url).await?;

        let mut file = fs::File::create(path)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        let mut stream = response.bytes_stream();
        let mut bytes = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DownloadError::Request {
                url: url.to_string(),
                source: e,
            })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(path, e))?;
            bytes += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| DownloadError::io(path, e))?;
        file.sync_all().await.map_err(|e| DownloadError::io(path, e))?;
        Ok(bytes)
    }
}

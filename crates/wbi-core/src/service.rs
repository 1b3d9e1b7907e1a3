//! Index service: cache refresh policy plus read-only queries
//!
//! Readers clone an `Arc<IndexSnapshot>` out of a `parking_lot::RwLock`, so a
//! slow fetch never blocks lookups. Refreshes are serialized by an async mutex
//! and swap in a fully built snapshot, never a partial one.

use crate::cache::DocumentCache;
use crate::catalog::{self, RiskDescriptor};
use crate::config::IndexConfig;
use crate::error::{CoreError, FetchOutcome, RefreshIssue, RefreshReport};
use crate::event::{EventBus, IndexEvent};
use crate::fetcher::{DocumentFetcher, HttpFetcher};
use crate::models::DistrictRiskMap;
use crate::parser::{parse_document, ParsedIndex};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Immutable view of one parsed index document
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    districts: DistrictRiskMap,
    last_updated: Option<String>,
    fetched_at: DateTime<Utc>,
    loaded_at: DateTime<Utc>,
}

impl IndexSnapshot {
    fn new(parsed: ParsedIndex, fetched_at: DateTime<Utc>) -> Self {
        Self {
            districts: parsed.districts,
            last_updated: parsed.last_updated,
            fetched_at,
            loaded_at: Utc::now(),
        }
    }

    /// District names in publication order
    pub fn districts(&self) -> impl Iterator<Item = &str> {
        self.districts.names()
    }

    pub fn lookup(&self, district: &str) -> Option<RiskDescriptor> {
        self.districts.get(district).map(catalog::describe)
    }

    pub fn risk_level(&self, district: &str) -> Option<i64> {
        self.districts.get(district)
    }

    /// Publication date from the document itself
    pub fn last_updated(&self) -> Option<&str> {
        self.last_updated.as_deref()
    }

    /// When the underlying document was fetched by this system
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// When this snapshot was built
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn len(&self) -> usize {
        self.districts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.districts.is_empty()
    }
}

/// Cache and index health, for status displays
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub source_url: String,
    pub cache_path: PathBuf,
    /// Fetch time of the cache artifact on disk
    pub cached_at: Option<DateTime<Utc>>,
    pub age_secs: Option<u64>,
    pub ttl_secs: u64,
    pub stale: bool,
    pub districts: usize,
    pub last_updated: Option<String>,
    pub loaded_at: DateTime<Utc>,
}

/// Serves district risk levels from a cached, periodically refreshed document
pub struct IndexService<F: DocumentFetcher = HttpFetcher> {
    config: IndexConfig,
    cache: DocumentCache,
    fetcher: F,
    snapshot: RwLock<Arc<IndexSnapshot>>,
    refresh_lock: tokio::sync::Mutex<()>,
    event_bus: EventBus,
}

impl IndexService<HttpFetcher> {
    /// Validate `config`, build the HTTP fetcher and initialize
    pub async fn from_config(config: IndexConfig) -> Result<Self, CoreError> {
        let fetcher = http_fetcher(&config)?;
        Self::initialize(config, fetcher).await
    }

    /// Like [`from_config`](Self::from_config), but always contacts the source
    pub async fn from_config_refreshed(
        config: IndexConfig,
    ) -> Result<(Self, RefreshReport), CoreError> {
        let fetcher = http_fetcher(&config)?;
        Self::initialize_refreshed(config, fetcher).await
    }
}

fn http_fetcher(config: &IndexConfig) -> Result<HttpFetcher, CoreError> {
    config.validate()?;
    HttpFetcher::from_config(config).map_err(|e| CoreError::InvalidConfig {
        message: e.to_string(),
    })
}

impl<F: DocumentFetcher> IndexService<F> {
    /// Load the index, refetching first if the cache is missing or stale
    ///
    /// Fails only when nothing can be served: no usable download and no
    /// parseable cached document.
    pub async fn initialize(config: IndexConfig, fetcher: F) -> Result<Self, CoreError> {
        let (service, report) = Self::initialize_with_report(config, fetcher).await?;
        for issue in &report.issues {
            debug!(source = %issue.source, message = %issue.message, "Startup issue");
        }
        Ok(service)
    }

    /// Same as [`initialize`](Self::initialize), also returning what happened
    pub async fn initialize_with_report(
        config: IndexConfig,
        fetcher: F,
    ) -> Result<(Self, RefreshReport), CoreError> {
        let cache = DocumentCache::new(config.cache_path.clone());
        let event_bus = EventBus::default_capacity();
        let mut report = RefreshReport::new();

        info!(
            url = %config.source_url,
            cache = %cache.path().display(),
            "Initializing forest fire index"
        );

        let download = if cache.is_stale(config.cache_ttl()) {
            Some(fetch_document(&fetcher, &cache, &config.source_url, &event_bus, &mut report).await)
        } else {
            debug!("Cached document is fresh, skipping fetch");
            None
        };

        let snapshot = match download {
            Some(Download::Ready(parsed, fetched_at)) => IndexSnapshot::new(parsed, fetched_at),
            other => {
                let document = match cache.current() {
                    Ok(document) => document,
                    Err(e) => {
                        error!(error = %e, "Nothing to serve: no usable download and no cached document");
                        // A malformed first download explains more than a missing cache
                        return Err(match other {
                            Some(Download::Malformed(parse_error)) => parse_error,
                            _ => e,
                        });
                    }
                };
                let parsed = parse_document(&document.raw_bytes).map_err(|e| {
                    error!(error = %e, "Cached document is malformed and there is no previous index");
                    e
                })?;
                record_parse_warnings(&parsed, &mut report);
                IndexSnapshot::new(parsed, document.fetched_at)
            }
        };

        report.reloaded = true;
        report.districts = snapshot.len();
        event_bus.publish(IndexEvent::IndexReloaded {
            districts: snapshot.len(),
            last_updated: snapshot.last_updated.clone(),
        });
        info!(
            districts = snapshot.len(),
            date = snapshot.last_updated().unwrap_or("-"),
            "Forest fire index loaded"
        );

        let service = Self {
            config,
            cache,
            fetcher,
            snapshot: RwLock::new(Arc::new(snapshot)),
            refresh_lock: tokio::sync::Mutex::new(()),
            event_bus,
        };

        Ok((service, report))
    }

    /// Initialize and make exactly one fetch attempt
    ///
    /// Startup already fetches when the cache is missing or stale; only a
    /// fresh cache triggers the extra forced refetch. The report describes
    /// whichever attempt was made.
    pub async fn initialize_refreshed(
        config: IndexConfig,
        fetcher: F,
    ) -> Result<(Self, RefreshReport), CoreError> {
        let (service, report) = Self::initialize_with_report(config, fetcher).await?;
        if report.fetch != FetchOutcome::Skipped {
            return Ok((service, report));
        }
        let report = service.force_refresh().await;
        Ok((service, report))
    }

    /// Refetch if the cache is stale. For scheduled use.
    pub async fn refresh(&self) -> RefreshReport {
        self.refresh_inner(false).await
    }

    /// Refetch regardless of cache age
    ///
    /// A failed fetch keeps the cache, a malformed document keeps the index.
    pub async fn force_refresh(&self) -> RefreshReport {
        self.refresh_inner(true).await
    }

    async fn refresh_inner(&self, force: bool) -> RefreshReport {
        let _guard = self.refresh_lock.lock().await;
        let mut report = RefreshReport::new();

        if !force && !self.cache.is_stale(self.config.cache_ttl()) {
            debug!("Cached document is fresh, skipping refresh");
            report.districts = self.snapshot.read().len();
            return report;
        }

        let download = fetch_document(
            &self.fetcher,
            &self.cache,
            &self.config.source_url,
            &self.event_bus,
            &mut report,
        )
        .await;

        match download {
            Download::Ready(parsed, fetched_at) => {
                let snapshot = Arc::new(IndexSnapshot::new(parsed, fetched_at));
                report.reloaded = true;
                report.districts = snapshot.len();
                self.event_bus.publish(IndexEvent::IndexReloaded {
                    districts: snapshot.len(),
                    last_updated: snapshot.last_updated.clone(),
                });
                info!(districts = snapshot.len(), "Forest fire index reloaded");
                *self.snapshot.write() = snapshot;
            }
            Download::Failed | Download::Malformed(_) => {
                report.districts = self.snapshot.read().len();
            }
        }

        report
    }

    /// Consistent view of the current index
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.snapshot.read().clone()
    }

    /// District names in publication order
    pub fn districts(&self) -> Vec<String> {
        self.snapshot().districts().map(str::to_string).collect()
    }

    /// Risk level with color and description, `None` for unknown districts
    pub fn lookup(&self, district: &str) -> Option<RiskDescriptor> {
        self.snapshot.read().lookup(district)
    }

    pub fn risk_level(&self, district: &str) -> Option<i64> {
        self.snapshot.read().risk_level(district)
    }

    /// Publication date of the loaded document
    pub fn last_updated(&self) -> Option<String> {
        self.snapshot.read().last_updated.clone()
    }

    pub fn status(&self) -> IndexStatus {
        let snapshot = self.snapshot();
        let now = Utc::now();
        let ttl = self.config.cache_ttl();
        IndexStatus {
            source_url: self.config.source_url.clone(),
            cache_path: self.cache.path().to_path_buf(),
            cached_at: self.cache.fetched_at().ok().flatten(),
            age_secs: self.cache.age_at(now).map(|age| age.as_secs()),
            ttl_secs: ttl.as_secs(),
            stale: self.cache.is_stale_at(ttl, now),
            districts: snapshot.len(),
            last_updated: snapshot.last_updated.clone(),
            loaded_at: snapshot.loaded_at,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IndexEvent> {
        self.event_bus.subscribe()
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }
}

/// Outcome of one fetch attempt
enum Download {
    /// Parsed, and cached if the write succeeded
    Ready(ParsedIndex, DateTime<Utc>),
    Failed,
    Malformed(CoreError),
}

/// Fetch, parse and cache a new document
///
/// A downloaded document only replaces the cache once it parses, anything
/// else leaves cache and index as they are.
async fn fetch_document<F: DocumentFetcher>(
    fetcher: &F,
    cache: &DocumentCache,
    url: &str,
    event_bus: &EventBus,
    report: &mut RefreshReport,
) -> Download {
    let bytes = match fetcher.fetch(url).await {
        Ok(bytes) => bytes,
        Err(failure) => {
            warn!(url, error = %failure, "Fetch failed, keeping cached document");
            report.fetch = FetchOutcome::Failed;
            report.add_issue(
                RefreshIssue::warning("fetch", failure.to_string())
                    .with_suggestion("Serving the cached document until the source is reachable"),
            );
            event_bus.publish(IndexEvent::FetchFailed(failure.to_string()));
            return Download::Failed;
        }
    };

    let parsed = match parse_document(&bytes) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(url, error = %e, "Downloaded document is malformed, keeping cached document");
            report.fetch = FetchOutcome::Failed;
            report.add_issue(RefreshIssue::from_core_error("parser", &e));
            event_bus.publish(IndexEvent::ParseFailed(e.to_string()));
            return Download::Malformed(e);
        }
    };
    record_parse_warnings(&parsed, report);

    report.fetch = FetchOutcome::Fetched { bytes: bytes.len() };
    let fetched_at = match cache.replace(&bytes) {
        Ok(document) => {
            event_bus.publish(IndexEvent::CacheRefreshed { bytes: bytes.len() });
            document.fetched_at
        }
        Err(e) => {
            // The new data is still served, it just won't survive a restart
            warn!(error = %e, "Failed to write document cache");
            report.add_issue(RefreshIssue::from_core_error("cache", &e));
            Utc::now()
        }
    };

    Download::Ready(parsed, fetched_at)
}

fn record_parse_warnings(parsed: &ParsedIndex, report: &mut RefreshReport) {
    for warning in &parsed.warnings {
        report.add_warning("parser", warning.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(xml: &str) -> IndexSnapshot {
        IndexSnapshot::new(parse_document(xml.as_bytes()).unwrap(), Utc::now())
    }

    #[test]
    fn test_snapshot_queries() {
        let snap = snapshot(
            r#"<wbs><tag><datum>2025-03-11</datum><landkreis name="Barnim">3</landkreis><landkreis name="Prignitz">x</landkreis></tag></wbs>"#,
        );

        assert_eq!(snap.districts().collect::<Vec<_>>(), vec!["Barnim", "Prignitz"]);
        assert_eq!(snap.last_updated(), Some("2025-03-11"));
        assert_eq!(snap.risk_level("Barnim"), Some(3));
        assert_eq!(snap.lookup("Barnim").unwrap().description, "Mittlere Gefahr");
        assert_eq!(snap.lookup("Prignitz").unwrap().color, "#6c757d");
        assert_eq!(snap.lookup("Nonexistent"), None);
        assert_eq!(snap.len(), 2);
        assert!(!snap.is_empty());
    }
}

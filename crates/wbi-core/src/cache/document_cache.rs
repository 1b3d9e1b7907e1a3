//! Durable cache for the raw index document
//!
//! Stores the last successfully fetched document at a configurable path
//! (default `~/.cache/wbi/wgs_cache.xml`). The file's mtime is the fetch time
//! and drives the staleness check.
//!
//! Replacement goes through a temp file in the same directory followed by a
//! rename, so readers see either the old or the new document, never a
//! truncated one.

use crate::error::CoreError;
use chrono::{DateTime, Utc};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Raw document bytes together with the time they were fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedDocument {
    pub raw_bytes: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

/// File-backed holder of the last fetched document
#[derive(Debug, Clone)]
pub struct DocumentCache {
    path: PathBuf,
}

impl DocumentCache {
    /// Open a cache at `path`. Nothing is touched on disk until [`replace`](Self::replace).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fetch time of the cached artifact, `None` if nothing is cached
    pub fn fetched_at(&self) -> Result<Option<DateTime<Utc>>, CoreError> {
        let metadata = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CoreError::FileRead {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        let modified = metadata.modified().map_err(|e| CoreError::FileRead {
            path: self.path.clone(),
            source: e,
        })?;

        Ok(Some(DateTime::<Utc>::from(modified)))
    }

    /// Age of the cached artifact at `now`. Future mtimes count as age zero.
    pub fn age_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        let fetched_at = self.fetched_at().ok().flatten()?;
        Some(
            now.signed_duration_since(fetched_at)
                .to_std()
                .unwrap_or(Duration::ZERO),
        )
    }

    pub fn age(&self) -> Option<Duration> {
        self.age_at(Utc::now())
    }

    /// True if nothing is cached or the cached document is older than `max_age`
    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.is_stale_at(max_age, Utc::now())
    }

    /// Staleness check against an explicit clock
    pub fn is_stale_at(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        match self.fetched_at() {
            Ok(Some(fetched_at)) => {
                let age = now
                    .signed_duration_since(fetched_at)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                let stale = age > max_age;
                debug!(
                    path = %self.path.display(),
                    age_secs = age.as_secs(),
                    ttl_secs = max_age.as_secs(),
                    stale,
                    "Checked document cache age"
                );
                stale
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "No cached document");
                true
            }
            Err(e) => {
                warn!(error = %e, "Cannot stat document cache, treating as stale");
                true
            }
        }
    }

    /// Current cached document
    pub fn current(&self) -> Result<CachedDocument, CoreError> {
        let raw_bytes = std::fs::read(&self.path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                CoreError::CacheNotFound {
                    path: self.path.clone(),
                }
            } else {
                CoreError::FileRead {
                    path: self.path.clone(),
                    source: e,
                }
            }
        })?;

        let fetched_at = self.fetched_at()?.ok_or_else(|| CoreError::CacheNotFound {
            path: self.path.clone(),
        })?;

        Ok(CachedDocument {
            raw_bytes,
            fetched_at,
        })
    }

    /// Atomically overwrite the cached document and its fetch time
    ///
    /// The new fetch time is never earlier than the one it replaces.
    pub fn replace(&self, bytes: &[u8]) -> Result<CachedDocument, CoreError> {
        if bytes.is_empty() {
            return Err(CoreError::EmptyDocument {
                path: self.path.clone(),
            });
        }

        let write_err = |source: std::io::Error| CoreError::FileWrite {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(write_err)?;

        let previous = self.fetched_at().ok().flatten();
        let fetched_at = match previous {
            Some(prev) => prev.max(Utc::now()),
            None => Utc::now(),
        };

        // Dropped (and removed) on any early return below
        let mut tmp = tempfile::Builder::new()
            .prefix(".wbi-cache")
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(write_err)?;
        tmp.write_all(bytes).map_err(write_err)?;
        tmp.flush().map_err(write_err)?;
        tmp.as_file()
            .set_modified(SystemTime::from(fetched_at))
            .map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        info!(
            path = %self.path.display(),
            bytes = bytes.len(),
            "Replaced cached document"
        );

        Ok(CachedDocument {
            raw_bytes: bytes.to_vec(),
            fetched_at,
        })
    }

    /// Remove the cached document. Returns false if there was nothing to remove.
    pub fn clear(&self) -> Result<bool, CoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Cleared document cache");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CoreError::FileWrite {
                path: self.path.clone(),
                source: e,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TTL: Duration = Duration::from_secs(3 * 60 * 60);

    #[test]
    fn test_fresh_store_is_stale_and_empty() {
        let dir = tempdir().unwrap();
        let cache = DocumentCache::new(dir.path().join("wgs_cache.xml"));

        assert!(cache.is_stale(TTL));
        assert!(cache.age().is_none());
        assert!(matches!(
            cache.current(),
            Err(CoreError::CacheNotFound { .. })
        ));
    }

    #[test]
    fn test_replace_then_current() {
        let dir = tempdir().unwrap();
        let cache = DocumentCache::new(dir.path().join("wgs_cache.xml"));

        let written = cache.replace(b"<wbs/>").unwrap();
        let current = cache.current().unwrap();

        assert_eq!(current.raw_bytes, b"<wbs/>");
        assert_eq!(written.raw_bytes, current.raw_bytes);
        assert!(!cache.is_stale(TTL));
    }

    #[test]
    fn test_staleness_boundary() {
        let dir = tempdir().unwrap();
        let cache = DocumentCache::new(dir.path().join("wgs_cache.xml"));
        cache.replace(b"<wbs/>").unwrap();

        let fetched_at = cache.current().unwrap().fetched_at;
        let ttl = chrono::Duration::from_std(TTL).unwrap();

        assert!(!cache.is_stale_at(TTL, fetched_at));
        assert!(!cache.is_stale_at(TTL, fetched_at + ttl));
        assert!(cache.is_stale_at(TTL, fetched_at + ttl + chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_future_mtime_is_not_stale() {
        let dir = tempdir().unwrap();
        let cache = DocumentCache::new(dir.path().join("wgs_cache.xml"));
        cache.replace(b"<wbs/>").unwrap();

        let past = Utc::now() - chrono::Duration::hours(1);
        assert!(!cache.is_stale_at(TTL, past));
        assert_eq!(cache.age_at(past), Some(Duration::ZERO));
    }

    #[test]
    fn test_replace_is_monotonic() {
        let dir = tempdir().unwrap();
        let cache = DocumentCache::new(dir.path().join("wgs_cache.xml"));

        let first = cache.replace(b"<a/>").unwrap();
        let second = cache.replace(b"<b/>").unwrap();

        assert!(second.fetched_at >= first.fetched_at);
        assert_eq!(cache.current().unwrap().raw_bytes, b"<b/>");
    }

    #[test]
    fn test_replace_keeps_later_previous_timestamp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wgs_cache.xml");
        std::fs::write(&path, b"<old/>").unwrap();

        // Simulate a clock that went backwards since the last fetch
        let future = Utc::now() + chrono::Duration::hours(2);
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::from(future)).unwrap();
        drop(file);

        let cache = DocumentCache::new(&path);
        let replaced = cache.replace(b"<new/>").unwrap();
        assert!(replaced.fetched_at > Utc::now() + chrono::Duration::hours(1));

        let on_disk = cache.fetched_at().unwrap().unwrap();
        assert!(on_disk > Utc::now() + chrono::Duration::hours(1));
    }

    #[test]
    fn test_replace_rejects_empty_document() {
        let dir = tempdir().unwrap();
        let cache = DocumentCache::new(dir.path().join("wgs_cache.xml"));
        cache.replace(b"<wbs/>").unwrap();

        assert!(matches!(
            cache.replace(b""),
            Err(CoreError::EmptyDocument { .. })
        ));
        assert_eq!(cache.current().unwrap().raw_bytes, b"<wbs/>");
    }

    #[test]
    fn test_replace_creates_parent_and_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let cache = DocumentCache::new(dir.path().join("nested/deeper/wgs_cache.xml"));
        cache.replace(b"<wbs/>").unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("nested/deeper"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("wgs_cache.xml")]);
    }

    #[test]
    fn test_clear() {
        let dir = tempdir().unwrap();
        let cache = DocumentCache::new(dir.path().join("wgs_cache.xml"));

        assert!(!cache.clear().unwrap());
        cache.replace(b"<wbs/>").unwrap();
        assert!(cache.clear().unwrap());
        assert!(cache.is_stale(TTL));
    }
}

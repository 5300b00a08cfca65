use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

pub const CALENDAR_CACHE_DURATION: Duration = Duration::days(31);
pub const EVENT_CACHE_DURATION: Duration = Duration::minutes(30);
pub const ISSUE_CACHE_DURATION: Duration = Duration::minutes(30);

#[derive(Serialize, Deserialize)]
struct CacheEntry<T> {
    saved_at: DateTime<Utc>,
    data: T,
}

/// JSON files under one directory, each holding a value and when it was fetched.
#[derive(Clone, Debug)]
pub struct Cache {
    dir: PathBuf,
}

impl Cache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Returns the cached `name` if younger than `ttl`, otherwise calls `fetch`
    /// and stores its result.
    pub fn check<T, F>(&self, name: &str, ttl: Duration, fetch: F) -> Result<T, SyncError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, SyncError>,
    {
        self.check_at(name, ttl, Utc::now(), fetch)
    }

    fn check_at<T, F>(&self, name: &str, ttl: Duration, now: DateTime<Utc>, fetch: F) -> Result<T, SyncError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, SyncError>,
    {
        if let Some(entry) = self.load::<T>(name)
            && now - entry.saved_at < ttl
        {
            log::debug!("Cache hit for {name}");
            return Ok(entry.data);
        }

        let data = fetch()?;
        let entry = CacheEntry { saved_at: now, data };
        self.save(name, &entry)?;
        Ok(entry.data)
    }

    /// Forgets `name` so the next check fetches again.
    pub fn invalidate(&self, name: &str) -> Result<(), SyncError> {
        let path = self.path(name);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Option<CacheEntry<T>> {
        let content = fs::read_to_string(self.path(name)).ok()?;
        match serde_json::from_str(&content) {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("Ignoring unreadable cache {name}: {err}");
                None
            }
        }
    }

    fn save<T: Serialize>(&self, name: &str, entry: &CacheEntry<T>) -> Result<(), SyncError> {
        fs::create_dir_all(&self.dir)?;
        let content = serde_json::to_string_pretty(entry)?;
        fs::write(self.path(name), content)?;
        Ok(())
    }
}

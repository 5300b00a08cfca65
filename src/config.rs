use chrono_tz::Tz;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::sort::SortOrder;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "diary-sync", "diary-sync")
}

fn default_data_dir() -> PathBuf {
    if let Some(path) = std::env::var_os("DIARY_SYNC_DATA_DIR") {
        return PathBuf::from(path);
    }
    if let Some(dirs) = project_dirs() {
        return dirs.data_dir().to_path_buf();
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".diary-sync")
}

fn default_notes_dir() -> PathBuf {
    default_data_dir().join("diary")
}

pub fn default_cache_dir() -> PathBuf {
    if let Some(dirs) = project_dirs() {
        return dirs.cache_dir().to_path_buf();
    }
    default_data_dir().join("cache")
}

pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os("DIARY_SYNC_CONFIG") {
        return PathBuf::from(path);
    }
    if let Some(dirs) = project_dirs() {
        return dirs.config_dir().join("config.toml");
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".diary-sync-config.toml")
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub active: bool,
    pub notes_path: PathBuf,
    pub cache_path: PathBuf,
    pub daily_headings: Vec<String>,
    /// IANA name; tracker timestamps are rendered in this zone.
    pub timezone: String,
    pub sort_issues_on_upload: bool,
    pub sort_order: SortOrder,
    pub google: GoogleConfig,
    pub github: GitHubConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            active: true,
            notes_path: default_notes_dir(),
            cache_path: default_cache_dir(),
            daily_headings: vec!["Notes".to_string()],
            timezone: "Europe/London".to_string(),
            sort_issues_on_upload: false,
            sort_order: SortOrder::default(),
            google: GoogleConfig::default(),
            github: GitHubConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GoogleConfig {
    pub use_google_calendar: bool,
    /// Calendar names whose events never enter the schedule.
    pub calendar_filter_list: Vec<String>,
    pub add_to_google_cal: bool,
    /// Calendar that diary events are uploaded to.
    pub google_cal_name: String,
    pub access_token: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            use_google_calendar: false,
            calendar_filter_list: Vec::new(),
            add_to_google_cal: false,
            google_cal_name: "primary".to_string(),
            access_token: String::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GitHubConfig {
    pub use_github_repo: bool,
    pub repo_name: String,
    pub user_name: String,
    pub token: String,
    pub api_url: String,
    pub timeout_seconds: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            use_github_repo: false,
            repo_name: String::new(),
            user_name: String::new(),
            token: String::new(),
            api_url: "https://api.github.com".to_string(),
            timeout_seconds: 20,
        }
    }
}

impl GitHubConfig {
    pub fn resolve_token(&self) -> String {
        if !self.token.trim().is_empty() {
            return self.token.trim().to_string();
        }
        std::env::var("GITHUB_TOKEN").unwrap_or_default()
    }

    /// `owner/name`, taking the owner from `user_name` when `repo_name` has none.
    pub fn full_repo_name(&self) -> String {
        if self.repo_name.contains('/') || self.user_name.trim().is_empty() {
            return self.repo_name.trim().to_string();
        }
        format!("{}/{}", self.user_name.trim(), self.repo_name.trim())
    }
}

impl GoogleConfig {
    pub fn resolve_access_token(&self) -> String {
        if !self.access_token.trim().is_empty() {
            return self.access_token.trim().to_string();
        }
        std::env::var("DIARY_SYNC_GOOGLE_TOKEN").unwrap_or_default()
    }
}

impl Config {
    pub fn load() -> Self {
        let config_path = config_path();
        let mut config = Self::load_from_path(&config_path);

        let changed = config.normalize_paths();
        if changed || !config_path.exists() {
            if let Err(err) = config.save_to_path(&config_path) {
                log::warn!("Could not write {config_path:?}: {err}");
            }
        }

        config
    }

    /// Reads a config file; a missing or unparsable file yields the defaults.
    pub fn load_from_path(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Config::default();
        };
        match toml::from_str::<Config>(&content) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to parse config.toml ({path:?}), using defaults: {e}");
                Config::default()
            }
        }
    }

    pub fn save_to_path(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).unwrap_or_default();
        fs::write(path, content)
    }

    pub fn timezone(&self) -> Result<Tz, SyncError> {
        self.timezone
            .trim()
            .parse::<Tz>()
            .map_err(|_| SyncError::Config(format!("Unknown timezone: {}", self.timezone)))
    }

    fn normalize_paths(&mut self) -> bool {
        let mut changed = false;

        if self.notes_path.as_os_str().is_empty() {
            self.notes_path = default_notes_dir();
            changed = true;
        }
        if self.notes_path.is_relative() {
            self.notes_path = default_data_dir().join(&self.notes_path);
            changed = true;
        }

        if self.cache_path.as_os_str().is_empty() {
            self.cache_path = default_cache_dir();
            changed = true;
        }
        if self.cache_path.is_relative() {
            self.cache_path = default_data_dir().join(&self.cache_path);
            changed = true;
        }

        changed
    }
}

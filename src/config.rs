//! # Configuration Module
//!
//! This module handles configuration management and data directory setup for Cadence.
//! It provides platform-appropriate data storage locations, ensures necessary
//! directories exist, and loads the session tunables.
//!
//! ## Data Storage
//!
//! Cadence stores its catalog database and optional `config.json` in the
//! platform-standard data directory:
//! - Linux: `~/.local/share/cadence/`
//! - macOS: `~/Library/Application Support/cadence/`
//! - Windows: `%APPDATA%\cadence\`
//!
//! ## Session Tunables
//!
//! [`SessionConfig`] carries the constants the playback core depends on: a
//! 20 second genuine-listen threshold, five-song personalized batches and
//! one-minute sleep ticks by default. A `config.json` may override any subset
//! of them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "cadence";
const DB_FILE: &str = "catalog.db";
const CONFIG_FILE: &str = "config.json";

/// Returns the platform-appropriate data directory for Cadence, creating it
/// when missing.
///
/// # Errors
///
/// This function will return an error if:
/// - The system data directory cannot be determined
/// - The cadence subdirectory cannot be created due to permissions
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        ))?;

    let cadence_dir = data_dir.join(APP_DIR);
    fs::create_dir_all(&cadence_dir)
        .with_context(|| format!(
            "Failed to create Cadence data directory at {}. Please check file permissions.",
            cadence_dir.display()
        ))?;

    Ok(cadence_dir)
}

/// Returns the platform-appropriate catalog database path.
///
/// # Examples
///
/// ```no_run
/// use cadence::config::get_db_path;
///
/// let db_path = get_db_path()?;
/// println!("Catalog location: {}", db_path.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(DB_FILE))
}

/// Tunables for a playback session.
///
/// Durations are (de)serialized as fractional seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// A span strictly longer than this counts as a genuine listen.
    #[serde(with = "secs")]
    pub listen_threshold: Duration,
    /// Recommendations kept after the seed song when a list is seeded.
    pub seed_take: usize,
    /// Size of a freshly seeded or replaced personalized list.
    pub list_cap: usize,
    /// Maximum songs appended by one refill.
    pub refill_cap: usize,
    /// Sleep timer countdown granularity.
    #[serde(with = "secs")]
    pub sleep_tick: Duration,
    /// Position readbacks are ignored for this long after a seek.
    #[serde(with = "secs")]
    pub seek_grace: Duration,
    /// Metadata probes attempted before reporting it unavailable.
    pub metadata_retry_limit: u32,
    pub default_volume: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            listen_threshold: Duration::from_secs(20),
            seed_take: 4,
            list_cap: 5,
            refill_cap: 5,
            sleep_tick: Duration::from_secs(60),
            seek_grace: Duration::from_millis(750),
            metadata_retry_limit: 10,
            default_volume: 0.75,
        }
    }
}

impl SessionConfig {
    /// Load from a JSON file; absent fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read session config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid session config {}", path.display()))?;
        log::debug!("Loaded session config from {}: {config:?}", path.display());
        Ok(config)
    }

    /// `config.json` from the data directory, or defaults if there is none.
    pub fn load_or_default() -> Result<Self> {
        let path = get_data_dir()?.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Configuration for runtime behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Path to the catalog database file
    pub db_path: PathBuf,
    pub session: SessionConfig,
}

impl RuntimeConfig {
    /// Resolve the runtime configuration, honouring explicit overrides.
    pub fn resolve(db_path: Option<PathBuf>, config_path: Option<&Path>) -> Result<Self> {
        let db_path = match db_path {
            Some(path) => path,
            None => get_db_path()?,
        };
        let session = match config_path {
            Some(path) => SessionConfig::load(path)?,
            None => SessionConfig::load_or_default()?,
        };
        Ok(Self { db_path, session })
    }

    /// Create configuration with explicit database path
    pub fn with_db_path(db_path: PathBuf) -> Self {
        Self {
            db_path,
            session: SessionConfig::default(),
        }
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(|e| {
            serde::de::Error::custom(format!("duration must be a non-negative number of seconds: {e}"))
        })
    }
}

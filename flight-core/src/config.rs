//! Configuration file management for flight-tracker.
//!
//! Reads/writes `~/.flight-tracker/config.toml` with home location, upstream
//! endpoints, cache lifetimes, enrichment budget, filter thresholds, and
//! display timing. Every key is optional; missing keys take the defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::geo::{BoundingBox, LatLon};
use crate::types::{FlightError, Result};

/// Full configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub location: LocationConfig,
    pub opensky: OpenSkyConfig,
    pub adsbdb: AdsbdbConfig,
    pub cache: CacheConfig,
    pub enrichment: EnrichmentConfig,
    pub filter: FilterConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub lat: f64,
    pub lon: f64,
    /// Radius of the state query box.
    pub radius_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenSkyConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdsbdbConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub route_ttl_secs: u64,
    pub metadata_ttl_secs: u64,
    /// Lifetime of authoritative "not found" results.
    pub failed_ttl_secs: u64,
    pub sweep_every_cycles: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub budget_per_cycle: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub max_distance_km: f64,
    pub min_altitude_m: f64,
    pub exclude_on_ground: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub tick_ms: u64,
    pub cycle_interval_secs: u64,
    pub shutdown_grace_secs: u64,
    /// How long the farewell status stays up before the display is blanked.
    pub goodbye_ms: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        LocationConfig {
            lat: 0.0,
            lon: 0.0,
            radius_km: 50.0,
        }
    }
}

impl Default for OpenSkyConfig {
    fn default() -> Self {
        OpenSkyConfig {
            base_url: "https://opensky-network.org/api".into(),
            username: None,
            password: None,
            poll_interval_secs: 15,
            request_timeout_secs: 10,
        }
    }
}

impl Default for AdsbdbConfig {
    fn default() -> Self {
        AdsbdbConfig {
            base_url: "https://api.adsbdb.com/v0".into(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            route_ttl_secs: 3600,
            metadata_ttl_secs: 86400,
            failed_ttl_secs: 300,
            sweep_every_cycles: 20,
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        EnrichmentConfig {
            budget_per_cycle: 3,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            max_distance_km: 50.0,
            min_altitude_m: 100.0,
            exclude_on_ground: true,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            tick_ms: 100,
            cycle_interval_secs: 10,
            shutdown_grace_secs: 5,
            goodbye_ms: 1000,
        }
    }
}

impl Config {
    pub fn home(&self) -> LatLon {
        LatLon::new(self.location.lat, self.location.lon)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::around(
            self.location.lat,
            self.location.lon,
            self.location.radius_km,
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.opensky.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.opensky.request_timeout_secs)
    }

    /// Basic-auth pair, only when a username is set.
    pub fn opensky_credentials(&self) -> Option<(String, String)> {
        let user = self.opensky.username.as_deref().filter(|u| !u.is_empty())?;
        let pass = self.opensky.password.clone().unwrap_or_default();
        Some((user.to_string(), pass))
    }

    /// Reject values the tracker cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(-90.0..=90.0).contains(&self.location.lat) {
            return Err(FlightError::Config(format!(
                "latitude {} out of range",
                self.location.lat
            )));
        }
        if !(-180.0..=180.0).contains(&self.location.lon) {
            return Err(FlightError::Config(format!(
                "longitude {} out of range",
                self.location.lon
            )));
        }
        if self.location.radius_km <= 0.0 {
            return Err(FlightError::Config("radius_km must be positive".into()));
        }
        if self.opensky.poll_interval_secs == 0 {
            return Err(FlightError::Config(
                "poll_interval_secs must be at least 1".into(),
            ));
        }
        if self.display.tick_ms == 0 {
            return Err(FlightError::Config("tick_ms must be at least 1".into()));
        }
        Ok(())
    }
}

impl CacheConfig {
    pub fn route_ttl(&self) -> Duration {
        Duration::from_secs(self.route_ttl_secs)
    }

    pub fn metadata_ttl(&self) -> Duration {
        Duration::from_secs(self.metadata_ttl_secs)
    }

    pub fn failed_ttl(&self) -> Duration {
        Duration::from_secs(self.failed_ttl_secs)
    }
}

impl DisplayConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn goodbye_hold(&self) -> Duration {
        Duration::from_millis(self.goodbye_ms)
    }
}

/// Get the config directory path (`~/.flight-tracker/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".flight-tracker")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `~/.flight-tracker/config.toml`.
///
/// Returns default config if the file doesn't exist.
pub fn load_config() -> Result<Config> {
    let path = config_file();
    if !path.exists() {
        return Ok(Config::default());
    }
    load_config_from(&path)
}

/// Load config from an explicit path. Missing or invalid files are errors.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)?;
    parse_config(&text).map_err(|source| FlightError::ConfigParse {
        path: path.display().to_string(),
        source,
    })
}

/// Save config to `~/.flight-tracker/config.toml`.
pub fn save_config(config: &Config) -> Result<PathBuf> {
    let path = config_file();
    save_config_to(config, &path)?;
    Ok(path)
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let text = serialize_config(config)?;
    std::fs::write(path, text)?;
    Ok(())
}

fn parse_config(text: &str) -> std::result::Result<Config, toml::de::Error> {
    toml::from_str(text)
}

fn serialize_config(config: &Config) -> Result<String> {
    let body = toml::to_string_pretty(config).map_err(|e| FlightError::Config(e.to_string()))?;
    Ok(format!("# flight-tracker configuration\n\n{body}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

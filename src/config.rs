use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::model::{CircleParams, EarthquakeParameters, GeoPoint, HurricaneParameters};

pub const DEV_API_URL: &str = "http://localhost:8000";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Everything tunable. Defaults, then an optional TOML file, then env vars.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub environment: Environment,
    pub api: ApiSettings,
    pub server: ServerSettings,
    pub defaults: DefaultParams,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Required in production; development falls back to [`DEV_API_URL`].
    pub base_url: Option<String>,
    pub timeout_ms: u64,
    /// Total attempts per simulation, 1 = no retry.
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: 30_000,
            max_attempts: 1,
            retry_delay_ms: 500,
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub frontend_dir: PathBuf,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            frontend_dir: PathBuf::from("frontend"),
        }
    }
}

/// Starting values for a freshly chosen disaster.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DefaultParams {
    pub map_center: GeoPoint,
    pub map_zoom: u8,

    pub earthquake_radius: f64,
    pub earthquake_intensity: f64,

    // Hurricane weakens along its path: end is smaller and less intense.
    pub hurricane_start_radius: f64,
    pub hurricane_start_intensity: f64,
    pub hurricane_end_offset: GeoPoint,
    pub hurricane_end_radius: f64,
    pub hurricane_end_intensity: f64,
}

impl Default for DefaultParams {
    fn default() -> Self {
        Self {
            map_center: GeoPoint::new(30.619026, -96.338900),
            map_zoom: 10,
            earthquake_radius: 10_000.0,
            earthquake_intensity: 70.0,
            hurricane_start_radius: 10_000.0,
            hurricane_start_intensity: 90.0,
            hurricane_end_offset: GeoPoint::new(0.4, 0.4),
            hurricane_end_radius: 5_000.0,
            hurricane_end_intensity: 50.0,
        }
    }
}

impl DefaultParams {
    pub fn earthquake_at(&self, center: GeoPoint) -> EarthquakeParameters {
        EarthquakeParameters(CircleParams::new(
            center,
            self.earthquake_radius,
            self.earthquake_intensity,
        ))
    }

    pub fn hurricane_at(&self, center: GeoPoint) -> HurricaneParameters {
        let end = center.offset(self.hurricane_end_offset.lat, self.hurricane_end_offset.lng);
        HurricaneParameters {
            start: CircleParams::new(
                center,
                self.hurricane_start_radius,
                self.hurricane_start_intensity,
            ),
            end: CircleParams::new(end, self.hurricane_end_radius, self.hurricane_end_intensity),
        }
    }

    fn validate(&self) -> Result<()> {
        self.earthquake_at(self.map_center)
            .0
            .validate()
            .map_err(|e| Error::config(format!("earthquake defaults: {e}")))?;
        let h = self.hurricane_at(self.map_center);
        h.start
            .validate()
            .and_then(|_| h.end.validate())
            .map_err(|e| Error::config(format!("hurricane defaults: {e}")))?;
        Ok(())
    }
}

impl Settings {
    /// Load from `HAZARDMAP_CONFIG` (if set) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut settings = match std::env::var_os("HAZARDMAP_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.defaults.validate()?;
        info!(
            environment = ?settings.environment,
            api = %settings.api_base_url()?,
            "settings loaded"
        );
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::config(e.to_string()))
    }

    /// Overrides come through a lookup function so tests need not touch the process env.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(env) = var("HAZARDMAP_ENV") {
            self.environment = match env.to_ascii_lowercase().as_str() {
                "development" | "dev" => Environment::Development,
                "production" | "prod" => Environment::Production,
                other => return Err(Error::config(format!("HAZARDMAP_ENV: unknown environment {other}"))),
            };
        }
        if let Some(url) = var("HAZARDMAP_API_URL") {
            self.api.base_url = Some(url);
        }
        if let Some(v) = var("HAZARDMAP_TIMEOUT_MS") {
            self.api.timeout_ms = parse_env("HAZARDMAP_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("HAZARDMAP_MAX_ATTEMPTS") {
            self.api.max_attempts = parse_env("HAZARDMAP_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = var("HAZARDMAP_ADDR") {
            self.server.addr = parse_env("HAZARDMAP_ADDR", &v)?;
        }
        Ok(())
    }

    /// Backend base URL for the selected environment, without trailing slash.
    pub fn api_base_url(&self) -> Result<String> {
        let url = match (&self.api.base_url, self.environment) {
            (Some(url), _) => url.clone(),
            (None, Environment::Development) => DEV_API_URL.to_string(),
            (None, Environment::Production) => {
                return Err(Error::config("production requires api.base_url"));
            }
        };
        Ok(url.trim_end_matches('/').to_string())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| Error::config(format!("{key}={value}: {e}")))
}

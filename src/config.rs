//! Navigation thresholds, travel profiles and directions API settings.
//!
//! Thresholds default per travel profile; any of them can be overridden
//! from JSON. Missing fields fall back to the chosen profile's defaults,
//! not to the walking defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};

/// Travel mode requested from the directions API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TravelProfile {
    #[default]
    FootWalking,
    CyclingRegular,
    DrivingCar,
}

impl TravelProfile {
    /// Profile name as used in openrouteservice URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelProfile::FootWalking => "foot-walking",
            TravelProfile::CyclingRegular => "cycling-regular",
            TravelProfile::DrivingCar => "driving-car",
        }
    }

    /// Default (announcement, recalculation) thresholds in meters.
    /// Faster modes get earlier announcements and more deviation slack.
    fn default_thresholds(&self) -> (f64, f64) {
        match self {
            TravelProfile::FootWalking => (25.0, 50.0),
            TravelProfile::CyclingRegular => (35.0, 75.0),
            TravelProfile::DrivingCar => (50.0, 100.0),
        }
    }
}

const DEFAULT_SNAP_THRESHOLD_M: f64 = 20.0;
const DEFAULT_ARRIVAL_THRESHOLD_M: f64 = 25.0;
const DEFAULT_FETCH_TIMEOUT_MS: u64 = 12_000;

/// Configuration for a navigation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Announce a step once the route position is within this distance of it.
    pub announcement_threshold_m: f64,

    /// Cross-track distance above which a new route is requested.
    pub recalculation_threshold_m: f64,

    /// Cross-track distance below which the displayed position is snapped
    /// to the route. Strictly less than: a fix exactly at the threshold is
    /// shown raw.
    pub snap_threshold_m: f64,

    /// Distance to destination at or below which the session arrives.
    pub arrival_threshold_m: f64,

    pub travel_profile: TravelProfile,

    /// When false, utterances are dropped silently.
    pub narration_enabled: bool,

    /// Caller-visible timeout for one route fetch.
    pub fetch_timeout_ms: u64,
}

impl NavigationConfig {
    /// Defaults for a travel profile.
    pub fn for_profile(profile: TravelProfile) -> Self {
        let (announcement, recalculation) = profile.default_thresholds();
        Self {
            announcement_threshold_m: announcement,
            recalculation_threshold_m: recalculation,
            snap_threshold_m: DEFAULT_SNAP_THRESHOLD_M,
            arrival_threshold_m: DEFAULT_ARRIVAL_THRESHOLD_M,
            travel_profile: profile,
            narration_enabled: true,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
        }
    }

    /// Parse a JSON config. Absent fields take the profile's defaults.
    ///
    /// ```
    /// use livenav::{NavigationConfig, TravelProfile};
    ///
    /// let config = NavigationConfig::from_json(
    ///     r#"{"travel_profile": "driving-car", "snap_threshold_m": 15}"#,
    /// ).unwrap();
    /// assert_eq!(config.travel_profile, TravelProfile::DrivingCar);
    /// assert_eq!(config.recalculation_threshold_m, 100.0);
    /// assert_eq!(config.snap_threshold_m, 15.0);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let overrides: NavigationConfigOverrides = serde_json::from_str(json)
            .map_err(|e| NavError::config(format!("invalid navigation config: {}", e)))?;
        let config = overrides.apply();
        config.validate()?;
        Ok(config)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Check that thresholds are usable together.
    pub fn validate(&self) -> Result<()> {
        let thresholds = [
            ("announcement_threshold_m", self.announcement_threshold_m),
            ("recalculation_threshold_m", self.recalculation_threshold_m),
            ("snap_threshold_m", self.snap_threshold_m),
            ("arrival_threshold_m", self.arrival_threshold_m),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value <= 0.0 {
                return Err(NavError::config(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        if self.snap_threshold_m >= self.recalculation_threshold_m {
            return Err(NavError::config(format!(
                "snap_threshold_m ({}) must be below recalculation_threshold_m ({})",
                self.snap_threshold_m, self.recalculation_threshold_m
            )));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(NavError::config("fetch_timeout_ms must be non-zero"));
        }
        Ok(())
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self::for_profile(TravelProfile::default())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct NavigationConfigOverrides {
    announcement_threshold_m: Option<f64>,
    recalculation_threshold_m: Option<f64>,
    snap_threshold_m: Option<f64>,
    arrival_threshold_m: Option<f64>,
    travel_profile: Option<TravelProfile>,
    narration_enabled: Option<bool>,
    fetch_timeout_ms: Option<u64>,
}

impl NavigationConfigOverrides {
    fn apply(self) -> NavigationConfig {
        let base = NavigationConfig::for_profile(self.travel_profile.unwrap_or_default());
        NavigationConfig {
            announcement_threshold_m: self
                .announcement_threshold_m
                .unwrap_or(base.announcement_threshold_m),
            recalculation_threshold_m: self
                .recalculation_threshold_m
                .unwrap_or(base.recalculation_threshold_m),
            snap_threshold_m: self.snap_threshold_m.unwrap_or(base.snap_threshold_m),
            arrival_threshold_m: self.arrival_threshold_m.unwrap_or(base.arrival_threshold_m),
            travel_profile: base.travel_profile,
            narration_enabled: self.narration_enabled.unwrap_or(base.narration_enabled),
            fetch_timeout_ms: self.fetch_timeout_ms.unwrap_or(base.fetch_timeout_ms),
        }
    }
}

/// Settings for the openrouteservice directions client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    /// Instruction language (ISO 639-1).
    pub language: String,
    /// Transport-level timeout for the HTTP request.
    pub request_timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openrouteservice.org".to_string(),
            api_key: String::new(),
            language: "en".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl ProviderConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: ProviderConfig = serde_json::from_str(json)
            .map_err(|e| NavError::config(format!("invalid provider config: {}", e)))?;
        if config.base_url.is_empty() {
            return Err(NavError::config("base_url must not be empty"));
        }
        if config.request_timeout_ms == 0 {
            return Err(NavError::config("request_timeout_ms must be non-zero"));
        }
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_defaults() {
        let walk = NavigationConfig::for_profile(TravelProfile::FootWalking);
        assert_eq!(walk.announcement_threshold_m, 25.0);
        assert_eq!(walk.recalculation_threshold_m, 50.0);

        let drive = NavigationConfig::for_profile(TravelProfile::DrivingCar);
        assert_eq!(drive.announcement_threshold_m, 50.0);
        assert_eq!(drive.recalculation_threshold_m, 100.0);
        assert_eq!(drive.snap_threshold_m, 20.0);
        assert!(drive.validate().is_ok());
    }

    #[test]
    fn test_from_json_uses_profile_defaults() {
        let config =
            NavigationConfig::from_json(r#"{"travel_profile": "cycling-regular"}"#).unwrap();
        assert_eq!(config.recalculation_threshold_m, 75.0);
        assert!(config.narration_enabled);

        let config = NavigationConfig::from_json("{}").unwrap();
        assert_eq!(config, NavigationConfig::default());
    }

    #[test]
    fn test_from_json_rejects_bad_values() {
        assert!(matches!(
            NavigationConfig::from_json(r#"{"snap_threshold_m": 60}"#),
            Err(NavError::ConfigError { .. })
        ));
        assert!(matches!(
            NavigationConfig::from_json(r#"{"arrival_threshold_m": -1}"#),
            Err(NavError::ConfigError { .. })
        ));
        assert!(matches!(
            NavigationConfig::from_json(r#"{"announce": 10}"#),
            Err(NavError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_profile_serde_names() {
        let json = serde_json::to_string(&TravelProfile::FootWalking).unwrap();
        assert_eq!(json, "\"foot-walking\"");
        assert_eq!(TravelProfile::DrivingCar.as_str(), "driving-car");
    }

    #[test]
    fn test_provider_config() {
        let config = ProviderConfig::from_json(r#"{"api_key": "k", "language": "es"}"#).unwrap();
        assert_eq!(config.api_key, "k");
        assert_eq!(config.language, "es");
        assert_eq!(config.base_url, "https://api.openrouteservice.org");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));

        assert!(ProviderConfig::from_json(r#"{"base_url": ""}"#).is_err());
    }
}

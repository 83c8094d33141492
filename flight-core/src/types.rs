//! Shared types and error enum for flight-core.

use serde::Serialize;
use thiserror::Error;

/// All errors produced by flight-core.
#[derive(Debug, Error)]
pub enum FlightError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("invalid config file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, FlightError>;

/// Normalize an optional string: trimmed, and `None` when nothing is left.
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Flight record
// ---------------------------------------------------------------------------

/// One tracked aircraft as seen in a single poll cycle.
///
/// Raw fields come straight from the state endpoint; `None` means the
/// upstream value was absent or null. Enriched fields are filled in by the
/// route/metadata lookups and are never blanked once learned (see
/// [`crate::merge::carry_forward`] and [`FlightRecord::absorb_route`]).
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FlightRecord {
    /// Stable 24-bit address in lowercase hex, the identity across cycles.
    pub icao24: String,
    pub callsign: Option<String>,
    pub origin_country: Option<String>,

    // Position
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub baro_altitude_m: Option<f64>,
    pub geo_altitude_m: Option<f64>,
    pub on_ground: bool,

    // Velocity
    pub velocity_mps: Option<f64>,
    pub true_track_deg: Option<f64>,
    pub vertical_rate_mps: Option<f64>,

    pub squawk: Option<String>,

    // Enriched
    pub origin_airport: Option<String>,
    pub destination_airport: Option<String>,
    pub aircraft_type: Option<String>,
    pub registration: Option<String>,

    /// Great-circle distance from home, set by the filter pipeline.
    pub distance_km: Option<f64>,
}

impl FlightRecord {
    pub fn new(icao24: impl Into<String>) -> Self {
        FlightRecord {
            icao24: icao24.into(),
            ..Default::default()
        }
    }

    pub fn has_position(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// Callsign if known, otherwise the ICAO address.
    pub fn label(&self) -> &str {
        self.callsign.as_deref().unwrap_or(&self.icao24)
    }

    /// True while neither end of the route is known.
    pub fn needs_route(&self) -> bool {
        self.origin_airport.is_none() && self.destination_airport.is_none()
    }

    pub fn needs_metadata(&self) -> bool {
        self.aircraft_type.is_none()
    }

    /// Copy any known route fields onto the record. Unknown fields leave
    /// existing values alone.
    pub fn absorb_route(&mut self, route: &Route) {
        if route.origin.is_some() {
            self.origin_airport = route.origin.clone();
        }
        if route.destination.is_some() {
            self.destination_airport = route.destination.clone();
        }
    }

    pub fn absorb_metadata(&mut self, info: &AircraftInfo) {
        if info.type_code.is_some() {
            self.aircraft_type = info.type_code.clone();
        }
        if info.registration.is_some() {
            self.registration = info.registration.clone();
        }
    }
}

// ---------------------------------------------------------------------------
// Enrichment payloads
// ---------------------------------------------------------------------------

/// Origin/destination airports (ICAO codes) for a callsign.
///
/// `Route::default()` is the authoritative "no known route" value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Route {
    pub origin: Option<String>,
    pub destination: Option<String>,
}

impl Route {
    pub fn new(origin: Option<&str>, destination: Option<&str>) -> Self {
        Route {
            origin: non_empty(origin),
            destination: non_empty(destination),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.origin.is_none() && self.destination.is_none()
    }
}

/// Airframe metadata for an ICAO address.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AircraftInfo {
    pub type_code: Option<String>,
    pub registration: Option<String>,
}

impl AircraftInfo {
    pub fn new(type_code: Option<&str>, registration: Option<&str>) -> Self {
        AircraftInfo {
            type_code: non_empty(type_code),
            registration: non_empty(registration),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.type_code.is_none() && self.registration.is_none()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

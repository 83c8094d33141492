//! OpenSky Network client: live state vectors and aircraft metadata.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use flight_core::{non_empty, AircraftInfo, BoundingBox, FlightRecord};

use crate::http::{FetchError, HttpClient};
use crate::lookup::LookupSource;

// State vector positions in the `states` arrays.
const IDX_ICAO24: usize = 0;
const IDX_CALLSIGN: usize = 1;
const IDX_ORIGIN_COUNTRY: usize = 2;
const IDX_LONGITUDE: usize = 5;
const IDX_LATITUDE: usize = 6;
const IDX_BARO_ALTITUDE: usize = 7;
const IDX_ON_GROUND: usize = 8;
const IDX_VELOCITY: usize = 9;
const IDX_TRUE_TRACK: usize = 10;
const IDX_VERTICAL_RATE: usize = 11;
const IDX_GEO_ALTITUDE: usize = 13;
const IDX_SQUAWK: usize = 14;

#[derive(Debug, Deserialize)]
struct StatesResponse {
    #[serde(default)]
    states: Option<Vec<Vec<Value>>>,
}

#[derive(Debug, Deserialize)]
struct MetadataResponse {
    #[serde(default)]
    typecode: Option<String>,
    #[serde(default)]
    registration: Option<String>,
}

// ---------------------------------------------------------------------------
// State fetcher
// ---------------------------------------------------------------------------

/// Retrieves current state vectors inside a bounding box.
pub struct StateFetcher {
    client: Arc<dyn HttpClient>,
    base_url: String,
}

impl StateFetcher {
    pub fn new(client: Arc<dyn HttpClient>, base_url: &str) -> Self {
        StateFetcher {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn states_url(&self, bbox: &BoundingBox) -> String {
        format!(
            "{}/states/all?lamin={:.4}&lomin={:.4}&lamax={:.4}&lomax={:.4}",
            self.base_url, bbox.south, bbox.west, bbox.north, bbox.east
        )
    }

    /// Current records in `bbox`. Any failure is logged and yields an empty
    /// list; the next poll is the retry.
    pub async fn fetch(&self, bbox: &BoundingBox) -> Vec<FlightRecord> {
        match self.try_fetch(bbox).await {
            Ok(records) => records,
            Err(FetchError::RateLimited) => {
                tracing::warn!("rate limited by OpenSky (429)");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch states");
                Vec::new()
            }
        }
    }

    async fn try_fetch(&self, bbox: &BoundingBox) -> Result<Vec<FlightRecord>, FetchError> {
        let response = self.client.get(&self.states_url(bbox)).await?;
        parse_states(response.success_body()?)
    }
}

/// Parse a `/states/all` body. Rows without an ICAO address are skipped;
/// every other missing or null field becomes unknown.
pub fn parse_states(body: &[u8]) -> Result<Vec<FlightRecord>, FetchError> {
    let parsed: StatesResponse =
        serde_json::from_slice(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    let rows = parsed.states.unwrap_or_default();
    let total = rows.len();
    let records: Vec<FlightRecord> = rows.iter().filter_map(|row| parse_state_row(row)).collect();
    if records.len() < total {
        tracing::debug!(skipped = total - records.len(), "state rows without icao24");
    }
    Ok(records)
}

fn parse_state_row(row: &[Value]) -> Option<FlightRecord> {
    let icao24 = non_empty(str_at(row, IDX_ICAO24))?.to_ascii_lowercase();
    Some(FlightRecord {
        icao24,
        callsign: non_empty(str_at(row, IDX_CALLSIGN)),
        origin_country: non_empty(str_at(row, IDX_ORIGIN_COUNTRY)),
        longitude: f64_at(row, IDX_LONGITUDE),
        latitude: f64_at(row, IDX_LATITUDE),
        baro_altitude_m: f64_at(row, IDX_BARO_ALTITUDE),
        on_ground: row
            .get(IDX_ON_GROUND)
            .and_then(Value::as_bool)
            .unwrap_or(false),
        velocity_mps: f64_at(row, IDX_VELOCITY),
        true_track_deg: f64_at(row, IDX_TRUE_TRACK),
        vertical_rate_mps: f64_at(row, IDX_VERTICAL_RATE),
        geo_altitude_m: f64_at(row, IDX_GEO_ALTITUDE),
        squawk: non_empty(str_at(row, IDX_SQUAWK)),
        ..Default::default()
    })
}

fn str_at(row: &[Value], idx: usize) -> Option<&str> {
    row.get(idx).and_then(Value::as_str)
}

fn f64_at(row: &[Value], idx: usize) -> Option<f64> {
    row.get(idx).and_then(Value::as_f64)
}

// ---------------------------------------------------------------------------
// Metadata source
// ---------------------------------------------------------------------------

/// Aircraft type and registration by ICAO address.
pub struct OpenSkyMetadata {
    client: Arc<dyn HttpClient>,
    base_url: String,
}

impl OpenSkyMetadata {
    pub fn new(client: Arc<dyn HttpClient>, base_url: &str) -> Self {
        OpenSkyMetadata {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl LookupSource for OpenSkyMetadata {
    type Value = AircraftInfo;

    fn kind(&self) -> &'static str {
        "metadata"
    }

    async fn fetch(&self, icao24: &str) -> Result<AircraftInfo, FetchError> {
        let url = format!("{}/metadata/aircraft/icao24/{}", self.base_url, icao24);
        let body: MetadataResponse = self.client.get(&url).await?.json()?;
        Ok(AircraftInfo::new(
            body.typecode.as_deref(),
            body.registration.as_deref(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

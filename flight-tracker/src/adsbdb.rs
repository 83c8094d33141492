//! adsbdb.com callsign → route lookups.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use flight_core::Route;

use crate::http::{FetchError, HttpClient};
use crate::lookup::LookupSource;

#[derive(Debug, Deserialize)]
struct CallsignResponse {
    #[serde(default)]
    response: Value,
}

#[derive(Debug, Default, Deserialize)]
struct FlightRouteBody {
    #[serde(default)]
    flightroute: Option<FlightRoute>,
}

#[derive(Debug, Default, Deserialize)]
struct FlightRoute {
    #[serde(default)]
    origin: Option<Airport>,
    #[serde(default)]
    destination: Option<Airport>,
}

#[derive(Debug, Default, Deserialize)]
struct Airport {
    #[serde(default)]
    icao_code: Option<String>,
}

pub struct AdsbdbRoutes {
    client: Arc<dyn HttpClient>,
    base_url: String,
}

impl AdsbdbRoutes {
    pub fn new(client: Arc<dyn HttpClient>, base_url: &str) -> Self {
        AdsbdbRoutes {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl LookupSource for AdsbdbRoutes {
    type Value = Route;

    fn kind(&self) -> &'static str {
        "route"
    }

    async fn fetch(&self, callsign: &str) -> Result<Route, FetchError> {
        let url = format!("{}/callsign/{}", self.base_url, callsign);
        let body: CallsignResponse = self.client.get(&url).await?.json()?;
        parse_route(body.response)
    }
}

/// `response` is an object on a hit and a plain string ("unknown callsign")
/// on a miss.
fn parse_route(response: Value) -> Result<Route, FetchError> {
    if response.is_string() {
        return Err(FetchError::NotFound);
    }
    let body: FlightRouteBody = if response.is_null() {
        FlightRouteBody::default()
    } else {
        serde_json::from_value(response).map_err(|e| FetchError::Malformed(e.to_string()))?
    };
    let route = body.flightroute.unwrap_or_default();
    let code = |airport: Option<Airport>| airport.and_then(|a| a.icao_code);
    let origin = code(route.origin);
    let destination = code(route.destination);
    Ok(Route::new(origin.as_deref(), destination.as_deref()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

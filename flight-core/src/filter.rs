//! Filter/sort pipeline: raw state records → nearby airborne flights,
//! nearest first.
//!
//! Filters, in order (all must hold):
//! 1. position present
//! 2. not on the ground (when ground exclusion is on)
//! 3. barometric altitude, if known, at or above the minimum
//! 4. haversine distance from home within the maximum
//!
//! Unknown altitude passes rule 3. Distance is stored on every survivor.

use crate::config::FilterConfig;
use crate::geo::LatLon;
use crate::types::FlightRecord;

/// Thresholds applied by [`FlightFilter::process`].
#[derive(Debug, Clone, PartialEq)]
pub struct FlightFilter {
    pub max_distance_km: f64,
    pub min_altitude_m: f64,
    pub exclude_on_ground: bool,
}

impl FlightFilter {
    pub fn new(config: &FilterConfig) -> Self {
        FlightFilter {
            max_distance_km: config.max_distance_km,
            min_altitude_m: config.min_altitude_m,
            exclude_on_ground: config.exclude_on_ground,
        }
    }

    /// Annotate, filter, and sort ascending by distance. Ties keep input order.
    pub fn process(&self, raw: Vec<FlightRecord>, home: LatLon) -> Vec<FlightRecord> {
        let mut kept: Vec<(f64, FlightRecord)> = raw
            .into_iter()
            .filter_map(|rec| self.admit(rec, home))
            .collect();

        // sort_by is stable
        kept.sort_by(|a, b| a.0.total_cmp(&b.0));

        kept.into_iter()
            .map(|(_, rec)| {
                debug_assert!(rec.distance_km.is_some());
                rec
            })
            .collect()
    }

    fn admit(&self, mut rec: FlightRecord, home: LatLon) -> Option<(f64, FlightRecord)> {
        let (lat, lon) = (rec.latitude?, rec.longitude?);

        if self.exclude_on_ground && rec.on_ground {
            return None;
        }

        if let Some(alt) = rec.baro_altitude_m {
            if alt < self.min_altitude_m {
                return None;
            }
        }

        let distance = home.distance_km(lat, lon);
        rec.distance_km = Some(distance);
        if distance > self.max_distance_km {
            return None;
        }

        Some((distance, rec))
    }
}

impl Default for FlightFilter {
    fn default() -> Self {
        FlightFilter::new(&FilterConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

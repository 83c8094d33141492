//! Sticky carry-forward of enrichment between poll cycles.
//!
//! Each cycle builds fresh records from the state endpoint, so anything the
//! lookups learned earlier would be lost. `carry_forward` copies previously
//! learned enrichment onto the new records by ICAO address, field by field,
//! wherever the new record has nothing. A known value is never replaced by an
//! unknown one.

use std::collections::HashMap;

use crate::types::FlightRecord;

/// Merge enrichment from `previous` into `current`, matched on `icao24`.
///
/// Records absent from `current` are dropped; order of `current` is kept.
pub fn carry_forward(previous: &[FlightRecord], current: Vec<FlightRecord>) -> Vec<FlightRecord> {
    if previous.is_empty() {
        return current;
    }

    let by_icao: HashMap<&str, &FlightRecord> = previous
        .iter()
        .map(|rec| (rec.icao24.as_str(), rec))
        .collect();

    current
        .into_iter()
        .map(|mut rec| {
            if let Some(old) = by_icao.get(rec.icao24.as_str()) {
                inherit(&mut rec.origin_airport, &old.origin_airport);
                inherit(&mut rec.destination_airport, &old.destination_airport);
                inherit(&mut rec.aircraft_type, &old.aircraft_type);
                inherit(&mut rec.registration, &old.registration);
            }
            rec
        })
        .collect()
}

fn inherit(field: &mut Option<String>, old: &Option<String>) {
    if field.is_none() {
        field.clone_from(old);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! flight-core: data model and pure pipeline stages for the flight tracker.
//!
//! No async and no network I/O: the record model, the TTL cache, distance
//! filtering, carry-forward merge, and the snapshot slot shared between the
//! producer and the display. The `flight-tracker` binary wires these to the
//! upstream services.

pub mod cache;
pub mod config;
pub mod enrich;
pub mod filter;
pub mod format;
pub mod geo;
pub mod merge;
pub mod snapshot;
pub mod types;

// Re-export commonly used types at crate root
pub use cache::TtlCache;
pub use config::Config;
pub use enrich::{EnrichmentBudget, EnrichmentReport};
pub use filter::FlightFilter;
pub use geo::{haversine_km, BoundingBox, LatLon};
pub use merge::carry_forward;
pub use snapshot::{Snapshot, SnapshotStore};
pub use types::*;

//! Budgeted route/metadata enrichment.
//!
//! Records are walked in the order given (nearest first after the filter
//! stage). For each missing field the cache is consulted for free; only a
//! miss spends budget on a network lookup. Route and metadata are separate
//! units. Once the budget runs out, cache hits still apply but no further
//! requests go out this cycle.

use flight_core::{AircraftInfo, EnrichmentBudget, EnrichmentReport, FlightRecord, Route};

use crate::lookup::{CachedLookup, LookupSource};

pub struct EnrichmentScheduler<R, M>
where
    R: LookupSource<Value = Route>,
    M: LookupSource<Value = AircraftInfo>,
{
    routes: CachedLookup<R>,
    metadata: CachedLookup<M>,
}

impl<R, M> EnrichmentScheduler<R, M>
where
    R: LookupSource<Value = Route>,
    M: LookupSource<Value = AircraftInfo>,
{
    pub fn new(routes: CachedLookup<R>, metadata: CachedLookup<M>) -> Self {
        EnrichmentScheduler { routes, metadata }
    }

    pub async fn enrich(&mut self, records: &mut [FlightRecord], budget: usize) -> EnrichmentReport {
        let mut budget = EnrichmentBudget::new(budget);
        let mut report = EnrichmentReport::default();

        for rec in records.iter_mut() {
            let mut deferred = false;

            if rec.needs_route() {
                if let Some(callsign) = rec.callsign.clone() {
                    if let Some(route) = self.routes.cached(&callsign) {
                        rec.absorb_route(&route);
                        report.cache_hits += 1;
                    } else if budget.try_spend() {
                        let (route, _) = self.routes.lookup(&callsign).await;
                        rec.absorb_route(&route);
                        report.network_lookups += 1;
                    } else {
                        deferred = true;
                    }
                }
            }

            if rec.needs_metadata() && !rec.icao24.is_empty() {
                if let Some(info) = self.metadata.cached(&rec.icao24) {
                    rec.absorb_metadata(&info);
                    report.cache_hits += 1;
                } else if budget.try_spend() {
                    let (info, _) = self.metadata.lookup(&rec.icao24).await;
                    rec.absorb_metadata(&info);
                    report.network_lookups += 1;
                } else {
                    deferred = true;
                }
            }

            if deferred {
                report.deferred += 1;
            }
        }

        debug_assert_eq!(report.network_lookups, budget.spent());
        report
    }

    /// Drop expired entries from both caches. Returns total removed.
    pub fn sweep(&mut self) -> usize {
        let removed = self.routes.sweep() + self.metadata.sweep();
        tracing::debug!(
            removed,
            routes = self.routes.cache_len(),
            metadata = self.metadata.cache_len(),
            "swept lookup caches"
        );
        removed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

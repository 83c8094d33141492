//! Per-cycle enrichment accounting.
//!
//! Route and metadata lookups are slow network calls against rate-limited
//! services. Each producer cycle gets a fixed number of calls; every network
//! lookup attempted (route or metadata, whatever its outcome) spends one
//! unit. Cache hits are free. Running out is normal, not an error: the rest
//! of the list waits for the next cycle.

/// Remaining network lookups for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentBudget {
    limit: usize,
    spent: usize,
}

impl EnrichmentBudget {
    pub fn new(limit: usize) -> Self {
        EnrichmentBudget { limit, spent: 0 }
    }

    /// Take one unit if any is left.
    pub fn try_spend(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.spent += 1;
        true
    }

    pub fn is_exhausted(&self) -> bool {
        self.spent >= self.limit
    }

    pub fn spent(&self) -> usize {
        self.spent
    }

    pub fn remaining(&self) -> usize {
        self.limit - self.spent
    }
}

/// What one enrichment pass did, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    /// Fields resolved from cache without a network call.
    pub cache_hits: usize,
    /// Network lookups performed (equals budget spent).
    pub network_lookups: usize,
    /// Records still missing something they could not get this cycle.
    pub deferred: usize,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

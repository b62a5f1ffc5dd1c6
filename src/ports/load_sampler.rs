//! LoadSampler port - process load proxies for the capacity monitor.

/// Source of load readings other than the connection count.
pub trait LoadSampler: Send + Sync {
    /// Memory pressure in `[0.0, 1.0]`; 0.0 when unknown.
    fn memory_pressure(&self) -> f64;
}

/// Sampler that always reports a fixed pressure.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedLoadSampler(pub f64);

impl LoadSampler for FixedLoadSampler {
    fn memory_pressure(&self) -> f64 {
        self.0
    }
}

//! Hysteresis-based scale-up / scale-down rules.

use serde::Serialize;

/// Snapshot of admission capacity and the compression knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalingState {
    pub active_connections: usize,
    pub max_connections: usize,
    pub compression_level: u8,
    pub auto_scaling_enabled: bool,
}

impl ScalingState {
    /// Connections as a fraction of capacity (the CPU-pressure proxy).
    pub fn utilization(&self) -> f64 {
        if self.max_connections == 0 {
            return 1.0;
        }
        self.active_connections as f64 / self.max_connections as f64
    }
}

/// One observation taken by the capacity monitor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadSample {
    pub active_connections: usize,
    /// Process memory as a fraction of its budget, 0.0..=1.0+.
    pub memory_pressure: f64,
}

/// What a tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingDecision {
    ScaleUp { from: usize, to: usize },
    ScaleDown { from: usize, to: usize },
    Hold,
}

/// Thresholds and bounds for the monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingPolicy {
    pub floor: usize,
    pub ceiling: usize,
    pub scale_up_connection_ratio: f64,
    pub scale_up_memory_ratio: f64,
    pub scale_up_cpu_ratio: f64,
    pub scale_down_connection_ratio: f64,
    pub growth_factor: f64,
    pub shrink_factor: f64,
    pub min_compression: u8,
    pub max_compression: u8,
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        Self {
            floor: 100,
            ceiling: 10_000,
            scale_up_connection_ratio: 0.80,
            scale_up_memory_ratio: 0.85,
            scale_up_cpu_ratio: 0.80,
            scale_down_connection_ratio: 0.30,
            growth_factor: 1.2,
            shrink_factor: 0.9,
            min_compression: 3,
            max_compression: 9,
        }
    }
}

impl ScalingPolicy {
    /// Applies one sample to `state`, returning the next state and decision.
    ///
    /// A scale-down only restricts future admissions; connections already
    /// admitted are never evicted by it. The decision reports capacity
    /// changes only: pinned at the floor or ceiling it is `Hold`, though
    /// the compression level may still move.
    pub fn evaluate(&self, state: &ScalingState, sample: &LoadSample) -> (ScalingState, ScalingDecision) {
        let mut next = ScalingState {
            active_connections: sample.active_connections,
            ..*state
        };

        if !state.auto_scaling_enabled {
            return (next, ScalingDecision::Hold);
        }

        let max = state.max_connections.max(1) as f64;
        let connection_ratio = sample.active_connections as f64 / max;
        let cpu_pressure = connection_ratio;

        let overloaded = connection_ratio > self.scale_up_connection_ratio
            || sample.memory_pressure > self.scale_up_memory_ratio
            || cpu_pressure > self.scale_up_cpu_ratio;

        let from = state.max_connections;

        if overloaded {
            // Always move by at least one slot so small capacities still grow.
            let grown = ((max * self.growth_factor).round() as usize).max(from.saturating_add(1));
            next.max_connections = grown.min(self.ceiling).max(from.min(self.ceiling));
            next.compression_level = (state.compression_level + 1).min(self.max_compression);
            let to = next.max_connections;
            if to == from {
                return (next, ScalingDecision::Hold);
            }
            return (next, ScalingDecision::ScaleUp { from, to });
        }

        if connection_ratio < self.scale_down_connection_ratio {
            let shrunk = ((max * self.shrink_factor).round() as usize).min(from.saturating_sub(1));
            next.max_connections = shrunk.max(self.floor).min(from.max(self.floor));
            next.compression_level = state
                .compression_level
                .saturating_sub(1)
                .max(self.min_compression);
            let to = next.max_connections;
            if to == from {
                return (next, ScalingDecision::Hold);
            }
            return (next, ScalingDecision::ScaleDown { from, to });
        }

        (next, ScalingDecision::Hold)
    }
}

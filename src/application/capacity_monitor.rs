//! CapacityMonitor - periodic load sampling and admission retuning.
//!
//! The monitor is the only writer of [`ScalingState`]. Each tick it sweeps
//! stale connections, samples load, evaluates the [`ScalingPolicy`], and
//! publishes the result on a `watch` channel read by the registry.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::domain::scaling::{LoadSample, ScalingDecision, ScalingPolicy, ScalingState};
use crate::ports::LoadSampler;

use super::relay::RelayService;
use super::scheduler::PeriodicJob;

/// Outcome of one monitor tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub swept: usize,
    pub decision: ScalingDecision,
    pub state: ScalingState,
}

pub struct CapacityMonitor {
    policy: ScalingPolicy,
    state: watch::Sender<ScalingState>,
    relay: Arc<RelayService>,
    sampler: Arc<dyn LoadSampler>,
}

impl CapacityMonitor {
    pub fn new(
        policy: ScalingPolicy,
        state: watch::Sender<ScalingState>,
        relay: Arc<RelayService>,
        sampler: Arc<dyn LoadSampler>,
    ) -> Self {
        Self {
            policy,
            state,
            relay,
            sampler,
        }
    }

    /// Current published state.
    pub fn current(&self) -> ScalingState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScalingState> {
        self.state.subscribe()
    }

    /// Turns automatic retuning on or off. Capacity stays where it is.
    pub fn set_auto_scaling(&self, enabled: bool) {
        self.state.send_modify(|s| s.auto_scaling_enabled = enabled);
        info!(enabled, "Auto-scaling toggled");
    }

    /// Runs one sweep + sample + evaluate cycle.
    pub async fn tick(&self) -> TickReport {
        let swept = self.relay.sweep_stale().await;

        let sample = LoadSample {
            active_connections: self.relay.active_connections().await,
            memory_pressure: self.sampler.memory_pressure(),
        };
        let current = self.current();
        let (next, decision) = self.policy.evaluate(&current, &sample);

        match decision {
            ScalingDecision::ScaleUp { from, to } => info!(
                from,
                to,
                compression_level = next.compression_level,
                active = sample.active_connections,
                memory_pressure = sample.memory_pressure,
                "Scaling up"
            ),
            ScalingDecision::ScaleDown { from, to } => info!(
                from,
                to,
                compression_level = next.compression_level,
                active = sample.active_connections,
                "Scaling down"
            ),
            ScalingDecision::Hold => debug!(
                active = sample.active_connections,
                max = next.max_connections,
                swept,
                "Capacity unchanged"
            ),
        }

        self.state.send_replace(next);
        TickReport {
            swept,
            decision,
            state: next,
        }
    }
}

#[async_trait]
impl PeriodicJob for CapacityMonitor {
    fn name(&self) -> &'static str {
        "capacity-monitor"
    }

    async fn run(&self) {
        self.tick().await;
    }
}

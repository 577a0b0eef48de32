use crate::events::{IdleReason, PipelineOutcome};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Contadores de operação do watcher.
///
/// Atualizados de forma atômica pelos pipelines; nada além destes números e
/// dos logs sobrevive a uma detecção encerrada.
#[derive(Debug, Default)]
pub struct WatcherMetrics {
    observed: AtomicU64,
    fetch_misses: AtomicU64,
    detections: AtomicU64,
    safe_verdicts: AtomicU64,
    oracle_failures: AtomicU64,
    build_failures: AtomicU64,
    simulation_failures: AtomicU64,
    relay_rejections: AtomicU64,
    included: AtomicU64,
    not_included: AtomicU64,
}

impl WatcherMetrics {
    pub(crate) fn record_observed(&self) {
        self.observed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fetch_miss(&self) {
        self.fetch_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_detection(&self) {
        self.detections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_outcome(&self, outcome: &PipelineOutcome) {
        let counter = match outcome {
            PipelineOutcome::Idle(IdleReason::SafeVerdict) => &self.safe_verdicts,
            PipelineOutcome::Idle(IdleReason::OracleUnavailable) => &self.oracle_failures,
            PipelineOutcome::Idle(IdleReason::BuildFailed(_)) => &self.build_failures,
            PipelineOutcome::Idle(IdleReason::SimulationReverted(_)) => &self.simulation_failures,
            PipelineOutcome::Idle(IdleReason::RelayRejected(_)) => &self.relay_rejections,
            PipelineOutcome::Included => &self.included,
            PipelineOutcome::NotIncluded => &self.not_included,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Fotografia dos contadores para exibição
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            observed: self.observed.load(Ordering::Relaxed),
            fetch_misses: self.fetch_misses.load(Ordering::Relaxed),
            detections: self.detections.load(Ordering::Relaxed),
            safe_verdicts: self.safe_verdicts.load(Ordering::Relaxed),
            oracle_failures: self.oracle_failures.load(Ordering::Relaxed),
            build_failures: self.build_failures.load(Ordering::Relaxed),
            simulation_failures: self.simulation_failures.load(Ordering::Relaxed),
            relay_rejections: self.relay_rejections.load(Ordering::Relaxed),
            included: self.included.load(Ordering::Relaxed),
            not_included: self.not_included.load(Ordering::Relaxed),
        }
    }
}

/// Valores acumulados dos contadores do watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub observed: u64,
    pub fetch_misses: u64,
    pub detections: u64,
    pub safe_verdicts: u64,
    pub oracle_failures: u64,
    pub build_failures: u64,
    pub simulation_failures: u64,
    pub relay_rejections: u64,
    pub included: u64,
    pub not_included: u64,
}

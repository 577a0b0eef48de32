use ethereum_types::Address;
use guardian_core::types::TransactionHash;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Motivo pelo qual um pipeline terminou em repouso
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdleReason {
    SafeVerdict,
    OracleUnavailable,
    BuildFailed(String),
    SimulationReverted(String),
    RelayRejected(String),
}

/// Desfecho terminal de um pipeline de defesa
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineOutcome {
    Idle(IdleReason),
    Included,
    NotIncluded,
}

/// Relatório emitido na conclusão de cada pipeline.
///
/// É o único canal de comunicação entre os pipelines e o mundo externo;
/// nenhum estado de controle é compartilhado entre detecções.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub tx_hash: TransactionHash,
    pub method: String,
    pub token: Address,
    /// Bloco alvo do bundle, quando algum chegou a ser construído
    pub target_block: Option<u64>,
    pub outcome: PipelineOutcome,
}

/// Barramento simples sobre canais [`tokio::sync::mpsc`].
pub struct EventBus<T> {
    sender: mpsc::Sender<T>,
}

impl<T> EventBus<T> {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<T>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { sender: tx }, rx)
    }

    pub fn sender(&self) -> mpsc::Sender<T> {
        self.sender.clone()
    }
}

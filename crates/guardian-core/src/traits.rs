/*!
 * Guardian Traits
 *
 * Traits comuns usados em toda a workspace Guardian
 */

use crate::error::Result;
use crate::types::{
    ClassificationVerdict, CounterBundle, InclusionOutcome, PendingTransaction, SimulationOutcome,
    SubmissionHandle, SubmissionOutcome, TransactionHash,
};
use async_trait::async_trait;
use ethereum_types::{Address, U256};
use tokio::sync::{mpsc, oneshot};

/// Inscrição ativa no feed de transações pendentes.
///
/// Os hashes chegam por um canal interno; `None` em [`recv`] sinaliza que o
/// feed foi interrompido. O guarda interno cancela a inscrição no node de
/// forma determinística quando o valor é descartado.
///
/// [`recv`]: PendingSubscription::recv
pub struct PendingSubscription {
    receiver: mpsc::Receiver<TransactionHash>,
    _guard: Option<oneshot::Sender<()>>,
}

impl PendingSubscription {
    /// Cria a inscrição com o guarda de cancelamento
    pub fn new(receiver: mpsc::Receiver<TransactionHash>, guard: oneshot::Sender<()>) -> Self {
        Self {
            receiver,
            _guard: Some(guard),
        }
    }

    /// Inscrição sem guarda, útil para fontes em memória
    pub fn from_receiver(receiver: mpsc::Receiver<TransactionHash>) -> Self {
        Self {
            receiver,
            _guard: None,
        }
    }

    /// Próximo hash anunciado; `None` quando o feed foi interrompido
    pub async fn recv(&mut self) -> Option<TransactionHash> {
        self.receiver.recv().await
    }
}

/// Trait para fontes de notificação de transações pendentes
#[async_trait]
pub trait MempoolFeed: Send + Sync {
    /// Abre uma inscrição no fluxo de hashes pendentes
    async fn subscribe_pending(&self) -> Result<PendingSubscription>;
}

/// Trait para consulta de estado do node durante o pipeline
#[async_trait]
pub trait MempoolProvider: Send + Sync {
    /// Busca uma transação ainda pendente; `None` quando já saiu do pool
    async fn pending_transaction(
        &self,
        hash: TransactionHash,
    ) -> Result<Option<PendingTransaction>>;

    /// Altura do bloco corrente
    async fn block_number(&self) -> Result<u64>;

    /// Base fee do bloco mais recente
    async fn base_fee(&self) -> Result<U256>;

    /// Nonce pendente de uma conta
    async fn pending_nonce(&self, address: Address) -> Result<U256>;
}

/// Trait para o oráculo de atestação
#[async_trait]
pub trait AttestationOracle: Send + Sync {
    /// Classifica um par (método, contrato alvo) e devolve o veredicto.
    ///
    /// Uma única requisição por chamada; a janela da corrida não comporta
    /// novas tentativas dentro da mesma detecção.
    async fn classify(&self, method: &str, token: Address) -> Result<ClassificationVerdict>;
}

/// Trait para o relay privado de submissão de bundles
#[async_trait]
pub trait DefenseRelay: Send + Sync {
    /// Executa o bundle contra o estado corrente sem efetivá-lo
    async fn simulate(&self, bundle: &CounterBundle) -> Result<SimulationOutcome>;

    /// Submete o bundle; disparo único, sem reenvio automático
    async fn submit(&self, bundle: &CounterBundle) -> Result<SubmissionOutcome>;

    /// Aguarda a resolução de inclusão no bloco alvo
    async fn await_inclusion(&self, handle: &SubmissionHandle) -> Result<InclusionOutcome>;
}

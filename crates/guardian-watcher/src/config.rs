use ethereum_types::Address;
use guardian_core::types::FeePolicy;
use guardian_detector::SelectorRegistry;
use std::time::Duration;

/// Configuração do watcher, montada uma única vez na inicialização e
/// compartilhada como snapshot somente-leitura entre os pipelines.
#[derive(Debug, Clone)]
pub struct GuardianConfig {
    /// Chain id da rede vigiada
    pub chain_id: u64,
    /// Endereço do contrato de defesa
    pub guardian_contract: Address,
    /// Registro de seletores suspeitos
    pub selectors: SelectorRegistry,
    /// Política de taxas do bundle de defesa
    pub fees: FeePolicy,
    /// Limite individual para cada chamada externa do pipeline
    pub call_timeout: Duration,
    /// Prazo para a resolução da inclusão no bloco alvo
    pub inclusion_timeout: Duration,
    /// Espera antes de reabrir o feed após uma interrupção
    pub resubscribe_delay: Duration,
    /// Capacidade do canal de relatórios de pipeline
    pub report_buffer: usize,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            guardian_contract: Address::zero(),
            selectors: SelectorRegistry::suspicious_defaults(),
            fees: FeePolicy::default(),
            call_timeout: Duration::from_secs(5),
            inclusion_timeout: Duration::from_secs(60),
            resubscribe_delay: Duration::from_secs(1),
            report_buffer: 256,
        }
    }
}

/*!
 * Guardian Types
 *
 * Tipos comuns usados em toda a workspace Guardian
 */

use ethereum_types::{Address, H256, U256};
use ethers::types::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Alias para hash de transação
pub type TransactionHash = H256;

/// Transação pendente observada na mempool.
///
/// Imutável após a busca; a identidade é o hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub hash: TransactionHash,
    pub sender: Address,
    pub target: Address,
    pub call_data: Vec<u8>,
    /// Altura do bloco vigente no momento da observação
    pub observed_block: u64,
}

/// Resultado do casamento de seletores sobre o calldata
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionResult {
    NoMatch,
    Matched(String),
}

impl DetectionResult {
    pub fn is_match(&self) -> bool {
        matches!(self, DetectionResult::Matched(_))
    }
}

/// Classificação emitida pelo oráculo de atestação
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "SAFE")]
    Safe,
    #[serde(rename = "MALICIOUS")]
    Malicious,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Safe => write!(f, "SAFE"),
            Classification::Malicious => write!(f, "MALICIOUS"),
        }
    }
}

/// Veredicto do oráculo acompanhado da assinatura de autorização.
///
/// Um veredicto malicioso sempre porta assinatura não vazia; um veredicto
/// seguro nunca porta assinatura. Os construtores garantem o invariante.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationVerdict {
    classification: Classification,
    signature: Vec<u8>,
}

impl ClassificationVerdict {
    /// Veredicto seguro, sem assinatura
    pub fn safe() -> Self {
        Self {
            classification: Classification::Safe,
            signature: Vec::new(),
        }
    }

    /// Veredicto malicioso com a assinatura de autorização do oráculo
    pub fn malicious(signature: Vec<u8>) -> crate::error::Result<Self> {
        if signature.is_empty() {
            return Err(crate::error::Error::ValidationError(
                "veredicto malicioso exige assinatura não vazia".to_string(),
            ));
        }
        Ok(Self {
            classification: Classification::Malicious,
            signature,
        })
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    pub fn is_malicious(&self) -> bool {
        self.classification == Classification::Malicious
    }

    /// Assinatura de autorização; vazia apenas em veredictos seguros
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }
}

/// Parâmetros de taxa EIP-1559 do bundle de defesa
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeParameters {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

/// Política configurável de taxas usada na construção do bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
    /// Multiplicador aplicado sobre a base fee corrente
    pub base_fee_headroom: u64,
    /// Gorjeta de prioridade, em gwei
    pub priority_fee_gwei: u64,
    /// Limite de gás da transação de defesa
    pub gas_limit: u64,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            base_fee_headroom: 2,
            priority_fee_gwei: 2,
            gas_limit: 300_000,
        }
    }
}

impl FeePolicy {
    /// Calcula os parâmetros de taxa; determinístico para as mesmas entradas
    pub fn fee_parameters(&self, base_fee: U256) -> FeeParameters {
        let priority = U256::from(self.priority_fee_gwei) * U256::exp10(9);
        FeeParameters {
            max_fee_per_gas: base_fee * U256::from(self.base_fee_headroom) + priority,
            max_priority_fee_per_gas: priority,
        }
    }
}

/// Bundle de contra-ataque direcionado a exatamente um bloco.
///
/// Imutável após a construção; uma nova detecção origina um novo bundle,
/// nunca a reutilização deste para outra altura.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterBundle {
    /// Altura alvo: bloco observado na detecção + 1
    pub target_block: u64,
    /// Sequência ordenada de transações assinadas (sempre uma única)
    pub txs: Vec<Bytes>,
    pub fees: FeeParameters,
}

/// Resultado da simulação do bundle contra o estado corrente
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationOutcome {
    Ok,
    Reverted(String),
}

/// Token de resolução de uma submissão aceita pelo relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionHandle {
    /// Hash do bundle atribuído pelo relay, quando informado
    pub bundle_hash: Option<H256>,
    /// Hash da transação assinada contida no bundle
    pub tx_hash: H256,
    pub target_block: u64,
}

/// Resultado da submissão ao relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Accepted(SubmissionHandle),
    Rejected(String),
}

/// Resolução da corrida de inclusão no bloco alvo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InclusionOutcome {
    Included,
    NotIncluded,
}

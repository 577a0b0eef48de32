/*!
 * Guardian AVS
 *
 * Cliente do serviço de atestação que classifica um par (método, contrato
 * alvo) e devolve a assinatura de autorização verificável pelo contrato de
 * defesa. O cliente não calcula hash nem assinatura: apenas transporta a
 * decisão do oráculo.
 */

use async_trait::async_trait;
use ethereum_types::Address;
use guardian_core::error::{Error, Result};
use guardian_core::traits::AttestationOracle;
use guardian_core::types::{Classification, ClassificationVerdict};
use guardian_core::utils::{format_address, hex_to_bytes};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuração do cliente de atestação
#[derive(Debug, Clone)]
pub struct AvsConfig {
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for AvsConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3001".to_string(),
            timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    #[serde(rename = "functionSignature")]
    function_signature: &'a str,
    #[serde(rename = "tokenAddress")]
    token_address: String,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    classification: Classification,
    signature: Option<String>,
}

/// Cliente HTTP do oráculo de atestação
pub struct AvsClient {
    config: AvsConfig,
    client: Client,
}

impl AvsClient {
    /// Cria um novo cliente com timeout limitado em todas as requisições
    pub fn new(config: AvsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Other(format!("Falha ao criar cliente HTTP: {}", e)))?;
        Ok(Self { config, client })
    }

    /// Consulta o oráculo para o par (método, contrato alvo).
    ///
    /// Uma única requisição, sem novas tentativas: a janela da corrida é
    /// fixa em relação ao bloco alvo da transação detectada. Timeout, erro
    /// de transporte ou resposta malformada resultam no veredicto seguro;
    /// condição ambígua nunca fabrica um veredicto malicioso.
    pub async fn classify(&self, method: &str, token: Address) -> ClassificationVerdict {
        let url = format!("{}/classify", self.config.endpoint.trim_end_matches('/'));
        let body = ClassifyRequest {
            function_signature: method,
            token_address: format_address(&token),
        };

        let response = match self.client.post(&url).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("oráculo inacessível ({}), assumindo veredicto seguro", e);
                return ClassificationVerdict::safe();
            }
        };

        let response = match response.error_for_status() {
            Ok(r) => r,
            Err(e) => {
                warn!("oráculo respondeu erro ({}), assumindo veredicto seguro", e);
                return ClassificationVerdict::safe();
            }
        };

        let parsed: ClassifyResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                warn!(
                    "resposta indecifrável do oráculo ({}), assumindo veredicto seguro",
                    e
                );
                return ClassificationVerdict::safe();
            }
        };

        match parsed.classification {
            Classification::Safe => {
                debug!("oráculo classificou {} como seguro", method);
                ClassificationVerdict::safe()
            }
            Classification::Malicious => {
                let signature = parsed
                    .signature
                    .as_deref()
                    .and_then(hex_to_bytes)
                    .unwrap_or_default();
                match ClassificationVerdict::malicious(signature) {
                    Ok(verdict) => verdict,
                    Err(_) => {
                        warn!(
                            "veredicto malicioso sem assinatura para {}, rebaixado para seguro",
                            method
                        );
                        ClassificationVerdict::safe()
                    }
                }
            }
        }
    }
}

#[async_trait]
impl AttestationOracle for AvsClient {
    async fn classify(&self, method: &str, token: Address) -> Result<ClassificationVerdict> {
        Ok(AvsClient::classify(self, method, token).await)
    }
}

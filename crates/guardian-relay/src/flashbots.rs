use crate::builder::BundleBuilder;
use async_trait::async_trait;
use chrono::Utc;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::LocalWallet;
use ethers_flashbots::{BundleRequest, FlashbotsMiddleware};
use guardian_core::error::{Error, Result};
use guardian_core::traits::DefenseRelay;
use guardian_core::types::{
    CounterBundle, InclusionOutcome, SimulationOutcome, SubmissionHandle, SubmissionOutcome,
};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Configuração da conexão com o relay privado
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub relay_endpoint: String,
    pub rpc_endpoint: String,
    /// Intervalo de checagem da altura da cadeia durante a resolução
    pub poll_interval: Duration,
    /// Prazo máximo para resolver a inclusão no bloco alvo
    pub resolution_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            relay_endpoint: "https://relay.flashbots.net".to_string(),
            rpc_endpoint: "http://localhost:8545".to_string(),
            poll_interval: Duration::from_millis(500),
            resolution_timeout: Duration::from_secs(60),
        }
    }
}

/// Submissor de bundles via relay Flashbots
pub struct FlashbotsRelay {
    middleware: FlashbotsMiddleware<Provider<Http>, LocalWallet>,
    provider: Provider<Http>,
    config: RelayConfig,
}

impl FlashbotsRelay {
    /// Cria a conexão com o relay; a identidade assina as requisições
    /// dirigidas ao próprio relay
    pub fn new(config: RelayConfig, identity: LocalWallet) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_endpoint.as_str())
            .map_err(|e| Error::RpcError(format!("Falha ao criar provider HTTP: {}", e)))?;

        let relay_url: Url = config.relay_endpoint.parse().map_err(|_| {
            Error::ValidationError(format!("URL de relay inválida: {}", config.relay_endpoint))
        })?;

        let middleware = FlashbotsMiddleware::new(provider.clone(), relay_url, identity);

        Ok(Self {
            middleware,
            provider,
            config,
        })
    }

    fn bundle_request(bundle: &CounterBundle) -> BundleRequest {
        let mut request = BundleRequest::new()
            .set_block(bundle.target_block.into())
            .set_simulation_block(bundle.target_block.saturating_sub(1).into())
            .set_simulation_timestamp(Utc::now().timestamp() as u64);
        for raw in &bundle.txs {
            request = request.push_transaction(raw.clone());
        }
        request
    }
}

#[async_trait]
impl DefenseRelay for FlashbotsRelay {
    /// Executa o bundle sobre o estado do bloco anterior ao alvo, sem
    /// efetivá-lo. Qualquer reversão é terminal para a detecção corrente.
    async fn simulate(&self, bundle: &CounterBundle) -> Result<SimulationOutcome> {
        let request = Self::bundle_request(bundle);

        let simulated = match self.middleware.simulate_bundle(&request).await {
            Ok(simulated) => simulated,
            Err(e) => {
                return Ok(SimulationOutcome::Reverted(format!(
                    "simulação recusada pelo relay: {}",
                    e
                )))
            }
        };

        for tx in &simulated.transactions {
            if let Some(error) = &tx.error {
                return Ok(SimulationOutcome::Reverted(error.clone()));
            }
            if let Some(revert) = &tx.revert {
                return Ok(SimulationOutcome::Reverted(revert.clone()));
            }
        }

        debug!(
            "simulação concluída sem reversão para o bloco {} (gás: {})",
            bundle.target_block, simulated.gas_used
        );
        Ok(SimulationOutcome::Ok)
    }

    /// Submissão de disparo único: uma recusa do relay é terminal, pois a
    /// janela do bloco alvo já estará se fechando quando ela for conhecida.
    async fn submit(&self, bundle: &CounterBundle) -> Result<SubmissionOutcome> {
        let tx_hash = BundleBuilder::bundle_tx_hash(bundle)?;
        let request = Self::bundle_request(bundle);

        let pending = match self.middleware.send_bundle(&request).await {
            Ok(pending) => pending,
            Err(e) => return Ok(SubmissionOutcome::Rejected(e.to_string())),
        };

        info!(
            "bundle aceito pelo relay para o bloco {}",
            bundle.target_block
        );
        Ok(SubmissionOutcome::Accepted(SubmissionHandle {
            bundle_hash: pending.bundle_hash,
            tx_hash,
            target_block: bundle.target_block,
        }))
    }

    /// Acompanha a altura da cadeia até o bloco alvo existir e então
    /// verifica se a transação do bundle foi incluída. Falhas de consulta
    /// durante a espera resolvem como `NotIncluded`: a essa altura a corrida
    /// já terminou e esse é o desfecho conservador.
    async fn await_inclusion(&self, handle: &SubmissionHandle) -> Result<InclusionOutcome> {
        let deadline = Instant::now() + self.config.resolution_timeout;

        loop {
            if Instant::now() >= deadline {
                warn!(
                    "prazo de resolução esgotado para o bloco {}",
                    handle.target_block
                );
                return Ok(InclusionOutcome::NotIncluded);
            }

            match self.provider.get_block_number().await {
                Ok(current) if current.as_u64() >= handle.target_block => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("falha ao consultar altura da cadeia: {}", e);
                    return Ok(InclusionOutcome::NotIncluded);
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }

        let block = match self.provider.get_block(handle.target_block).await {
            Ok(Some(block)) => block,
            Ok(None) => return Ok(InclusionOutcome::NotIncluded),
            Err(e) => {
                warn!("falha ao buscar bloco alvo: {}", e);
                return Ok(InclusionOutcome::NotIncluded);
            }
        };

        if block.transactions.iter().any(|tx| *tx == handle.tx_hash) {
            info!("bundle incluído no bloco {}", handle.target_block);
            Ok(InclusionOutcome::Included)
        } else {
            Ok(InclusionOutcome::NotIncluded)
        }
    }
}

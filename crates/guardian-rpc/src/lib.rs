/*!
 * Guardian RPC
 *
 * Cliente RPC para observação da mempool e consulta de estado em nodes
 * Ethereum, com transporte HTTP ou WebSocket
 */

use async_trait::async_trait;
use ethereum_types::{Address, H256, U256};
use futures::StreamExt;
use guardian_core::{
    error::{Error, Result},
    traits::{MempoolFeed, MempoolProvider, PendingSubscription},
    types::{PendingTransaction, TransactionHash},
};
use parking_lot::RwLock;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use web3::{
    transports::{Http, WebSocket},
    types::{BlockId, BlockNumber, TransactionId, H256 as Web3H256},
    Web3,
};

/// Configuração do cliente RPC
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub endpoint: String,
    pub timeout: Duration,
    /// Capacidade do canal interno de hashes pendentes
    pub feed_buffer: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:8546".to_string(),
            timeout: Duration::from_secs(30),
            feed_buffer: 1024,
        }
    }
}

/// Enum para diferentes tipos de transporte
pub enum TransportType {
    Http(Web3<Http>),
    WebSocket(Web3<WebSocket>),
}

/// Cliente RPC da mempool
pub struct GuardianRpcClient {
    transport: TransportType,
    config: RpcConfig,
    // base fee memoizada por altura de bloco
    base_fee_cache: RwLock<Option<(u64, U256)>>,
}

impl GuardianRpcClient {
    /// Cria um novo cliente RPC HTTP
    pub async fn new_http(config: RpcConfig) -> Result<Self> {
        let transport = Http::new(&config.endpoint)
            .map_err(|e| Error::RpcError(format!("Falha ao conectar via HTTP: {}", e)))?;

        let web3 = Web3::new(transport);

        // Verifica a conexão
        web3.eth()
            .block_number()
            .await
            .map_err(|e| Error::RpcError(format!("Falha ao conectar ao node Ethereum: {}", e)))?;

        Ok(Self {
            transport: TransportType::Http(web3),
            config,
            base_fee_cache: RwLock::new(None),
        })
    }

    /// Cria um novo cliente RPC WebSocket
    pub async fn new_websocket(config: RpcConfig) -> Result<Self> {
        let transport = WebSocket::new(&config.endpoint)
            .await
            .map_err(|e| Error::RpcError(format!("Falha ao conectar via WebSocket: {}", e)))?;

        let web3 = Web3::new(transport);

        // Verifica a conexão
        web3.eth()
            .block_number()
            .await
            .map_err(|e| Error::RpcError(format!("Falha ao conectar ao node Ethereum: {}", e)))?;

        Ok(Self {
            transport: TransportType::WebSocket(web3),
            config,
            base_fee_cache: RwLock::new(None),
        })
    }

    /// Cria um novo cliente baseado na URL
    pub async fn new(config: RpcConfig) -> Result<Self> {
        if config.endpoint.starts_with("ws") {
            Self::new_websocket(config).await
        } else {
            Self::new_http(config).await
        }
    }

    /// Busca uma transação ainda pendente na mempool.
    ///
    /// Retorna `None` quando a transação já não está disponível, situação
    /// esperada quando ela foi incluída ou descartada entre o anúncio e a
    /// busca. Transações sem destinatário (criação de contrato) também
    /// resultam em `None`, pois não participam da detecção.
    pub async fn pending_transaction(
        &self,
        hash: TransactionHash,
    ) -> Result<Option<PendingTransaction>> {
        let web3_hash = Web3H256::from_slice(hash.as_bytes());

        let tx = match &self.transport {
            TransportType::Http(web3) => web3
                .eth()
                .transaction(TransactionId::Hash(web3_hash))
                .await
                .map_err(|e| Error::RpcError(format!("Falha ao buscar transação pendente: {}", e)))?,
            TransportType::WebSocket(web3) => web3
                .eth()
                .transaction(TransactionId::Hash(web3_hash))
                .await
                .map_err(|e| Error::RpcError(format!("Falha ao buscar transação pendente: {}", e)))?,
        };

        let tx = match tx {
            Some(tx) => tx,
            None => return Ok(None),
        };

        let (sender, target) = match (tx.from, tx.to) {
            (Some(from), Some(to)) => (from, to),
            _ => return Ok(None),
        };

        let observed_block = self.block_number().await?;

        Ok(Some(PendingTransaction {
            hash,
            sender: Address::from_slice(sender.as_bytes()),
            target: Address::from_slice(target.as_bytes()),
            call_data: tx.input.0,
            observed_block,
        }))
    }

    /// Obtém o número do bloco atual
    pub async fn block_number(&self) -> Result<u64> {
        let block_number = match &self.transport {
            TransportType::Http(web3) => web3
                .eth()
                .block_number()
                .await
                .map_err(|e| Error::RpcError(format!("Falha ao obter número do bloco: {}", e)))?,
            TransportType::WebSocket(web3) => web3
                .eth()
                .block_number()
                .await
                .map_err(|e| Error::RpcError(format!("Falha ao obter número do bloco: {}", e)))?,
        };

        Ok(block_number.as_u64())
    }

    /// Base fee do bloco mais recente, memoizada por altura de bloco
    pub async fn base_fee(&self) -> Result<U256> {
        let current = self.block_number().await?;

        if let Some((height, fee)) = *self.base_fee_cache.read() {
            if height == current {
                return Ok(fee);
            }
        }

        let block = match &self.transport {
            TransportType::Http(web3) => web3
                .eth()
                .block(BlockId::Number(BlockNumber::Latest))
                .await
                .map_err(|e| Error::RpcError(format!("Falha ao obter bloco mais recente: {}", e)))?,
            TransportType::WebSocket(web3) => web3
                .eth()
                .block(BlockId::Number(BlockNumber::Latest))
                .await
                .map_err(|e| Error::RpcError(format!("Falha ao obter bloco mais recente: {}", e)))?,
        };

        let block =
            block.ok_or_else(|| Error::NotFound("Bloco mais recente não encontrado".to_string()))?;
        let fee = block.base_fee_per_gas.ok_or_else(|| {
            Error::ValidationError("Node não informa base fee (rede pré-EIP-1559?)".to_string())
        })?;

        *self.base_fee_cache.write() = Some((current, fee));
        Ok(fee)
    }

    /// Nonce pendente de uma conta
    pub async fn pending_nonce(&self, address: Address) -> Result<U256> {
        let nonce = match &self.transport {
            TransportType::Http(web3) => web3
                .eth()
                .transaction_count(address, Some(BlockNumber::Pending))
                .await
                .map_err(|e| Error::RpcError(format!("Falha ao obter nonce pendente: {}", e)))?,
            TransportType::WebSocket(web3) => web3
                .eth()
                .transaction_count(address, Some(BlockNumber::Pending))
                .await
                .map_err(|e| Error::RpcError(format!("Falha ao obter nonce pendente: {}", e)))?,
        };

        Ok(nonce)
    }

    /// Abre a inscrição de novas transações pendentes (apenas WebSocket).
    ///
    /// Os hashes são encaminhados por um canal interno; o encerramento do
    /// canal sinaliza a interrupção do feed. O guarda devolvido cancela a
    /// inscrição no node quando a [`PendingSubscription`] é descartada.
    pub async fn subscribe_pending(&self) -> Result<PendingSubscription> {
        let web3 = match &self.transport {
            TransportType::WebSocket(web3) => web3.clone(),
            TransportType::Http(_) => {
                return Err(Error::ValidationError(
                    "inscrição na mempool requer transporte WebSocket".to_string(),
                ))
            }
        };

        let mut stream = web3
            .eth_subscribe()
            .subscribe_new_pending_transactions()
            .await
            .map_err(|e| Error::RpcError(format!("Falha ao abrir inscrição de pendentes: {}", e)))?;

        let (sender, receiver) = mpsc::channel(self.config.feed_buffer);
        let (guard, mut released) = oneshot::channel::<()>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut released => break,
                    item = stream.next() => match item {
                        Some(Ok(hash)) => {
                            let hash = H256::from_slice(hash.as_bytes());
                            if sender.send(hash).await.is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            warn!("erro na inscrição de pendentes: {}", e);
                            break;
                        }
                        None => {
                            debug!("inscrição de pendentes encerrada pelo node");
                            break;
                        }
                    },
                }
            }
            if let Err(e) = stream.unsubscribe().await {
                debug!("falha ao cancelar inscrição no node: {}", e);
            }
        });

        Ok(PendingSubscription::new(receiver, guard))
    }
}

/// Implementação das traits de acesso à mempool do guardian-core
#[async_trait]
impl MempoolProvider for GuardianRpcClient {
    async fn pending_transaction(
        &self,
        hash: TransactionHash,
    ) -> Result<Option<PendingTransaction>> {
        self.pending_transaction(hash).await
    }

    async fn block_number(&self) -> Result<u64> {
        self.block_number().await
    }

    async fn base_fee(&self) -> Result<U256> {
        self.base_fee().await
    }

    async fn pending_nonce(&self, address: Address) -> Result<U256> {
        self.pending_nonce(address).await
    }
}

#[async_trait]
impl MempoolFeed for GuardianRpcClient {
    async fn subscribe_pending(&self) -> Result<PendingSubscription> {
        self.subscribe_pending().await
    }
}

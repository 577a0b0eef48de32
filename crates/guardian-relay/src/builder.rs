use ethereum_types::{Address, H256, U256};
use ethers::abi::{AbiParser, Token};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Bytes, Eip1559TransactionRequest};
use guardian_core::error::{Error, Result};
use guardian_core::types::{ClassificationVerdict, CounterBundle, FeePolicy};
use guardian_core::utils::keccak256;

/// Assinatura da função de entrada do contrato de defesa
const DEFENSE_ABI: &str = "autoDefenseAction(address,string,bytes)";

/// Construtor do bundle de contra-ataque.
///
/// A montagem do calldata e dos parâmetros de taxa é pura e determinística;
/// a assinatura usa a carteira local, sem acesso a rede.
pub struct BundleBuilder {
    wallet: LocalWallet,
    guardian: Address,
    chain_id: u64,
    fees: FeePolicy,
}

impl BundleBuilder {
    pub fn new(wallet: LocalWallet, guardian: Address, chain_id: u64, fees: FeePolicy) -> Self {
        let wallet = wallet.with_chain_id(chain_id);
        Self {
            wallet,
            guardian,
            chain_id,
            fees,
        }
    }

    /// Endereço da conta que assina as transações de defesa
    pub fn sender(&self) -> Address {
        self.wallet.address()
    }

    /// Codifica a chamada ao contrato de defesa com exatamente
    /// (contrato alvo, método detectado, assinatura do oráculo)
    pub fn defense_calldata(token: Address, method: &str, signature: &[u8]) -> Result<Bytes> {
        let function = AbiParser::default()
            .parse_function(DEFENSE_ABI)
            .map_err(|e| Error::EncodeError(format!("ABI do contrato de defesa inválida: {}", e)))?;
        let data = function
            .encode_input(&[
                Token::Address(token),
                Token::String(method.to_string()),
                Token::Bytes(signature.to_vec()),
            ])
            .map_err(|e| Error::EncodeError(format!("Falha ao codificar chamada de defesa: {}", e)))?;
        Ok(data.into())
    }

    /// Monta a requisição EIP-1559 sem assinatura; pura e determinística
    pub fn defense_request(
        &self,
        token: Address,
        method: &str,
        signature: &[u8],
        base_fee: U256,
        nonce: U256,
    ) -> Result<Eip1559TransactionRequest> {
        let data = Self::defense_calldata(token, method, signature)?;
        let fees = self.fees.fee_parameters(base_fee);
        Ok(Eip1559TransactionRequest::new()
            .to(self.guardian)
            .data(data)
            .value(0u64)
            .gas(self.fees.gas_limit)
            .max_fee_per_gas(fees.max_fee_per_gas)
            .max_priority_fee_per_gas(fees.max_priority_fee_per_gas)
            .nonce(nonce)
            .chain_id(self.chain_id))
    }

    /// Constrói o bundle assinado para o bloco seguinte ao observado.
    ///
    /// O veredicto precisa ser malicioso e portar assinatura; um veredicto
    /// seguro jamais origina bundle.
    pub async fn build(
        &self,
        verdict: &ClassificationVerdict,
        method: &str,
        token: Address,
        observed_block: u64,
        base_fee: U256,
        nonce: U256,
    ) -> Result<CounterBundle> {
        if !verdict.is_malicious() {
            return Err(Error::ValidationError(
                "apenas veredictos maliciosos originam bundle de defesa".to_string(),
            ));
        }

        let request =
            self.defense_request(token, method, verdict.signature(), base_fee, nonce)?;
        let fees = self.fees.fee_parameters(base_fee);

        let typed: TypedTransaction = request.into();
        let signature = self
            .wallet
            .sign_transaction(&typed)
            .await
            .map_err(|e| Error::EncodeError(format!("Falha ao assinar transação de defesa: {}", e)))?;
        let raw = typed.rlp_signed(&signature);

        Ok(CounterBundle {
            target_block: observed_block + 1,
            txs: vec![raw],
            fees,
        })
    }

    /// Hash da transação assinada contida no bundle
    pub fn bundle_tx_hash(bundle: &CounterBundle) -> Result<H256> {
        let raw = bundle
            .txs
            .first()
            .ok_or_else(|| Error::ValidationError("bundle sem transações".to_string()))?;
        Ok(H256::from_slice(&keccak256(raw.as_ref())))
    }
}

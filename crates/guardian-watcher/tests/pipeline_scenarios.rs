use async_trait::async_trait;
use ethereum_types::{Address, H256, U256};
use ethers::signers::LocalWallet;
use ethers::types::transaction::eip2718::TypedTransaction;
use rlp::Rlp;
use guardian_core::error::{Error, Result};
use guardian_core::traits::{
    AttestationOracle, DefenseRelay, MempoolFeed, MempoolProvider, PendingSubscription,
};
use guardian_core::types::{
    ClassificationVerdict, CounterBundle, FeePolicy, InclusionOutcome, PendingTransaction,
    SimulationOutcome, SubmissionHandle, SubmissionOutcome, TransactionHash,
};
use guardian_relay::BundleBuilder;
use guardian_watcher::{GuardianConfig, IdleReason, PipelineOutcome, Watcher};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

#[derive(Clone, Default)]
struct NullFeed;

#[async_trait]
impl MempoolFeed for NullFeed {
    async fn subscribe_pending(&self) -> Result<PendingSubscription> {
        let (_sender, receiver) = mpsc::channel(1);
        Ok(PendingSubscription::from_receiver(receiver))
    }
}

#[derive(Clone, Default)]
struct MockProvider {
    txs: Arc<Mutex<HashMap<H256, PendingTransaction>>>,
}

#[async_trait]
impl MempoolProvider for MockProvider {
    async fn pending_transaction(
        &self,
        hash: TransactionHash,
    ) -> Result<Option<PendingTransaction>> {
        Ok(self.txs.lock().unwrap().get(&hash).cloned())
    }

    async fn block_number(&self) -> Result<u64> {
        Ok(100)
    }

    async fn base_fee(&self) -> Result<U256> {
        Ok(U256::from(30u64) * U256::exp10(9))
    }

    async fn pending_nonce(&self, _address: Address) -> Result<U256> {
        Ok(U256::from(7u64))
    }
}

#[derive(Clone)]
struct MockOracle {
    verdict: ClassificationVerdict,
    unavailable: bool,
    calls: Arc<AtomicUsize>,
}

impl MockOracle {
    fn malicious(signature: Vec<u8>) -> Self {
        Self {
            verdict: ClassificationVerdict::malicious(signature).unwrap(),
            unavailable: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn safe() -> Self {
        Self {
            verdict: ClassificationVerdict::safe(),
            unavailable: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn unavailable() -> Self {
        Self {
            verdict: ClassificationVerdict::safe(),
            unavailable: true,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl AttestationOracle for MockOracle {
    async fn classify(&self, _method: &str, _token: Address) -> Result<ClassificationVerdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(Error::TimeoutError("oráculo fora do ar".to_string()));
        }
        Ok(self.verdict.clone())
    }
}

#[derive(Default)]
struct RelayState {
    simulations: AtomicUsize,
    submissions: Mutex<Vec<CounterBundle>>,
}

#[derive(Clone)]
struct MockRelay {
    simulation: SimulationOutcome,
    accept: bool,
    include: bool,
    state: Arc<RelayState>,
}

impl MockRelay {
    fn new(simulation: SimulationOutcome, accept: bool, include: bool) -> Self {
        Self {
            simulation,
            accept,
            include,
            state: Arc::new(RelayState::default()),
        }
    }
}

#[async_trait]
impl DefenseRelay for MockRelay {
    async fn simulate(&self, _bundle: &CounterBundle) -> Result<SimulationOutcome> {
        self.state.simulations.fetch_add(1, Ordering::SeqCst);
        Ok(self.simulation.clone())
    }

    async fn submit(&self, bundle: &CounterBundle) -> Result<SubmissionOutcome> {
        self.state.submissions.lock().unwrap().push(bundle.clone());
        if self.accept {
            Ok(SubmissionOutcome::Accepted(SubmissionHandle {
                bundle_hash: Some(H256::repeat_byte(0xbb)),
                tx_hash: BundleBuilder::bundle_tx_hash(bundle).unwrap(),
                target_block: bundle.target_block,
            }))
        } else {
            Ok(SubmissionOutcome::Rejected("taxa insuficiente".to_string()))
        }
    }

    async fn await_inclusion(&self, _handle: &SubmissionHandle) -> Result<InclusionOutcome> {
        Ok(if self.include {
            InclusionOutcome::Included
        } else {
            InclusionOutcome::NotIncluded
        })
    }
}

fn test_config() -> GuardianConfig {
    GuardianConfig {
        chain_id: 5,
        guardian_contract: Address::repeat_byte(0x99),
        call_timeout: Duration::from_millis(500),
        inclusion_timeout: Duration::from_millis(500),
        resubscribe_delay: Duration::from_millis(20),
        ..GuardianConfig::default()
    }
}

fn test_builder() -> BundleBuilder {
    let wallet: LocalWallet = TEST_KEY.parse().unwrap();
    BundleBuilder::new(wallet, Address::repeat_byte(0x99), 5, FeePolicy::default())
}

fn rug_pull_tx(hash: H256) -> PendingTransaction {
    PendingTransaction {
        hash,
        sender: Address::repeat_byte(0x01),
        target: Address::repeat_byte(0xaa),
        call_data: vec![0xd4, 0xee, 0x1d, 0x90],
        observed_block: 100,
    }
}

fn provider_with(txs: Vec<PendingTransaction>) -> MockProvider {
    let provider = MockProvider::default();
    for tx in txs {
        provider.txs.lock().unwrap().insert(tx.hash, tx);
    }
    provider
}

#[tokio::test]
async fn malicious_detection_submits_one_bundle_for_next_block() {
    let hash = H256::repeat_byte(0x11);
    let provider = provider_with(vec![rug_pull_tx(hash)]);
    let oracle = MockOracle::malicious(vec![0x51, 0x60]);
    let relay = MockRelay::new(SimulationOutcome::Ok, true, true);

    let (watcher, mut reports) = Watcher::new(
        test_config(),
        NullFeed,
        provider,
        oracle.clone(),
        relay.clone(),
        test_builder(),
    );

    assert!(watcher.handle_pending(hash));
    let report = reports.recv().await.unwrap();

    assert_eq!(report.outcome, PipelineOutcome::Included);
    assert_eq!(report.method, "rugPull");
    assert_eq!(report.token, Address::repeat_byte(0xaa));
    assert_eq!(report.target_block, Some(101));

    let submissions = relay.state.submissions.lock().unwrap();
    assert_eq!(submissions.len(), 1);
    let bundle = &submissions[0];
    assert_eq!(bundle.target_block, 101);
    assert_eq!(bundle.txs.len(), 1);

    // o calldata submetido codifica exatamente (alvo, método, assinatura)
    let rlp = Rlp::new(bundle.txs[0].as_ref());
    let (decoded, _signature) = TypedTransaction::decode_signed(&rlp).unwrap();
    let expected =
        BundleBuilder::defense_calldata(Address::repeat_byte(0xaa), "rugPull", &[0x51, 0x60])
            .unwrap();
    assert_eq!(decoded.data().cloned(), Some(expected));

    assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    assert_eq!(watcher.metrics().snapshot().included, 1);
}

#[tokio::test]
async fn unregistered_selector_triggers_nothing() {
    let hash = H256::repeat_byte(0x22);
    let mut tx = rug_pull_tx(hash);
    tx.call_data = vec![0x11, 0x11, 0x11, 0x11];
    let provider = provider_with(vec![tx]);
    let oracle = MockOracle::safe();
    let relay = MockRelay::new(SimulationOutcome::Ok, true, true);

    let (watcher, mut reports) = Watcher::new(
        test_config(),
        NullFeed,
        provider,
        oracle.clone(),
        relay.clone(),
        test_builder(),
    );

    assert!(watcher.handle_pending(hash));
    let nothing = tokio::time::timeout(Duration::from_millis(200), reports.recv()).await;
    assert!(nothing.is_err());

    assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    assert!(relay.state.submissions.lock().unwrap().is_empty());
    assert_eq!(watcher.metrics().snapshot().detections, 0);
}

#[tokio::test]
async fn simulation_revert_blocks_submission() {
    let hash = H256::repeat_byte(0x33);
    let provider = provider_with(vec![rug_pull_tx(hash)]);
    let oracle = MockOracle::malicious(vec![0x51, 0x60]);
    let relay = MockRelay::new(
        SimulationOutcome::Reverted("assinatura já consumida".to_string()),
        true,
        true,
    );

    let (watcher, mut reports) = Watcher::new(
        test_config(),
        NullFeed,
        provider,
        oracle,
        relay.clone(),
        test_builder(),
    );

    assert!(watcher.handle_pending(hash));
    let report = reports.recv().await.unwrap();

    assert_eq!(
        report.outcome,
        PipelineOutcome::Idle(IdleReason::SimulationReverted(
            "assinatura já consumida".to_string()
        ))
    );
    assert_eq!(relay.state.simulations.load(Ordering::SeqCst), 1);
    assert!(relay.state.submissions.lock().unwrap().is_empty());
    assert_eq!(watcher.metrics().snapshot().simulation_failures, 1);
}

#[tokio::test]
async fn lost_race_ends_in_not_included_without_retry() {
    let hash = H256::repeat_byte(0x44);
    let provider = provider_with(vec![rug_pull_tx(hash)]);
    let oracle = MockOracle::malicious(vec![0x51, 0x60]);
    let relay = MockRelay::new(SimulationOutcome::Ok, true, false);

    let (watcher, mut reports) = Watcher::new(
        test_config(),
        NullFeed,
        provider,
        oracle,
        relay.clone(),
        test_builder(),
    );

    assert!(watcher.handle_pending(hash));
    let report = reports.recv().await.unwrap();

    assert_eq!(report.outcome, PipelineOutcome::NotIncluded);
    assert_eq!(report.target_block, Some(101));
    // derrota na corrida não gera novas submissões
    assert_eq!(relay.state.submissions.lock().unwrap().len(), 1);
    assert_eq!(watcher.metrics().snapshot().not_included, 1);
}

#[tokio::test]
async fn relay_rejection_is_terminal() {
    let hash = H256::repeat_byte(0x55);
    let provider = provider_with(vec![rug_pull_tx(hash)]);
    let oracle = MockOracle::malicious(vec![0x51, 0x60]);
    let relay = MockRelay::new(SimulationOutcome::Ok, false, false);

    let (watcher, mut reports) = Watcher::new(
        test_config(),
        NullFeed,
        provider,
        oracle,
        relay.clone(),
        test_builder(),
    );

    assert!(watcher.handle_pending(hash));
    let report = reports.recv().await.unwrap();

    assert_eq!(
        report.outcome,
        PipelineOutcome::Idle(IdleReason::RelayRejected("taxa insuficiente".to_string()))
    );
    assert_eq!(relay.state.submissions.lock().unwrap().len(), 1);
    assert_eq!(watcher.metrics().snapshot().relay_rejections, 1);
}

#[tokio::test]
async fn safe_verdict_builds_and_submits_nothing() {
    let hash = H256::repeat_byte(0x66);
    let provider = provider_with(vec![rug_pull_tx(hash)]);
    let oracle = MockOracle::safe();
    let relay = MockRelay::new(SimulationOutcome::Ok, true, true);

    let (watcher, mut reports) = Watcher::new(
        test_config(),
        NullFeed,
        provider,
        oracle.clone(),
        relay.clone(),
        test_builder(),
    );

    assert!(watcher.handle_pending(hash));
    let report = reports.recv().await.unwrap();

    assert_eq!(report.outcome, PipelineOutcome::Idle(IdleReason::SafeVerdict));
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    assert_eq!(relay.state.simulations.load(Ordering::SeqCst), 0);
    assert!(relay.state.submissions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn oracle_outage_fails_safe() {
    let hash = H256::repeat_byte(0x77);
    let provider = provider_with(vec![rug_pull_tx(hash)]);
    let oracle = MockOracle::unavailable();
    let relay = MockRelay::new(SimulationOutcome::Ok, true, true);

    let (watcher, mut reports) = Watcher::new(
        test_config(),
        NullFeed,
        provider,
        oracle.clone(),
        relay.clone(),
        test_builder(),
    );

    assert!(watcher.handle_pending(hash));
    let report = reports.recv().await.unwrap();

    assert_eq!(
        report.outcome,
        PipelineOutcome::Idle(IdleReason::OracleUnavailable)
    );
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    assert_eq!(relay.state.simulations.load(Ordering::SeqCst), 0);
    assert!(relay.state.submissions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_notifications_spawn_single_pipeline() {
    let hash = H256::repeat_byte(0x88);
    let provider = provider_with(vec![rug_pull_tx(hash)]);
    let oracle = MockOracle::malicious(vec![0x51, 0x60]);
    let relay = MockRelay::new(SimulationOutcome::Ok, true, true);

    let (watcher, mut reports) = Watcher::new(
        test_config(),
        NullFeed,
        provider,
        oracle.clone(),
        relay.clone(),
        test_builder(),
    );

    assert!(watcher.handle_pending(hash));
    assert!(!watcher.handle_pending(hash));

    let report = reports.recv().await.unwrap();
    assert_eq!(report.outcome, PipelineOutcome::Included);

    let nothing = tokio::time::timeout(Duration::from_millis(200), reports.recv()).await;
    assert!(nothing.is_err());

    assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    assert_eq!(relay.state.submissions.lock().unwrap().len(), 1);
    assert_eq!(watcher.metrics().snapshot().observed, 2);
}

#[tokio::test]
async fn vanished_transaction_is_skipped_silently() {
    let hash = H256::repeat_byte(0x99);
    let provider = provider_with(vec![]);
    let oracle = MockOracle::safe();
    let relay = MockRelay::new(SimulationOutcome::Ok, true, true);

    let (watcher, mut reports) = Watcher::new(
        test_config(),
        NullFeed,
        provider,
        oracle.clone(),
        relay,
        test_builder(),
    );

    assert!(watcher.handle_pending(hash));
    let nothing = tokio::time::timeout(Duration::from_millis(200), reports.recv()).await;
    assert!(nothing.is_err());

    assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    assert_eq!(watcher.metrics().snapshot().fetch_misses, 1);
}

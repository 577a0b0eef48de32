use ethereum_types::{Address, H256, U256};
use ethers::abi::{AbiParser, Token};
use ethers::signers::LocalWallet;
use ethers::types::transaction::eip2718::TypedTransaction;
use rlp::Rlp;
use guardian_core::types::{ClassificationVerdict, FeePolicy};
use guardian_relay::BundleBuilder;

const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

fn guardian_contract() -> Address {
    Address::repeat_byte(0x99)
}

fn test_builder() -> BundleBuilder {
    let wallet: LocalWallet = TEST_KEY.parse().unwrap();
    BundleBuilder::new(wallet, guardian_contract(), 5, FeePolicy::default())
}

fn gwei(value: u64) -> U256 {
    U256::from(value) * U256::exp10(9)
}

#[test]
fn defense_calldata_encodes_exact_arguments() {
    let token = Address::repeat_byte(0xaa);
    let signature = vec![0xde, 0xad, 0xbe, 0xef];
    let data = BundleBuilder::defense_calldata(token, "rugPull", &signature).unwrap();

    let function = AbiParser::default()
        .parse_function("autoDefenseAction(address,string,bytes)")
        .unwrap();
    assert_eq!(&data[..4], function.short_signature().as_slice());

    let tokens = function.decode_input(&data[4..]).unwrap();
    assert_eq!(tokens[0], Token::Address(token));
    assert_eq!(tokens[1], Token::String("rugPull".to_string()));
    assert_eq!(tokens[2], Token::Bytes(signature));
}

#[test]
fn fee_parameters_are_deterministic() {
    let policy = FeePolicy {
        base_fee_headroom: 2,
        priority_fee_gwei: 2,
        gas_limit: 300_000,
    };

    let fees = policy.fee_parameters(gwei(30));
    assert_eq!(fees.max_priority_fee_per_gas, gwei(2));
    assert_eq!(fees.max_fee_per_gas, gwei(62));
    assert_eq!(fees, policy.fee_parameters(gwei(30)));
}

#[tokio::test]
async fn build_targets_next_block_with_single_signed_tx() -> anyhow::Result<()> {
    let builder = test_builder();
    let token = Address::repeat_byte(0xaa);
    let verdict = ClassificationVerdict::malicious(vec![0xde, 0xad])?;

    let bundle = builder
        .build(&verdict, "rugPull", token, 100, gwei(10), U256::from(7u64))
        .await?;

    assert_eq!(bundle.target_block, 101);
    assert_eq!(bundle.txs.len(), 1);
    assert_eq!(bundle.fees, FeePolicy::default().fee_parameters(gwei(10)));

    let raw = &bundle.txs[0];
    let rlp = Rlp::new(raw.as_ref());
    let (decoded, _signature) = TypedTransaction::decode_signed(&rlp)?;

    assert_eq!(
        decoded.to().and_then(|to| to.as_address().copied()),
        Some(guardian_contract())
    );
    let expected = BundleBuilder::defense_calldata(token, "rugPull", &[0xde, 0xad])?;
    assert_eq!(decoded.data().cloned(), Some(expected));
    assert_eq!(decoded.gas().copied(), Some(U256::from(300_000u64)));
    assert_eq!(decoded.nonce().copied(), Some(U256::from(7u64)));

    Ok(())
}

#[tokio::test]
async fn build_is_deterministic_for_same_inputs() -> anyhow::Result<()> {
    let token = Address::repeat_byte(0xaa);
    let verdict = ClassificationVerdict::malicious(vec![0x01])?;

    let first = test_builder()
        .build(&verdict, "mint", token, 200, gwei(15), U256::zero())
        .await?;
    let second = test_builder()
        .build(&verdict, "mint", token, 200, gwei(15), U256::zero())
        .await?;

    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn safe_verdict_never_builds() {
    let builder = test_builder();
    let result = builder
        .build(
            &ClassificationVerdict::safe(),
            "rugPull",
            Address::zero(),
            100,
            gwei(10),
            U256::zero(),
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn bundle_tx_hash_matches_keccak_of_raw_tx() -> anyhow::Result<()> {
    let builder = test_builder();
    let verdict = ClassificationVerdict::malicious(vec![0x02])?;
    let bundle = builder
        .build(
            &verdict,
            "blacklist",
            Address::repeat_byte(0xbb),
            50,
            gwei(20),
            U256::one(),
        )
        .await?;

    let expected = H256::from(ethers::utils::keccak256(bundle.txs[0].as_ref()));
    assert_eq!(BundleBuilder::bundle_tx_hash(&bundle)?, expected);
    Ok(())
}

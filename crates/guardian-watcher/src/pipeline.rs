use crate::events::{IdleReason, PipelineOutcome, PipelineReport};
use crate::watcher::Inner;
use guardian_core::{
    error::{Error, Result},
    traits::{AttestationOracle, DefenseRelay, MempoolProvider},
    types::{InclusionOutcome, PendingTransaction, SimulationOutcome, SubmissionOutcome},
    utils::{format_address, format_h256},
};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Estados do pipeline de defesa.
///
/// Todos os caminhos convergem para um estado terminal e nenhum estado é
/// revisitado; a instância nasce em `Detected` apenas quando o casamento de
/// seletores teve sucesso.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Detected,
    Classifying,
    Building,
    Simulating,
    Submitting,
    AwaitingInclusion,
    Idle,
    Included,
    NotIncluded,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Detected => write!(f, "detected"),
            PipelineState::Classifying => write!(f, "classifying"),
            PipelineState::Building => write!(f, "building"),
            PipelineState::Simulating => write!(f, "simulating"),
            PipelineState::Submitting => write!(f, "submitting"),
            PipelineState::AwaitingInclusion => write!(f, "awaiting_inclusion"),
            PipelineState::Idle => write!(f, "idle"),
            PipelineState::Included => write!(f, "included"),
            PipelineState::NotIncluded => write!(f, "not_included"),
        }
    }
}

/// Limita uma chamada externa ao prazo configurado; um fornecedor travado
/// não pode reter um pipeline indefinidamente
pub(crate) async fn bounded<T, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::TimeoutError(format!("{} excedeu {:?}", what, limit))),
    }
}

fn advance(hash: &ethereum_types::H256, state: &mut PipelineState, next: PipelineState) {
    debug!("pipeline {}: {} -> {}", format_h256(hash), state, next);
    *state = next;
}

fn terminal(
    tx: &PendingTransaction,
    method: &str,
    target_block: Option<u64>,
    outcome: PipelineOutcome,
) -> PipelineReport {
    PipelineReport {
        tx_hash: tx.hash,
        method: method.to_string(),
        token: tx.target,
        target_block,
        outcome,
    }
}

/// Executa o pipeline de defesa de uma detecção até o estado terminal.
///
/// Nenhum erro escapa daqui: cada falha vira um desfecho terminal
/// observável, pois não existe chamador aguardando além do canal de
/// relatórios.
pub(crate) async fn run_defense<P, O, R>(
    inner: &Inner<P, O, R>,
    tx: PendingTransaction,
    method: String,
) -> PipelineReport
where
    P: MempoolProvider,
    O: AttestationOracle,
    R: DefenseRelay,
{
    let limit = inner.config.call_timeout;
    let mut state = PipelineState::Detected;

    advance(&tx.hash, &mut state, PipelineState::Classifying);
    let verdict = match bounded(limit, "classificação", inner.oracle.classify(&method, tx.target))
        .await
    {
        Ok(verdict) => verdict,
        Err(e) => {
            // Oráculo indisponível nunca vira veredicto malicioso
            warn!("oráculo indisponível para {}: {}", method, e);
            advance(&tx.hash, &mut state, PipelineState::Idle);
            return terminal(&tx, &method, None, PipelineOutcome::Idle(IdleReason::OracleUnavailable));
        }
    };

    if !verdict.is_malicious() {
        debug!("veredicto seguro para {} em {}", method, format_address(&tx.target));
        advance(&tx.hash, &mut state, PipelineState::Idle);
        return terminal(&tx, &method, None, PipelineOutcome::Idle(IdleReason::SafeVerdict));
    }

    info!(
        "veredicto malicioso para {} em {}, montando contra-ataque",
        method,
        format_address(&tx.target)
    );

    advance(&tx.hash, &mut state, PipelineState::Building);
    let base_fee = match bounded(limit, "consulta de base fee", inner.provider.base_fee()).await {
        Ok(base_fee) => base_fee,
        Err(e) => {
            warn!("falha ao obter base fee: {}", e);
            advance(&tx.hash, &mut state, PipelineState::Idle);
            return terminal(
                &tx,
                &method,
                None,
                PipelineOutcome::Idle(IdleReason::BuildFailed(e.to_string())),
            );
        }
    };

    let nonce = match bounded(
        limit,
        "consulta de nonce",
        inner.provider.pending_nonce(inner.builder.sender()),
    )
    .await
    {
        Ok(nonce) => nonce,
        Err(e) => {
            warn!("falha ao obter nonce: {}", e);
            advance(&tx.hash, &mut state, PipelineState::Idle);
            return terminal(
                &tx,
                &method,
                None,
                PipelineOutcome::Idle(IdleReason::BuildFailed(e.to_string())),
            );
        }
    };

    let bundle = match inner
        .builder
        .build(&verdict, &method, tx.target, tx.observed_block, base_fee, nonce)
        .await
    {
        Ok(bundle) => bundle,
        Err(e) => {
            warn!("falha ao construir bundle: {}", e);
            advance(&tx.hash, &mut state, PipelineState::Idle);
            return terminal(
                &tx,
                &method,
                None,
                PipelineOutcome::Idle(IdleReason::BuildFailed(e.to_string())),
            );
        }
    };
    let target_block = bundle.target_block;

    advance(&tx.hash, &mut state, PipelineState::Simulating);
    match bounded(limit, "simulação", inner.relay.simulate(&bundle)).await {
        Ok(SimulationOutcome::Ok) => {}
        Ok(SimulationOutcome::Reverted(reason)) => {
            warn!("bundle reverteria no bloco {}: {}", target_block, reason);
            advance(&tx.hash, &mut state, PipelineState::Idle);
            return terminal(
                &tx,
                &method,
                Some(target_block),
                PipelineOutcome::Idle(IdleReason::SimulationReverted(reason)),
            );
        }
        Err(e) => {
            warn!("simulação indisponível para o bloco {}: {}", target_block, e);
            advance(&tx.hash, &mut state, PipelineState::Idle);
            return terminal(
                &tx,
                &method,
                Some(target_block),
                PipelineOutcome::Idle(IdleReason::SimulationReverted(e.to_string())),
            );
        }
    }

    advance(&tx.hash, &mut state, PipelineState::Submitting);
    let handle = match bounded(limit, "submissão", inner.relay.submit(&bundle)).await {
        Ok(SubmissionOutcome::Accepted(handle)) => handle,
        Ok(SubmissionOutcome::Rejected(reason)) => {
            warn!("relay recusou o bundle do bloco {}: {}", target_block, reason);
            advance(&tx.hash, &mut state, PipelineState::Idle);
            return terminal(
                &tx,
                &method,
                Some(target_block),
                PipelineOutcome::Idle(IdleReason::RelayRejected(reason)),
            );
        }
        Err(e) => {
            warn!("submissão falhou para o bloco {}: {}", target_block, e);
            advance(&tx.hash, &mut state, PipelineState::Idle);
            return terminal(
                &tx,
                &method,
                Some(target_block),
                PipelineOutcome::Idle(IdleReason::RelayRejected(e.to_string())),
            );
        }
    };

    advance(&tx.hash, &mut state, PipelineState::AwaitingInclusion);
    match bounded(
        inner.config.inclusion_timeout,
        "resolução de inclusão",
        inner.relay.await_inclusion(&handle),
    )
    .await
    {
        Ok(InclusionOutcome::Included) => {
            info!("defesa incluída no bloco {}", target_block);
            advance(&tx.hash, &mut state, PipelineState::Included);
            terminal(&tx, &method, Some(target_block), PipelineOutcome::Included)
        }
        Ok(InclusionOutcome::NotIncluded) | Err(_) => {
            // Corrida perdida: desfecho aceito, não é erro
            info!("corrida perdida para o bloco {}", target_block);
            advance(&tx.hash, &mut state, PipelineState::NotIncluded);
            terminal(&tx, &method, Some(target_block), PipelineOutcome::NotIncluded)
        }
    }
}

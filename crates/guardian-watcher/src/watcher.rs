use crate::config::GuardianConfig;
use crate::events::{EventBus, PipelineReport};
use crate::metrics::WatcherMetrics;
use crate::pipeline;
use dashmap::DashSet;
use guardian_core::{
    traits::{AttestationOracle, DefenseRelay, MempoolFeed, MempoolProvider},
    types::{DetectionResult, TransactionHash},
    utils::{format_address, format_h256},
};
use guardian_relay::BundleBuilder;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Estado compartilhado entre o laço de ingestão e os pipelines.
///
/// Somente leitura, exceto pelo conjunto de hashes já vistos e pelos
/// contadores atômicos.
pub(crate) struct Inner<P, O, R> {
    pub(crate) provider: P,
    pub(crate) oracle: O,
    pub(crate) relay: R,
    pub(crate) builder: BundleBuilder,
    pub(crate) config: GuardianConfig,
    pub(crate) seen: DashSet<TransactionHash>,
    pub(crate) metrics: WatcherMetrics,
    pub(crate) reports: mpsc::Sender<PipelineReport>,
}

/// Orquestrador da observação da mempool.
///
/// Consome o feed de hashes pendentes e dispara um pipeline independente
/// por detecção; os pipelines não compartilham estado de controle e se
/// reportam apenas pelo canal de relatórios.
pub struct Watcher<F, P, O, R> {
    feed: F,
    inner: Arc<Inner<P, O, R>>,
}

impl<F, P, O, R> Watcher<F, P, O, R>
where
    F: MempoolFeed,
    P: MempoolProvider + 'static,
    O: AttestationOracle + 'static,
    R: DefenseRelay + 'static,
{
    /// Cria o watcher e o canal de relatórios de pipeline
    pub fn new(
        config: GuardianConfig,
        feed: F,
        provider: P,
        oracle: O,
        relay: R,
        builder: BundleBuilder,
    ) -> (Self, mpsc::Receiver<PipelineReport>) {
        let (bus, receiver) = EventBus::new(config.report_buffer);
        let inner = Arc::new(Inner {
            provider,
            oracle,
            relay,
            builder,
            config,
            seen: DashSet::new(),
            metrics: WatcherMetrics::default(),
            reports: bus.sender(),
        });
        (Self { feed, inner }, receiver)
    }

    /// Contadores acumulados do watcher
    pub fn metrics(&self) -> &WatcherMetrics {
        &self.inner.metrics
    }

    /// Processa uma notificação de hash pendente.
    ///
    /// A inserção no conjunto de vistos é atômica e acontece antes de
    /// qualquer suspensão, garantindo no máximo um pipeline por hash
    /// durante a vida do processo. Retorna `false` para hashes repetidos.
    pub fn handle_pending(&self, hash: TransactionHash) -> bool {
        self.inner.metrics.record_observed();
        if !self.inner.seen.insert(hash) {
            debug!("hash repetido ignorado: {}", format_h256(&hash));
            return false;
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            process_notification(inner, hash).await;
        });
        true
    }

    /// Consome o feed até o sinal de desligamento, reabrindo a inscrição a
    /// cada interrupção. Pipelines em voo não dependem do feed e seguem até
    /// seus estados terminais.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let mut subscription = match self.feed.subscribe_pending().await {
                Ok(subscription) => {
                    info!("inscrição aberta no feed de pendentes");
                    subscription
                }
                Err(e) => {
                    warn!("falha ao abrir o feed de pendentes: {}", e);
                    if wait_or_shutdown(&mut shutdown, self.inner.config.resubscribe_delay).await {
                        break;
                    }
                    continue;
                }
            };

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("watcher encerrado");
                            return;
                        }
                    }
                    hash = subscription.recv() => match hash {
                        Some(hash) => {
                            self.handle_pending(hash);
                        }
                        None => {
                            warn!("feed de pendentes interrompido, reabrindo inscrição");
                            break;
                        }
                    },
                }
            }

            if wait_or_shutdown(&mut shutdown, self.inner.config.resubscribe_delay).await {
                break;
            }
        }
        info!("watcher encerrado");
    }

    /// Inicia o watcher em segundo plano e devolve o controle de
    /// desligamento
    pub fn spawn(self) -> WatcherHandle
    where
        F: 'static,
    {
        let (sender, receiver) = watch::channel(false);
        let task = tokio::spawn(async move {
            self.run(receiver).await;
        });
        WatcherHandle {
            shutdown: sender,
            task,
        }
    }
}

/// Controle de desligamento de um watcher em execução
pub struct WatcherHandle {
    shutdown: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl WatcherHandle {
    /// Sinaliza o desligamento e aguarda o laço principal encerrar
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}

async fn process_notification<P, O, R>(inner: Arc<Inner<P, O, R>>, hash: TransactionHash)
where
    P: MempoolProvider,
    O: AttestationOracle,
    R: DefenseRelay,
{
    let fetched = pipeline::bounded(
        inner.config.call_timeout,
        "busca da transação",
        inner.provider.pending_transaction(hash),
    )
    .await;

    let tx = match fetched {
        Ok(Some(tx)) => tx,
        // A transação saiu do pool antes da busca; descarte silencioso
        Ok(None) | Err(_) => {
            inner.metrics.record_fetch_miss();
            debug!("transação {} já não está pendente", format_h256(&hash));
            return;
        }
    };

    let method = match inner.config.selectors.match_input(&tx.call_data) {
        DetectionResult::Matched(method) => method,
        DetectionResult::NoMatch => return,
    };

    inner.metrics.record_detection();
    info!(
        "chamada suspeita {} de {} na transação {}",
        method,
        format_address(&tx.sender),
        format_h256(&hash)
    );

    let report = pipeline::run_defense(&inner, tx, method).await;
    inner.metrics.record_outcome(&report.outcome);

    // O consumidor pode já ter descartado o canal; o pipeline não depende dele
    let _ = inner.reports.send(report).await;
}

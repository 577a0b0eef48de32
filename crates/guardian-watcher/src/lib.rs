/*!
 * Guardian Watcher
 *
 * Orquestra a observação contínua da mempool: deduplica notificações de
 * transações pendentes, casa seletores suspeitos e dispara um pipeline de
 * defesa independente por detecção, do veredicto do oráculo até a corrida
 * de inclusão no bloco alvo.
 */

pub mod config;
pub mod events;
pub mod metrics;
pub mod pipeline;
pub mod watcher;

pub use config::*;
pub use events::*;
pub use metrics::*;
pub use pipeline::PipelineState;
pub use watcher::*;

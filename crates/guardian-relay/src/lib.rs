/*! Guardian Relay
 *
 * Crate para construção do bundle de contra-ataque e interação com o relay
 * privado: simulação prévia, submissão de disparo único e resolução da
 * corrida de inclusão no bloco alvo.
 */

pub mod builder;
pub mod flashbots;

pub use builder::*;
pub use flashbots::*;

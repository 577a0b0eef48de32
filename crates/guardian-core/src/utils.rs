/*!
 * Guardian Utils
 *
 * Utilitários comuns usados em toda a workspace Guardian
 */

use ethereum_types::{Address, H256};
use std::str::FromStr;
use tiny_keccak::{Hasher, Keccak};

/// Converte uma string hexadecimal para Address
pub fn hex_to_address(hex: &str) -> Option<Address> {
    let hex_str = if hex.starts_with("0x") { &hex[2..] } else { hex };
    Address::from_str(hex_str).ok()
}

/// Converte uma string hexadecimal para H256
pub fn hex_to_h256(hex: &str) -> Option<H256> {
    let hex_str = if hex.starts_with("0x") { &hex[2..] } else { hex };
    H256::from_str(hex_str).ok()
}

/// Converte uma string hexadecimal (com ou sem 0x) para bytes
pub fn hex_to_bytes(hex_str: &str) -> Option<Vec<u8>> {
    let hex_str = if hex_str.starts_with("0x") {
        &hex_str[2..]
    } else {
        hex_str
    };
    hex::decode(hex_str).ok()
}

/// Formata um Address para exibição
pub fn format_address(address: &Address) -> String {
    format!("0x{:x}", address)
}

/// Formata um H256 para exibição
pub fn format_h256(hash: &H256) -> String {
    format!("0x{:x}", hash)
}

/// Calcula o hash Keccak-256 de dados
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut result = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut result);
    result
}

/// Seletor de 4 bytes derivado de uma assinatura de função
pub fn method_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

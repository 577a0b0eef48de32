/*!
 * Guardian Detector
 *
 * Casamento puro de seletores de função contra um registro fixo de métodos
 * perigosos conhecidos. Sem acesso a rede e sem efeitos colaterais.
 */

use guardian_core::error::{Error, Result};
use guardian_core::types::DetectionResult;

/// Entrada do registro: nome do método e seletor de 4 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorEntry {
    pub method: String,
    pub selector: [u8; 4],
}

/// Registro ordenado de seletores suspeitos.
///
/// A ordem das entradas é fixa após a construção; a primeira entrada cujo
/// seletor casar com o prefixo do calldata vence.
#[derive(Debug, Clone, Default)]
pub struct SelectorRegistry {
    entries: Vec<SelectorEntry>,
}

impl SelectorRegistry {
    /// Constrói o registro a partir de pares (método, seletor hexadecimal).
    ///
    /// O seletor aceita o prefixo `0x` e dígitos em qualquer caixa; entradas
    /// malformadas são erro de construção, nunca de casamento.
    pub fn new<I, M, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (M, S)>,
        M: AsRef<str>,
        S: AsRef<str>,
    {
        let mut parsed = Vec::new();
        for (method, selector) in entries {
            parsed.push(SelectorEntry {
                method: method.as_ref().to_string(),
                selector: parse_selector(selector.as_ref())?,
            });
        }
        Ok(Self { entries: parsed })
    }

    /// Registro padrão com os métodos perigosos já observados em campo
    pub fn suspicious_defaults() -> Self {
        let entries = vec![
            SelectorEntry {
                method: "rugPull".to_string(),
                selector: [0xd4, 0xee, 0x1d, 0x90],
            },
            SelectorEntry {
                method: "removeLiquidity".to_string(),
                selector: [0xba, 0xa2, 0xab, 0xde],
            },
            SelectorEntry {
                method: "setTaxFee".to_string(),
                selector: [0x12, 0x34, 0x56, 0x78],
            },
            SelectorEntry {
                method: "blacklist".to_string(),
                selector: [0xab, 0xcd, 0xef, 0x12],
            },
            SelectorEntry {
                method: "toggleTrading".to_string(),
                selector: [0x87, 0x65, 0x43, 0x21],
            },
            SelectorEntry {
                method: "mint".to_string(),
                selector: [0x40, 0xc1, 0x0f, 0x19],
            },
            SelectorEntry {
                method: "transferOwnership".to_string(),
                selector: [0xf2, 0xfd, 0xe3, 0x8b],
            },
        ];
        Self { entries }
    }

    /// Casa o calldata em forma hexadecimal ("0x" + dígitos).
    ///
    /// Entrada sem o marcador, mais curta que um seletor completo ou com
    /// prefixo não hexadecimal resulta em `NoMatch`, nunca em erro. O
    /// casamento é insensível à caixa dos dígitos.
    pub fn match_calldata(&self, data: &str) -> DetectionResult {
        // "0x" + 8 dígitos hexadecimais formam o seletor completo
        if !data.starts_with("0x") || data.len() < 10 {
            return DetectionResult::NoMatch;
        }
        let prefix = match data.get(2..10) {
            Some(prefix) => prefix,
            None => return DetectionResult::NoMatch,
        };
        match hex::decode(prefix) {
            Ok(bytes) => self.match_input(&bytes),
            Err(_) => DetectionResult::NoMatch,
        }
    }

    /// Casa o prefixo de 4 bytes do calldata bruto
    pub fn match_input(&self, input: &[u8]) -> DetectionResult {
        if input.len() < 4 {
            return DetectionResult::NoMatch;
        }
        let selector = [input[0], input[1], input[2], input[3]];
        for entry in &self.entries {
            if entry.selector == selector {
                return DetectionResult::Matched(entry.method.clone());
            }
        }
        DetectionResult::NoMatch
    }

    /// Entradas do registro, na ordem de avaliação
    pub fn entries(&self) -> &[SelectorEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

fn parse_selector(hex_str: &str) -> Result<[u8; 4]> {
    let trimmed = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    let bytes = hex::decode(trimmed)
        .map_err(|e| Error::DecodeError(format!("seletor inválido {}: {}", hex_str, e)))?;
    if bytes.len() != 4 {
        return Err(Error::ValidationError(format!(
            "seletor deve ter exatamente 4 bytes: {}",
            hex_str
        )));
    }
    Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
}

//! Contract schema embedded in the contract transaction.

use serde::{Deserialize, Serialize};

use crate::error::TokenError;

/// Longest accepted token symbol.
pub const MAX_SYMBOL_LEN: usize = 128;

/// JSON document describing a token, published in the contract output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContractSchema {
    /// Human-readable name of the token.
    pub name: String,
    /// Token identifier, conventionally the issuer's public key hash.
    pub token_id: String,
    /// Protocol identifier, e.g. `"STAS"`.
    #[serde(default)]
    pub protocol_id: String,
    /// Short symbol, also pushed into version 2 token scripts.
    pub symbol: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Total supply in satoshis.
    pub total_supply: u64,
    /// Display decimals.
    #[serde(default)]
    pub decimals: u8,
    /// Satoshis backing one token unit.
    pub sats_per_token: u64,
    /// Issuer-defined properties, kept verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,
}

impl ContractSchema {
    /// Check the schema against the amount being locked in the contract.
    ///
    /// # Errors
    /// `Validation` for an invalid symbol, a zero `sats_per_token`, or a
    /// `token_satoshis` smaller than or not divisible by `sats_per_token`.
    pub fn validate(&self, token_satoshis: u64) -> Result<(), TokenError> {
        if !is_valid_symbol(&self.symbol) {
            return Err(TokenError::Validation(
                "Invalid Symbol. Must be between 1 and 128 long and contain alphanumeric, '-', '_' chars."
                    .into(),
            ));
        }
        if self.sats_per_token == 0 {
            return Err(TokenError::Validation(
                "Invalid satsPerToken. Must be over 0.".into(),
            ));
        }
        if self.sats_per_token > token_satoshis {
            return Err(TokenError::Validation(format!(
                "Token amount {} is less than satsPerToken {}",
                token_satoshis, self.sats_per_token
            )));
        }
        if token_satoshis % self.sats_per_token != 0 {
            return Err(TokenError::Validation(format!(
                "Token amount {} must be divisible by satsPerToken {}",
                token_satoshis, self.sats_per_token
            )));
        }
        Ok(())
    }

    /// Serialize the schema to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TokenError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize a schema from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TokenError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// 1 to 128 characters of `[A-Za-z0-9_-]`.
pub fn is_valid_symbol(symbol: &str) -> bool {
    (1..=MAX_SYMBOL_LEN).contains(&symbol.len())
        && symbol
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

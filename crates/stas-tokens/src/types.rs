//! Common types for token operations.

use serde::{Deserialize, Serialize};

use stas_primitives::chainhash::Hash;
use stas_primitives::ec::PublicKey;
use stas_script::{Address, Script};
use stas_transaction::input::TransactionInput;
use stas_transaction::output::TransactionOutput;
use stas_transaction::Transaction;

use crate::error::TokenError;

/// Shortest accepted Base58Check address string.
pub const MIN_ADDRESS_LEN: usize = 25;

/// Longest accepted Base58Check address string.
pub const MAX_ADDRESS_LEN: usize = 34;

/// An unspent output the caller owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// Transaction that created the output.
    pub txid: Hash,
    /// Output index within that transaction.
    pub vout: u32,
    /// Value in satoshis.
    pub satoshis: u64,
    /// Locking script of the output.
    pub locking_script: Script,
}

impl Utxo {
    /// Create a UTXO reference.
    pub fn new(txid: Hash, vout: u32, satoshis: u64, locking_script: Script) -> Self {
        Utxo {
            txid,
            vout,
            satoshis,
            locking_script,
        }
    }

    /// The `vout`-th output of `tx` as a UTXO.
    pub fn from_transaction(tx: &Transaction, vout: u32) -> Result<Self, TokenError> {
        let output = tx.outputs.get(vout as usize).ok_or_else(|| {
            TokenError::Validation(format!(
                "output {} does not exist (tx has {} outputs)",
                vout,
                tx.outputs.len()
            ))
        })?;
        Ok(Utxo {
            txid: tx.tx_id(),
            vout,
            satoshis: output.satoshis,
            locking_script: output.locking_script.clone(),
        })
    }

    /// An unsigned input spending this UTXO, with the spent output attached.
    pub(crate) fn to_input(&self) -> TransactionInput {
        TransactionInput::with_source_output(
            self.txid,
            self.vout,
            TransactionOutput::new(self.satoshis, self.locking_script.clone()),
        )
    }
}

/// A UTXO together with the raw transaction that created it.
///
/// Merge and swap unlocking scripts embed the counterpart's previous
/// transaction, so those builders take proven UTXOs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenUtxo {
    /// The output being spent.
    pub utxo: Utxo,
    /// Wire bytes of the transaction that created `utxo`.
    pub source_tx: Vec<u8>,
}

impl ProvenUtxo {
    /// Resolve output `vout` of the raw transaction `source_tx`.
    pub fn from_source_tx(source_tx: &[u8], vout: u32) -> Result<Self, TokenError> {
        let tx = Transaction::from_bytes(source_tx)?;
        Ok(ProvenUtxo {
            utxo: Utxo::from_transaction(&tx, vout)?,
            source_tx: source_tx.to_vec(),
        })
    }

    /// Check that `source_tx` is the transaction `utxo` points into and that
    /// it carries `utxo`'s output.
    pub fn verify(&self) -> Result<(), TokenError> {
        let source = Transaction::from_bytes(&self.source_tx)?;
        if source.tx_id() != self.utxo.txid {
            return Err(TokenError::Validation(format!(
                "source transaction does not hash to {}",
                self.utxo.txid
            )));
        }
        match source.outputs.get(self.utxo.vout as usize) {
            Some(output)
                if output.satoshis == self.utxo.satoshis
                    && output.locking_script == self.utxo.locking_script =>
            {
                Ok(())
            }
            _ => Err(TokenError::Validation(format!(
                "output {}:{} does not match its source transaction",
                self.utxo.txid, self.utxo.vout
            ))),
        }
    }

    /// Same as [`ProvenUtxo::from_source_tx`] for a hex-encoded transaction.
    pub fn from_source_hex(source_hex: &str, vout: u32) -> Result<Self, TokenError> {
        let bytes = hex::decode(source_hex)
            .map_err(|e| TokenError::Validation(format!("source transaction hex: {e}")))?;
        Self::from_source_tx(&bytes, vout)
    }
}

/// A recipient of part of a split token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitDestination {
    /// Base58Check address of the recipient.
    pub address: String,
    /// Token satoshis sent to the recipient.
    pub satoshis: u64,
}

impl SplitDestination {
    /// Create a split destination.
    pub fn new(address: impl Into<String>, satoshis: u64) -> Self {
        SplitDestination {
            address: address.into(),
            satoshis,
        }
    }
}

/// A recipient of freshly issued tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDestination {
    /// Base58Check address of the recipient.
    pub address: String,
    /// Token satoshis issued to the recipient.
    pub satoshis: u64,
    /// Optional payload appended to the token script.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
}

/// A fee-paying P2PKH UTXO and the key that will sign for it.
#[derive(Debug, Clone)]
pub(crate) struct Funding {
    pub utxo: Utxo,
    pub public_key: PublicKey,
}

/// Pair the optional payment UTXO with its public key.
///
/// Either both are given (fee-paying transaction) or neither (zero-fee).
pub(crate) fn resolve_funding(
    utxo: Option<&Utxo>,
    public_key: Option<&PublicKey>,
) -> Result<Option<Funding>, TokenError> {
    match (utxo, public_key) {
        (Some(utxo), Some(key)) => Ok(Some(Funding {
            utxo: utxo.clone(),
            public_key: key.clone(),
        })),
        (Some(_), None) => Err(TokenError::Validation(
            "Payment UTXO provided but payment public key is null".into(),
        )),
        (None, Some(_)) => Err(TokenError::Validation(
            "Payment public key provided but payment UTXO is null".into(),
        )),
        (None, None) => Ok(None),
    }
}

/// Check that an address string has a plausible Base58Check length.
pub fn check_address_length(address: &str) -> Result<(), TokenError> {
    if (MIN_ADDRESS_LEN..=MAX_ADDRESS_LEN).contains(&address.len()) {
        Ok(())
    } else {
        Err(TokenError::Validation(format!(
            "Invalid Address in split destination: length {} outside {}..={}",
            address.len(),
            MIN_ADDRESS_LEN,
            MAX_ADDRESS_LEN
        )))
    }
}

/// Validate and decode a destination address.
pub fn parse_destination_address(address: &str) -> Result<Address, TokenError> {
    check_address_length(address)?;
    Address::from_string(address)
        .map_err(|e| TokenError::Validation(format!("Invalid Address in split destination: {e}")))
}

/// Convert an explorer-style decimal BTC amount to satoshis.
pub fn bitcoin_to_satoshis(amount: f64) -> Result<u64, TokenError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(TokenError::Validation(format!(
            "invalid bitcoin amount {amount}"
        )));
    }
    Ok((amount * 100_000_000.0).round() as u64)
}

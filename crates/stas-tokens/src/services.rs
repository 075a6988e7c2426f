//! Network collaborators the builders rely on.
//!
//! Builders never talk to the network. These traits describe the three
//! services a caller wires in around them; implementations live outside
//! this crate.

use stas_primitives::chainhash::Hash;
use stas_transaction::Transaction;
use tracing::debug;

use crate::error::ServiceError;
use crate::types::{ProvenUtxo, Utxo};

/// Trait for broadcasting transactions to the network.
pub trait Broadcaster {
    /// Broadcast a hex-encoded transaction.
    ///
    /// # Returns
    /// The transaction ID reported by the network.
    fn broadcast(&self, tx_hex: &str) -> Result<String, ServiceError>;
}

/// Trait for looking up transactions by ID.
pub trait TxFetcher {
    /// Fetch a transaction.
    fn get_transaction(&self, txid: &Hash) -> Result<Transaction, ServiceError>;
}

/// Trait for requesting test coins.
pub trait Faucet {
    /// Send coins to `address` and return the resulting outputs.
    fn fund(&self, address: &str) -> Result<Vec<Utxo>, ServiceError>;
}

/// Fetch `txid` and resolve output `vout` together with the raw transaction.
///
/// Merge and swap builders need the raw previous transaction of the
/// counterpart input; this is the usual way to get it.
///
/// # Errors
/// `ServiceError::NotFound` when the transaction has no output `vout`, or
/// the fetcher's error unchanged.
pub fn fetch_proven_utxo<F: TxFetcher + ?Sized>(
    fetcher: &F,
    txid: &Hash,
    vout: u32,
) -> Result<ProvenUtxo, ServiceError> {
    let tx = fetcher.get_transaction(txid)?;
    let utxo = Utxo::from_transaction(&tx, vout)
        .map_err(|e| ServiceError::NotFound(e.to_string()))?;
    debug!(%txid, vout, satoshis = utxo.satoshis, "resolved proven utxo");
    Ok(ProvenUtxo {
        utxo,
        source_tx: tx.to_bytes(),
    })
}

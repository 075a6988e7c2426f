//! Token error types.

use stas_primitives::PrimitivesError;
use stas_script::ScriptError;
use stas_transaction::TransactionError;

/// Errors that can occur while building or signing token transactions.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// A required argument is missing or malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The inputs cannot cover the requested outputs plus fee.
    #[error("insufficient funds: needed {needed}, available {available}")]
    InsufficientFunds {
        /// Amount needed.
        needed: u64,
        /// Amount available.
        available: u64,
    },

    /// The script does not have the expected token or P2PKH shape.
    #[error("malformed script: {0}")]
    MalformedScript(String),

    /// The amounts of a swap do not line up between maker and taker.
    #[error("swap offer mismatch on {field}: expected {expected}, actual {actual}")]
    OfferMismatch {
        /// Which pair of amounts disagreed.
        field: &'static str,
        /// The amount the counterpart committed to.
        expected: u64,
        /// The amount supplied.
        actual: u64,
    },

    /// The segment list does not describe the transaction outputs.
    #[error("segment count mismatch: {segments} segments for {outputs} outputs")]
    SegmentCountMismatch {
        /// Number of non-null segments.
        segments: usize,
        /// Number of outputs.
        outputs: usize,
    },

    /// An injected signer failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Transaction error.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Script error.
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// Primitives error.
    #[error(transparent)]
    Primitives(#[from] PrimitivesError),

    /// JSON serialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by network collaborators (broadcast, lookup, faucet).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The requested transaction or output does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The collaborator refused the request.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The collaborator could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// A fetched transaction could not be decoded.
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

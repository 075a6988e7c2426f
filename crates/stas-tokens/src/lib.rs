#![deny(missing_docs)]
//! STAS token transactions.
//!
//! Builds, fee-sizes and signs the transactions of the STAS token protocol:
//! contract, issue, transfer, split, merge, redeem and their splitting
//! variants, plus atomic swaps between two parties.
//!
//! Builders take UTXOs and injected [`Signer`]s and never hold private keys;
//! the `*_with_keys` wrappers sign with in-process keys for convenience.

pub mod assembler;
pub mod config;
pub mod error;
pub mod factory;
pub mod fee;
pub mod proof;
pub mod scheme;
pub mod script;
pub mod services;
pub mod signer;
pub mod swap;
pub mod types;

pub use config::FeeRate;
pub use error::{ServiceError, TokenError};
pub use factory::PendingTx;
pub use scheme::ContractSchema;
pub use script::{StasScript, Version};
pub use services::{fetch_proven_utxo, Broadcaster, Faucet, TxFetcher};
pub use signer::{AsyncSigner, LocalSigner, Signer, SignerRole, Signers, SigningRequest};
pub use swap::{AcceptedSwap, Acceptance, SettledSwap, SwapAmounts, SwapOffer, Wanted};
pub use types::{IssueDestination, ProvenUtxo, SplitDestination, Utxo};

//! Transaction factories for token operations.
//!
//! Every operation comes in three forms:
//! - `prepare_*` validates the request and returns an unsigned [`PendingTx`]
//!   whose outputs and fee are final;
//! - `build_*_tx` signs it with injected [`Signers`];
//! - `*_with_keys` signs with private keys and returns the transaction hex.

pub mod contract;
pub mod issue;
pub mod merge;
pub mod pending;
pub mod redeem;
pub mod split;
pub mod transfer;

pub use contract::{build_contract_tx, contract_with_keys, prepare_contract, ContractConfig};
pub use issue::{build_issue_tx, issue_with_keys, prepare_issue, IssueConfig};
pub use merge::{
    build_merge_split_tx, build_merge_tx, merge_split_with_keys, merge_with_keys,
    prepare_merge, prepare_merge_split, MergeConfig, MergeSplitConfig,
};
pub use pending::PendingTx;
pub use redeem::{
    build_redeem_split_tx, build_redeem_tx, prepare_redeem, prepare_redeem_split,
    redeem_split_with_keys, redeem_with_keys, RedeemConfig, RedeemSplitConfig,
};
pub use split::{build_split_tx, prepare_split, split_with_keys, SplitConfig};
pub use transfer::{build_transfer_tx, prepare_transfer, transfer_with_keys, TransferConfig};

use stas_primitives::ec::{PrivateKey, PublicKey};
use stas_script::Script;
use stas_transaction::output::TransactionOutput;
use stas_transaction::Transaction;
use tracing::debug;

use crate::assembler::{FundingOutpoint, UnlockShape};
use crate::config::FeeRate;
use crate::error::TokenError;
use crate::fee::{compute_change, estimate_fee, estimate_tx_size};
use crate::script::{StasScript, Version};
use crate::signer::{LocalSigner, Signer, SignerRole, Signers};
use crate::types::{parse_destination_address, Funding, SplitDestination, Utxo};

use self::pending::{InputPlan, TokenUnlock};

/// Most outputs a token unlocking script can describe.
pub const MAX_SEGMENTS: usize = 4;

// -----------------------------------------------------------------------
// Draft transactions
// -----------------------------------------------------------------------

/// Inputs, outputs and unlocking plans of a transaction being built.
pub(crate) struct Draft {
    tx: Transaction,
    plans: Vec<InputPlan>,
}

impl Draft {
    pub(crate) fn new() -> Self {
        Draft {
            tx: Transaction::new(),
            plans: Vec::new(),
        }
    }

    /// Continue from an existing transaction, one plan per input.
    pub(crate) fn from_transaction(tx: Transaction, plans: Vec<InputPlan>) -> Self {
        Draft { tx, plans }
    }

    /// Spend `utxo`, unlocking it according to `plan`.
    pub(crate) fn spend(&mut self, utxo: &Utxo, plan: InputPlan) {
        self.tx.add_input(utxo.to_input());
        self.plans.push(plan);
    }

    /// Add an output.
    pub(crate) fn pay(&mut self, satoshis: u64, locking_script: Script) {
        self.tx.add_output(TransactionOutput::new(satoshis, locking_script));
    }

    pub(crate) fn transaction(&self) -> &Transaction {
        &self.tx
    }

    pub(crate) fn estimated_size(&self) -> usize {
        let lens: Vec<Option<usize>> = self
            .plans
            .iter()
            .enumerate()
            .map(|(i, plan)| plan.estimate_len(&self.tx, i))
            .collect();
        estimate_tx_size(&self.tx, &lens)
    }

    /// Size the transaction, add change to `change_to` and freeze the outputs.
    ///
    /// Without a change address the transaction is zero-fee: whatever the
    /// inputs carry beyond the outputs goes to the miner.
    pub(crate) fn finish(
        self,
        change_to: Option<&[u8; 20]>,
        rate: &FeeRate,
    ) -> Result<PendingTx, TokenError> {
        self.finish_with(change_to, rate, Draft::estimated_size)
    }

    /// Same as [`Draft::finish`] with a caller-supplied size estimate.
    pub(crate) fn finish_with(
        mut self,
        change_to: Option<&[u8; 20]>,
        rate: &FeeRate,
        size_of: impl Fn(&Draft) -> usize,
    ) -> Result<PendingTx, TokenError> {
        let inputs_total = self.tx.total_input_satoshis()?;
        let outputs_total = self.tx.total_output_satoshis();

        let (size, fee) = match change_to {
            Some(pkh) => {
                self.pay(0, Script::p2pkh(pkh));
                let size = size_of(&self);
                let fee = estimate_fee(size, rate);
                let change = compute_change(inputs_total, outputs_total, fee)?;
                if let Some(last) = self.tx.outputs.last_mut() {
                    last.satoshis = change;
                }
                (size, fee)
            }
            None => {
                let fee = inputs_total.checked_sub(outputs_total).ok_or(
                    TokenError::InsufficientFunds {
                        needed: outputs_total,
                        available: inputs_total,
                    },
                )?;
                (size_of(&self), fee)
            }
        };

        debug!(
            inputs = self.tx.inputs.len(),
            outputs = self.tx.outputs.len(),
            estimated_size = size,
            fee,
            "transaction prepared"
        );
        Ok(PendingTx::new(self.tx, self.plans, size, fee))
    }

    /// Freeze the transaction as it is; no change is added.
    pub(crate) fn seal(self, fee: u64) -> PendingTx {
        let size = self.estimated_size();
        PendingTx::new(self.tx, self.plans, size, fee)
    }
}

// -----------------------------------------------------------------------
// Shared validation
// -----------------------------------------------------------------------

/// Parse the token being spent and check that `owner` owns it.
pub(crate) fn owned_token(utxo: &Utxo, owner: &PublicKey) -> Result<StasScript, TokenError> {
    let stas = StasScript::from_script(&utxo.locking_script)?;
    if stas.owner != owner.hash160() {
        return Err(TokenError::Validation(format!(
            "token {}:{} is not owned by the supplied owner public key",
            utxo.txid, utxo.vout
        )));
    }
    Ok(stas)
}

/// Version 1 scripts have no zero-fee path.
pub(crate) fn check_fee_mode(version: Version, funding: Option<&Funding>) -> Result<(), TokenError> {
    if funding.is_none() && version == Version::V1 {
        return Err(TokenError::Validation(
            "version 1 tokens cannot be spent without a fee".into(),
        ));
    }
    Ok(())
}

/// Resolve a token recipient, refusing the issuer's own address.
pub(crate) fn token_recipient(address: &str, stas: &StasScript) -> Result<[u8; 20], TokenError> {
    let pkh = parse_destination_address(address)?.public_key_hash;
    if pkh == stas.redemption {
        return Err(TokenError::Validation(
            "Token UTXO cannot be sent to issuer address".into(),
        ));
    }
    Ok(pkh)
}

/// Validate a list of split destinations and resolve their recipients.
///
/// # Errors
/// `Validation` for an empty or oversized list, a zero amount or a bad
/// address; the issuer's address is refused.
pub(crate) fn split_recipients(
    destinations: &[SplitDestination],
    max: usize,
    stas: &StasScript,
) -> Result<Vec<([u8; 20], u64)>, TokenError> {
    if destinations.is_empty() {
        return Err(TokenError::Validation(
            "split destinations array is null or empty".into(),
        ));
    }
    if destinations.len() > max {
        return Err(TokenError::Validation(format!(
            "Must have less than {} segments (at most {max} destinations)",
            MAX_SEGMENTS + 1
        )));
    }
    destinations
        .iter()
        .map(|d| {
            if d.satoshis == 0 {
                return Err(TokenError::Validation(format!(
                    "split destination {} has a zero amount",
                    d.address
                )));
            }
            Ok((token_recipient(&d.address, stas)?, d.satoshis))
        })
        .collect()
}

/// Token amounts must be conserved exactly.
pub(crate) fn check_conserved(input: u64, outputs: u64) -> Result<(), TokenError> {
    if outputs > input {
        return Err(TokenError::InsufficientFunds {
            needed: outputs,
            available: input,
        });
    }
    if outputs < input {
        return Err(TokenError::Validation(format!(
            "output amounts ({outputs}) must add up to the token input ({input})"
        )));
    }
    Ok(())
}

/// Unlocking fields for a token input; fee-paying when `funding` is given.
pub(crate) fn token_unlock(
    funding: Option<&Funding>,
    shape: UnlockShape,
    version: Version,
    null_slot: Option<usize>,
) -> TokenUnlock {
    TokenUnlock {
        null_slot,
        funding: funding.map(|f| FundingOutpoint {
            txid: f.utxo.txid,
            vout: f.utxo.vout,
        }),
        shape,
        version,
    }
}

// -----------------------------------------------------------------------
// Signing with private keys
// -----------------------------------------------------------------------

/// Sign `pending` with in-process keys and return the transaction hex.
///
/// Each key must match the public key the transaction was prepared for.
pub(crate) fn sign_with_keys(
    pending: PendingTx,
    keys: &[(SignerRole, &PrivateKey)],
) -> Result<String, TokenError> {
    let locals: Vec<(SignerRole, LocalSigner)> = keys
        .iter()
        .map(|(role, key)| (*role, LocalSigner::new((*key).clone())))
        .collect();

    for (role, expected) in pending.expected_keys() {
        let local = locals
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, s)| s)
            .ok_or_else(|| TokenError::Signing(format!("no private key supplied for {role:?}")))?;
        if local.public_key() != *expected {
            return Err(TokenError::Validation(format!(
                "private key for {role:?} does not match its public key"
            )));
        }
    }

    let signers = locals
        .iter()
        .fold(Signers::<dyn Signer>::new(), |signers, (role, signer)| {
            signers.with(*role, signer)
        });
    Ok(pending.sign(&signers)?.to_hex())
}

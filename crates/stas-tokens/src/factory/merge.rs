//! Merge and merge-split transaction builders.
//!
//! Both spend two token UTXOs of the same token and owner. Each token input
//! proves the other's ancestry: its unlocking script carries the other
//! input's previous transaction cut around the token script body.

use stas_primitives::ec::{PrivateKey, PublicKey};
use stas_transaction::Transaction;
use tracing::info;

use crate::assembler::UnlockShape;
use crate::config::FeeRate;
use crate::error::TokenError;
use crate::proof::merge_pieces;
use crate::script::{same_lineage, StasScript};
use crate::signer::{Signer, SignerRole, Signers};
use crate::types::{resolve_funding, Funding, ProvenUtxo, SplitDestination, Utxo};

use super::pending::{InputPlan, PendingTx};
use super::{
    check_conserved, check_fee_mode, owned_token, sign_with_keys, split_recipients,
    token_recipient, token_unlock, Draft,
};

/// Most destinations a merge-split can pay.
pub const MAX_MERGE_SPLIT_DESTINATIONS: usize = 2;

/// Configuration for merging two token UTXOs into one.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Owner of both token UTXOs.
    pub owner_public_key: PublicKey,
    /// The two token UTXOs, with their source transactions.
    pub token_utxos: [ProvenUtxo; 2],
    /// Address receiving the merged token.
    pub destination: String,
    /// Optional fee-paying UTXO.
    pub payment_utxo: Option<Utxo>,
    /// Key for `payment_utxo`; also receives the change.
    pub payment_public_key: Option<PublicKey>,
    /// Fee rate.
    pub fee_rate: FeeRate,
}

/// Configuration for merging two token UTXOs and splitting the result.
#[derive(Debug, Clone)]
pub struct MergeSplitConfig {
    /// Owner of both token UTXOs.
    pub owner_public_key: PublicKey,
    /// The two token UTXOs, with their source transactions.
    pub token_utxos: [ProvenUtxo; 2],
    /// Recipients (at most two); amounts must add up to both inputs.
    pub destinations: Vec<SplitDestination>,
    /// Optional fee-paying UTXO.
    pub payment_utxo: Option<Utxo>,
    /// Key for `payment_utxo`; also receives the change.
    pub payment_public_key: Option<PublicKey>,
    /// Fee rate.
    pub fee_rate: FeeRate,
}

/// Check both inputs and return the token they carry.
fn merged_token(
    token_utxos: &[ProvenUtxo; 2],
    owner: &PublicKey,
) -> Result<StasScript, TokenError> {
    for proven in token_utxos {
        proven.verify()?;
    }
    let [a, b] = token_utxos;
    let stas = owned_token(&a.utxo, owner)?;
    owned_token(&b.utxo, owner)?;
    if !same_lineage(&a.utxo.locking_script, &b.utxo.locking_script) {
        return Err(TokenError::Validation(
            "token UTXOs belong to different tokens".into(),
        ));
    }
    Ok(stas)
}

/// Lay out the two token inputs, the payment input and the token outputs.
fn merge_draft(
    token_utxos: &[ProvenUtxo; 2],
    owner: &PublicKey,
    stas: &StasScript,
    funding: Option<&Funding>,
    outputs: &[([u8; 20], u64)],
) -> Result<Draft, TokenError> {
    let mut draft = Draft::new();
    for (index, proven) in token_utxos.iter().enumerate() {
        let other = &token_utxos[1 - index];
        let shape = UnlockShape::Merge {
            counterpart_vout: other.utxo.vout,
            pieces: merge_pieces(&other.source_tx, other.utxo.vout)?,
        };
        draft.spend(
            &proven.utxo,
            InputPlan::token(
                SignerRole::Owner,
                owner,
                token_unlock(funding, shape, stas.version, None),
            ),
        );
    }
    if let Some(f) = funding {
        draft.spend(&f.utxo, InputPlan::p2pkh(SignerRole::Payment, &f.public_key));
    }
    for (recipient, satoshis) in outputs {
        draft.pay(*satoshis, stas.with_owner(*recipient).to_script()?);
    }
    Ok(draft)
}

fn input_total(token_utxos: &[ProvenUtxo; 2]) -> u64 {
    token_utxos.iter().map(|p| p.utxo.satoshis).sum()
}

/// Validate a merge and lay out the unsigned transaction.
///
/// # Transaction structure
/// - Inputs 0, 1: token UTXOs (owner)
/// - Input 2: payment UTXO (fee-paying only)
/// - Output 0: merged token to the destination
/// - Output 1: change (fee-paying only)
pub fn prepare_merge(config: &MergeConfig) -> Result<PendingTx, TokenError> {
    let funding = resolve_funding(
        config.payment_utxo.as_ref(),
        config.payment_public_key.as_ref(),
    )?;
    let stas = merged_token(&config.token_utxos, &config.owner_public_key)?;
    check_fee_mode(stas.version, funding.as_ref())?;
    let recipient = token_recipient(&config.destination, &stas)?;
    let total = input_total(&config.token_utxos);

    let draft = merge_draft(
        &config.token_utxos,
        &config.owner_public_key,
        &stas,
        funding.as_ref(),
        &[(recipient, total)],
    )?;
    let change_to = funding.as_ref().map(|f| f.public_key.hash160());
    let pending = draft.finish(change_to.as_ref(), &config.fee_rate)?;
    info!(satoshis = total, fee = pending.fee(), "merge prepared");
    Ok(pending)
}

/// Validate a merge-split and lay out the unsigned transaction.
///
/// # Transaction structure
/// - Inputs 0, 1: token UTXOs (owner)
/// - Input 2: payment UTXO (fee-paying only)
/// - Outputs: one token output per destination, then change
pub fn prepare_merge_split(config: &MergeSplitConfig) -> Result<PendingTx, TokenError> {
    let funding = resolve_funding(
        config.payment_utxo.as_ref(),
        config.payment_public_key.as_ref(),
    )?;
    let stas = merged_token(&config.token_utxos, &config.owner_public_key)?;
    let recipients =
        split_recipients(&config.destinations, MAX_MERGE_SPLIT_DESTINATIONS, &stas)?;
    if recipients.len() > 1 && !stas.splittable {
        return Err(TokenError::Validation("token is not splittable".into()));
    }
    check_fee_mode(stas.version, funding.as_ref())?;
    let total = input_total(&config.token_utxos);
    check_conserved(total, recipients.iter().map(|(_, sats)| *sats).sum())?;

    let draft = merge_draft(
        &config.token_utxos,
        &config.owner_public_key,
        &stas,
        funding.as_ref(),
        &recipients,
    )?;
    let change_to = funding.as_ref().map(|f| f.public_key.hash160());
    let pending = draft.finish(change_to.as_ref(), &config.fee_rate)?;
    info!(
        destinations = recipients.len(),
        satoshis = total,
        fee = pending.fee(),
        "merge split prepared"
    );
    Ok(pending)
}

/// Build and sign a merge transaction.
pub fn build_merge_tx<S: Signer + ?Sized>(
    config: &MergeConfig,
    signers: &Signers<'_, S>,
) -> Result<Transaction, TokenError> {
    prepare_merge(config)?.sign(signers)
}

/// Build and sign a merge-split transaction.
pub fn build_merge_split_tx<S: Signer + ?Sized>(
    config: &MergeSplitConfig,
    signers: &Signers<'_, S>,
) -> Result<Transaction, TokenError> {
    prepare_merge_split(config)?.sign(signers)
}

/// Build a merge signed with private keys; returns its hex.
pub fn merge_with_keys(
    config: &MergeConfig,
    owner_key: &PrivateKey,
    payment_key: Option<&PrivateKey>,
) -> Result<String, TokenError> {
    let mut keys = vec![(SignerRole::Owner, owner_key)];
    keys.extend(payment_key.map(|k| (SignerRole::Payment, k)));
    sign_with_keys(prepare_merge(config)?, &keys)
}

/// Build a merge-split signed with private keys; returns its hex.
pub fn merge_split_with_keys(
    config: &MergeSplitConfig,
    owner_key: &PrivateKey,
    payment_key: Option<&PrivateKey>,
) -> Result<String, TokenError> {
    let mut keys = vec![(SignerRole::Owner, owner_key)];
    keys.extend(payment_key.map(|k| (SignerRole::Payment, k)));
    sign_with_keys(prepare_merge_split(config)?, &keys)
}

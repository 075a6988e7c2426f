//! Split transaction builder.

use stas_primitives::ec::{PrivateKey, PublicKey};
use stas_transaction::Transaction;
use tracing::info;

use crate::assembler::UnlockShape;
use crate::config::FeeRate;
use crate::error::TokenError;
use crate::signer::{Signer, SignerRole, Signers};
use crate::types::{resolve_funding, SplitDestination, Utxo};

use super::pending::{InputPlan, PendingTx};
use super::{
    check_conserved, check_fee_mode, owned_token, sign_with_keys, split_recipients, token_unlock,
    Draft, MAX_SEGMENTS,
};

/// Configuration for splitting one token UTXO into several.
#[derive(Debug, Clone)]
pub struct SplitConfig {
    /// Current owner of the token.
    pub owner_public_key: PublicKey,
    /// The token UTXO being split.
    pub token_utxo: Utxo,
    /// Recipients; amounts must add up to the token UTXO.
    pub destinations: Vec<SplitDestination>,
    /// Optional fee-paying UTXO.
    pub payment_utxo: Option<Utxo>,
    /// Key for `payment_utxo`; also receives the change.
    pub payment_public_key: Option<PublicKey>,
    /// Fee rate.
    pub fee_rate: FeeRate,
}

/// Validate a split and lay out the unsigned transaction.
///
/// # Transaction structure
/// - Input 0: token UTXO (owner)
/// - Input 1: payment UTXO (fee-paying only)
/// - Outputs 0..n: one token output per destination (at most 4)
/// - Output n: change (fee-paying only)
pub fn prepare_split(config: &SplitConfig) -> Result<PendingTx, TokenError> {
    let funding = resolve_funding(
        config.payment_utxo.as_ref(),
        config.payment_public_key.as_ref(),
    )?;
    let stas = owned_token(&config.token_utxo, &config.owner_public_key)?;
    let recipients = split_recipients(&config.destinations, MAX_SEGMENTS, &stas)?;
    if !stas.splittable {
        return Err(TokenError::Validation("token is not splittable".into()));
    }
    check_fee_mode(stas.version, funding.as_ref())?;
    let total: u64 = recipients.iter().map(|(_, sats)| *sats).sum();
    check_conserved(config.token_utxo.satoshis, total)?;

    let mut draft = Draft::new();
    draft.spend(
        &config.token_utxo,
        InputPlan::token(
            SignerRole::Owner,
            &config.owner_public_key,
            token_unlock(funding.as_ref(), UnlockShape::Plain, stas.version, None),
        ),
    );
    if let Some(f) = &funding {
        draft.spend(&f.utxo, InputPlan::p2pkh(SignerRole::Payment, &f.public_key));
    }
    for (owner, satoshis) in &recipients {
        draft.pay(*satoshis, stas.with_owner(*owner).to_script()?);
    }

    let change_to = funding.as_ref().map(|f| f.public_key.hash160());
    let pending = draft.finish(change_to.as_ref(), &config.fee_rate)?;
    info!(
        destinations = recipients.len(),
        satoshis = total,
        fee = pending.fee(),
        "split prepared"
    );
    Ok(pending)
}

/// Build and sign a split transaction.
pub fn build_split_tx<S: Signer + ?Sized>(
    config: &SplitConfig,
    signers: &Signers<'_, S>,
) -> Result<Transaction, TokenError> {
    prepare_split(config)?.sign(signers)
}

/// Build a split signed with private keys; returns its hex.
pub fn split_with_keys(
    config: &SplitConfig,
    owner_key: &PrivateKey,
    payment_key: Option<&PrivateKey>,
) -> Result<String, TokenError> {
    let mut keys = vec![(SignerRole::Owner, owner_key)];
    keys.extend(payment_key.map(|k| (SignerRole::Payment, k)));
    sign_with_keys(prepare_split(config)?, &keys)
}

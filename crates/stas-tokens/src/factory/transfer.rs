//! Transfer transaction builder.

use stas_primitives::ec::{PrivateKey, PublicKey};
use stas_transaction::Transaction;
use tracing::info;

use crate::assembler::UnlockShape;
use crate::config::FeeRate;
use crate::error::TokenError;
use crate::signer::{Signer, SignerRole, Signers};
use crate::types::{resolve_funding, Utxo};

use super::pending::{InputPlan, PendingTx};
use super::{check_fee_mode, owned_token, sign_with_keys, token_recipient, token_unlock, Draft};

/// Configuration for transferring a token to a new owner.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Current owner of the token.
    pub owner_public_key: PublicKey,
    /// The token UTXO being transferred.
    pub token_utxo: Utxo,
    /// Address of the new owner.
    pub destination: String,
    /// Optional fee-paying UTXO.
    pub payment_utxo: Option<Utxo>,
    /// Key for `payment_utxo`; also receives the change.
    pub payment_public_key: Option<PublicKey>,
    /// Fee rate.
    pub fee_rate: FeeRate,
}

/// Validate a transfer and lay out the unsigned transaction.
///
/// # Transaction structure
/// - Input 0: token UTXO (owner)
/// - Input 1: payment UTXO (fee-paying only)
/// - Output 0: the token re-owned to the destination
/// - Output 1: change (fee-paying only)
pub fn prepare_transfer(config: &TransferConfig) -> Result<PendingTx, TokenError> {
    let funding = resolve_funding(
        config.payment_utxo.as_ref(),
        config.payment_public_key.as_ref(),
    )?;
    let stas = owned_token(&config.token_utxo, &config.owner_public_key)?;
    check_fee_mode(stas.version, funding.as_ref())?;

    let recipient = token_recipient(&config.destination, &stas)?;
    if recipient == stas.owner {
        return Err(TokenError::Validation(
            "transfer destination is the current owner".into(),
        ));
    }

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
    draft.pay(config.token_utxo.satoshis, stas.with_owner(recipient).to_script()?);

    let change_to = funding.as_ref().map(|f| f.public_key.hash160());
    let pending = draft.finish(change_to.as_ref(), &config.fee_rate)?;
    info!(
        satoshis = config.token_utxo.satoshis,
        zero_fee = funding.is_none(),
        fee = pending.fee(),
        "transfer prepared"
    );
    Ok(pending)
}

/// Build and sign a transfer transaction.
pub fn build_transfer_tx<S: Signer + ?Sized>(
    config: &TransferConfig,
    signers: &Signers<'_, S>,
) -> Result<Transaction, TokenError> {
    prepare_transfer(config)?.sign(signers)
}

/// Build a transfer signed with private keys; returns its hex.
pub fn transfer_with_keys(
    config: &TransferConfig,
    owner_key: &PrivateKey,
    payment_key: Option<&PrivateKey>,
) -> Result<String, TokenError> {
    let mut keys = vec![(SignerRole::Owner, owner_key)];
    keys.extend(payment_key.map(|k| (SignerRole::Payment, k)));
    sign_with_keys(prepare_transfer(config)?, &keys)
}

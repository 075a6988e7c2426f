//! Redeem and redeem-split transaction builders.
//!
//! Redeeming turns token satoshis back into plain satoshis paid to the
//! issuer, whose key hash is the token's redemption hash.

use stas_primitives::ec::{PrivateKey, PublicKey};
use stas_script::Script;
use stas_transaction::Transaction;
use tracing::info;

use crate::assembler::UnlockShape;
use crate::config::FeeRate;
use crate::error::TokenError;
use crate::script::StasScript;
use crate::signer::{Signer, SignerRole, Signers};
use crate::types::{resolve_funding, SplitDestination, Utxo};

use super::pending::{InputPlan, PendingTx};
use super::{
    check_fee_mode, owned_token, sign_with_keys, split_recipients, token_unlock, Draft,
    MAX_SEGMENTS,
};

/// Most token destinations a redeem-split can pay besides the redeem output.
pub const MAX_REDEEM_SPLIT_DESTINATIONS: usize = MAX_SEGMENTS - 1;

/// Configuration for redeeming a whole token UTXO.
#[derive(Debug, Clone)]
pub struct RedeemConfig {
    /// Current owner of the token.
    pub owner_public_key: PublicKey,
    /// Issuer (contract) key; the redeem output pays its hash.
    pub issuer_public_key: PublicKey,
    /// The token UTXO being redeemed.
    pub token_utxo: Utxo,
    /// Optional fee-paying UTXO.
    pub payment_utxo: Option<Utxo>,
    /// Key for `payment_utxo`; also receives the change.
    pub payment_public_key: Option<PublicKey>,
    /// Fee rate.
    pub fee_rate: FeeRate,
}

/// Configuration for redeeming part of a token UTXO and sending the rest on.
#[derive(Debug, Clone)]
pub struct RedeemSplitConfig {
    /// Current owner of the token.
    pub owner_public_key: PublicKey,
    /// Issuer (contract) key; the redeem output pays its hash.
    pub issuer_public_key: PublicKey,
    /// The token UTXO being split.
    pub token_utxo: Utxo,
    /// Token recipients (at most three); the remainder is redeemed.
    pub destinations: Vec<SplitDestination>,
    /// Optional fee-paying UTXO.
    pub payment_utxo: Option<Utxo>,
    /// Key for `payment_utxo`; also receives the change.
    pub payment_public_key: Option<PublicKey>,
    /// Fee rate.
    pub fee_rate: FeeRate,
}

/// The redemption hash must belong to the supplied issuer key.
fn redeem_script(stas: &StasScript, issuer: &PublicKey) -> Result<Script, TokenError> {
    let issuer_hash = issuer.hash160();
    if issuer_hash != stas.redemption {
        return Err(TokenError::Validation(
            "contract public key does not match the token redemption hash".into(),
        ));
    }
    Ok(Script::p2pkh(&issuer_hash))
}

/// Validate a redeem and lay out the unsigned transaction.
///
/// # Transaction structure
/// - Input 0: token UTXO (owner)
/// - Input 1: payment UTXO (fee-paying only)
/// - Output 0: P2PKH to the issuer carrying the token satoshis
/// - Output 1: change (fee-paying only)
///
/// The unlocking script carries a null slot after the redeem segment.
pub fn prepare_redeem(config: &RedeemConfig) -> Result<PendingTx, TokenError> {
    let funding = resolve_funding(
        config.payment_utxo.as_ref(),
        config.payment_public_key.as_ref(),
    )?;
    let stas = owned_token(&config.token_utxo, &config.owner_public_key)?;
    check_fee_mode(stas.version, funding.as_ref())?;
    let redeem = redeem_script(&stas, &config.issuer_public_key)?;

    let mut draft = Draft::new();
    draft.spend(
        &config.token_utxo,
        InputPlan::token(
            SignerRole::Owner,
            &config.owner_public_key,
            token_unlock(funding.as_ref(), UnlockShape::Plain, stas.version, Some(1)),
        ),
    );
    if let Some(f) = &funding {
        draft.spend(&f.utxo, InputPlan::p2pkh(SignerRole::Payment, &f.public_key));
    }
    draft.pay(config.token_utxo.satoshis, redeem);

    let change_to = funding.as_ref().map(|f| f.public_key.hash160());
    let pending = draft.finish(change_to.as_ref(), &config.fee_rate)?;
    info!(
        satoshis = config.token_utxo.satoshis,
        fee = pending.fee(),
        "redeem prepared"
    );
    Ok(pending)
}

/// Validate a redeem-split and lay out the unsigned transaction.
///
/// # Transaction structure
/// - Input 0: token UTXO (owner)
/// - Input 1: payment UTXO (fee-paying only)
/// - Output 0: P2PKH to the issuer carrying what the destinations leave
/// - Outputs 1..n: token outputs per destination
/// - Output n: change (fee-paying only)
pub fn prepare_redeem_split(config: &RedeemSplitConfig) -> Result<PendingTx, TokenError> {
    let funding = resolve_funding(
        config.payment_utxo.as_ref(),
        config.payment_public_key.as_ref(),
    )?;
    let stas = owned_token(&config.token_utxo, &config.owner_public_key)?;
    let recipients =
        split_recipients(&config.destinations, MAX_REDEEM_SPLIT_DESTINATIONS, &stas)?;
    if !stas.splittable {
        return Err(TokenError::Validation("token is not splittable".into()));
    }
    check_fee_mode(stas.version, funding.as_ref())?;
    let redeem = redeem_script(&stas, &config.issuer_public_key)?;

    let split_total: u64 = recipients.iter().map(|(_, sats)| *sats).sum();
    let redeem_satoshis = match config.token_utxo.satoshis.checked_sub(split_total) {
        Some(sats) if sats > 0 => sats,
        _ => {
            return Err(TokenError::InsufficientFunds {
                needed: split_total.saturating_add(1),
                available: config.token_utxo.satoshis,
            })
        }
    };

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
    draft.pay(redeem_satoshis, redeem);
    for (owner, satoshis) in &recipients {
        draft.pay(*satoshis, stas.with_owner(*owner).to_script()?);
    }

    let change_to = funding.as_ref().map(|f| f.public_key.hash160());
    let pending = draft.finish(change_to.as_ref(), &config.fee_rate)?;
    info!(
        redeemed = redeem_satoshis,
        destinations = recipients.len(),
        fee = pending.fee(),
        "redeem split prepared"
    );
    Ok(pending)
}

/// Build and sign a redeem transaction.
pub fn build_redeem_tx<S: Signer + ?Sized>(
    config: &RedeemConfig,
    signers: &Signers<'_, S>,
) -> Result<Transaction, TokenError> {
    prepare_redeem(config)?.sign(signers)
}

/// Build and sign a redeem-split transaction.
pub fn build_redeem_split_tx<S: Signer + ?Sized>(
    config: &RedeemSplitConfig,
    signers: &Signers<'_, S>,
) -> Result<Transaction, TokenError> {
    prepare_redeem_split(config)?.sign(signers)
}

/// Build a redeem signed with private keys; returns its hex.
pub fn redeem_with_keys(
    config: &RedeemConfig,
    owner_key: &PrivateKey,
    payment_key: Option<&PrivateKey>,
) -> Result<String, TokenError> {
    let mut keys = vec![(SignerRole::Owner, owner_key)];
    keys.extend(payment_key.map(|k| (SignerRole::Payment, k)));
    sign_with_keys(prepare_redeem(config)?, &keys)
}

/// Build a redeem-split signed with private keys; returns its hex.
pub fn redeem_split_with_keys(
    config: &RedeemSplitConfig,
    owner_key: &PrivateKey,
    payment_key: Option<&PrivateKey>,
) -> Result<String, TokenError> {
    let mut keys = vec![(SignerRole::Owner, owner_key)];
    keys.extend(payment_key.map(|k| (SignerRole::Payment, k)));
    sign_with_keys(prepare_redeem_split(config)?, &keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stas_primitives::chainhash::Hash;
    use stas_script::{Address, Network};

    use crate::assembler::decode_segments;
    use crate::script::{build_token_script, is_p2pkh_script, is_token_script_bytes, Version};

    fn address(key: &PrivateKey) -> String {
        Address::from_public_key(&key.pub_key(), Network::Mainnet).address_string
    }

    struct Keys {
        issuer: PrivateKey,
        owner: PrivateKey,
        payment: PrivateKey,
    }

    fn keys() -> Keys {
        Keys {
            issuer: PrivateKey::new(),
            owner: PrivateKey::new(),
            payment: PrivateKey::new(),
        }
    }

    fn token(k: &Keys) -> Utxo {
        let script = build_token_script(
            &k.owner.pub_key().hash160(),
            &k.issuer.pub_key(),
            Version::V2,
            None,
            true,
        )
        .unwrap();
        Utxo::new(Hash::new([0x71; 32]), 1, 70_000, script)
    }

    fn payment(k: &Keys) -> Utxo {
        Utxo::new(
            Hash::new([0x72; 32]),
            0,
            20_000,
            Script::p2pkh(&k.payment.pub_key().hash160()),
        )
    }

    fn redeem_config(k: &Keys) -> RedeemConfig {
        RedeemConfig {
            owner_public_key: k.owner.pub_key(),
            issuer_public_key: k.issuer.pub_key(),
            token_utxo: token(k),
            payment_utxo: Some(payment(k)),
            payment_public_key: Some(k.payment.pub_key()),
            fee_rate: FeeRate::default(),
        }
    }

    fn redeem_split_config(k: &Keys, amounts: &[u64]) -> RedeemSplitConfig {
        RedeemSplitConfig {
            owner_public_key: k.owner.pub_key(),
            issuer_public_key: k.issuer.pub_key(),
            token_utxo: token(k),
            destinations: amounts
                .iter()
                .map(|a| SplitDestination::new(address(&PrivateKey::new()), *a))
                .collect(),
            payment_utxo: Some(payment(k)),
            payment_public_key: Some(k.payment.pub_key()),
            fee_rate: FeeRate::default(),
        }
    }

    #[test]
    fn redeem_pays_the_issuer() {
        let k = keys();
        let cfg = redeem_config(&k);
        let pending = prepare_redeem(&cfg).unwrap();
        let estimated = pending.estimated_size();
        let tx = Transaction::from_hex(&redeem_with_keys(&cfg, &k.owner, Some(&k.payment)).unwrap())
            .unwrap();

        assert!(tx.size() <= estimated);
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].satoshis, 70_000);
        assert_eq!(
            tx.outputs[0].locking_script,
            Script::p2pkh(&k.issuer.pub_key().hash160())
        );

        let slots = decode_segments(tx.inputs[0].unlocking_script.as_ref().unwrap()).unwrap();
        assert_eq!(slots.len(), 3);
        assert!(slots[1].is_none());
        assert_eq!(slots[0].unwrap().satoshis, 70_000);
    }

    #[test]
    fn zero_fee_redeem_keeps_the_null_slot() {
        let k = keys();
        let mut cfg = redeem_config(&k);
        cfg.payment_utxo = None;
        cfg.payment_public_key = None;
        let tx = Transaction::from_hex(&redeem_with_keys(&cfg, &k.owner, None).unwrap()).unwrap();
        assert_eq!(tx.outputs.len(), 1);
        let slots = decode_segments(tx.inputs[0].unlocking_script.as_ref().unwrap()).unwrap();
        assert_eq!(slots.len(), 2);
    }

    #[test]
    fn wrong_issuer_key_is_rejected() {
        let k = keys();
        let mut cfg = redeem_config(&k);
        cfg.issuer_public_key = PrivateKey::new().pub_key();
        assert!(matches!(prepare_redeem(&cfg), Err(TokenError::Validation(_))));
    }

    #[test]
    fn redeem_split_puts_redeem_output_first() {
        let k = keys();
        let cfg = redeem_split_config(&k, &[10_000, 10_000]);
        let pending = prepare_redeem_split(&cfg).unwrap();
        let estimated = pending.estimated_size();
        let tx = Transaction::from_hex(
            &redeem_split_with_keys(&cfg, &k.owner, Some(&k.payment)).unwrap(),
        )
        .unwrap();

        assert!(tx.size() <= estimated);
        assert_eq!(tx.outputs.len(), 4);
        assert_eq!(tx.outputs[0].satoshis, 50_000);
        assert!(is_p2pkh_script(tx.outputs[0].locking_script.to_bytes()));
        assert!(is_token_script_bytes(tx.outputs[1].locking_script.to_bytes()));
        assert!(is_token_script_bytes(tx.outputs[2].locking_script.to_bytes()));
        assert!(is_p2pkh_script(tx.outputs[3].locking_script.to_bytes()));
    }

    #[test]
    fn redeem_split_needs_something_to_redeem() {
        let k = keys();
        let cfg = redeem_split_config(&k, &[35_000, 35_000]);
        assert!(matches!(
            prepare_redeem_split(&cfg),
            Err(TokenError::InsufficientFunds { .. })
        ));
        let cfg = redeem_split_config(&k, &[60_000, 20_000]);
        assert!(matches!(
            prepare_redeem_split(&cfg),
            Err(TokenError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn redeem_split_caps_destinations() {
        let k = keys();
        let cfg = redeem_split_config(&k, &[1_000, 1_000, 1_000, 1_000]);
        let err = prepare_redeem_split(&cfg).unwrap_err();
        assert!(err.to_string().contains("Must have less than 5 segments"));
        assert!(prepare_redeem_split(&redeem_split_config(&k, &[1_000, 1_000, 1_000])).is_ok());
    }

    #[test]
    fn redeem_split_refuses_issuer_destination() {
        let k = keys();
        let mut cfg = redeem_split_config(&k, &[10_000]);
        cfg.destinations[0].address = address(&k.issuer);
        let err = prepare_redeem_split(&cfg).unwrap_err();
        assert!(err.to_string().contains("Token UTXO cannot be sent to issuer address"));
    }
}

//! Atomic swaps between a token and another token or native satoshis.
//!
//! A swap moves through three states, each carried as transaction hex:
//!
//! - [`SwapOffer`]: the maker's input 0 and wanted output 0. A signed offer
//!   also carries the maker's `SIGHASH_SINGLE | ANYONECANPAY` signature, so
//!   the taker can settle alone.
//! - [`AcceptedSwap`]: the taker added their input and output, the funding
//!   input and change, and signed; the maker still has to sign input 0.
//! - [`SettledSwap`]: every input is unlocked.
//!
//! [`all_in_one_swap`] goes straight to the settled state when both parties
//! sign in the same process.

use serde::{Deserialize, Serialize};
use stas_primitives::ec::{PrivateKey, PublicKey};
use stas_script::Script;
use stas_transaction::output::TransactionOutput;
use stas_transaction::sighash::SIGHASH_SINGLE_ANYONECANPAY_FORKID;
use stas_transaction::Transaction;
use tracing::{debug, info};

use crate::assembler::UnlockShape;
use crate::config::FeeRate;
use crate::error::TokenError;
use crate::factory::pending::{InputPlan, PendingTx};
use crate::factory::{sign_with_keys, token_unlock, Draft};
use crate::fee::{estimate_swap_size, preimage_len};
use crate::script::{
    detect_version, is_p2pkh_script, is_token_script_bytes, recipient_hash, same_lineage,
    update_owner,
};
use crate::signer::{Signer, SignerRole, Signers};
use crate::types::{Funding, ProvenUtxo, Utxo};

/// Shortest raw transaction accepted as a swap counterpart (50 bytes, 100 hex chars).
const MIN_SOURCE_TX_LEN: usize = 50;

// -----------------------------------------------------------------------
// Swap states
// -----------------------------------------------------------------------

/// An offer published by the maker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOffer(pub String);

/// An offer the taker accepted; waits for the maker's signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedSwap(pub String);

/// A fully signed swap, ready to broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettledSwap(pub String);

/// Result of accepting an offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acceptance {
    /// The offer was unsigned; hand the transaction back to the maker.
    Accepted(AcceptedSwap),
    /// The offer was signed; the swap is complete.
    Settled(SettledSwap),
}

impl SettledSwap {
    /// Decode the settled transaction.
    pub fn transaction(&self) -> Result<Transaction, TokenError> {
        Ok(Transaction::from_hex(&self.0)?)
    }
}

/// What the maker wants in exchange for their UTXO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wanted {
    /// Satoshis of the token with this locking script, re-owned to the maker.
    Token(Script),
    /// Plain satoshis paid to the maker's P2PKH.
    Native,
}

/// The four amounts of a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapAmounts {
    /// Value of the UTXO the maker gives.
    pub maker_input: u64,
    /// Value the maker receives.
    pub maker_output: u64,
    /// Value of the UTXO the taker gives.
    pub taker_input: u64,
    /// Value the taker receives.
    pub taker_output: u64,
}

impl SwapAmounts {
    /// Each side must receive exactly what the other gives.
    pub fn validate(&self) -> Result<(), TokenError> {
        if self.taker_output != self.maker_input {
            return Err(TokenError::OfferMismatch {
                field: "taker output",
                expected: self.maker_input,
                actual: self.taker_output,
            });
        }
        if self.taker_input != self.maker_output {
            return Err(TokenError::OfferMismatch {
                field: "taker input",
                expected: self.maker_output,
                actual: self.taker_input,
            });
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------
// Configurations
// -----------------------------------------------------------------------

/// Configuration for creating an offer.
#[derive(Debug, Clone)]
pub struct OfferConfig {
    /// Maker's key; owns `maker_utxo` and receives the wanted output.
    pub maker_public_key: PublicKey,
    /// UTXO the maker gives (token or P2PKH).
    pub maker_utxo: Utxo,
    /// What the maker wants back.
    pub wanted: Wanted,
    /// How many satoshis of it.
    pub wanted_satoshis: u64,
}

/// Configuration for accepting an offer.
#[derive(Debug, Clone)]
pub struct AcceptConfig {
    /// The offer being accepted.
    pub offer: SwapOffer,
    /// The maker's offered UTXO with its source transaction.
    pub maker: ProvenUtxo,
    /// Taker's key; owns the taker UTXO and receives the maker's UTXO value.
    pub taker_public_key: PublicKey,
    /// UTXO the taker gives, with its source transaction.
    pub taker: ProvenUtxo,
    /// Value the taker expects to receive.
    pub taker_output_satoshis: u64,
    /// Fee-paying UTXO.
    pub payment_utxo: Utxo,
    /// Key for `payment_utxo`; also receives the change.
    pub payment_public_key: PublicKey,
    /// Fee rate.
    pub fee_rate: FeeRate,
}

/// Configuration for the maker's signature on an accepted swap.
#[derive(Debug, Clone)]
pub struct MakerSignConfig {
    /// The swap the taker accepted.
    pub accepted: AcceptedSwap,
    /// Maker's key.
    pub maker_public_key: PublicKey,
    /// The maker's offered UTXO with its source transaction.
    pub maker: ProvenUtxo,
    /// The taker's UTXO with its source transaction.
    pub taker: ProvenUtxo,
}

/// Configuration for a swap signed by both parties at once.
#[derive(Debug, Clone)]
pub struct AllInOneConfig {
    /// Maker's key.
    pub maker_public_key: PublicKey,
    /// UTXO the maker gives.
    pub maker: ProvenUtxo,
    /// What the maker wants back.
    pub wanted: Wanted,
    /// How many satoshis of it.
    pub wanted_satoshis: u64,
    /// Taker's key.
    pub taker_public_key: PublicKey,
    /// UTXO the taker gives.
    pub taker: ProvenUtxo,
    /// Value the taker receives.
    pub taker_output_satoshis: u64,
    /// Fee-paying UTXO.
    pub payment_utxo: Utxo,
    /// Key for `payment_utxo`; also receives the change.
    pub payment_public_key: PublicKey,
    /// Fee rate.
    pub fee_rate: FeeRate,
}

// -----------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------

/// `script` with its recipient replaced by `owner`.
fn reown(script: &Script, owner: &[u8; 20]) -> Result<Script, TokenError> {
    let bytes = script.to_bytes();
    if is_token_script_bytes(bytes) {
        update_owner(script, owner)
    } else if is_p2pkh_script(bytes) {
        Ok(Script::p2pkh(owner))
    } else {
        Err(TokenError::MalformedScript(
            "swap outputs must be token or P2PKH scripts".into(),
        ))
    }
}

/// Output 0 of an offer: what the maker wants, paid to the maker.
fn wanted_script(wanted: &Wanted, maker: &PublicKey) -> Result<Script, TokenError> {
    let owner = maker.hash160();
    match wanted {
        Wanted::Token(script) if is_token_script_bytes(script.to_bytes()) => {
            update_owner(script, &owner)
        }
        Wanted::Token(_) => Err(TokenError::MalformedScript(
            "wanted script is not a token script".into(),
        )),
        Wanted::Native => Ok(Script::p2pkh(&owner)),
    }
}

fn check_owner(utxo: &Utxo, key: &PublicKey, role: SignerRole) -> Result<(), TokenError> {
    if recipient_hash(&utxo.locking_script)? != key.hash160() {
        return Err(TokenError::Validation(format!(
            "{role:?} UTXO {}:{} is not owned by the supplied public key",
            utxo.txid, utxo.vout
        )));
    }
    Ok(())
}

fn check_source_len(proven: &ProvenUtxo) -> Result<(), TokenError> {
    if proven.source_tx.len() < MIN_SOURCE_TX_LEN {
        return Err(TokenError::Validation(format!(
            "source transaction of {}:{} is too short",
            proven.utxo.txid, proven.utxo.vout
        )));
    }
    Ok(())
}

/// The taker's UTXO must be what output 0 asks for.
fn check_wanted_matches(wanted: &Script, taker: &Utxo) -> Result<(), TokenError> {
    let matches = if is_token_script_bytes(wanted.to_bytes()) {
        same_lineage(wanted, &taker.locking_script)
    } else {
        is_p2pkh_script(taker.locking_script.to_bytes())
    };
    if !matches {
        return Err(TokenError::Validation(
            "taker UTXO is not what the offer wants".into(),
        ));
    }
    Ok(())
}

/// Token unlocking for a swap party: its outputs, the funding outpoint and
/// the counterpart's previous transaction. P2PKH inputs just sign.
fn party_plan(
    role: SignerRole,
    public_key: &PublicKey,
    spent: &Script,
    counterpart: &ProvenUtxo,
    funding: &Funding,
) -> Result<InputPlan, TokenError> {
    if is_token_script_bytes(spent.to_bytes()) {
        let shape = UnlockShape::Swap {
            counterpart_vout: counterpart.utxo.vout,
            counterpart_tx: counterpart.source_tx.clone(),
        };
        Ok(InputPlan::token(
            role,
            public_key,
            token_unlock(Some(funding), shape, detect_version(spent)?, None),
        ))
    } else if is_p2pkh_script(spent.to_bytes()) {
        Ok(InputPlan::p2pkh(role, public_key))
    } else {
        Err(TokenError::MalformedScript(format!(
            "{role:?} input is neither a token nor P2PKH"
        )))
    }
}

fn spends(tx: &Transaction, index: usize, utxo: &Utxo) -> bool {
    tx.inputs.get(index).map_or(false, |input| {
        input.source_txid_hash() == utxo.txid && input.source_tx_out_index == utxo.vout
    })
}

/// Add the taker side, the funding input and change, then size the swap.
///
/// `draft` holds input 0 and output 0 already.
#[allow(clippy::too_many_arguments)]
fn settle_draft(
    mut draft: Draft,
    maker: &ProvenUtxo,
    taker: &ProvenUtxo,
    taker_plan: InputPlan,
    taker_output: u64,
    taker_public_key: &PublicKey,
    funding: &Funding,
    rate: &FeeRate,
) -> Result<PendingTx, TokenError> {
    draft.spend(&taker.utxo, taker_plan);
    draft.pay(
        taker_output,
        reown(&maker.utxo.locking_script, &taker_public_key.hash160())?,
    );
    draft.spend(
        &funding.utxo,
        InputPlan::p2pkh(SignerRole::Payment, &funding.public_key),
    );

    // Counterpart transactions are counted at their hex length.
    let extra_bytes = 2 * (maker.source_tx.len() + taker.source_tx.len());
    let maker_preimage = preimage_len(maker.utxo.locking_script.len());
    let change_to = funding.public_key.hash160();
    draft.finish_with(Some(&change_to), rate, |d| {
        estimate_swap_size(d.transaction(), extra_bytes, maker_preimage)
    })
}

// -----------------------------------------------------------------------
// Offers
// -----------------------------------------------------------------------

fn offer_draft(config: &OfferConfig, plan: InputPlan) -> Result<Draft, TokenError> {
    check_owner(&config.maker_utxo, &config.maker_public_key, SignerRole::Maker)?;
    let wanted = wanted_script(&config.wanted, &config.maker_public_key)?;
    let mut tx = Transaction::new();
    tx.add_input(config.maker_utxo.to_input());
    tx.add_output(TransactionOutput::new(config.wanted_satoshis, wanted));
    Ok(Draft::from_transaction(tx, vec![plan]))
}

/// Create an unsigned offer: the maker signs after the taker accepts.
///
/// # Transaction structure
/// - Input 0: maker UTXO (unsigned)
/// - Output 0: the wanted script, paid to the maker
pub fn create_offer(config: &OfferConfig) -> Result<SwapOffer, TokenError> {
    let draft = offer_draft(config, InputPlan::Keep)?;
    let offer = SwapOffer(draft.transaction().to_hex());
    info!(
        maker_satoshis = config.maker_utxo.satoshis,
        wanted_satoshis = config.wanted_satoshis,
        "swap offer created"
    );
    Ok(offer)
}

/// Lay out a signed offer.
///
/// Input 0 is signed with `SIGHASH_SINGLE | ANYONECANPAY` so the taker can
/// add inputs and outputs. A token input gets `<preimage> <sig> <pubkey>`
/// and the taker prepends the linking fields; a P2PKH input is complete.
pub fn prepare_signed_offer(config: &OfferConfig) -> Result<PendingTx, TokenError> {
    let role = SignerRole::Maker;
    let public_key = config.maker_public_key.clone();
    let sighash_type = SIGHASH_SINGLE_ANYONECANPAY_FORKID;
    let plan = if is_token_script_bytes(config.maker_utxo.locking_script.to_bytes()) {
        InputPlan::Preimage {
            role,
            public_key,
            sighash_type,
        }
    } else {
        InputPlan::P2pkh {
            role,
            public_key,
            sighash_type,
        }
    };
    Ok(offer_draft(config, plan)?.seal(0))
}

/// Create an offer the taker can settle without the maker.
pub fn create_signed_offer<S: Signer + ?Sized>(
    config: &OfferConfig,
    signers: &Signers<'_, S>,
) -> Result<SwapOffer, TokenError> {
    let tx = prepare_signed_offer(config)?.sign(signers)?;
    info!(
        maker_satoshis = config.maker_utxo.satoshis,
        wanted_satoshis = config.wanted_satoshis,
        "signed swap offer created"
    );
    Ok(SwapOffer(tx.to_hex()))
}

/// Create a signed offer with the maker's private key.
pub fn create_signed_offer_with_keys(
    config: &OfferConfig,
    maker_key: &PrivateKey,
) -> Result<SwapOffer, TokenError> {
    let hex = sign_with_keys(
        prepare_signed_offer(config)?,
        &[(SignerRole::Maker, maker_key)],
    )?;
    Ok(SwapOffer(hex))
}

// -----------------------------------------------------------------------
// Accepting
// -----------------------------------------------------------------------

/// Validate an acceptance and lay out the swap for the taker's signatures.
///
/// # Transaction structure
/// - Input 0: maker UTXO (from the offer)
/// - Input 1: taker UTXO (taker)
/// - Input 2: payment UTXO (payment)
/// - Output 0: wanted output to the maker (from the offer)
/// - Output 1: the maker's UTXO value, re-owned to the taker
/// - Output 2: change
///
/// # Errors
/// `OfferMismatch` when the amounts do not line up with the offer.
pub fn prepare_accept(config: &AcceptConfig) -> Result<PendingTx, TokenError> {
    let mut tx = Transaction::from_hex(&config.offer.0)?;
    if tx.inputs.len() != 1 || tx.outputs.len() != 1 {
        return Err(TokenError::Validation(format!(
            "a swap offer has one input and one output, got {} and {}",
            tx.inputs.len(),
            tx.outputs.len()
        )));
    }
    if !spends(&tx, 0, &config.maker.utxo) {
        return Err(TokenError::Validation(
            "offer does not spend the supplied maker UTXO".into(),
        ));
    }
    config.maker.verify()?;
    config.taker.verify()?;
    check_owner(&config.taker.utxo, &config.taker_public_key, SignerRole::Taker)?;

    let wanted = tx.outputs[0].clone();
    SwapAmounts {
        maker_input: config.maker.utxo.satoshis,
        maker_output: wanted.satoshis,
        taker_input: config.taker.utxo.satoshis,
        taker_output: config.taker_output_satoshis,
    }
    .validate()?;
    check_wanted_matches(&wanted.locking_script, &config.taker.utxo)?;

    let funding = Funding {
        utxo: config.payment_utxo.clone(),
        public_key: config.payment_public_key.clone(),
    };
    let signed = tx.inputs[0].unlocking_script.is_some();
    let maker_script = &config.maker.utxo.locking_script;
    let maker_plan = if signed && is_token_script_bytes(maker_script.to_bytes()) {
        let shape = UnlockShape::Swap {
            counterpart_vout: config.taker.utxo.vout,
            counterpart_tx: config.taker.source_tx.clone(),
        };
        InputPlan::Linked {
            unlock: token_unlock(Some(&funding), shape, detect_version(maker_script)?, None),
        }
    } else {
        InputPlan::Keep
    };
    tx.inputs[0].set_source_output(Some(TransactionOutput::new(
        config.maker.utxo.satoshis,
        maker_script.clone(),
    )));

    let taker_plan = party_plan(
        SignerRole::Taker,
        &config.taker_public_key,
        &config.taker.utxo.locking_script,
        &config.maker,
        &funding,
    )?;
    let pending = settle_draft(
        Draft::from_transaction(tx, vec![maker_plan]),
        &config.maker,
        &config.taker,
        taker_plan,
        config.taker_output_satoshis,
        &config.taker_public_key,
        &funding,
        &config.fee_rate,
    )?;
    debug!(signed_offer = signed, fee = pending.fee(), "swap acceptance prepared");
    Ok(pending)
}

fn acceptance(offer: &SwapOffer, tx: &Transaction) -> Result<Acceptance, TokenError> {
    let offer_signed = Transaction::from_hex(&offer.0)?
        .inputs
        .first()
        .map_or(false, |i| i.unlocking_script.is_some());
    let hex = tx.to_hex();
    if offer_signed {
        info!(txid = %tx.tx_id(), "swap settled by taker");
        Ok(Acceptance::Settled(SettledSwap(hex)))
    } else {
        info!(txid = %tx.tx_id(), "swap accepted");
        Ok(Acceptance::Accepted(AcceptedSwap(hex)))
    }
}

/// Accept an offer with the taker's and payer's signers.
///
/// A signed offer settles immediately; an unsigned one goes back to the
/// maker for [`maker_sign`].
pub fn accept_offer<S: Signer + ?Sized>(
    config: &AcceptConfig,
    signers: &Signers<'_, S>,
) -> Result<Acceptance, TokenError> {
    let tx = prepare_accept(config)?.sign(signers)?;
    acceptance(&config.offer, &tx)
}

/// Accept an offer with private keys.
pub fn accept_offer_with_keys(
    config: &AcceptConfig,
    taker_key: &PrivateKey,
    payment_key: &PrivateKey,
) -> Result<Acceptance, TokenError> {
    let hex = sign_with_keys(
        prepare_accept(config)?,
        &[(SignerRole::Taker, taker_key), (SignerRole::Payment, payment_key)],
    )?;
    acceptance(&config.offer, &Transaction::from_hex(&hex)?)
}

// -----------------------------------------------------------------------
// Maker signature
// -----------------------------------------------------------------------

/// Lay out the maker's signature on an accepted swap.
///
/// The funding outpoint and the outputs are read back from the accepted
/// transaction. The fee was fixed by the taker, so the pending transaction
/// reports zero.
pub fn prepare_maker_sign(config: &MakerSignConfig) -> Result<PendingTx, TokenError> {
    let mut tx = Transaction::from_hex(&config.accepted.0)?;
    if tx.inputs.len() != 3 || tx.outputs.len() != 3 {
        return Err(TokenError::Validation(format!(
            "an accepted swap has three inputs and three outputs, got {} and {}",
            tx.inputs.len(),
            tx.outputs.len()
        )));
    }
    if !spends(&tx, 0, &config.maker.utxo) || !spends(&tx, 1, &config.taker.utxo) {
        return Err(TokenError::Validation(
            "accepted swap does not spend the supplied maker and taker UTXOs".into(),
        ));
    }
    config.maker.verify()?;
    config.taker.verify()?;
    check_owner(&config.maker.utxo, &config.maker_public_key, SignerRole::Maker)?;
    if tx.inputs[0].unlocking_script.is_some() {
        return Err(TokenError::Validation("maker input is already signed".into()));
    }

    let funding_input = &tx.inputs[2];
    let funding = Funding {
        utxo: Utxo::new(
            funding_input.source_txid_hash(),
            funding_input.source_tx_out_index,
            0,
            Script::new(),
        ),
        public_key: config.maker_public_key.clone(),
    };
    let maker_plan = party_plan(
        SignerRole::Maker,
        &config.maker_public_key,
        &config.maker.utxo.locking_script,
        &config.taker,
        &funding,
    )?;
    tx.inputs[0].set_source_output(Some(TransactionOutput::new(
        config.maker.utxo.satoshis,
        config.maker.utxo.locking_script.clone(),
    )));
    Ok(Draft::from_transaction(tx, vec![maker_plan, InputPlan::Keep, InputPlan::Keep]).seal(0))
}

/// Sign the maker's input of an accepted swap.
pub fn maker_sign<S: Signer + ?Sized>(
    config: &MakerSignConfig,
    signers: &Signers<'_, S>,
) -> Result<SettledSwap, TokenError> {
    let tx = prepare_maker_sign(config)?.sign(signers)?;
    info!(txid = %tx.tx_id(), "swap settled by maker");
    Ok(SettledSwap(tx.to_hex()))
}

/// Sign the maker's input with a private key.
pub fn maker_sign_with_keys(
    config: &MakerSignConfig,
    maker_key: &PrivateKey,
) -> Result<SettledSwap, TokenError> {
    let hex = sign_with_keys(
        prepare_maker_sign(config)?,
        &[(SignerRole::Maker, maker_key)],
    )?;
    Ok(SettledSwap(hex))
}

// -----------------------------------------------------------------------
// All in one
// -----------------------------------------------------------------------

/// Validate a swap signed by both parties and lay it out.
///
/// The transaction has the same structure as an accepted offer.
pub fn prepare_all_in_one(config: &AllInOneConfig) -> Result<PendingTx, TokenError> {
    check_source_len(&config.maker)?;
    check_source_len(&config.taker)?;
    config.maker.verify()?;
    config.taker.verify()?;
    check_owner(&config.maker.utxo, &config.maker_public_key, SignerRole::Maker)?;
    check_owner(&config.taker.utxo, &config.taker_public_key, SignerRole::Taker)?;
    SwapAmounts {
        maker_input: config.maker.utxo.satoshis,
        maker_output: config.wanted_satoshis,
        taker_input: config.taker.utxo.satoshis,
        taker_output: config.taker_output_satoshis,
    }
    .validate()?;
    let wanted = wanted_script(&config.wanted, &config.maker_public_key)?;
    check_wanted_matches(&wanted, &config.taker.utxo)?;

    let funding = Funding {
        utxo: config.payment_utxo.clone(),
        public_key: config.payment_public_key.clone(),
    };
    let mut draft = Draft::new();
    draft.spend(
        &config.maker.utxo,
        party_plan(
            SignerRole::Maker,
            &config.maker_public_key,
            &config.maker.utxo.locking_script,
            &config.taker,
            &funding,
        )?,
    );
    draft.pay(config.wanted_satoshis, wanted);
    let taker_plan = party_plan(
        SignerRole::Taker,
        &config.taker_public_key,
        &config.taker.utxo.locking_script,
        &config.maker,
        &funding,
    )?;
    settle_draft(
        draft,
        &config.maker,
        &config.taker,
        taker_plan,
        config.taker_output_satoshis,
        &config.taker_public_key,
        &funding,
        &config.fee_rate,
    )
}

/// Build and sign a complete swap in one step.
pub fn all_in_one_swap<S: Signer + ?Sized>(
    config: &AllInOneConfig,
    signers: &Signers<'_, S>,
) -> Result<SettledSwap, TokenError> {
    let tx = prepare_all_in_one(config)?.sign(signers)?;
    info!(txid = %tx.tx_id(), "swap settled in one step");
    Ok(SettledSwap(tx.to_hex()))
}

/// Build a complete swap signed with private keys.
pub fn all_in_one_swap_with_keys(
    config: &AllInOneConfig,
    maker_key: &PrivateKey,
    taker_key: &PrivateKey,
    payment_key: &PrivateKey,
) -> Result<SettledSwap, TokenError> {
    let hex = sign_with_keys(
        prepare_all_in_one(config)?,
        &[
            (SignerRole::Maker, maker_key),
            (SignerRole::Taker, taker_key),
            (SignerRole::Payment, payment_key),
        ],
    )?;
    Ok(SettledSwap(hex))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stas_primitives::chainhash::Hash;

    use crate::assembler::decode_segments;
    use crate::script::{build_token_script, extract_owner, Version};

    struct Parties {
        maker: PrivateKey,
        taker: PrivateKey,
        payment: PrivateKey,
        issuer_a: PrivateKey,
        issuer_b: PrivateKey,
    }

    fn parties() -> Parties {
        Parties {
            maker: PrivateKey::new(),
            taker: PrivateKey::new(),
            payment: PrivateKey::new(),
            issuer_a: PrivateKey::new(),
            issuer_b: PrivateKey::new(),
        }
    }

    /// A one-input transaction paying `script` at output 0.
    fn proven(script: Script, satoshis: u64, seed: u8) -> ProvenUtxo {
        let mut tx = Transaction::new();
        tx.add_input(Utxo::new(Hash::new([seed; 32]), 0, satoshis + 500, Script::p2pkh(&[seed; 20])).to_input());
        tx.add_output(TransactionOutput::new(satoshis, script));
        ProvenUtxo::from_source_tx(&tx.to_bytes(), 0).unwrap()
    }

    fn token(owner: &PrivateKey, issuer: &PrivateKey) -> Script {
        build_token_script(&owner.pub_key().hash160(), &issuer.pub_key(), Version::V2, None, true)
            .unwrap()
    }

    fn payment(p: &Parties) -> Utxo {
        Utxo::new(
            Hash::new([0x77; 32]),
            3,
            40_000,
            Script::p2pkh(&p.payment.pub_key().hash160()),
        )
    }

    fn token_swap(p: &Parties) -> AllInOneConfig {
        let maker = proven(token(&p.maker, &p.issuer_a), 10_000, 0x61);
        let taker = proven(token(&p.taker, &p.issuer_b), 6_000, 0x62);
        AllInOneConfig {
            maker_public_key: p.maker.pub_key(),
            wanted: Wanted::Token(taker.utxo.locking_script.clone()),
            wanted_satoshis: 6_000,
            taker_public_key: p.taker.pub_key(),
            taker_output_satoshis: 10_000,
            maker,
            taker,
            payment_utxo: payment(p),
            payment_public_key: p.payment.pub_key(),
            fee_rate: FeeRate::default(),
        }
    }

    fn offer_config(cfg: &AllInOneConfig) -> OfferConfig {
        OfferConfig {
            maker_public_key: cfg.maker_public_key.clone(),
            maker_utxo: cfg.maker.utxo.clone(),
            wanted: cfg.wanted.clone(),
            wanted_satoshis: cfg.wanted_satoshis,
        }
    }

    fn accept_config(cfg: &AllInOneConfig, offer: SwapOffer) -> AcceptConfig {
        AcceptConfig {
            offer,
            maker: cfg.maker.clone(),
            taker_public_key: cfg.taker_public_key.clone(),
            taker: cfg.taker.clone(),
            taker_output_satoshis: cfg.taker_output_satoshis,
            payment_utxo: cfg.payment_utxo.clone(),
            payment_public_key: cfg.payment_public_key.clone(),
            fee_rate: cfg.fee_rate,
        }
    }

    fn segments(tx: &Transaction, input: usize) -> usize {
        decode_segments(tx.inputs[input].unlocking_script.as_ref().unwrap())
            .unwrap()
            .iter()
            .flatten()
            .count()
    }

    #[test]
    fn all_in_one_token_swap() {
        let p = parties();
        let cfg = token_swap(&p);
        let pending = prepare_all_in_one(&cfg).unwrap();
        let estimated = pending.estimated_size();
        let fee = pending.fee();

        let tx = all_in_one_swap_with_keys(&cfg, &p.maker, &p.taker, &p.payment)
            .unwrap()
            .transaction()
            .unwrap();
        assert!(tx.size() <= estimated);
        assert_eq!(tx.inputs.len(), 3);
        assert_eq!(tx.outputs.len(), 3);
        assert_eq!(tx.outputs[0].satoshis, 6_000);
        assert_eq!(tx.outputs[1].satoshis, 10_000);
        assert_eq!(tx.outputs[2].satoshis + fee, 40_000);
        assert_eq!(
            extract_owner(&tx.outputs[0].locking_script).unwrap(),
            p.maker.pub_key().hash160()
        );
        assert_eq!(
            extract_owner(&tx.outputs[1].locking_script).unwrap(),
            p.taker.pub_key().hash160()
        );
        assert!(same_lineage(&tx.outputs[1].locking_script, &cfg.maker.utxo.locking_script));
        assert_eq!(segments(&tx, 0), 3);
        assert_eq!(segments(&tx, 1), 3);
    }

    #[test]
    fn three_step_swap_matches_all_in_one() {
        let p = parties();
        let cfg = token_swap(&p);
        let offer = create_offer(&offer_config(&cfg)).unwrap();

        let accepted = match accept_offer_with_keys(&accept_config(&cfg, offer), &p.taker, &p.payment)
            .unwrap()
        {
            Acceptance::Accepted(accepted) => accepted,
            other => panic!("unsigned offer settled early: {other:?}"),
        };
        let settled = maker_sign_with_keys(
            &MakerSignConfig {
                accepted,
                maker_public_key: p.maker.pub_key(),
                maker: cfg.maker.clone(),
                taker: cfg.taker.clone(),
            },
            &p.maker,
        )
        .unwrap();

        let direct = all_in_one_swap_with_keys(&cfg, &p.maker, &p.taker, &p.payment).unwrap();
        assert_eq!(settled, direct);
    }

    #[test]
    fn signed_offer_settles_on_acceptance() {
        let p = parties();
        let cfg = token_swap(&p);
        let offer = create_signed_offer_with_keys(&offer_config(&cfg), &p.maker).unwrap();
        let offer_script_len = Transaction::from_hex(&offer.0).unwrap().inputs[0]
            .unlocking_script
            .as_ref()
            .unwrap()
            .len();

        let accept = accept_config(&cfg, offer);
        let estimated = prepare_accept(&accept).unwrap().estimated_size();
        let settled = match accept_offer_with_keys(&accept, &p.taker, &p.payment).unwrap() {
            Acceptance::Settled(settled) => settled,
            other => panic!("signed offer not settled: {other:?}"),
        };
        let tx = settled.transaction().unwrap();
        assert!(tx.size() <= estimated);
        let maker_script = tx.inputs[0].unlocking_script.as_ref().unwrap();
        assert!(maker_script.len() > offer_script_len);
        assert_eq!(segments(&tx, 0), 3);
        assert_eq!(segments(&tx, 1), 3);
    }

    #[test]
    fn native_swap_taker_pays_with_p2pkh() {
        let p = parties();
        let maker = proven(token(&p.maker, &p.issuer_a), 10_000, 0x63);
        let taker = proven(Script::p2pkh(&p.taker.pub_key().hash160()), 5_000, 0x64);
        let cfg = AllInOneConfig {
            maker_public_key: p.maker.pub_key(),
            wanted: Wanted::Native,
            wanted_satoshis: 5_000,
            taker_public_key: p.taker.pub_key(),
            taker_output_satoshis: 10_000,
            maker,
            taker,
            payment_utxo: payment(&p),
            payment_public_key: p.payment.pub_key(),
            fee_rate: FeeRate::default(),
        };
        let offer = create_offer(&offer_config(&cfg)).unwrap();
        let Acceptance::Accepted(accepted) =
            accept_offer_with_keys(&accept_config(&cfg, offer), &p.taker, &p.payment).unwrap()
        else {
            panic!("unsigned offer settled early");
        };
        let tx = maker_sign_with_keys(
            &MakerSignConfig {
                accepted,
                maker_public_key: p.maker.pub_key(),
                maker: cfg.maker.clone(),
                taker: cfg.taker.clone(),
            },
            &p.maker,
        )
        .unwrap()
        .transaction()
        .unwrap();

        assert!(is_p2pkh_script(tx.outputs[0].locking_script.to_bytes()));
        assert_eq!(tx.outputs[0].satoshis, 5_000);
        assert!(is_token_script_bytes(tx.outputs[1].locking_script.to_bytes()));
        let taker_unlock = tx.inputs[1].unlocking_script.as_ref().unwrap();
        assert_eq!(taker_unlock.chunks().unwrap().len(), 2);
        assert_eq!(segments(&tx, 0), 3);
    }

    #[test]
    fn mismatched_amounts_are_rejected() {
        let p = parties();
        let mut cfg = token_swap(&p);
        cfg.taker_output_satoshis = 9_999;
        assert!(matches!(
            prepare_all_in_one(&cfg),
            Err(TokenError::OfferMismatch {
                field: "taker output",
                expected: 10_000,
                actual: 9_999
            })
        ));

        let cfg = token_swap(&p);
        let offer = create_offer(&OfferConfig {
            wanted_satoshis: 7_000,
            ..offer_config(&cfg)
        })
        .unwrap();
        assert!(matches!(
            prepare_accept(&accept_config(&cfg, offer)),
            Err(TokenError::OfferMismatch { field: "taker input", .. })
        ));
    }

    #[test]
    fn wanted_token_must_be_a_token_script() {
        let p = parties();
        let mut cfg = offer_config(&token_swap(&p));
        cfg.wanted = Wanted::Token(Script::p2pkh(&[0x01; 20]));
        assert!(matches!(create_offer(&cfg), Err(TokenError::MalformedScript(_))));
    }

    #[test]
    fn taker_must_offer_the_wanted_token() {
        let p = parties();
        let mut cfg = token_swap(&p);
        let other = proven(token(&p.taker, &PrivateKey::new()), 6_000, 0x65);
        cfg.taker = other;
        assert!(matches!(prepare_all_in_one(&cfg), Err(TokenError::Validation(_))));
    }

    #[test]
    fn maker_must_own_the_offered_utxo() {
        let p = parties();
        let mut cfg = offer_config(&token_swap(&p));
        cfg.maker_public_key = p.taker.pub_key();
        assert!(matches!(create_offer(&cfg), Err(TokenError::Validation(_))));
    }

    #[test]
    fn amounts_validate_both_directions() {
        let amounts = SwapAmounts {
            maker_input: 100,
            maker_output: 50,
            taker_input: 50,
            taker_output: 100,
        };
        assert!(amounts.validate().is_ok());
        assert!(SwapAmounts {
            taker_input: 49,
            ..amounts
        }
        .validate()
        .is_err());
    }
}

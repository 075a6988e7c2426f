//! Contract transaction builder.
//!
//! The contract transaction locks the satoshis that will back the token.
//! Output 0 pays the issuer with a P2PKH script followed by
//! `OP_FALSE OP_RETURN <schema JSON>`; the issue transaction later spends it.

use stas_primitives::ec::{PrivateKey, PublicKey};
use stas_script::opcodes::{OP_FALSE, OP_RETURN};
use stas_script::Script;
use stas_transaction::Transaction;
use tracing::info;

use crate::config::FeeRate;
use crate::error::TokenError;
use crate::scheme::ContractSchema;
use crate::signer::{Signer, SignerRole, Signers};
use crate::types::Utxo;

use super::pending::{InputPlan, PendingTx};
use super::{sign_with_keys, Draft};

/// Configuration for building a contract transaction.
#[derive(Debug, Clone)]
pub struct ContractConfig {
    /// Key that signs the issuer UTXOs and becomes the redemption key.
    pub issuer_public_key: PublicKey,
    /// P2PKH UTXOs of the issuer funding the token.
    pub issuer_utxos: Vec<Utxo>,
    /// Schema published in the contract output.
    pub schema: ContractSchema,
    /// Satoshis locked in the contract output.
    pub token_satoshis: u64,
    /// Optional fee-paying UTXOs.
    pub payment_utxos: Vec<Utxo>,
    /// Key for `payment_utxos`; also receives the change.
    pub payment_public_key: Option<PublicKey>,
    /// Fee rate.
    pub fee_rate: FeeRate,
}

/// Contract locking script: P2PKH to the issuer plus the schema as data.
pub fn contract_script(
    issuer_public_key: &PublicKey,
    schema: &ContractSchema,
) -> Result<Script, TokenError> {
    let mut script = Script::p2pkh(&issuer_public_key.hash160());
    script.append_opcodes(&[OP_FALSE, OP_RETURN]);
    script.append_push_data(&schema.to_bytes()?)?;
    Ok(script)
}

/// Validate a contract request and lay out the unsigned transaction.
///
/// # Transaction structure
/// - Inputs: issuer UTXOs, then payment UTXOs
/// - Output 0: contract output carrying `token_satoshis`
/// - Output 1: change to the payment key (fee-paying only)
pub fn prepare_contract(config: &ContractConfig) -> Result<PendingTx, TokenError> {
    if config.issuer_utxos.is_empty() {
        return Err(TokenError::Validation("inputUtxos is invalid".into()));
    }
    if config.token_satoshis == 0 {
        return Err(TokenError::Validation("Token satoshis is zero".into()));
    }
    if !config.payment_utxos.is_empty() && config.payment_public_key.is_none() {
        return Err(TokenError::Validation(
            "Payment UTXOs provided but payment public key is null".into(),
        ));
    }
    config.schema.validate(config.token_satoshis)?;

    let mut draft = Draft::new();
    for utxo in &config.issuer_utxos {
        draft.spend(
            utxo,
            InputPlan::p2pkh(SignerRole::Issuer, &config.issuer_public_key),
        );
    }
    let payment_key = config
        .payment_public_key
        .as_ref()
        .filter(|_| !config.payment_utxos.is_empty());
    if let Some(key) = payment_key {
        for utxo in &config.payment_utxos {
            draft.spend(utxo, InputPlan::p2pkh(SignerRole::Payment, key));
        }
    }

    draft.pay(
        config.token_satoshis,
        contract_script(&config.issuer_public_key, &config.schema)?,
    );

    let change_to = payment_key.map(PublicKey::hash160);
    let pending = draft.finish(change_to.as_ref(), &config.fee_rate)?;
    info!(
        symbol = %config.schema.symbol,
        token_satoshis = config.token_satoshis,
        fee = pending.fee(),
        "contract prepared"
    );
    Ok(pending)
}

/// Build and sign a contract transaction.
pub fn build_contract_tx<S: Signer + ?Sized>(
    config: &ContractConfig,
    signers: &Signers<'_, S>,
) -> Result<Transaction, TokenError> {
    prepare_contract(config)?.sign(signers)
}

/// Build a contract transaction signed with private keys; returns its hex.
pub fn contract_with_keys(
    config: &ContractConfig,
    issuer_key: &PrivateKey,
    payment_key: Option<&PrivateKey>,
) -> Result<String, TokenError> {
    let mut keys = vec![(SignerRole::Issuer, issuer_key)];
    keys.extend(payment_key.map(|k| (SignerRole::Payment, k)));
    sign_with_keys(prepare_contract(config)?, &keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stas_primitives::chainhash::Hash;

    use crate::script::is_p2pkh_script;

    fn schema() -> ContractSchema {
        ContractSchema {
            name: "Test".into(),
            token_id: "00".into(),
            protocol_id: "STAS".into(),
            symbol: "TEST".into(),
            description: String::new(),
            image: None,
            total_supply: 10_000,
            decimals: 0,
            sats_per_token: 1,
            properties: None,
        }
    }

    fn config(issuer: &PrivateKey, payment: Option<&PrivateKey>) -> ContractConfig {
        let issuer_pub = issuer.pub_key();
        ContractConfig {
            issuer_utxos: vec![Utxo::new(
                Hash::new([0x11; 32]),
                0,
                10_000,
                Script::p2pkh(&issuer_pub.hash160()),
            )],
            issuer_public_key: issuer_pub,
            schema: schema(),
            token_satoshis: 10_000,
            payment_utxos: payment
                .map(|k| {
                    vec![Utxo::new(
                        Hash::new([0x22; 32]),
                        1,
                        5_000,
                        Script::p2pkh(&k.pub_key().hash160()),
                    )]
                })
                .unwrap_or_default(),
            payment_public_key: payment.map(PrivateKey::pub_key),
            fee_rate: FeeRate::default(),
        }
    }

    #[test]
    fn contract_output_carries_schema() {
        let issuer = PrivateKey::new();
        let payment = PrivateKey::new();
        let cfg = config(&issuer, Some(&payment));
        let hex = contract_with_keys(&cfg, &issuer, Some(&payment)).unwrap();
        let tx = Transaction::from_hex(&hex).unwrap();

        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].satoshis, 10_000);
        let script = tx.outputs[0].locking_script.to_bytes();
        assert_eq!(&script[3..23], &issuer.pub_key().hash160());
        assert!(script.windows(2).any(|w| w == [OP_FALSE, OP_RETURN]));
        assert!(is_p2pkh_script(tx.outputs[1].locking_script.to_bytes()));
    }

    #[test]
    fn fee_is_paid_from_payment_utxos() {
        let issuer = PrivateKey::new();
        let payment = PrivateKey::new();
        let cfg = config(&issuer, Some(&payment));
        let pending = prepare_contract(&cfg).unwrap();
        let change = pending.transaction().outputs[1].satoshis;
        assert_eq!(change + pending.fee(), 5_000);
    }

    #[test]
    fn zero_fee_contract_has_no_change() {
        let issuer = PrivateKey::new();
        let cfg = config(&issuer, None);
        let hex = contract_with_keys(&cfg, &issuer, None).unwrap();
        let tx = Transaction::from_hex(&hex).unwrap();
        assert_eq!(tx.outputs.len(), 1);
    }

    #[test]
    fn rejects_bad_requests() {
        let issuer = PrivateKey::new();
        let mut cfg = config(&issuer, None);
        cfg.token_satoshis = 0;
        assert!(matches!(prepare_contract(&cfg), Err(TokenError::Validation(_))));

        let mut cfg = config(&issuer, None);
        cfg.schema.symbol = "BAD SYMBOL".into();
        assert!(matches!(prepare_contract(&cfg), Err(TokenError::Validation(_))));

        let payment = PrivateKey::new();
        let mut cfg = config(&issuer, Some(&payment));
        cfg.payment_public_key = None;
        assert!(matches!(prepare_contract(&cfg), Err(TokenError::Validation(_))));
    }

    #[test]
    fn mismatched_key_is_refused() {
        let issuer = PrivateKey::new();
        let cfg = config(&issuer, None);
        let other = PrivateKey::new();
        assert!(matches!(
            contract_with_keys(&cfg, &other, None),
            Err(TokenError::Validation(_))
        ));
    }
}

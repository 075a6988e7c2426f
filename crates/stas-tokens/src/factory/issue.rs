//! Issue transaction builder.
//!
//! Spends the contract output and mints one token output per destination.
//! The contract input is unlocked like a P2PKH input by the issuer.

use stas_primitives::ec::{PrivateKey, PublicKey};
use stas_transaction::Transaction;
use tracing::info;

use crate::config::FeeRate;
use crate::error::TokenError;
use crate::scheme::is_valid_symbol;
use crate::script::{StasScript, Version};
use crate::signer::{Signer, SignerRole, Signers};
use crate::types::{parse_destination_address, resolve_funding, IssueDestination, Utxo};

use super::pending::{InputPlan, PendingTx};
use super::{sign_with_keys, Draft};

/// Configuration for issuing tokens from a contract output.
#[derive(Debug, Clone)]
pub struct IssueConfig {
    /// Issuer key: signs the contract input, its hash becomes the redemption hash.
    pub issuer_public_key: PublicKey,
    /// The contract output being spent.
    pub contract_utxo: Utxo,
    /// Recipients of the new tokens.
    pub destinations: Vec<IssueDestination>,
    /// Whether the issued tokens may be split (version 2).
    pub splittable: bool,
    /// Symbol pushed into version 2 scripts.
    pub symbol: Option<String>,
    /// Template version to issue.
    pub version: Version,
    /// Optional fee-paying UTXO.
    pub payment_utxo: Option<Utxo>,
    /// Key for `payment_utxo`; also receives the change.
    pub payment_public_key: Option<PublicKey>,
    /// Fee rate.
    pub fee_rate: FeeRate,
}

/// Validate an issue request and lay out the unsigned transaction.
///
/// # Transaction structure
/// - Input 0: contract UTXO (issuer)
/// - Input 1: payment UTXO (fee-paying only)
/// - Outputs: one token output per destination, then change
pub fn prepare_issue(config: &IssueConfig) -> Result<PendingTx, TokenError> {
    if config.destinations.is_empty() {
        return Err(TokenError::Validation("issueInfo is invalid".into()));
    }
    let funding = resolve_funding(
        config.payment_utxo.as_ref(),
        config.payment_public_key.as_ref(),
    )?;
    if let Some(symbol) = &config.symbol {
        if !is_valid_symbol(symbol) {
            return Err(TokenError::Validation(format!("Invalid symbol {symbol:?}")));
        }
        if config.version == Version::V1 {
            return Err(TokenError::Validation(
                "version 1 tokens carry no symbol".into(),
            ));
        }
    }

    let supply = config.contract_utxo.satoshis;
    let mut issued: u64 = 0;
    let mut outputs = Vec::with_capacity(config.destinations.len());
    for destination in &config.destinations {
        if destination.satoshis == 0 {
            return Err(TokenError::Validation(format!(
                "issue amount for {} must be greater than zero",
                destination.address
            )));
        }
        let owner = parse_destination_address(&destination.address)?.public_key_hash;
        let mut stas = StasScript::new(owner, config.issuer_public_key.hash160())?;
        stas.version = config.version;
        stas.splittable = config.splittable || config.version == Version::V1;
        if config.version == Version::V2 {
            stas.symbol = config.symbol.as_ref().map(|s| s.as_bytes().to_vec());
            stas.data = destination.data.clone();
        } else if destination.data.is_some() {
            return Err(TokenError::Validation(
                "version 1 tokens carry no data".into(),
            ));
        }
        issued = issued.saturating_add(destination.satoshis);
        outputs.push((destination.satoshis, stas.to_script()?));
    }

    if issued > supply {
        return Err(TokenError::InsufficientFunds {
            needed: issued,
            available: supply,
        });
    }
    if funding.is_none() && issued != supply {
        return Err(TokenError::Validation(format!(
            "zero-fee issue must issue the whole supply ({supply}), got {issued}"
        )));
    }

    let mut draft = Draft::new();
    draft.spend(
        &config.contract_utxo,
        InputPlan::p2pkh(SignerRole::Issuer, &config.issuer_public_key),
    );
    if let Some(f) = &funding {
        draft.spend(&f.utxo, InputPlan::p2pkh(SignerRole::Payment, &f.public_key));
    }
    for (satoshis, script) in outputs {
        draft.pay(satoshis, script);
    }

    let change_to = funding.as_ref().map(|f| f.public_key.hash160());
    let pending = draft.finish(change_to.as_ref(), &config.fee_rate)?;
    info!(
        destinations = config.destinations.len(),
        issued,
        supply,
        fee = pending.fee(),
        "issue prepared"
    );
    Ok(pending)
}

/// Build and sign an issue transaction.
pub fn build_issue_tx<S: Signer + ?Sized>(
    config: &IssueConfig,
    signers: &Signers<'_, S>,
) -> Result<Transaction, TokenError> {
    prepare_issue(config)?.sign(signers)
}

/// Build an issue transaction signed with private keys; returns its hex.
pub fn issue_with_keys(
    config: &IssueConfig,
    issuer_key: &PrivateKey,
    payment_key: Option<&PrivateKey>,
) -> Result<String, TokenError> {
    let mut keys = vec![(SignerRole::Issuer, issuer_key)];
    keys.extend(payment_key.map(|k| (SignerRole::Payment, k)));
    sign_with_keys(prepare_issue(config)?, &keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stas_primitives::chainhash::Hash;
    use stas_script::{Address, Network, Script};

    use crate::script::{extract_owner, is_p2pkh_script, is_token_script_bytes, same_lineage};

    struct Parties {
        issuer: PrivateKey,
        payment: PrivateKey,
        alice: PrivateKey,
        bob: PrivateKey,
    }

    fn parties() -> Parties {
        Parties {
            issuer: PrivateKey::new(),
            payment: PrivateKey::new(),
            alice: PrivateKey::new(),
            bob: PrivateKey::new(),
        }
    }

    fn address(key: &PrivateKey) -> String {
        Address::from_public_key(&key.pub_key(), Network::Mainnet).address_string
    }

    fn config(p: &Parties, fee_paying: bool) -> IssueConfig {
        let issuer_pub = p.issuer.pub_key();
        IssueConfig {
            contract_utxo: Utxo::new(
                Hash::new([0x31; 32]),
                0,
                10_000,
                Script::p2pkh(&issuer_pub.hash160()),
            ),
            issuer_public_key: issuer_pub,
            destinations: vec![
                IssueDestination {
                    address: address(&p.alice),
                    satoshis: 7_000,
                    data: None,
                },
                IssueDestination {
                    address: address(&p.bob),
                    satoshis: 3_000,
                    data: Some(b"one".to_vec()),
                },
            ],
            splittable: true,
            symbol: Some("TST".into()),
            version: Version::V2,
            payment_utxo: fee_paying.then(|| {
                Utxo::new(
                    Hash::new([0x32; 32]),
                    2,
                    4_000,
                    Script::p2pkh(&p.payment.pub_key().hash160()),
                )
            }),
            payment_public_key: fee_paying.then(|| p.payment.pub_key()),
            fee_rate: FeeRate::default(),
        }
    }

    #[test]
    fn issues_two_token_outputs_and_change() {
        let p = parties();
        let cfg = config(&p, true);
        let hex = issue_with_keys(&cfg, &p.issuer, Some(&p.payment)).unwrap();
        let tx = Transaction::from_hex(&hex).unwrap();

        assert_eq!(tx.outputs.len(), 3);
        assert_eq!(tx.outputs[0].satoshis, 7_000);
        assert_eq!(tx.outputs[1].satoshis, 3_000);
        assert!(is_token_script_bytes(tx.outputs[0].locking_script.to_bytes()));
        assert!(is_token_script_bytes(tx.outputs[1].locking_script.to_bytes()));
        assert!(is_p2pkh_script(tx.outputs[2].locking_script.to_bytes()));
        assert_eq!(
            extract_owner(&tx.outputs[0].locking_script).unwrap(),
            p.alice.pub_key().hash160()
        );
    }

    #[test]
    fn conserves_value_and_estimate_bounds_size() {
        let p = parties();
        let cfg = config(&p, true);
        let pending = prepare_issue(&cfg).unwrap();
        let estimated = pending.estimated_size();
        let fee = pending.fee();
        let outputs: u64 = pending.transaction().total_output_satoshis();
        assert_eq!(outputs + fee, 14_000);

        let hex = issue_with_keys(&cfg, &p.issuer, Some(&p.payment)).unwrap();
        assert!(hex.len() / 2 <= estimated);
    }

    #[test]
    fn data_does_not_change_lineage_check_of_plain_outputs() {
        let p = parties();
        let mut cfg = config(&p, true);
        cfg.destinations[1].data = None;
        let pending = prepare_issue(&cfg).unwrap();
        let outs = &pending.transaction().outputs;
        assert!(same_lineage(&outs[0].locking_script, &outs[1].locking_script));
    }

    #[test]
    fn zero_fee_issue_must_use_the_whole_supply() {
        let p = parties();
        let cfg = config(&p, false);
        let tx = Transaction::from_hex(&issue_with_keys(&cfg, &p.issuer, None).unwrap()).unwrap();
        assert_eq!(tx.outputs.len(), 2);

        let mut cfg = config(&p, false);
        cfg.destinations[1].satoshis = 2_000;
        assert!(matches!(prepare_issue(&cfg), Err(TokenError::Validation(_))));
    }

    #[test]
    fn over_issuing_is_insufficient_funds() {
        let p = parties();
        let mut cfg = config(&p, true);
        cfg.destinations[0].satoshis = 8_000;
        assert!(matches!(
            prepare_issue(&cfg),
            Err(TokenError::InsufficientFunds {
                needed: 11_000,
                available: 10_000
            })
        ));
    }

    #[test]
    fn rejects_invalid_symbol_and_address() {
        let p = parties();
        let mut cfg = config(&p, true);
        cfg.symbol = Some("no spaces".into());
        assert!(matches!(prepare_issue(&cfg), Err(TokenError::Validation(_))));

        let mut cfg = config(&p, true);
        cfg.destinations[0].address = "1abc".into();
        assert!(matches!(prepare_issue(&cfg), Err(TokenError::Validation(_))));
    }
}

//! Unsigned transactions waiting for their signatures.
//!
//! A builder produces a [`PendingTx`]: the final inputs and outputs plus one
//! [`InputPlan`] per input describing how its unlocking script will be
//! assembled. Signatures cover the preimage only, so every signature is
//! collected before any unlocking script is written.

use stas_primitives::ec::PublicKey;
use stas_script::Script;
use stas_transaction::sighash::SIGHASH_ALL_FORKID;
use stas_transaction::template::p2pkh::{self, P2PKH_UNLOCKING_SCRIPT_BYTES};
use stas_transaction::Transaction;
use tracing::debug;

use crate::assembler::{assemble, assemble_linking, FundingOutpoint, Segment, UnlockParts, UnlockShape};
use crate::error::TokenError;
use crate::fee::{
    estimate_unlocking_script_overhead, preimage_len, push_size, shape_len, AMOUNT_PUSH_BYTES,
    HASH_PUSH_BYTES, INDEX_PUSH_BYTES, PUBLIC_KEY_PUSH_BYTES, SIGNATURE_PUSH_BYTES,
    TXID_PUSH_BYTES,
};
use crate::script::{recipient_hash, Version};
use crate::signer::{AsyncSigner, Signer, SignerRole, Signers, SigningRequest};

/// Token-specific unlocking fields of one input.
#[derive(Debug, Clone)]
pub(crate) struct TokenUnlock {
    /// Slot index that carries `OP_FALSE OP_FALSE` (the redeem slot).
    pub null_slot: Option<usize>,
    /// Fee-paying outpoint; `None` for zero-fee transactions.
    pub funding: Option<FundingOutpoint>,
    pub shape: UnlockShape,
    pub version: Version,
}

impl TokenUnlock {
    fn slot_count(&self, outputs: usize) -> usize {
        outputs + usize::from(self.null_slot.is_some())
    }

    fn slots(&self, segments: &[Segment]) -> Vec<Option<Segment>> {
        let mut slots: Vec<Option<Segment>> = segments.iter().copied().map(Some).collect();
        if let Some(index) = self.null_slot {
            slots.insert(index.min(slots.len()), None);
        }
        slots
    }

    fn linking_len(&self, outputs: usize) -> usize {
        self.slot_count(outputs) * (AMOUNT_PUSH_BYTES + HASH_PUSH_BYTES)
            + INDEX_PUSH_BYTES
            + TXID_PUSH_BYTES
            + shape_len(&self.shape)
    }
}

/// How one input gets unlocked.
#[derive(Debug, Clone)]
pub(crate) enum InputPlan {
    /// `<sig> <pubkey>`.
    P2pkh {
        role: SignerRole,
        public_key: PublicKey,
        sighash_type: u32,
    },
    /// Full token unlocking script.
    Token {
        role: SignerRole,
        public_key: PublicKey,
        sighash_type: u32,
        unlock: TokenUnlock,
    },
    /// `<preimage> <sig> <pubkey>`, completed later by a counterparty.
    Preimage {
        role: SignerRole,
        public_key: PublicKey,
        sighash_type: u32,
    },
    /// Prepend linking fields to the unlocking script the input already has.
    Linked { unlock: TokenUnlock },
    /// Leave the input as it is.
    Keep,
}

impl InputPlan {
    pub(crate) fn p2pkh(role: SignerRole, public_key: &PublicKey) -> Self {
        InputPlan::P2pkh {
            role,
            public_key: public_key.clone(),
            sighash_type: SIGHASH_ALL_FORKID,
        }
    }

    pub(crate) fn token(role: SignerRole, public_key: &PublicKey, unlock: TokenUnlock) -> Self {
        InputPlan::Token {
            role,
            public_key: public_key.clone(),
            sighash_type: SIGHASH_ALL_FORKID,
            unlock,
        }
    }

    fn signer(&self) -> Option<(SignerRole, &PublicKey, u32)> {
        match self {
            InputPlan::P2pkh {
                role,
                public_key,
                sighash_type,
            }
            | InputPlan::Token {
                role,
                public_key,
                sighash_type,
                ..
            }
            | InputPlan::Preimage {
                role,
                public_key,
                sighash_type,
            } => Some((*role, public_key, *sighash_type)),
            InputPlan::Linked { .. } | InputPlan::Keep => None,
        }
    }

    /// Upper bound of the input's unlocking script, or `None` to keep the
    /// current one.
    pub(crate) fn estimate_len(&self, tx: &Transaction, input_index: usize) -> Option<usize> {
        let spent_len = tx
            .inputs
            .get(input_index)
            .and_then(|i| i.source_tx_script())
            .map_or(0, Script::len);
        match self {
            InputPlan::P2pkh { .. } => Some(P2PKH_UNLOCKING_SCRIPT_BYTES),
            InputPlan::Token { unlock, .. } => Some(estimate_unlocking_script_overhead(
                unlock.slot_count(tx.outputs.len()),
                preimage_len(spent_len),
                shape_len(&unlock.shape),
            )),
            InputPlan::Preimage { .. } => Some(
                push_size(preimage_len(spent_len)) + SIGNATURE_PUSH_BYTES + PUBLIC_KEY_PUSH_BYTES,
            ),
            InputPlan::Linked { unlock } => {
                let current = tx
                    .inputs
                    .get(input_index)
                    .and_then(|i| i.unlocking_script.as_ref())
                    .map_or(0, Script::len);
                Some(current + unlock.linking_len(tx.outputs.len()))
            }
            InputPlan::Keep => None,
        }
    }
}

/// An unsigned transaction with everything needed to finish it.
#[derive(Debug, Clone)]
pub struct PendingTx {
    tx: Transaction,
    plans: Vec<InputPlan>,
    estimated_size: usize,
    fee: u64,
}

impl PendingTx {
    pub(crate) fn new(
        tx: Transaction,
        plans: Vec<InputPlan>,
        estimated_size: usize,
        fee: u64,
    ) -> Self {
        PendingTx {
            tx,
            plans,
            estimated_size,
            fee,
        }
    }

    /// The transaction as it will be signed. Outputs are final.
    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    /// Size the fee was computed for; the signed transaction is never larger.
    pub fn estimated_size(&self) -> usize {
        self.estimated_size
    }

    /// Fee paid by the transaction.
    pub fn fee(&self) -> u64 {
        self.fee
    }

    /// Roles and public keys the signatures must come from.
    pub(crate) fn expected_keys(&self) -> impl Iterator<Item = (SignerRole, &PublicKey)> {
        self.plans
            .iter()
            .filter_map(|p| p.signer().map(|(role, key, _)| (role, key)))
    }

    /// Signatures the transaction needs, in input order.
    pub fn requests(&self) -> Result<Vec<SigningRequest>, TokenError> {
        let mut requests = Vec::new();
        for (input_index, plan) in self.plans.iter().enumerate() {
            if let Some((role, _, sighash_type)) = plan.signer() {
                let (prev_script, prev_satoshis) = self.spent(input_index)?;
                requests.push(SigningRequest {
                    input_index,
                    role,
                    prev_script: prev_script.clone(),
                    prev_satoshis,
                    sighash_type,
                });
            }
        }
        Ok(requests)
    }

    /// Sign with synchronous signers and assemble the unlocking scripts.
    pub fn sign<S: Signer + ?Sized>(self, signers: &Signers<'_, S>) -> Result<Transaction, TokenError> {
        let mut signatures = Vec::new();
        for request in self.requests()? {
            let signature = signers.get(request.role)?.sign(
                &self.tx,
                request.input_index,
                &request.prev_script,
                request.prev_satoshis,
                request.sighash_type,
            )?;
            signatures.push((request.input_index, signature));
        }
        self.complete(signatures)
    }

    /// Sign with asynchronous signers; assembly starts once every signature
    /// has resolved.
    pub async fn sign_async<S: AsyncSigner + ?Sized>(
        self,
        signers: &Signers<'_, S>,
    ) -> Result<Transaction, TokenError> {
        let mut signatures = Vec::new();
        for request in self.requests()? {
            let signature = signers
                .get(request.role)?
                .sign_async(
                    &self.tx,
                    request.input_index,
                    &request.prev_script,
                    request.prev_satoshis,
                    request.sighash_type,
                )
                .await?;
            signatures.push((request.input_index, signature));
        }
        self.complete(signatures)
    }

    /// Assemble the unlocking scripts from externally produced signatures.
    ///
    /// `signatures` pairs each requested input index with its DER signature
    /// plus sighash byte.
    pub fn complete(self, signatures: Vec<(usize, Vec<u8>)>) -> Result<Transaction, TokenError> {
        let PendingTx { mut tx, plans, fee, .. } = self;
        let output_count = tx.outputs.len();
        let mut segments: Option<Vec<Segment>> = None;

        let signature_for = |index: usize| -> Result<&[u8], TokenError> {
            signatures
                .iter()
                .find(|(i, _)| *i == index)
                .map(|(_, s)| s.as_slice())
                .ok_or_else(|| TokenError::Signing(format!("missing signature for input {index}")))
        };

        let mut scripts = Vec::with_capacity(plans.len());
        for (index, plan) in plans.iter().enumerate() {
            let script = match plan {
                InputPlan::Keep => None,
                InputPlan::P2pkh { public_key, .. } => {
                    Some(p2pkh::unlocking_script(signature_for(index)?, public_key)?)
                }
                InputPlan::Preimage {
                    public_key,
                    sighash_type,
                    ..
                } => {
                    let preimage = preimage_of(&tx, index, *sighash_type)?;
                    let mut script = Script::new();
                    script.append_push_data(&preimage)?;
                    script.append_push_data(signature_for(index)?)?;
                    script.append_push_data(&public_key.to_compressed())?;
                    Some(script)
                }
                InputPlan::Token {
                    public_key,
                    sighash_type,
                    unlock,
                    ..
                } => {
                    if segments.is_none() {
                        segments = Some(output_segments(&tx)?);
                    }
                    let slots = unlock.slots(segments.as_deref().unwrap_or_default());
                    let preimage = preimage_of(&tx, index, *sighash_type)?;
                    let parts = UnlockParts {
                        segments: &slots,
                        funding: unlock.funding,
                        shape: &unlock.shape,
                        preimage: &preimage,
                        signature: signature_for(index)?,
                        public_key,
                    };
                    Some(assemble(
                        &parts,
                        unlock.version,
                        unlock.funding.is_none(),
                        output_count,
                    )?)
                }
                InputPlan::Linked { unlock } => {
                    if segments.is_none() {
                        segments = Some(output_segments(&tx)?);
                    }
                    let slots = unlock.slots(segments.as_deref().unwrap_or_default());
                    let mut script = assemble_linking(
                        &slots,
                        unlock.funding.as_ref(),
                        &unlock.shape,
                        unlock.version,
                        unlock.funding.is_none(),
                        output_count,
                    )?;
                    let existing = tx.inputs[index].unlocking_script.as_ref().ok_or_else(|| {
                        TokenError::Validation(format!(
                            "input {index} has no unlocking script to complete"
                        ))
                    })?;
                    script.append_raw(existing.to_bytes());
                    Some(script)
                }
            };
            scripts.push(script);
        }

        for (input, script) in tx.inputs.iter_mut().zip(scripts) {
            if let Some(script) = script {
                input.unlocking_script = Some(script);
            }
        }

        debug!(
            txid = %tx.tx_id(),
            inputs = tx.inputs.len(),
            outputs = output_count,
            size = tx.size(),
            fee,
            "transaction signed"
        );
        Ok(tx)
    }

    fn spent(&self, input_index: usize) -> Result<(&Script, u64), TokenError> {
        spent_output(&self.tx, input_index)
    }
}

fn spent_output(tx: &Transaction, input_index: usize) -> Result<(&Script, u64), TokenError> {
    let output = tx
        .inputs
        .get(input_index)
        .and_then(|i| i.source_tx_output())
        .ok_or_else(|| {
            TokenError::Validation(format!("input {input_index} has no spent output attached"))
        })?;
    Ok((&output.locking_script, output.satoshis))
}

fn preimage_of(tx: &Transaction, input_index: usize, sighash_type: u32) -> Result<Vec<u8>, TokenError> {
    let (script, satoshis) = spent_output(tx, input_index)?;
    Ok(tx.preimage(input_index, script.to_bytes(), sighash_type, satoshis)?)
}

/// One segment per output, in output order.
fn output_segments(tx: &Transaction) -> Result<Vec<Segment>, TokenError> {
    tx.outputs
        .iter()
        .map(|o| {
            Ok(Segment {
                satoshis: o.satoshis,
                public_key_hash: recipient_hash(&o.locking_script)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stas_primitives::chainhash::Hash;
    use stas_primitives::ec::PrivateKey;
    use stas_transaction::output::TransactionOutput;

    use crate::signer::LocalSigner;
    use crate::types::Utxo;

    fn p2pkh_pending(key: &PrivateKey) -> PendingTx {
        let pkh = key.pub_key().hash160();
        let utxo = Utxo::new(Hash::new([0x09; 32]), 1, 5_000, Script::p2pkh(&pkh));
        let mut tx = Transaction::new();
        tx.add_input(utxo.to_input());
        tx.add_output(TransactionOutput::new(4_000, Script::p2pkh(&[0x01; 20])));
        PendingTx::new(
            tx,
            vec![InputPlan::p2pkh(SignerRole::Payment, &key.pub_key())],
            300,
            1_000,
        )
    }

    #[test]
    fn requests_describe_the_spent_output() {
        let key = PrivateKey::new();
        let pending = p2pkh_pending(&key);
        let requests = pending.requests().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].role, SignerRole::Payment);
        assert_eq!(requests[0].prev_satoshis, 5_000);
        assert_eq!(requests[0].sighash_type, SIGHASH_ALL_FORKID);
    }

    #[test]
    fn complete_requires_every_signature() {
        let pending = p2pkh_pending(&PrivateKey::new());
        let err = pending.complete(Vec::new()).unwrap_err();
        assert!(matches!(err, TokenError::Signing(_)));
    }

    #[test]
    fn external_signatures_match_local_signing() {
        let key = PrivateKey::new();
        let signer = LocalSigner::new(key.clone());
        let signers = Signers::<dyn Signer>::new().with(SignerRole::Payment, &signer);
        let local = p2pkh_pending(&key).sign(&signers).unwrap();

        let pending = p2pkh_pending(&key);
        let requests = pending.requests().unwrap();
        let request = &requests[0];
        let sig = signer
            .sign(
                pending.transaction(),
                0,
                &request.prev_script,
                request.prev_satoshis,
                request.sighash_type,
            )
            .unwrap();
        let external = pending.complete(vec![(0, sig)]).unwrap();
        assert_eq!(local.to_hex(), external.to_hex());
    }

    #[test]
    fn null_slot_is_inserted_at_its_index() {
        let unlock = TokenUnlock {
            null_slot: Some(1),
            funding: None,
            shape: UnlockShape::Plain,
            version: Version::V2,
        };
        let seg = Segment {
            satoshis: 10,
            public_key_hash: [0x05; 20],
        };
        let slots = unlock.slots(&[seg, seg]);
        assert_eq!(slots, vec![Some(seg), None, Some(seg)]);
    }
}

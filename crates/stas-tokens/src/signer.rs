//! Injected signing capability.
//!
//! Builders never see private keys. They describe what must be signed
//! ([`SigningRequest`]) and a [`Signer`] registered for the request's
//! [`SignerRole`] produces the signature. [`LocalSigner`] is the in-process
//! implementation; remote or hardware signers implement [`Signer`] or
//! [`AsyncSigner`].

use std::future::Future;

use stas_primitives::ec::{PrivateKey, PublicKey};
use stas_script::Script;
use stas_transaction::Transaction;

use crate::error::TokenError;

/// Who is expected to sign an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignerRole {
    /// Owner of the token input(s).
    Owner,
    /// Owner of the fee-paying input.
    Payment,
    /// Issuer spending the contract or issuer UTXOs.
    Issuer,
    /// Swap maker.
    Maker,
    /// Swap taker.
    Taker,
}

/// One signature a pending transaction needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
    /// Input being signed.
    pub input_index: usize,
    /// Role expected to sign.
    pub role: SignerRole,
    /// Locking script of the spent output.
    pub prev_script: Script,
    /// Value of the spent output.
    pub prev_satoshis: u64,
    /// Sighash flags to sign with.
    pub sighash_type: u32,
}

/// Synchronous signing capability.
pub trait Signer {
    /// Sign input `input_index` of `tx`.
    ///
    /// # Returns
    /// The DER signature followed by the sighash byte.
    fn sign(
        &self,
        tx: &Transaction,
        input_index: usize,
        prev_script: &Script,
        prev_satoshis: u64,
        sighash_type: u32,
    ) -> Result<Vec<u8>, TokenError>;
}

/// Asynchronous signing capability, for signers that live behind I/O.
pub trait AsyncSigner {
    /// Sign input `input_index` of `tx`; see [`Signer::sign`].
    fn sign_async(
        &self,
        tx: &Transaction,
        input_index: usize,
        prev_script: &Script,
        prev_satoshis: u64,
        sighash_type: u32,
    ) -> impl Future<Output = Result<Vec<u8>, TokenError>> + Send;
}

impl<S: Signer + Sync> AsyncSigner for S {
    fn sign_async(
        &self,
        tx: &Transaction,
        input_index: usize,
        prev_script: &Script,
        prev_satoshis: u64,
        sighash_type: u32,
    ) -> impl Future<Output = Result<Vec<u8>, TokenError>> + Send {
        std::future::ready(self.sign(tx, input_index, prev_script, prev_satoshis, sighash_type))
    }
}

/// Signer holding a private key in process.
#[derive(Clone)]
pub struct LocalSigner {
    key: PrivateKey,
}

impl LocalSigner {
    /// Wrap a private key.
    pub fn new(key: PrivateKey) -> Self {
        LocalSigner { key }
    }

    /// Public key matching the held private key.
    pub fn public_key(&self) -> PublicKey {
        self.key.pub_key()
    }
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("public_key", &self.key.pub_key().to_hex())
            .finish()
    }
}

impl Signer for LocalSigner {
    fn sign(
        &self,
        tx: &Transaction,
        input_index: usize,
        prev_script: &Script,
        prev_satoshis: u64,
        sighash_type: u32,
    ) -> Result<Vec<u8>, TokenError> {
        let digest =
            tx.signature_hash(input_index, prev_script.to_bytes(), sighash_type, prev_satoshis)?;
        let signature = self.key.sign(&digest)?;
        let mut out = signature.to_der();
        out.push(sighash_type as u8);
        Ok(out)
    }
}

/// Signers registered per role.
///
/// `S` is usually `dyn Signer` for mixed synchronous signers, or a concrete
/// [`AsyncSigner`] type.
pub struct Signers<'a, S: ?Sized> {
    entries: Vec<(SignerRole, &'a S)>,
}

impl<'a, S: ?Sized> Signers<'a, S> {
    /// An empty registry.
    pub fn new() -> Self {
        Signers {
            entries: Vec::new(),
        }
    }

    /// Register `signer` for `role`, replacing an earlier registration.
    pub fn with(mut self, role: SignerRole, signer: &'a S) -> Self {
        self.entries.retain(|(r, _)| *r != role);
        self.entries.push((role, signer));
        self
    }

    /// The signer registered for `role`.
    pub fn get(&self, role: SignerRole) -> Result<&'a S, TokenError> {
        self.entries
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, s)| *s)
            .ok_or_else(|| TokenError::Signing(format!("no signer registered for {role:?}")))
    }
}

impl<'a, S: ?Sized> Default for Signers<'a, S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stas_primitives::chainhash::Hash;
    use stas_primitives::ec::Signature;
    use stas_transaction::input::TransactionInput;
    use stas_transaction::output::TransactionOutput;
    use stas_transaction::sighash::SIGHASH_ALL_FORKID;

    fn one_input_tx() -> (Transaction, Script) {
        let prev = Script::p2pkh(&[0x01; 20]);
        let mut tx = Transaction::new();
        tx.add_input(TransactionInput::new(Hash::new([0x02; 32]), 0));
        tx.add_output(TransactionOutput::new(900, Script::p2pkh(&[0x03; 20])));
        (tx, prev)
    }

    #[test]
    fn local_signer_verifies() {
        let key = PrivateKey::new();
        let signer = LocalSigner::new(key.clone());
        let (tx, prev) = one_input_tx();

        let sig = signer.sign(&tx, 0, &prev, 1000, SIGHASH_ALL_FORKID).unwrap();
        assert_eq!(*sig.last().unwrap(), 0x41);

        let digest = tx.signature_hash(0, prev.to_bytes(), SIGHASH_ALL_FORKID, 1000).unwrap();
        let der = Signature::from_der(&sig[..sig.len() - 1]).unwrap();
        assert!(key.pub_key().verify(&digest, &der));
    }

    #[test]
    fn out_of_range_input_is_an_error() {
        let signer = LocalSigner::new(PrivateKey::new());
        let (tx, prev) = one_input_tx();
        assert!(signer.sign(&tx, 3, &prev, 1000, SIGHASH_ALL_FORKID).is_err());
    }

    #[test]
    fn registry_lookup() {
        let a = LocalSigner::new(PrivateKey::new());
        let b = LocalSigner::new(PrivateKey::new());
        let signers = Signers::<dyn Signer>::new()
            .with(SignerRole::Owner, &a)
            .with(SignerRole::Owner, &b);
        assert!(signers.get(SignerRole::Owner).is_ok());
        let err = signers.get(SignerRole::Payment).err().unwrap();
        assert!(matches!(err, TokenError::Signing(_)));
    }

    #[tokio::test]
    async fn blanket_async_signer_matches_sync() {
        let signer = LocalSigner::new(PrivateKey::new());
        let (tx, prev) = one_input_tx();
        let sync = signer.sign(&tx, 0, &prev, 1000, SIGHASH_ALL_FORKID).unwrap();
        let asynchronous = signer
            .sign_async(&tx, 0, &prev, 1000, SIGHASH_ALL_FORKID)
            .await
            .unwrap();
        // RFC 6979 signatures are deterministic.
        assert_eq!(sync, asynchronous);
    }
}

//! Base58Check P2PKH addresses.
//!
//! Token destinations, change and redeem targets are all addressed by the
//! hash of a public key; this module converts between that hash and its
//! mainnet or testnet string form.

use std::fmt;
use std::str::FromStr;

use stas_primitives::ec::PublicKey;
use stas_primitives::hash::sha256d;

use crate::{Script, ScriptError};

/// Mainnet P2PKH address version byte.
const MAINNET_P2PKH: u8 = 0x00;
/// Testnet P2PKH address version byte.
const TESTNET_P2PKH: u8 = 0x6f;

/// Network selecting the address version byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Version 0x00, addresses start with '1'.
    #[default]
    Mainnet,
    /// Version 0x6f, addresses start with 'm' or 'n'.
    Testnet,
}

impl Network {
    fn version_byte(self) -> u8 {
        match self {
            Network::Mainnet => MAINNET_P2PKH,
            Network::Testnet => TESTNET_P2PKH,
        }
    }
}

/// A P2PKH address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Address {
    /// The Base58Check string.
    pub address_string: String,
    /// The 20-byte Hash160 of the public key.
    pub public_key_hash: [u8; 20],
    /// The network this address belongs to.
    pub network: Network,
}

impl Address {
    /// Parse a Base58Check address string.
    ///
    /// # Arguments
    /// * `addr` - The Base58Check address string.
    ///
    /// # Returns
    /// An `Address`, or an error for bad characters, length, checksum or
    /// version byte.
    pub fn from_string(addr: &str) -> Result<Self, ScriptError> {
        let decoded = bs58::decode(addr)
            .into_vec()
            .map_err(|_| ScriptError::InvalidAddress(format!("bad char for '{}'", addr)))?;

        if decoded.len() != 25 {
            return Err(ScriptError::InvalidAddressLength(addr.to_string()));
        }

        let checksum = sha256d(&decoded[..21]);
        if decoded[21..25] != checksum[..4] {
            return Err(ScriptError::EncodingChecksumFailed);
        }

        let network = match decoded[0] {
            MAINNET_P2PKH => Network::Mainnet,
            TESTNET_P2PKH => Network::Testnet,
            _ => return Err(ScriptError::UnsupportedAddress(addr.to_string())),
        };

        let mut pkh = [0u8; 20];
        pkh.copy_from_slice(&decoded[1..21]);

        Ok(Address {
            address_string: addr.to_string(),
            public_key_hash: pkh,
            network,
        })
    }

    /// Encode a public-key hash for `network`.
    pub fn from_public_key_hash(hash: &[u8; 20], network: Network) -> Self {
        let mut payload = Vec::with_capacity(25);
        payload.push(network.version_byte());
        payload.extend_from_slice(hash);
        let checksum = sha256d(&payload);
        payload.extend_from_slice(&checksum[..4]);

        Address {
            address_string: bs58::encode(&payload).into_string(),
            public_key_hash: *hash,
            network,
        }
    }

    /// Address of a public key (Hash160 of its compressed form).
    pub fn from_public_key(key: &PublicKey, network: Network) -> Self {
        Self::from_public_key_hash(&key.hash160(), network)
    }

    /// The P2PKH locking script paying to this address.
    pub fn locking_script(&self) -> Script {
        Script::p2pkh(&self.public_key_hash)
    }
}

impl FromStr for Address {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_string(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address_string)
    }
}

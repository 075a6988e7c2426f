//! Token locking script codec.
//!
//! [`StasScript`] is the structured view of a token locking script. Scripts
//! built here are bit-exact instances of the STAS template; scripts read
//! from the chain are validated against the fixed offsets in
//! [`templates`](super::templates) and never re-serialized when only the
//! owner changes.

use serde::{Deserialize, Serialize};

use stas_primitives::ec::PublicKey;
use stas_script::chunk::decode_script;
use stas_script::opcodes::{OP_0, OP_DATA_20, OP_RETURN};
use stas_script::Script;

use super::templates::*;
use crate::error::TokenError;

/// Token script version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Version {
    /// Template ends at the redemption hash.
    V1,
    /// Template followed by a flags push and optional symbol and data.
    V2,
}

impl Version {
    /// Numeric protocol version.
    pub fn as_u8(self) -> u8 {
        match self {
            Version::V1 => 1,
            Version::V2 => 2,
        }
    }
}

/// Structured token locking script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StasScript {
    /// Hash160 of the current owner's public key.
    pub owner: [u8; 20],
    /// Hash160 of the issuer (redemption) public key.
    pub redemption: [u8; 20],
    /// Script version.
    pub version: Version,
    /// Whether the token may be split. Always true for version 1.
    pub splittable: bool,
    /// Optional token symbol pushed after the flags.
    pub symbol: Option<Vec<u8>>,
    /// Optional trailing data push.
    pub data: Option<Vec<u8>>,
    body: Vec<u8>,
}

impl StasScript {
    /// A splittable version 2 token owned by `owner` and redeemable by `redemption`.
    pub fn new(owner: [u8; 20], redemption: [u8; 20]) -> Result<Self, TokenError> {
        let template = template_bytes()?;
        Ok(StasScript {
            owner,
            redemption,
            version: Version::V2,
            splittable: true,
            symbol: None,
            data: None,
            body: template[MARKER_OFFSET..OP_RETURN_OFFSET].to_vec(),
        })
    }

    /// Parse a locking script.
    ///
    /// # Returns
    /// The structured script, or `MalformedScript` when the bytes are not a
    /// token script or its trailing pushes cannot be read.
    pub fn from_script(script: &Script) -> Result<Self, TokenError> {
        let bytes = script.to_bytes();
        if !is_token_script_bytes(bytes) {
            return Err(TokenError::MalformedScript(
                "not a token locking script".into(),
            ));
        }

        let mut owner = [0u8; 20];
        owner.copy_from_slice(&bytes[OWNER_OFFSET..MARKER_OFFSET]);
        let mut redemption = [0u8; 20];
        redemption.copy_from_slice(&bytes[REDEMPTION_OFFSET..TEMPLATE_LEN]);
        let body = bytes[MARKER_OFFSET..OP_RETURN_OFFSET].to_vec();

        if bytes.len() == TEMPLATE_LEN {
            return Ok(StasScript {
                owner,
                redemption,
                version: Version::V1,
                splittable: true,
                symbol: None,
                data: None,
                body,
            });
        }

        let chunks = decode_script(&bytes[TEMPLATE_LEN..]).map_err(|e| {
            TokenError::MalformedScript(format!("token script tail: {e}"))
        })?;
        let mut pushes = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            match (chunk.op, chunk.data) {
                (_, Some(data)) => pushes.push(data),
                (OP_0, None) => pushes.push(Vec::new()),
                (op, None) => {
                    return Err(TokenError::MalformedScript(format!(
                        "unexpected opcode 0x{op:02x} after redemption hash"
                    )))
                }
            }
        }

        let mut pushes = pushes.into_iter();
        let splittable = match pushes.next().as_deref() {
            Some([FLAG_SPLITTABLE]) => true,
            Some([FLAG_NON_SPLITTABLE]) => false,
            _ => {
                return Err(TokenError::MalformedScript(
                    "missing or invalid flags push".into(),
                ))
            }
        };
        let symbol = pushes.next();
        let data = pushes.next();
        if pushes.next().is_some() {
            return Err(TokenError::MalformedScript(
                "too many pushes after flags".into(),
            ));
        }

        Ok(StasScript {
            owner,
            redemption,
            version: Version::V2,
            splittable,
            symbol,
            data,
            body,
        })
    }

    /// Serialize to a locking script.
    pub fn to_script(&self) -> Result<Script, TokenError> {
        let mut script = Script::new();
        script.append_raw(&TOKEN_PREFIX);
        script.append_raw(&self.owner);
        script.append_raw(&self.body);
        script.append_opcodes(&[OP_RETURN, OP_DATA_20]);
        script.append_raw(&self.redemption);

        match self.version {
            Version::V1 => {
                if self.symbol.is_some() || self.data.is_some() {
                    return Err(TokenError::Validation(
                        "version 1 tokens carry no symbol or data".into(),
                    ));
                }
            }
            Version::V2 => {
                let flags = if self.splittable {
                    FLAG_SPLITTABLE
                } else {
                    FLAG_NON_SPLITTABLE
                };
                script.append_push_data(&[flags])?;
                match (&self.symbol, &self.data) {
                    (Some(symbol), data) => {
                        script.append_push_data(symbol)?;
                        if let Some(data) = data {
                            script.append_push_data(data)?;
                        }
                    }
                    // The data slot is positional, so an absent symbol is an empty push.
                    (None, Some(data)) => {
                        script.append_push_data(&[])?;
                        script.append_push_data(data)?;
                    }
                    (None, None) => {}
                }
            }
        }
        Ok(script)
    }

    /// The same token re-owned by `owner`.
    pub fn with_owner(&self, owner: [u8; 20]) -> Self {
        StasScript {
            owner,
            ..self.clone()
        }
    }
}

fn template_bytes() -> Result<Vec<u8>, TokenError> {
    hex::decode(TOKEN_TEMPLATE_HEX)
        .map_err(|e| TokenError::MalformedScript(format!("template decode error: {e}")))
}

/// Build a token locking script.
///
/// # Arguments
/// * `owner` - Hash160 of the owner's public key.
/// * `issuer_public_key` - Key whose hash becomes the redemption hash.
/// * `version` - Template version.
/// * `data` - Optional trailing data (version 2 only).
/// * `splittable` - Flags byte for version 2 tokens.
pub fn build_token_script(
    owner: &[u8; 20],
    issuer_public_key: &PublicKey,
    version: Version,
    data: Option<&[u8]>,
    splittable: bool,
) -> Result<Script, TokenError> {
    let mut stas = StasScript::new(*owner, issuer_public_key.hash160())?;
    stas.version = version;
    stas.splittable = splittable || version == Version::V1;
    stas.data = data.map(<[u8]>::to_vec);
    stas.to_script()
}

/// Replace the owner hash of a token script, keeping every other byte.
pub fn update_owner(existing: &Script, new_owner: &[u8; 20]) -> Result<Script, TokenError> {
    let bytes = existing.to_bytes();
    if !is_token_script_bytes(bytes) {
        return Err(TokenError::MalformedScript(
            "cannot update owner of a non-token script".into(),
        ));
    }
    let mut out = bytes.to_vec();
    out[OWNER_OFFSET..MARKER_OFFSET].copy_from_slice(new_owner);
    Ok(Script::from(out))
}

/// Owner hash of a token script.
pub fn extract_owner(script: &Script) -> Result<[u8; 20], TokenError> {
    let bytes = script.to_bytes();
    if !is_token_script_bytes(bytes) {
        return Err(TokenError::MalformedScript(
            "cannot extract owner of a non-token script".into(),
        ));
    }
    Ok(hash_at(bytes, OWNER_OFFSET))
}

/// Redemption (issuer) hash of a token script.
pub fn extract_redemption(script: &Script) -> Result<[u8; 20], TokenError> {
    let bytes = script.to_bytes();
    if !is_token_script_bytes(bytes) {
        return Err(TokenError::MalformedScript(
            "cannot extract redemption hash of a non-token script".into(),
        ));
    }
    Ok(hash_at(bytes, REDEMPTION_OFFSET))
}

/// Hash a token or P2PKH output pays to. Both keep it at bytes 3..23.
pub fn recipient_hash(script: &Script) -> Result<[u8; 20], TokenError> {
    let bytes = script.to_bytes();
    if is_token_script_bytes(bytes) || is_p2pkh_script(bytes) {
        Ok(hash_at(bytes, OWNER_OFFSET))
    } else {
        Err(TokenError::MalformedScript(
            "output is neither a token nor a P2PKH script".into(),
        ))
    }
}

fn hash_at(bytes: &[u8], offset: usize) -> [u8; 20] {
    let mut out = [0u8; 20];
    out.copy_from_slice(&bytes[offset..offset + PKH_LEN]);
    out
}

/// Whether the hex string is a token locking script.
pub fn is_token_script(script_hex: &str) -> bool {
    hex::decode(script_hex)
        .map(|bytes| is_token_script_bytes(&bytes))
        .unwrap_or(false)
}

/// Whether the bytes are a token locking script.
pub fn is_token_script_bytes(bytes: &[u8]) -> bool {
    bytes.len() >= TEMPLATE_LEN
        && bytes[..OWNER_OFFSET] == TOKEN_PREFIX
        && bytes[MARKER_OFFSET..MARKER_OFFSET + TOKEN_MARKER.len()] == TOKEN_MARKER
        && bytes[OP_RETURN_OFFSET] == OP_RETURN
        && bytes[OP_RETURN_OFFSET + 1] == OP_DATA_20
}

/// Whether the bytes are exactly `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`.
pub fn is_p2pkh_script(bytes: &[u8]) -> bool {
    bytes.len() == P2PKH_LEN
        && bytes[..OWNER_OFFSET] == TOKEN_PREFIX
        && bytes[MARKER_OFFSET..] == P2PKH_SUFFIX
}

/// Version of a token script: version 2 when a flags section follows the
/// redemption hash.
pub fn detect_version(script: &Script) -> Result<Version, TokenError> {
    let bytes = script.to_bytes();
    if !is_token_script_bytes(bytes) {
        return Err(TokenError::MalformedScript(
            "cannot detect version of a non-token script".into(),
        ));
    }
    Ok(if bytes.len() == TEMPLATE_LEN {
        Version::V1
    } else {
        Version::V2
    })
}

/// Whether a token script allows splitting.
pub fn is_splittable(script: &Script) -> Result<bool, TokenError> {
    Ok(StasScript::from_script(script)?.splittable)
}

/// Whether two token scripts are the same token, differing at most in owner.
pub fn same_lineage(a: &Script, b: &Script) -> bool {
    let (a, b) = (a.to_bytes(), b.to_bytes());
    is_token_script_bytes(a) && is_token_script_bytes(b) && a[MARKER_OFFSET..] == b[MARKER_OFFSET..]
}

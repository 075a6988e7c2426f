/// Errors from key handling, signature encoding and wire decoding.
#[derive(Debug, thiserror::Error)]
pub enum PrimitivesError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid WIF format: {0}")]
    InvalidWif(String),

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid chain hash: {0}")]
    InvalidHash(String),

    #[error("unexpected end of data while decoding")]
    UnexpectedEof,
}

impl From<hex::FromHexError> for PrimitivesError {
    fn from(e: hex::FromHexError) -> Self {
        PrimitivesError::InvalidHex(e.to_string())
    }
}

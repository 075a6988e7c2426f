/// Errors from script encoding, chunk decoding and address parsing.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Invalid address string.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid address length after Base58 decoding.
    #[error("invalid address length for '{0}'")]
    InvalidAddressLength(String),

    /// Address version byte is neither mainnet nor testnet P2PKH.
    #[error("address not supported {0}")]
    UnsupportedAddress(String),

    /// Base58Check checksum did not match.
    #[error("checksum failed")]
    EncodingChecksumFailed,

    /// Hex decoding error.
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// Script is not a P2PKH script.
    #[error("not a P2PKH")]
    NotP2PKH,

    /// Not enough data in script to complete a push operation.
    #[error("not enough data")]
    DataTooSmall,

    /// Push data exceeds maximum allowed size.
    #[error("data too big")]
    DataTooBig,

    /// Error from the primitives layer.
    #[error(transparent)]
    Primitives(#[from] stas_primitives::PrimitivesError),
}

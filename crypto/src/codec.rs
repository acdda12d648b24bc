//! Byte/string conversions used across the wallet: lowercase hex and
//! Bitcoin-alphabet base58.

use crate::CryptoError;

/// Encode bytes as a lowercase hex string.
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode a hex string, rejecting odd lengths and non-hex digits.
pub fn from_hex(s: &str) -> Result<Vec<u8>, CryptoError> {
    hex::decode(s).map_err(|_| CryptoError::InvalidHex)
}

/// Encode bytes as base58 (Bitcoin alphabet).
pub fn to_base58(bytes: &[u8]) -> String {
    bs58::encode(bytes).into_string()
}

/// Decode a base58 string (Bitcoin alphabet).
pub fn from_base58(s: &str) -> Result<Vec<u8>, CryptoError> {
    bs58::decode(s)
        .into_vec()
        .map_err(|_| CryptoError::InvalidBase58)
}

//! Xian wallet cryptography
//!
//! Key generation, transaction signing and verification, and
//! encryption-at-rest for private key material.

pub mod codec;
pub mod keys;
pub mod keystore;
pub mod secure;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid hex string")]
    InvalidHex,

    #[error("Invalid base58 string")]
    InvalidBase58,

    #[error("Invalid key material")]
    InvalidKey,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid password or corrupted key data")]
    BadPassword,

    #[error("Corrupted keystore blob")]
    CorruptBlob,

    #[error("Secure key provider unavailable: {0}")]
    SecureProviderUnavailable(String),
}

pub use codec::{from_base58, from_hex, to_base58, to_hex};
pub use keys::{sign_message, sign_transaction, verify_signature, XianKeyPair};
pub use keystore::{decrypt_private_key, encrypt_private_key};
pub use secure::{SecureCipher, SecureKeyProvider, SoftwareKeyProvider};

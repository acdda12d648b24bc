//! Ed25519 keypair operations.
//!
//! On the Xian network the address IS the 32-byte public key, rendered as
//! 64 lowercase hex characters. Transaction signatures are computed over
//! canonical payload bytes with the 64-byte seed-plus-public-key layout.

use crate::codec::{from_hex, to_hex};
use crate::CryptoError;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

/// Ed25519 keypair backing a wallet identity.
#[derive(Clone)]
pub struct XianKeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl XianKeyPair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Rebuild a keypair from a raw 32-byte Ed25519 seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Rebuild a keypair from a hex-encoded 32-byte seed.
    pub fn from_seed_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = from_hex(hex_str)?;
        let seed: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self::from_seed(&seed))
    }

    /// The raw 32-byte seed.
    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// The seed as lowercase hex.
    pub fn seed_hex(&self) -> String {
        to_hex(&self.seed())
    }

    /// The 32-byte public key.
    pub fn public_key(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// The public key as 64 lowercase hex characters (the wallet address).
    pub fn public_key_hex(&self) -> String {
        to_hex(&self.public_key())
    }
}

impl std::fmt::Debug for XianKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("XianKeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Sign canonical transaction bytes.
///
/// The 64-byte keypair layout (32-byte seed followed by the 32-byte public
/// key) is rebuilt before signing; a public key that does not belong to the
/// seed is rejected rather than producing a signature that can never verify.
pub fn sign_transaction(
    canonical_bytes: &[u8],
    seed: &[u8; 32],
    public_key_hex: &str,
) -> Result<String, CryptoError> {
    let public_key = from_hex(public_key_hex)?;
    if public_key.len() != 32 {
        return Err(CryptoError::InvalidKey);
    }

    let mut combined = Zeroizing::new([0u8; 64]);
    combined[..32].copy_from_slice(seed);
    combined[32..].copy_from_slice(&public_key);

    let signing_key =
        SigningKey::from_keypair_bytes(&combined).map_err(|_| CryptoError::InvalidKey)?;
    let signature = signing_key.sign(canonical_bytes);

    Ok(to_hex(&signature.to_bytes()))
}

/// Sign an arbitrary message with a raw seed, deriving the public half.
pub fn sign_message(message: &[u8], seed: &[u8; 32]) -> String {
    let signing_key = SigningKey::from_bytes(seed);
    let signature = signing_key.sign(message);
    to_hex(&signature.to_bytes())
}

/// Verify a hex signature over a message against a hex public key.
pub fn verify_signature(
    public_key_hex: &str,
    message: &[u8],
    signature_hex: &str,
) -> Result<(), CryptoError> {
    let public_key = from_hex(public_key_hex)?;
    let public_key: [u8; 32] = public_key.try_into().map_err(|_| CryptoError::InvalidKey)?;
    let verifying_key =
        VerifyingKey::from_bytes(&public_key).map_err(|_| CryptoError::InvalidKey)?;

    let signature_bytes = from_hex(signature_hex)?;
    let signature_bytes: [u8; 64] = signature_bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidSignature)?;
    let signature = Signature::from_bytes(&signature_bytes);

    verifying_key
        .verify(message, &signature)
        .map_err(|_| CryptoError::InvalidSignature)
}

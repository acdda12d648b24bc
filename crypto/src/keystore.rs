//! Encryption-at-rest for private key seeds.
//!
//! Blob layout is `hex(salt) || hex(nonce) || hex(ciphertext)` in one
//! opaque hex string. The encryption key is derived from the password with
//! Argon2id using the per-blob salt, and the seed is sealed with
//! AES-256-GCM. Decryption re-derives the public key and compares it with
//! the expected address, so a wrong password and a corrupted ciphertext
//! both surface as the same typed failure.

use crate::keys::XianKeyPair;
use crate::CryptoError;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::Argon2;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;

fn derive_key(password: &str, salt: &[u8]) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
    let mut key = Zeroizing::new([0u8; 32]);
    Argon2::default()
        .hash_password_into(password.as_bytes(), salt, key.as_mut())
        .map_err(|_| CryptoError::BadPassword)?;
    Ok(key)
}

/// Encrypt a 32-byte private key seed with a password.
pub fn encrypt_private_key(seed: &[u8; 32], password: &str) -> Result<String, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let key = derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_ref()));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), seed.as_ref())
        .map_err(|_| CryptoError::BadPassword)?;

    let mut blob = String::with_capacity((SALT_LEN + NONCE_LEN + ciphertext.len()) * 2);
    blob.push_str(&hex::encode(salt));
    blob.push_str(&hex::encode(nonce));
    blob.push_str(&hex::encode(&ciphertext));
    Ok(blob)
}

/// Decrypt an encrypted private key blob with a password.
///
/// The decrypted seed is accepted only if the public key it derives matches
/// `public_key_hex`; anything else is a typed failure, never a panic.
pub fn decrypt_private_key(
    blob: &str,
    password: &str,
    public_key_hex: &str,
) -> Result<[u8; 32], CryptoError> {
    let header_len = (SALT_LEN + NONCE_LEN) * 2;
    if !blob.is_ascii() || blob.len() <= header_len {
        return Err(CryptoError::CorruptBlob);
    }

    let salt = hex::decode(&blob[..SALT_LEN * 2]).map_err(|_| CryptoError::CorruptBlob)?;
    let nonce =
        hex::decode(&blob[SALT_LEN * 2..header_len]).map_err(|_| CryptoError::CorruptBlob)?;
    let ciphertext = hex::decode(&blob[header_len..]).map_err(|_| CryptoError::CorruptBlob)?;

    let key = derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_ref()));
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
            .map_err(|_| CryptoError::BadPassword)?,
    );

    let seed: [u8; 32] = plaintext
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::BadPassword)?;

    // The stored blob is only trusted if it still decrypts to the key this
    // wallet was registered under.
    let keypair = XianKeyPair::from_seed(&seed);
    if keypair.public_key_hex() != public_key_hex {
        return Err(CryptoError::BadPassword);
    }

    Ok(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let keypair = XianKeyPair::generate();
        let seed = keypair.seed();

        let blob = encrypt_private_key(&seed, "hunter2").unwrap();
        let decrypted =
            decrypt_private_key(&blob, "hunter2", &keypair.public_key_hex()).unwrap();

        assert_eq!(decrypted, seed);
    }

    #[test]
    fn test_wrong_password_is_typed_error() {
        let keypair = XianKeyPair::generate();
        let blob = encrypt_private_key(&keypair.seed(), "hunter2").unwrap();

        let result = decrypt_private_key(&blob, "wrong", &keypair.public_key_hex());
        assert!(matches!(result, Err(CryptoError::BadPassword)));
    }

    #[test]
    fn test_corrupt_blob_is_typed_error() {
        let keypair = XianKeyPair::generate();

        let result = decrypt_private_key("deadbeef", "hunter2", &keypair.public_key_hex());
        assert!(matches!(result, Err(CryptoError::CorruptBlob)));

        let result = decrypt_private_key("zz", "hunter2", &keypair.public_key_hex());
        assert!(matches!(result, Err(CryptoError::CorruptBlob)));
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let keypair = XianKeyPair::generate();
        let blob = encrypt_private_key(&keypair.seed(), "hunter2").unwrap();

        // Flip one nibble of the ciphertext portion.
        let mut tampered: Vec<char> = blob.chars().collect();
        let last = tampered.len() - 1;
        tampered[last] = if tampered[last] == '0' { '1' } else { '0' };
        let tampered: String = tampered.into_iter().collect();

        let result = decrypt_private_key(&tampered, "hunter2", &keypair.public_key_hex());
        assert!(result.is_err());
    }

    #[test]
    fn test_mismatched_public_key_rejected() {
        let keypair = XianKeyPair::generate();
        let other = XianKeyPair::generate();
        let blob = encrypt_private_key(&keypair.seed(), "hunter2").unwrap();

        let result = decrypt_private_key(&blob, "hunter2", &other.public_key_hex());
        assert!(matches!(result, Err(CryptoError::BadPassword)));
    }

    #[test]
    fn test_blobs_are_salted() {
        let keypair = XianKeyPair::generate();
        let blob1 = encrypt_private_key(&keypair.seed(), "hunter2").unwrap();
        let blob2 = encrypt_private_key(&keypair.seed(), "hunter2").unwrap();

        assert_ne!(blob1, blob2);
    }
}

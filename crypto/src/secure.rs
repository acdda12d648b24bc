//! Device-bound key wrapping behind a provider seam.
//!
//! Platform builds supply a provider backed by the secure element whose
//! authorization step is the biometric prompt. The software provider here
//! serves test and non-mobile targets with the same contract: a cipher can
//! only be obtained after the authorization hook passes, every decryption
//! handle requires a fresh authorization, and provider failures are
//! reported as typed errors the caller treats as "fall back to password".

use crate::CryptoError;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

const NONCE_LEN: usize = 12;

/// One-shot AEAD handle bound to the provider's wrapping key.
pub struct SecureCipher {
    key: Zeroizing<[u8; 32]>,
    nonce: [u8; NONCE_LEN],
}

impl SecureCipher {
    /// The nonce to persist alongside the ciphertext.
    pub fn iv(&self) -> &[u8] {
        &self.nonce
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.key.as_ref()));
        cipher
            .encrypt(Nonce::from_slice(&self.nonce), plaintext)
            .map_err(|_| CryptoError::SecureProviderUnavailable("encrypt failed".into()))
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.key.as_ref()));
        cipher
            .decrypt(Nonce::from_slice(&self.nonce), ciphertext)
            .map_err(|_| CryptoError::SecureProviderUnavailable("decrypt failed".into()))
    }
}

/// Hardware- or software-backed wrapping-key provider.
pub trait SecureKeyProvider: Send + Sync {
    /// Run the authorization challenge and hand out an encryption cipher
    /// with a fresh IV. Creates the wrapping key on first use.
    fn prepare_encryption(&self) -> Result<SecureCipher, CryptoError>;

    /// Run a fresh authorization challenge and hand out a decryption cipher
    /// for a previously persisted IV.
    fn cipher_for_decryption(&self, iv: &[u8]) -> Result<SecureCipher, CryptoError>;

    /// Destroy the shared wrapping key. Only a full wallet wipe calls this;
    /// disabling one wallet's device unlock must not.
    fn wipe(&self) -> Result<(), CryptoError>;
}

type AuthorizeHook = Box<dyn Fn() -> bool + Send + Sync>;

/// Software provider: process-local wrapping key, pluggable authorization.
pub struct SoftwareKeyProvider {
    key: Mutex<Option<Zeroizing<[u8; 32]>>>,
    authorize: AuthorizeHook,
}

impl SoftwareKeyProvider {
    /// Provider whose authorization challenge always passes.
    pub fn new() -> Self {
        Self {
            key: Mutex::new(None),
            authorize: Box::new(|| true),
        }
    }

    /// Provider with a custom authorization hook, used by tests to model a
    /// failed or cancelled challenge.
    pub fn with_authorization(hook: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self {
            key: Mutex::new(None),
            authorize: Box::new(hook),
        }
    }

    fn challenge(&self) -> Result<(), CryptoError> {
        if (self.authorize)() {
            Ok(())
        } else {
            Err(CryptoError::SecureProviderUnavailable(
                "authorization challenge failed".into(),
            ))
        }
    }
}

impl Default for SoftwareKeyProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureKeyProvider for SoftwareKeyProvider {
    fn prepare_encryption(&self) -> Result<SecureCipher, CryptoError> {
        self.challenge()?;

        let mut guard = self.key.lock();
        if guard.is_none() {
            let mut key = Zeroizing::new([0u8; 32]);
            OsRng.fill_bytes(key.as_mut());
            *guard = Some(key);
            log::debug!("Generated new software wrapping key");
        }
        let key = guard
            .as_ref()
            .map(|k| Zeroizing::new(**k))
            .ok_or_else(|| CryptoError::SecureProviderUnavailable("no wrapping key".into()))?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        Ok(SecureCipher { key, nonce })
    }

    fn cipher_for_decryption(&self, iv: &[u8]) -> Result<SecureCipher, CryptoError> {
        self.challenge()?;

        let nonce: [u8; NONCE_LEN] = iv.try_into().map_err(|_| {
            CryptoError::SecureProviderUnavailable("bad IV length".into())
        })?;

        let guard = self.key.lock();
        let key = guard
            .as_ref()
            .map(|k| Zeroizing::new(**k))
            .ok_or_else(|| CryptoError::SecureProviderUnavailable("no wrapping key".into()))?;

        Ok(SecureCipher { key, nonce })
    }

    fn wipe(&self) -> Result<(), CryptoError> {
        *self.key.lock() = None;
        log::debug!("Software wrapping key wiped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_unwrap_round_trip() {
        let provider = SoftwareKeyProvider::new();
        let secret = b"thirty-two bytes of key material";

        let cipher = provider.prepare_encryption().unwrap();
        let iv = cipher.iv().to_vec();
        let wrapped = cipher.encrypt(secret).unwrap();

        let cipher = provider.cipher_for_decryption(&iv).unwrap();
        let unwrapped = cipher.decrypt(&wrapped).unwrap();

        assert_eq!(unwrapped, secret);
    }

    #[test]
    fn test_failed_challenge_is_typed_error() {
        let provider = SoftwareKeyProvider::with_authorization(|| false);

        let result = provider.prepare_encryption();
        assert!(matches!(
            result,
            Err(CryptoError::SecureProviderUnavailable(_))
        ));
    }

    #[test]
    fn test_decrypt_without_key_fails() {
        let provider = SoftwareKeyProvider::new();
        let result = provider.cipher_for_decryption(&[0u8; NONCE_LEN]);
        assert!(result.is_err());
    }

    #[test]
    fn test_wipe_destroys_wrapping_key() {
        let provider = SoftwareKeyProvider::new();

        let cipher = provider.prepare_encryption().unwrap();
        let iv = cipher.iv().to_vec();
        let wrapped = cipher.encrypt(b"secret").unwrap();

        provider.wipe().unwrap();

        // A new wrapping key is generated afterwards, so the old ciphertext
        // no longer opens.
        let cipher = provider.prepare_encryption().unwrap();
        let _ = cipher;
        let result = provider
            .cipher_for_decryption(&iv)
            .and_then(|c| c.decrypt(&wrapped));
        assert!(result.is_err());
    }
}

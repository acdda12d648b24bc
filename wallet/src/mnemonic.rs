//! BIP-39 mnemonic support for wallet creation and recovery.
//!
//! Recovery phrases are always 24 words (256 bits of entropy). The Ed25519
//! seed is the first 32 bytes of the 64-byte BIP-39 seed; this is not
//! BIP-32/SLIP-0010 hierarchical derivation, but it is what every deployed
//! wallet for this network derives, so the rule is load-bearing and must
//! not change without a key-migration path.

use bip39::{Language, Mnemonic};
use thiserror::Error;
use xian_crypto::{CryptoError, XianKeyPair};

/// Required phrase length.
pub const WORD_COUNT: usize = 24;

#[derive(Debug, Error)]
pub enum MnemonicError {
    #[error("Invalid recovery phrase: must be {WORD_COUNT} words, got {0}")]
    WordCount(usize),

    #[error("Invalid recovery phrase: word {0} is not in the BIP-39 wordlist")]
    UnknownWord(usize),

    #[error("Invalid recovery phrase: checksum validation failed")]
    Checksum,

    #[error("Invalid recovery phrase: {0}")]
    Invalid(String),

    #[error("Key error: {0}")]
    Key(#[from] CryptoError),
}

fn normalize(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse(phrase: &str) -> Result<Mnemonic, MnemonicError> {
    let normalized = normalize(phrase);
    let count = normalized.split(' ').filter(|w| !w.is_empty()).count();
    if count != WORD_COUNT {
        return Err(MnemonicError::WordCount(count));
    }

    Mnemonic::parse_in_normalized(Language::English, &normalized).map_err(|e| match e {
        bip39::Error::BadWordCount(n) => MnemonicError::WordCount(n),
        bip39::Error::UnknownWord(index) => MnemonicError::UnknownWord(index),
        bip39::Error::InvalidChecksum => MnemonicError::Checksum,
        other => MnemonicError::Invalid(other.to_string()),
    })
}

/// Generate a new 24-word recovery phrase from 256 bits of OS entropy.
pub fn generate_mnemonic() -> Result<String, MnemonicError> {
    let mnemonic = Mnemonic::generate_in(Language::English, WORD_COUNT)
        .map_err(|e| MnemonicError::Invalid(e.to_string()))?;
    Ok(mnemonic.to_string())
}

/// Validate a recovery phrase without deriving anything.
pub fn validate_mnemonic(phrase: &str) -> Result<(), MnemonicError> {
    parse(phrase)?;
    Ok(())
}

/// Derive the 64-byte BIP-39 seed from a phrase and optional passphrase.
pub fn seed_from_mnemonic(phrase: &str, passphrase: &str) -> Result<[u8; 64], MnemonicError> {
    let mnemonic = parse(phrase)?;
    Ok(mnemonic.to_seed(passphrase))
}

/// Derive the wallet keypair from a 64-byte BIP-39 seed.
///
/// Takes the first 32 bytes as the Ed25519 seed.
pub fn derive_keypair(seed: &[u8; 64]) -> XianKeyPair {
    let mut ed25519_seed = [0u8; 32];
    ed25519_seed.copy_from_slice(&seed[..32]);
    XianKeyPair::from_seed(&ed25519_seed)
}

/// Derive the wallet keypair straight from a phrase (empty passphrase),
/// the composition used by create and import flows.
pub fn keypair_from_mnemonic(phrase: &str) -> Result<XianKeyPair, MnemonicError> {
    let seed = seed_from_mnemonic(phrase, "")?;
    Ok(derive_keypair(&seed))
}

/// Import a keypair from a raw 64-hex-char private key seed.
pub fn import_from_private_key_hex(hex_key: &str) -> Result<XianKeyPair, MnemonicError> {
    Ok(XianKeyPair::from_seed_hex(hex_key)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 24-word all-"abandon" test phrase with valid checksum.
    const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon art";

    #[test]
    fn test_generate_is_24_words() {
        let mnemonic = generate_mnemonic().unwrap();
        assert_eq!(mnemonic.split_whitespace().count(), 24);
        assert!(validate_mnemonic(&mnemonic).is_ok());
    }

    #[test]
    fn test_generated_phrases_differ() {
        let a = generate_mnemonic().unwrap();
        let b = generate_mnemonic().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_wrong_word_count() {
        let result = validate_mnemonic("abandon abandon abandon");
        assert!(matches!(result, Err(MnemonicError::WordCount(3))));

        // Valid 12-word phrase is still rejected here: 24 words required.
        let twelve = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
        assert!(matches!(
            validate_mnemonic(twelve),
            Err(MnemonicError::WordCount(12))
        ));
    }

    #[test]
    fn test_rejects_unknown_word() {
        let mut words: Vec<&str> = TEST_MNEMONIC.split(' ').collect();
        words[5] = "zzzzzz";
        let phrase = words.join(" ");
        assert!(matches!(
            validate_mnemonic(&phrase),
            Err(MnemonicError::UnknownWord(_))
        ));
    }

    #[test]
    fn test_rejects_bad_checksum() {
        // Swap the checksum-bearing last word for another valid word.
        let mut words: Vec<&str> = TEST_MNEMONIC.split(' ').collect();
        let last = words.len() - 1;
        words[last] = "abandon";
        let phrase = words.join(" ");
        assert!(matches!(
            validate_mnemonic(&phrase),
            Err(MnemonicError::Checksum)
        ));
    }

    #[test]
    fn test_validation_normalizes_case_and_whitespace() {
        let messy = format!("  {}  ", TEST_MNEMONIC.to_uppercase().replace(' ', "   "));
        assert!(validate_mnemonic(&messy).is_ok());
    }

    #[test]
    fn test_derivation_deterministic() {
        let keypair1 = keypair_from_mnemonic(TEST_MNEMONIC).unwrap();
        let keypair2 = keypair_from_mnemonic(TEST_MNEMONIC).unwrap();

        assert_eq!(keypair1.public_key(), keypair2.public_key());
        assert_eq!(keypair1.seed(), keypair2.seed());
        assert_eq!(keypair1.public_key_hex().len(), 64);
    }

    #[test]
    fn test_seed_is_first_32_bytes_of_bip39_seed() {
        let seed = seed_from_mnemonic(TEST_MNEMONIC, "").unwrap();
        let keypair = derive_keypair(&seed);

        assert_eq!(keypair.seed(), &seed[..32]);
    }

    #[test]
    fn test_passphrase_changes_keypair() {
        let plain = derive_keypair(&seed_from_mnemonic(TEST_MNEMONIC, "").unwrap());
        let salted = derive_keypair(&seed_from_mnemonic(TEST_MNEMONIC, "extra").unwrap());

        assert_ne!(plain.public_key(), salted.public_key());
    }

    #[test]
    fn test_import_from_private_key_hex() {
        let keypair = keypair_from_mnemonic(TEST_MNEMONIC).unwrap();
        let imported = import_from_private_key_hex(&keypair.seed_hex()).unwrap();

        assert_eq!(imported.public_key_hex(), keypair.public_key_hex());
    }

    #[test]
    fn test_mnemonic_round_trip_yields_valid_public_key() {
        let mnemonic = generate_mnemonic().unwrap();
        let keypair = keypair_from_mnemonic(&mnemonic).unwrap();
        assert_eq!(keypair.public_key().len(), 32);

        let again = keypair_from_mnemonic(&mnemonic).unwrap();
        assert_eq!(keypair.public_key_hex(), again.public_key_hex());
    }
}

//! Multi-wallet registry and encrypted key storage.
//!
//! Backed by a sled tree. Every per-wallet record is namespaced under
//! `wallet:{publicKey}:{field}`; the wallet list and the active pointer are
//! global keys. The active pointer, if present, is always a member of the
//! list, and deleting the active wallet reassigns it (or empties it) in the
//! same operation.
//!
//! The unlocked private key lives only in memory, for at most one wallet at
//! a time, and is cleared on wallet switch, delete, explicit lock, and
//! process exit. Active-wallet changes are published on a watch channel so
//! balance and asset loaders reload on every switch.

use crate::mnemonic::{
    generate_mnemonic, import_from_private_key_hex, keypair_from_mnemonic, MnemonicError,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use xian_crypto::{
    decrypt_private_key, encrypt_private_key, CryptoError, SecureCipher, SecureKeyProvider,
    XianKeyPair,
};
use zeroize::Zeroizing;

/// The base network currency contract; always present, never removable.
pub const DEFAULT_TOKEN: &str = "currency";

pub const DEFAULT_RPC_URL: &str = "https://node.xian.org";
pub const DEFAULT_EXPLORER_URL: &str = "https://explorer.xian.org";

const KEY_WALLET_LIST: &str = "registry:wallets";
const KEY_ACTIVE_WALLET: &str = "registry:active";

const FIELD_ENCRYPTED_KEY: &str = "encrypted_key";
const FIELD_NAME: &str = "name";
const FIELD_CREATED_AT: &str = "created_at";
const FIELD_TOKENS: &str = "tokens";
const FIELD_TOKEN_ORDER: &str = "token_order";
const FIELD_RPC_URL: &str = "rpc_url";
const FIELD_EXPLORER_URL: &str = "explorer_url";
const FIELD_REQUIRE_PASSWORD: &str = "require_password";
const FIELD_BIOMETRIC_ENABLED: &str = "biometric_enabled";
const FIELD_BIOMETRIC_KEY: &str = "biometric_key";
const FIELD_BIOMETRIC_IV: &str = "biometric_iv";
const FIELD_PREFERRED_NFT: &str = "preferred_nft";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Database error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("No active wallet")]
    NoActiveWallet,

    #[error("Unknown wallet: {0}")]
    UnknownWallet(String),

    #[error("Wallet name cannot be blank")]
    InvalidName,

    #[error("Token order does not match the current token set")]
    TokenOrderMismatch,

    #[error("The base network currency cannot be removed")]
    BaseTokenProtected,

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Mnemonic error: {0}")]
    Mnemonic(#[from] MnemonicError),
}

/// Result of creating or importing a wallet. The mnemonic is surfaced once,
/// here, and never persisted.
#[derive(Debug)]
pub struct WalletCreation {
    pub public_key: String,
    pub mnemonic: Option<String>,
}

/// Outcome of a token-list addition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAddResult {
    Added,
    AlreadyExists,
    InvalidContract,
    NoActiveWallet,
}

pub struct WalletRegistry {
    db: sled::Db,
    secure: Arc<dyn SecureKeyProvider>,
    unlocked_key: Mutex<Option<Zeroizing<[u8; 32]>>>,
    active_tx: watch::Sender<Option<String>>,
}

impl WalletRegistry {
    /// Open (or create) the registry at `path` with the given secure key
    /// provider. The active pointer is validated against the wallet list on
    /// open and corrected if stale.
    pub fn open<P: AsRef<Path>>(
        path: P,
        secure: Arc<dyn SecureKeyProvider>,
    ) -> Result<Self, RegistryError> {
        let db = sled::open(path)?;
        let registry = Self {
            db,
            secure,
            unlocked_key: Mutex::new(None),
            active_tx: watch::channel(None).0,
        };

        let initial = registry.validated_active()?;
        if let Some(ref pk) = initial {
            registry.put(KEY_ACTIVE_WALLET, pk)?;
        }
        registry.active_tx.send_replace(initial);
        Ok(registry)
    }

    // ---- storage helpers ----

    fn wallet_key(public_key: &str, field: &str) -> String {
        format!("wallet:{}:{}", public_key, field)
    }

    fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), RegistryError> {
        let bytes = bincode::serialize(value)?;
        self.db.insert(key.as_bytes(), bytes)?;
        self.db.flush()?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, RegistryError> {
        match self.db.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn remove(&self, key: &str) -> Result<(), RegistryError> {
        self.db.remove(key.as_bytes())?;
        Ok(())
    }

    fn validated_active(&self) -> Result<Option<String>, RegistryError> {
        let wallets = self.list_wallets()?;
        let stored: Option<String> = self.get(KEY_ACTIVE_WALLET)?;
        Ok(match stored {
            Some(pk) if wallets.contains(&pk) => Some(pk),
            _ => wallets.first().cloned(),
        })
    }

    // ---- wallet lifecycle ----

    /// Create a new wallet from a fresh 24-word mnemonic, encrypt its key
    /// under `password`, and make it active. Returns the mnemonic for the
    /// one-time backup prompt.
    pub fn create_wallet(&self, password: &str) -> Result<WalletCreation, RegistryError> {
        let mnemonic = generate_mnemonic()?;
        let keypair = keypair_from_mnemonic(&mnemonic)?;
        let public_key = self.register_keypair(&keypair, password)?;
        log::info!("Created wallet {}", public_key);
        Ok(WalletCreation {
            public_key,
            mnemonic: Some(mnemonic),
        })
    }

    /// Import a wallet from a raw hex private key seed.
    pub fn import_from_private_key(
        &self,
        private_key_hex: &str,
        password: &str,
    ) -> Result<WalletCreation, RegistryError> {
        let keypair = import_from_private_key_hex(private_key_hex)?;
        let public_key = self.register_keypair(&keypair, password)?;
        log::info!("Imported wallet {} from private key", public_key);
        Ok(WalletCreation {
            public_key,
            mnemonic: None,
        })
    }

    /// Import a wallet from a 24-word recovery phrase. Validation failures
    /// surface as the distinct mnemonic error kinds.
    pub fn import_from_mnemonic(
        &self,
        phrase: &str,
        password: &str,
    ) -> Result<WalletCreation, RegistryError> {
        let keypair = keypair_from_mnemonic(phrase)?;
        let public_key = self.register_keypair(&keypair, password)?;
        log::info!("Imported wallet {} from mnemonic", public_key);
        Ok(WalletCreation {
            public_key,
            mnemonic: None,
        })
    }

    fn register_keypair(
        &self,
        keypair: &XianKeyPair,
        password: &str,
    ) -> Result<String, RegistryError> {
        let public_key = keypair.public_key_hex();
        let blob = encrypt_private_key(&keypair.seed(), password)?;
        self.put(&Self::wallet_key(&public_key, FIELD_ENCRYPTED_KEY), &blob)?;
        self.put(
            &Self::wallet_key(&public_key, FIELD_CREATED_AT),
            &chrono::Utc::now().timestamp(),
        )?;
        self.assign_default_name(&public_key)?;

        let mut wallets = self.list_wallets()?;
        if !wallets.contains(&public_key) {
            wallets.push(public_key.clone());
            self.put(KEY_WALLET_LIST, &wallets)?;
        }
        self.set_active(&public_key)?;
        Ok(public_key)
    }

    fn assign_default_name(&self, public_key: &str) -> Result<(), RegistryError> {
        let name_key = Self::wallet_key(public_key, FIELD_NAME);
        if self.get::<String>(&name_key)?.is_none() {
            let existing = self.list_wallets()?.len();
            let name = if existing == 0 {
                "My Wallet".to_string()
            } else {
                format!("My Wallet {}", existing + 1)
            };
            self.put(&name_key, &name)?;
        }
        Ok(())
    }

    pub fn has_wallet(&self) -> Result<bool, RegistryError> {
        Ok(!self.list_wallets()?.is_empty())
    }

    pub fn list_wallets(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self.get(KEY_WALLET_LIST)?.unwrap_or_default())
    }

    pub fn wallet_name(&self, public_key: &str) -> Result<Option<String>, RegistryError> {
        self.get(&Self::wallet_key(public_key, FIELD_NAME))
    }

    pub fn rename(&self, public_key: &str, name: &str) -> Result<(), RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::InvalidName);
        }
        if !self.list_wallets()?.contains(&public_key.to_string()) {
            return Err(RegistryError::UnknownWallet(public_key.to_string()));
        }
        self.put(&Self::wallet_key(public_key, FIELD_NAME), &name.to_string())
    }

    /// Delete a wallet and every setting namespaced under it. If it was the
    /// active wallet, the unlocked-key cache is cleared and the pointer
    /// moves to the first remaining wallet, or becomes empty. The shared
    /// secure-provider key is left alone.
    pub fn delete_wallet(&self, public_key: &str) -> Result<(), RegistryError> {
        let mut wallets = self.list_wallets()?;
        let Some(position) = wallets.iter().position(|pk| pk == public_key) else {
            return Err(RegistryError::UnknownWallet(public_key.to_string()));
        };

        for field in [
            FIELD_ENCRYPTED_KEY,
            FIELD_NAME,
            FIELD_CREATED_AT,
            FIELD_TOKENS,
            FIELD_TOKEN_ORDER,
            FIELD_RPC_URL,
            FIELD_EXPLORER_URL,
            FIELD_REQUIRE_PASSWORD,
            FIELD_BIOMETRIC_ENABLED,
            FIELD_BIOMETRIC_KEY,
            FIELD_BIOMETRIC_IV,
            FIELD_PREFERRED_NFT,
        ] {
            self.remove(&Self::wallet_key(public_key, field))?;
        }

        wallets.remove(position);
        self.put(KEY_WALLET_LIST, &wallets)?;

        if self.active_wallet() == Some(public_key.to_string()) {
            self.lock();
            match wallets.first() {
                Some(next) => {
                    self.put(KEY_ACTIVE_WALLET, next)?;
                    self.active_tx.send_replace(Some(next.clone()));
                    log::info!("Deleted active wallet; new active wallet is {}", next);
                }
                None => {
                    self.remove(KEY_ACTIVE_WALLET)?;
                    self.active_tx.send_replace(None);
                    log::info!("Deleted the last wallet");
                }
            }
        }
        self.db.flush()?;
        Ok(())
    }

    /// Wipe everything, including the shared secure-provider key. The only
    /// operation allowed to remove that key.
    pub fn wipe_all(&self) -> Result<(), RegistryError> {
        self.db.clear()?;
        self.db.flush()?;
        self.lock();
        if let Err(e) = self.secure.wipe() {
            log::error!("Failed to wipe secure provider key: {}", e);
        }
        self.active_tx.send_replace(None);
        log::warn!("Wiped all wallets and settings");
        Ok(())
    }

    // ---- active pointer ----

    pub fn active_wallet(&self) -> Option<String> {
        self.active_tx.borrow().clone()
    }

    /// Make `public_key` the active wallet. Clears the unlocked-key cache
    /// before observers can see the new value, so no reader observes a
    /// stale key.
    pub fn set_active(&self, public_key: &str) -> Result<(), RegistryError> {
        if !self.list_wallets()?.contains(&public_key.to_string()) {
            return Err(RegistryError::UnknownWallet(public_key.to_string()));
        }
        if self.active_wallet().as_deref() == Some(public_key) {
            return Ok(());
        }
        self.lock();
        self.put(KEY_ACTIVE_WALLET, &public_key.to_string())?;
        self.active_tx.send_replace(Some(public_key.to_string()));
        log::debug!("Active wallet set to {}", public_key);
        Ok(())
    }

    /// Subscribe to active-wallet changes; fires on every switch.
    pub fn subscribe_active(&self) -> watch::Receiver<Option<String>> {
        self.active_tx.subscribe()
    }

    fn require_active(&self) -> Result<String, RegistryError> {
        self.active_wallet().ok_or(RegistryError::NoActiveWallet)
    }

    // ---- unlocked-key cache ----

    /// Decrypt the active wallet's private key with `password` and cache it.
    pub fn unlock_wallet(&self, password: &str) -> Result<[u8; 32], RegistryError> {
        let public_key = self.require_active()?;
        let blob: String = self
            .get(&Self::wallet_key(&public_key, FIELD_ENCRYPTED_KEY))?
            .ok_or_else(|| RegistryError::UnknownWallet(public_key.clone()))?;
        let seed = decrypt_private_key(&blob, password, &public_key)?;
        *self.unlocked_key.lock() = Some(Zeroizing::new(seed));
        log::debug!("Unlocked wallet {}", public_key);
        Ok(seed)
    }

    /// The cached private key, if a wallet is unlocked.
    pub fn unlocked_private_key(&self) -> Option<[u8; 32]> {
        self.unlocked_key.lock().as_ref().map(|k| **k)
    }

    /// Drop the cached private key.
    pub fn lock(&self) {
        *self.unlocked_key.lock() = None;
    }

    // ---- per-wallet settings ----

    fn setting_or<T: DeserializeOwned>(
        &self,
        field: &str,
        default: T,
    ) -> Result<T, RegistryError> {
        match self.active_wallet() {
            Some(pk) => Ok(self
                .get(&Self::wallet_key(&pk, field))?
                .unwrap_or(default)),
            None => Ok(default),
        }
    }

    fn set_setting<T: Serialize>(&self, field: &str, value: &T) -> Result<(), RegistryError> {
        let pk = self.require_active()?;
        self.put(&Self::wallet_key(&pk, field), value)
    }

    pub fn rpc_url(&self) -> Result<String, RegistryError> {
        self.setting_or(FIELD_RPC_URL, DEFAULT_RPC_URL.to_string())
    }

    pub fn set_rpc_url(&self, url: &str) -> Result<(), RegistryError> {
        self.set_setting(FIELD_RPC_URL, &url.to_string())
    }

    pub fn explorer_url(&self) -> Result<String, RegistryError> {
        self.setting_or(FIELD_EXPLORER_URL, DEFAULT_EXPLORER_URL.to_string())
    }

    pub fn set_explorer_url(&self, url: &str) -> Result<(), RegistryError> {
        self.set_setting(FIELD_EXPLORER_URL, &url.to_string())
    }

    pub fn require_password_on_startup(&self) -> Result<bool, RegistryError> {
        self.setting_or(FIELD_REQUIRE_PASSWORD, false)
    }

    pub fn set_require_password_on_startup(&self, enabled: bool) -> Result<(), RegistryError> {
        self.set_setting(FIELD_REQUIRE_PASSWORD, &enabled)
    }

    pub fn preferred_nft_contract(&self) -> Result<Option<String>, RegistryError> {
        self.setting_or(FIELD_PREFERRED_NFT, None)
    }

    pub fn set_preferred_nft_contract(
        &self,
        contract: Option<String>,
    ) -> Result<(), RegistryError> {
        self.set_setting(FIELD_PREFERRED_NFT, &contract)
    }

    // ---- token list ----

    /// The active wallet's token set; always contains the base currency.
    pub fn token_list(&self) -> Result<Vec<String>, RegistryError> {
        let mut tokens: Vec<String> =
            self.setting_or(FIELD_TOKENS, vec![DEFAULT_TOKEN.to_string()])?;
        if !tokens.iter().any(|t| t == DEFAULT_TOKEN) {
            tokens.insert(0, DEFAULT_TOKEN.to_string());
        }
        Ok(tokens)
    }

    /// Tokens in display order: currency first, then the stored custom
    /// order, then anything new, alphabetical when no order is stored.
    pub fn ordered_token_list(&self) -> Result<Vec<String>, RegistryError> {
        let tokens = self.token_list()?;
        let stored: Vec<String> = self.setting_or(FIELD_TOKEN_ORDER, Vec::new())?;

        let mut ordered: Vec<String> = stored
            .into_iter()
            .filter(|t| t != DEFAULT_TOKEN && tokens.contains(t))
            .collect();
        let mut remaining: Vec<String> = tokens
            .iter()
            .filter(|t| *t != DEFAULT_TOKEN && !ordered.contains(t))
            .cloned()
            .collect();
        remaining.sort();
        ordered.extend(remaining);

        let mut result = vec![DEFAULT_TOKEN.to_string()];
        result.extend(ordered);
        Ok(result)
    }

    pub fn add_token(&self, contract: &str) -> Result<TokenAddResult, RegistryError> {
        if contract.trim().is_empty() {
            return Ok(TokenAddResult::InvalidContract);
        }
        let Some(pk) = self.active_wallet() else {
            return Ok(TokenAddResult::NoActiveWallet);
        };

        let mut tokens = self.token_list()?;
        if tokens.iter().any(|t| t == contract) {
            return Ok(TokenAddResult::AlreadyExists);
        }
        tokens.push(contract.to_string());
        self.put(&Self::wallet_key(&pk, FIELD_TOKENS), &tokens)?;
        Ok(TokenAddResult::Added)
    }

    /// Remove a token from the active wallet's list. The base currency is
    /// protected.
    pub fn remove_token(&self, contract: &str) -> Result<(), RegistryError> {
        if contract == DEFAULT_TOKEN {
            return Err(RegistryError::BaseTokenProtected);
        }
        let pk = self.require_active()?;
        let mut tokens = self.token_list()?;
        tokens.retain(|t| t != contract);
        self.put(&Self::wallet_key(&pk, FIELD_TOKENS), &tokens)
    }

    /// Store a custom token ordering. The request must be a permutation of
    /// the exact current token set; anything else rejects the whole reorder
    /// with no partial application.
    pub fn save_token_order(&self, ordered: &[String]) -> Result<(), RegistryError> {
        let pk = self.require_active()?;
        let tokens = self.token_list()?;

        let mut requested: Vec<&String> = ordered.iter().collect();
        let mut current: Vec<&String> = tokens.iter().collect();
        requested.sort();
        current.sort();
        if requested != current {
            return Err(RegistryError::TokenOrderMismatch);
        }

        // Currency is always rendered first, so only the rest is stored.
        let order: Vec<String> = ordered
            .iter()
            .filter(|t| *t != DEFAULT_TOKEN)
            .cloned()
            .collect();
        self.put(&Self::wallet_key(&pk, FIELD_TOKEN_ORDER), &order)
    }

    // ---- biometric / device unlock ----

    pub fn is_biometric_enabled(&self) -> Result<bool, RegistryError> {
        self.setting_or(FIELD_BIOMETRIC_ENABLED, false)
    }

    /// Obtain an encryption cipher from the secure provider. The provider
    /// runs its authorization challenge (the biometric prompt on device
    /// builds) before the cipher is usable.
    pub fn prepare_biometric_encryption(&self) -> Result<SecureCipher, RegistryError> {
        Ok(self.secure.prepare_encryption()?)
    }

    /// Finish enabling device unlock for the active wallet: re-validate the
    /// password, re-encrypt the key under the authorized cipher, persist
    /// ciphertext and IV.
    pub fn finalize_biometric_enable(
        &self,
        password: &str,
        cipher: &SecureCipher,
    ) -> Result<(), RegistryError> {
        let seed = Zeroizing::new(self.unlock_wallet(password)?);
        self.lock();

        let pk = self.require_active()?;
        let wrapped = match cipher.encrypt(seed.as_ref()) {
            Ok(wrapped) => wrapped,
            Err(e) => {
                log::error!("Device-unlock enable failed: {}", e);
                self.disable_biometric()?;
                return Err(e.into());
            }
        };

        self.put(&Self::wallet_key(&pk, FIELD_BIOMETRIC_KEY), &wrapped)?;
        self.put(
            &Self::wallet_key(&pk, FIELD_BIOMETRIC_IV),
            &cipher.iv().to_vec(),
        )?;
        self.put(&Self::wallet_key(&pk, FIELD_BIOMETRIC_ENABLED), &true)?;
        log::info!("Device unlock enabled for wallet {}", pk);
        Ok(())
    }

    /// Disable device unlock for the active wallet. Removes this wallet's
    /// wrapped key and IV only; the shared provider key stays because other
    /// wallets may still use it.
    pub fn disable_biometric(&self) -> Result<(), RegistryError> {
        let pk = self.require_active()?;
        self.remove(&Self::wallet_key(&pk, FIELD_BIOMETRIC_KEY))?;
        self.remove(&Self::wallet_key(&pk, FIELD_BIOMETRIC_IV))?;
        self.put(&Self::wallet_key(&pk, FIELD_BIOMETRIC_ENABLED), &false)?;
        log::info!("Device unlock disabled for wallet {}", pk);
        Ok(())
    }

    /// Obtain a decryption cipher for the active wallet's stored IV. Each
    /// call requires a fresh authorization challenge.
    pub fn biometric_cipher_for_decryption(&self) -> Result<SecureCipher, RegistryError> {
        let pk = self.require_active()?;
        let iv: Vec<u8> = self
            .get(&Self::wallet_key(&pk, FIELD_BIOMETRIC_IV))?
            .ok_or_else(|| {
                RegistryError::Crypto(CryptoError::SecureProviderUnavailable(
                    "no device-unlock data for this wallet".into(),
                ))
            })?;
        Ok(self.secure.cipher_for_decryption(&iv)?)
    }

    /// Unlock the active wallet with an authorized decryption cipher and
    /// populate the key cache. Every failure is a typed error; callers fall
    /// back to password entry.
    pub fn unlock_with_biometric_cipher(
        &self,
        cipher: &SecureCipher,
    ) -> Result<(), RegistryError> {
        let pk = self.require_active()?;
        let wrapped: Vec<u8> = self
            .get(&Self::wallet_key(&pk, FIELD_BIOMETRIC_KEY))?
            .ok_or_else(|| {
                RegistryError::Crypto(CryptoError::SecureProviderUnavailable(
                    "no device-unlock data for this wallet".into(),
                ))
            })?;

        let plain = Zeroizing::new(cipher.decrypt(&wrapped)?);
        let seed: [u8; 32] = plain
            .as_slice()
            .try_into()
            .map_err(|_| RegistryError::Crypto(CryptoError::BadPassword))?;
        *self.unlocked_key.lock() = Some(Zeroizing::new(seed));
        log::debug!("Unlocked wallet {} via device unlock", pk);
        Ok(())
    }
}

impl std::fmt::Debug for WalletRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("WalletRegistry")
            .field("active", &self.active_wallet())
            .finish_non_exhaustive()
    }
}

//! Xian Wallet Module
//!
//! Wallet identity and signing engine:
//! - BIP-39 mnemonic generation and validation with distinct error kinds
//! - Seed-to-keypair derivation (wire-compatible with existing wallets)
//! - Deterministic transaction canonicalization and signing
//! - Multi-wallet registry with per-wallet settings and encrypted keys
//! - In-memory unlocked-key cache with single-writer semantics

pub mod mnemonic;
pub mod registry;
pub mod transaction;

pub use mnemonic::{
    derive_keypair, generate_mnemonic, import_from_private_key_hex, keypair_from_mnemonic,
    seed_from_mnemonic, validate_mnemonic, MnemonicError,
};
pub use registry::{RegistryError, TokenAddResult, WalletCreation, WalletRegistry};
pub use transaction::{SignedTransaction, TransactionPayload, TxValue};

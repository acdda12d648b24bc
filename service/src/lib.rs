//! Transaction orchestration for the Xian wallet.
//!
//! Drives the full send pipeline (nonce and chain id collection, payload
//! assembly, provisional signing, stamp estimation, balance check, final
//! signing, broadcast) over a node seam the tests can mock, and exposes the
//! wallet's bridge surface for dApp hosts.

pub mod bridge;
pub mod config;
pub mod fee;
pub mod send;

use thiserror::Error;
use xian_wallet::transaction::TransactionError;

/// Failure taxonomy for the send pipeline. Crypto, mnemonic, registry, and
/// node errors keep their own enums in their crates; this is what the
/// orchestration layer itself can report.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("Insufficient balance ({balance} XIAN). You need approximately {required} XIAN to cover the fees for this transaction.")]
    InsufficientBalance { balance: f64, required: f64 },

    #[error("No connection to node. Please check your internet connection.")]
    NotConnected,

    #[error("{message}")]
    NodeRejected { tx_hash: String, message: String },

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
}

pub use bridge::{BridgeTxResponse, SignMessageResponse, WalletBridge, WalletInfo};
pub use config::NodeConfig;
pub use fee::FeeEstimate;
pub use send::{NodeApi, SendOutcome, SendRequest, TransactionService};

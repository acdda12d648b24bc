//! Xian node RPC client.
//!
//! HTTP transport against a node's status, ABCI query, broadcast, and
//! genesis endpoints, with candidate-list failover. Query methods keep the
//! caller's control flow linear: transport errors, timeouts, and malformed
//! responses decode to documented defaults (zero nonce, zero balance,
//! conservative stamp estimates) rather than propagating as crashes.

pub mod client;
pub mod types;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("No connection to any available node")]
    NotConnected,

    #[error("Unexpected response from node: {0}")]
    Protocol(String),
}

pub use client::NodeClient;
pub use types::{ContractMethod, MethodArgument, TokenInfo, TransactionResult};

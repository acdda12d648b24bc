//! The send pipeline.
//!
//! A transfer walks Building, Estimating, Finalizing, Signing, and
//! Broadcasting in strict sequence: the estimate depends on a fresh nonce
//! and chain id, and the final signature depends on the estimate. The
//! pipeline halts with `Rejected` before any broadcast when validation or
//! the balance check fails; after the broadcast is submitted the operation
//! is not cancellable and is never retried here (a resubmission would need
//! a fresh nonce).

use crate::fee::{self, FeeEstimate};
use crate::ServiceError;
use std::collections::BTreeMap;
use xian_crypto::XianKeyPair;
use xian_network::{NodeClient, NodeError, TransactionResult};
use xian_wallet::transaction::{TransactionPayload, TxValue};

/// Provisional stamp limit used while estimating.
pub const INITIAL_STAMP_LIMIT: u64 = 100_000;

/// Node operations the pipeline depends on. `NodeClient` is the production
/// implementation; tests substitute a recording mock.
#[allow(async_fn_in_trait)]
pub trait NodeApi {
    async fn check_connectivity(&self) -> bool;
    async fn get_nonce(&self, address: &str) -> u64;
    async fn get_chain_id(&self) -> String;
    async fn get_balance(&self, contract: &str, address: &str) -> f64;
    async fn estimate_stamps(&self, signed_tx_hex: &str) -> u64;
    async fn get_stamp_rate(&self) -> u64;
    async fn broadcast(&self, signed_tx_hex: &str) -> Result<TransactionResult, NodeError>;
}

impl NodeApi for NodeClient {
    async fn check_connectivity(&self) -> bool {
        NodeClient::check_connectivity(self).await
    }

    async fn get_nonce(&self, address: &str) -> u64 {
        NodeClient::get_nonce(self, address).await
    }

    async fn get_chain_id(&self) -> String {
        NodeClient::get_chain_id(self).await
    }

    async fn get_balance(&self, contract: &str, address: &str) -> f64 {
        NodeClient::get_balance(self, contract, address).await
    }

    async fn estimate_stamps(&self, signed_tx_hex: &str) -> u64 {
        NodeClient::estimate_stamps(self, signed_tx_hex).await
    }

    async fn get_stamp_rate(&self) -> u64 {
        NodeClient::get_stamp_rate(self).await
    }

    async fn broadcast(&self, signed_tx_hex: &str) -> Result<TransactionResult, NodeError> {
        NodeClient::broadcast(self, signed_tx_hex).await
    }
}

/// What the caller wants to execute.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub contract: String,
    pub function: String,
    pub kwargs: BTreeMap<String, TxValue>,
    /// Caller-supplied stamp limit; 0 means "estimate for me".
    pub stamp_limit: u64,
}

/// Terminal pipeline states. The error's `Display` form is the
/// user-facing message.
#[derive(Debug)]
pub enum SendOutcome {
    /// Accepted by the node.
    Confirmed { tx_hash: String },
    /// Halted before broadcast (validation or balance check).
    Rejected { error: ServiceError },
    /// Broadcast was attempted and failed, or no node was reachable.
    Failed { error: ServiceError },
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Building,
    Estimating,
    Finalizing,
    Signing,
    Broadcasting,
}

pub struct TransactionService<N> {
    node: N,
}

impl<N: NodeApi> TransactionService<N> {
    pub fn new(node: N) -> Self {
        Self { node }
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    /// Run the full pipeline for one transaction. Independent calls may run
    /// concurrently; within one call the round-trips are strictly ordered.
    pub async fn send_transaction(&self, request: SendRequest, seed: &[u8; 32]) -> SendOutcome {
        if request.contract.trim().is_empty() || request.function.trim().is_empty() {
            return SendOutcome::Rejected {
                error: ServiceError::Validation(
                    "Contract and function must not be blank".to_string(),
                ),
            };
        }

        log::debug!("{:?}: {}.{}", Stage::Building, request.contract, request.function);
        if !self.node.check_connectivity().await {
            return SendOutcome::Failed {
                error: ServiceError::NotConnected,
            };
        }

        let keypair = XianKeyPair::from_seed(seed);
        let sender = keypair.public_key_hex();

        let balance = self.node.get_balance("currency", &sender).await;
        let nonce = self.node.get_nonce(&sender).await;
        let chain_id = self.node.get_chain_id().await;
        log::debug!("nonce={} chain_id={} balance={}", nonce, chain_id, balance);

        let provisional_stamps = if request.stamp_limit > 0 {
            request.stamp_limit
        } else {
            INITIAL_STAMP_LIMIT
        };

        let mut payload = TransactionPayload {
            chain_id,
            sender: sender.clone(),
            nonce,
            contract: request.contract.clone(),
            function: request.function.clone(),
            kwargs: request.kwargs.clone(),
            stamps_supplied: provisional_stamps,
        };

        log::debug!("{:?}", Stage::Estimating);
        let provisional = match payload.sign(&keypair) {
            Ok(signed) => signed,
            Err(e) => {
                log::error!("Signing failed: {}", e);
                return SendOutcome::Failed { error: e.into() };
            }
        };
        let stamps = self.node.estimate_stamps(&provisional.to_hex()).await;
        let rate = self.node.get_stamp_rate().await;

        let cost = fee::clamp_fee(
            fee::stamps_to_xian(stamps, rate),
            &request.contract,
            &request.function,
        );
        let estimate = FeeEstimate {
            stamps,
            xian_cost: cost,
        };
        log::debug!(
            "Estimated {} stamps (~{} XIAN at rate {})",
            estimate.stamps,
            estimate.xian_cost,
            rate
        );

        if !fee::balance_covers(balance, cost) {
            log::warn!("Insufficient balance: have {} need ~{}", balance, cost);
            return SendOutcome::Rejected {
                error: ServiceError::InsufficientBalance {
                    balance,
                    required: cost,
                },
            };
        }

        log::debug!("{:?}", Stage::Finalizing);
        payload.stamps_supplied = stamps;

        log::debug!("{:?}", Stage::Signing);
        let signed = match payload.sign(&keypair) {
            Ok(signed) => signed,
            Err(e) => {
                log::error!("Final signing failed: {}", e);
                return SendOutcome::Failed { error: e.into() };
            }
        };

        log::debug!("{:?}", Stage::Broadcasting);
        match self.node.broadcast(&signed.to_hex()).await {
            Ok(TransactionResult {
                tx_hash,
                success: true,
                ..
            }) => {
                log::info!("Transaction confirmed: {}", tx_hash);
                SendOutcome::Confirmed { tx_hash }
            }
            Ok(TransactionResult {
                tx_hash, errors, ..
            }) => {
                let node_log = errors.unwrap_or_else(|| "Unknown error".to_string());
                let message = if node_log.contains("too few stamps") {
                    "Transaction error: Insufficient stamps. Please try again with a smaller amount or contact support."
                        .to_string()
                } else {
                    format!("Transaction error: {}", node_log)
                };
                log::error!("Node rejected transaction: {}", node_log);
                SendOutcome::Failed {
                    error: ServiceError::NodeRejected { tx_hash, message },
                }
            }
            Err(NodeError::NotConnected) => SendOutcome::Failed {
                error: ServiceError::NotConnected,
            },
            Err(e) => SendOutcome::Failed {
                error: ServiceError::NodeRejected {
                    tx_hash: String::new(),
                    message: format!("Transaction error: {}", e),
                },
            },
        }
    }

    /// Estimate the stamp cost of a prospective call without broadcasting:
    /// build and sign a throwaway payload, run it through the estimation
    /// endpoint. `None` when no node is reachable.
    pub async fn estimate_transaction_fee(
        &self,
        contract: &str,
        function: &str,
        kwargs: BTreeMap<String, TxValue>,
        seed: &[u8; 32],
    ) -> Option<u64> {
        if !self.node.check_connectivity().await {
            log::error!("No node connection for fee estimation");
            return None;
        }

        let keypair = XianKeyPair::from_seed(seed);
        let sender = keypair.public_key_hex();
        let payload = TransactionPayload {
            chain_id: self.node.get_chain_id().await,
            sender: sender.clone(),
            nonce: self.node.get_nonce(&sender).await,
            contract: contract.to_string(),
            function: function.to_string(),
            kwargs,
            stamps_supplied: INITIAL_STAMP_LIMIT,
        };

        let signed = match payload.sign(&keypair) {
            Ok(signed) => signed,
            Err(e) => {
                log::error!("Estimation signing failed: {}", e);
                return None;
            }
        };
        Some(self.node.estimate_stamps(&signed.to_hex()).await)
    }
}

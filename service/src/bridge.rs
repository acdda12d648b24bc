//! The wallet surface exposed to the embedded web-view / dApp host.
//!
//! A `null` password from the host means "use the in-memory unlocked key
//! if present"; that path is only honored when the wallet was unlocked at
//! startup. Every response is a serializable struct with a `success` flag,
//! never a panic.

use crate::send::{NodeApi, SendOutcome, SendRequest, TransactionService};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use xian_wallet::transaction::TxValue;
use xian_wallet::WalletRegistry;

#[derive(Debug, Serialize, PartialEq)]
pub struct SignMessageResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct BridgeTxResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<String>,
}

impl BridgeTxResponse {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            txid: None,
            status: "failed".to_string(),
            errors: Some(message),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct WalletInfo {
    pub address: String,
    pub network: String,
}

pub struct WalletBridge<N> {
    registry: Arc<WalletRegistry>,
    service: TransactionService<N>,
}

impl<N: NodeApi> WalletBridge<N> {
    pub fn new(registry: Arc<WalletRegistry>, service: TransactionService<N>) -> Self {
        Self { registry, service }
    }

    /// Resolve the signing key per the host contract: cached key when
    /// startup auth covered it, otherwise the provided password.
    fn resolve_key(&self, password: Option<&str>) -> Result<[u8; 32], String> {
        let startup_auth = self.registry.require_password_on_startup().unwrap_or(false);

        if startup_auth && password.is_none() {
            self.registry
                .unlocked_private_key()
                .ok_or_else(|| "Failed to retrieve cached key.".to_string())
        } else if let Some(password) = password {
            if password.is_empty() {
                Err("Password cannot be empty.".to_string())
            } else {
                self.registry
                    .unlock_wallet(password)
                    .map_err(|_| "Invalid password.".to_string())
            }
        } else {
            Err("Password is required when not authenticated at startup.".to_string())
        }
    }

    pub fn sign_message(&self, message: &str, password: Option<&str>) -> SignMessageResponse {
        let seed = match self.resolve_key(password) {
            Ok(seed) => seed,
            Err(error) => {
                log::warn!("signMessage key resolution failed: {}", error);
                return SignMessageResponse {
                    success: false,
                    signature: None,
                    message: None,
                    error: Some(error),
                };
            }
        };

        let signature = xian_crypto::sign_message(message.as_bytes(), &seed);
        SignMessageResponse {
            success: true,
            signature: Some(signature),
            message: Some(message.to_string()),
            error: None,
        }
    }

    pub async fn send_transaction(
        &self,
        contract: &str,
        method: &str,
        kwargs_json: &str,
        password: Option<&str>,
        stamp_limit: u64,
    ) -> BridgeTxResponse {
        let seed = match self.resolve_key(password) {
            Ok(seed) => seed,
            Err(error) => {
                log::warn!("sendTransaction key resolution failed: {}", error);
                return BridgeTxResponse::failure(error);
            }
        };

        let kwargs = match parse_kwargs(kwargs_json) {
            Ok(kwargs) => kwargs,
            Err(error) => return BridgeTxResponse::failure(error),
        };

        let request = SendRequest {
            contract: contract.to_string(),
            function: method.to_string(),
            kwargs,
            stamp_limit,
        };

        match self.service.send_transaction(request, &seed).await {
            SendOutcome::Confirmed { tx_hash } => BridgeTxResponse {
                success: true,
                txid: Some(tx_hash),
                status: "pending".to_string(),
                errors: None,
            },
            SendOutcome::Rejected { error } | SendOutcome::Failed { error } => {
                BridgeTxResponse::failure(error.to_string())
            }
        }
    }

    pub fn get_wallet_info(&self) -> WalletInfo {
        WalletInfo {
            address: self.registry.active_wallet().unwrap_or_default(),
            network: self
                .registry
                .rpc_url()
                .unwrap_or_else(|_| xian_wallet::registry::DEFAULT_RPC_URL.to_string()),
        }
    }

    pub fn is_password_required_on_startup(&self) -> bool {
        self.registry.require_password_on_startup().unwrap_or(false)
    }
}

fn parse_kwargs(kwargs_json: &str) -> Result<BTreeMap<String, TxValue>, String> {
    let parsed: serde_json::Value = serde_json::from_str(kwargs_json)
        .map_err(|e| format!("Invalid kwargs JSON: {}", e))?;
    match TxValue::from_json(&parsed) {
        TxValue::Map(map) => Ok(map),
        _ => Err("Invalid kwargs JSON: expected an object".to_string()),
    }
}

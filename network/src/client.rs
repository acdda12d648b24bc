//! HTTP client for Xian node RPC.
//!
//! One client per wallet session. The configured endpoint is tried first
//! for every logical operation; when it stops answering, the candidate list
//! is probed in order and the first responder becomes current. Failover is
//! decided at operation start, never mid-request.

use crate::types::{
    decode_abci_value, AbciQueryResponse, BroadcastResponse, ContractMethod, GenesisResponse,
    MethodsWrapper, SimulationResult, StampEstimate, TokenInfo, TransactionResult,
};
use crate::NodeError;
use parking_lot::Mutex;
use std::time::Duration;

/// Fallback when the chain id cannot be fetched.
pub const DEFAULT_CHAIN_ID: &str = "xian";

/// Conservative stamp limit used when estimation fails.
pub const DEFAULT_STAMP_LIMIT: u64 = 200_000;

/// Fallback stamps-per-XIAN rate.
pub const DEFAULT_STAMP_RATE: u64 = 10_000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub struct NodeClient {
    client: reqwest::Client,
    candidates: Vec<String>,
    current: Mutex<String>,
    chain_id: Mutex<Option<String>>,
}

impl NodeClient {
    /// Build a client over an ordered candidate list; the first entry is
    /// the initially configured endpoint.
    pub fn new(node_urls: Vec<String>) -> Self {
        let current = node_urls
            .first()
            .cloned()
            .unwrap_or_else(|| "https://node.xian.org".to_string());
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            candidates: node_urls,
            current: Mutex::new(current),
            chain_id: Mutex::new(None),
        }
    }

    /// The endpoint currently in use.
    pub fn current_url(&self) -> String {
        self.current.lock().clone()
    }

    /// Point the client at a different endpoint (per-wallet RPC setting).
    pub fn set_current_url(&self, url: &str) {
        *self.current.lock() = url.to_string();
    }

    /// Probe a single node's health endpoint.
    pub async fn probe(&self, url: &str) -> bool {
        match self.client.get(format!("{}/status", url)).send().await {
            Ok(response) => {
                let ok = response.status().is_success();
                log::debug!("Probe {}: {}", url, response.status());
                ok
            }
            Err(e) => {
                log::debug!("Probe {} failed: {}", url, e);
                false
            }
        }
    }

    /// Walk the candidate list and adopt the first responding node.
    pub async fn find_working_node(&self) -> bool {
        for url in &self.candidates {
            if self.probe(url).await {
                log::info!("Using node {}", url);
                *self.current.lock() = url.clone();
                return true;
            }
        }
        false
    }

    /// Check the current endpoint, failing over to a candidate if it is
    /// unreachable. Returns whether any node answered.
    pub async fn check_connectivity(&self) -> bool {
        let current = self.current_url();
        if self.probe(&current).await {
            return true;
        }
        log::warn!("Node {} unreachable, probing candidates", current);
        self.find_working_node().await
    }

    async fn ensure_connected(&self) -> Result<(), NodeError> {
        if self.check_connectivity().await {
            Ok(())
        } else {
            Err(NodeError::NotConnected)
        }
    }

    /// Run an ABCI path query and decode `result.response.value`. Every
    /// failure mode decodes to `None`.
    async fn abci_query(&self, path: &str) -> Option<String> {
        let url = format!("{}/abci_query", self.current_url());
        let quoted = format!("\"{}\"", path);

        let response = match self.client.get(&url).query(&[("path", quoted)]).send().await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("abci_query {} failed: {}", path, e);
                return None;
            }
        };
        if !response.status().is_success() {
            log::warn!("abci_query {} returned {}", path, response.status());
            return None;
        }
        match response.json::<AbciQueryResponse>().await {
            Ok(body) => decode_abci_value(body.value()),
            Err(e) => {
                log::warn!("abci_query {} returned malformed body: {}", path, e);
                None
            }
        }
    }

    /// Next nonce for an address. An absent or sentinel value is nonce 0;
    /// so is any transport or parse failure.
    pub async fn get_nonce(&self, address: &str) -> u64 {
        let decoded = self
            .abci_query(&format!("/get_next_nonce/{}", address))
            .await;
        decoded
            .and_then(|value| value.trim().parse::<u64>().ok())
            .unwrap_or(0)
    }

    /// Chain id from the genesis document, cached for the process lifetime
    /// once fetched. Falls back to `"xian"`.
    pub async fn get_chain_id(&self) -> String {
        if let Some(cached) = self.chain_id.lock().clone() {
            return cached;
        }
        if !self.check_connectivity().await {
            log::error!("No node connection; using default chain id");
            return DEFAULT_CHAIN_ID.to_string();
        }

        let url = format!("{}/genesis", self.current_url());
        let fetched = match self.client.get(&url).send().await {
            Ok(response) => response
                .json::<GenesisResponse>()
                .await
                .ok()
                .and_then(|body| body.result)
                .and_then(|result| result.genesis)
                .and_then(|genesis| genesis.chain_id),
            Err(e) => {
                log::error!("Error fetching genesis: {}", e);
                None
            }
        };

        match fetched {
            Some(chain_id) => {
                log::debug!("Chain id: {}", chain_id);
                *self.chain_id.lock() = Some(chain_id.clone());
                chain_id
            }
            None => DEFAULT_CHAIN_ID.to_string(),
        }
    }

    /// Token balance for an address. Tries a simulated `balance_of` call
    /// first, then the direct state variable. Absent values and every
    /// failure mode decode to 0.0.
    pub async fn get_balance(&self, contract: &str, address: &str) -> f64 {
        if !self.check_connectivity().await {
            log::error!("No node connection; reporting zero balance");
            return 0.0;
        }

        // Simulated contract call. The payload here is a read-only probe,
        // not a signed transaction.
        let payload = serde_json::json!({
            "sender": address,
            "contract": contract,
            "function": "balance_of",
            "kwargs": { "address": address },
        });
        let payload_hex = hex::encode(payload.to_string().as_bytes());

        if let Some(decoded) = self
            .abci_query(&format!("/simulate_tx/{}", payload_hex))
            .await
        {
            if let Ok(simulation) = serde_json::from_str::<SimulationResult>(&decoded) {
                if let Some(balance) = simulation.result.and_then(|v| json_number(&v)) {
                    return round_to_tenth(balance);
                }
            }
        }

        // Fallback: read the balances hash directly.
        let decoded = self
            .abci_query(&format!("/get/{}.balances:{}", contract, address))
            .await;
        decoded
            .and_then(|value| value.trim().parse::<f64>().ok())
            .map(round_to_tenth)
            .unwrap_or(0.0)
    }

    /// Estimate the stamps a signed transaction would consume. The input is
    /// the hex form of the full signed transaction. Estimation failure
    /// falls back to a conservative default rather than failing the caller.
    pub async fn estimate_stamps(&self, signed_tx_hex: &str) -> u64 {
        if !self.check_connectivity().await {
            log::error!("No node connection; using default stamp limit");
            return DEFAULT_STAMP_LIMIT;
        }

        let decoded = self
            .abci_query(&format!("/calculate_stamps/{}", signed_tx_hex))
            .await;
        let estimate = decoded.and_then(|value| serde_json::from_str::<StampEstimate>(&value).ok());

        match estimate {
            Some(e) if e.status == 0 && e.stamps_used > 0 => e.stamps_used,
            other => {
                log::warn!("Stamp estimation inconclusive ({:?}), using default", other);
                DEFAULT_STAMP_LIMIT
            }
        }
    }

    /// Stamps-per-XIAN conversion rate from chain state.
    pub async fn get_stamp_rate(&self) -> u64 {
        let decoded = self.abci_query("/get/stamp_cost.S:value").await;
        decoded
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|rate| *rate > 0)
            .unwrap_or(DEFAULT_STAMP_RATE)
    }

    /// Broadcast a signed transaction (hex form). `Err(NotConnected)` is a
    /// transport failure; a node rejection comes back as
    /// `Ok(TransactionResult { success: false, .. })` with the node's
    /// message.
    pub async fn broadcast(&self, signed_tx_hex: &str) -> Result<TransactionResult, NodeError> {
        self.ensure_connected().await?;

        let url = format!("{}/broadcast_tx_sync", self.current_url());
        let quoted = format!("\"{}\"", signed_tx_hex);
        let response = self
            .client
            .get(&url)
            .query(&[("tx", quoted)])
            .send()
            .await
            .map_err(|e| {
                log::error!("Broadcast transport error: {}", e);
                NodeError::NotConnected
            })?;

        let body = response.text().await.map_err(|e| {
            log::error!("Broadcast body error: {}", e);
            NodeError::NotConnected
        })?;
        log::debug!("Broadcast response: {}", body);
        Ok(parse_broadcast_body(&body))
    }

    /// Raw transaction lookup by hash. Errors come back as an error JSON
    /// body rather than a crash.
    pub async fn get_transaction(&self, tx_hash: &str) -> String {
        if !self.check_connectivity().await {
            return r#"{"error":"No connection to node"}"#.to_string();
        }

        let url = format!("{}/tx", self.current_url());
        let quoted = format!("\"{}\"", tx_hash);
        match self.client.get(&url).query(&[("hash", quoted)]).send().await {
            Ok(response) => response
                .text()
                .await
                .unwrap_or_else(|e| format!(r#"{{"error":"{}"}}"#, e)),
            Err(e) => format!(r#"{{"error":"{}"}}"#, e),
        }
    }

    /// Token metadata from contract state, with contract-derived fallbacks.
    pub async fn get_token_info(&self, contract: &str) -> TokenInfo {
        if contract == "currency" {
            return TokenInfo {
                name: "Xian".to_string(),
                symbol: "XIAN".to_string(),
                contract: contract.to_string(),
                logo_url: None,
            };
        }

        let fallback_symbol = contract.chars().take(3).collect::<String>().to_uppercase();
        if !self.check_connectivity().await {
            return TokenInfo {
                name: contract.to_string(),
                symbol: fallback_symbol,
                contract: contract.to_string(),
                logo_url: None,
            };
        }

        let name = self
            .abci_query(&format!("/get/{}.metadata:token_name", contract))
            .await;
        let symbol = self
            .abci_query(&format!("/get/{}.metadata:token_symbol", contract))
            .await;
        let logo_url = self
            .abci_query(&format!("/get/{}.metadata:token_logo_url", contract))
            .await;

        TokenInfo {
            name: name.unwrap_or_else(|| contract.to_string()),
            symbol: symbol.unwrap_or(fallback_symbol),
            contract: contract.to_string(),
            logo_url,
        }
    }

    /// Methods and argument signatures a contract exposes, or `None` when
    /// the contract is unknown or the response is malformed.
    pub async fn get_contract_methods(&self, contract: &str) -> Option<Vec<ContractMethod>> {
        if !self.check_connectivity().await {
            return None;
        }

        let decoded = self
            .abci_query(&format!("/contract_methods/{}", contract))
            .await?;
        match serde_json::from_str::<MethodsWrapper>(&decoded) {
            Ok(wrapper) => Some(wrapper.methods.unwrap_or_default()),
            Err(e) => {
                log::warn!("Malformed contract_methods for {}: {}", contract, e);
                None
            }
        }
    }
}

impl std::fmt::Debug for NodeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("NodeClient")
            .field("current", &self.current_url())
            .field("candidates", &self.candidates.len())
            .finish_non_exhaustive()
    }
}

/// Interpret a broadcast_tx_sync body: an explicit error object or a
/// non-zero result code is a failure carrying the node's message; code 0 is
/// success with the transaction hash.
pub fn parse_broadcast_body(body: &str) -> TransactionResult {
    let parsed: BroadcastResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(_) => {
            return TransactionResult {
                tx_hash: String::new(),
                success: false,
                errors: Some("Unexpected response from node".to_string()),
            }
        }
    };

    if let Some(error) = parsed.error {
        let message = error
            .data
            .or(error.message)
            .unwrap_or_else(|| "Unknown error".to_string());
        return TransactionResult {
            tx_hash: String::new(),
            success: false,
            errors: Some(message),
        };
    }

    match parsed.result {
        Some(result) => {
            let hash = result.hash.unwrap_or_default();
            if result.code == 0 {
                TransactionResult {
                    tx_hash: hash,
                    success: true,
                    errors: None,
                }
            } else {
                TransactionResult {
                    tx_hash: hash,
                    success: false,
                    errors: Some(
                        result
                            .log
                            .unwrap_or_else(|| "Unknown error".to_string()),
                    ),
                }
            }
        }
        None => TransactionResult {
            tx_hash: String::new(),
            success: false,
            errors: Some("Unexpected response from node".to_string()),
        },
    }
}

fn json_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Balances render at one decimal place, half away from zero.
fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_success() {
        let body = r#"{"result":{"hash":"ABC123","code":0,"log":""}}"#;
        let result = parse_broadcast_body(body);
        assert!(result.success);
        assert_eq!(result.tx_hash, "ABC123");
        assert!(result.errors.is_none());
    }

    #[test]
    fn test_broadcast_node_rejection_carries_log() {
        let body = r#"{"result":{"hash":"ABC123","code":1,"log":"too few stamps"}}"#;
        let result = parse_broadcast_body(body);
        assert!(!result.success);
        assert_eq!(result.tx_hash, "ABC123");
        assert_eq!(result.errors.as_deref(), Some("too few stamps"));
    }

    #[test]
    fn test_broadcast_explicit_error_object() {
        let body = r#"{"error":{"message":"tx parse error","data":"invalid hex"}}"#;
        let result = parse_broadcast_body(body);
        assert!(!result.success);
        assert_eq!(result.errors.as_deref(), Some("invalid hex"));
    }

    #[test]
    fn test_broadcast_garbage_body() {
        let result = parse_broadcast_body("<html>502</html>");
        assert!(!result.success);
        assert!(result.errors.is_some());
    }

    #[test]
    fn test_broadcast_missing_code_is_failure() {
        let body = r#"{"result":{"hash":"ABC123"}}"#;
        let result = parse_broadcast_body(body);
        assert!(!result.success);
    }

    #[test]
    fn test_round_to_tenth() {
        assert_eq!(round_to_tenth(1.25), 1.3);
        assert_eq!(round_to_tenth(0.04), 0.0);
        assert_eq!(round_to_tenth(10.0), 10.0);
    }

    #[test]
    fn test_json_number_accepts_strings_and_numbers() {
        assert_eq!(json_number(&serde_json::json!(1.5)), Some(1.5));
        assert_eq!(json_number(&serde_json::json!("2.25")), Some(2.25));
        assert_eq!(json_number(&serde_json::json!(true)), None);
    }

    #[tokio::test]
    async fn test_unreachable_node_defaults() {
        // Point at a port nothing listens on; every query should fall back
        // to its documented default instead of erroring.
        let client = NodeClient::new(vec!["http://127.0.0.1:1".to_string()]);

        assert!(!client.check_connectivity().await);
        assert_eq!(client.get_nonce("abc").await, 0);
        assert_eq!(client.get_chain_id().await, DEFAULT_CHAIN_ID);
        assert_eq!(client.get_balance("currency", "abc").await, 0.0);
        assert_eq!(client.estimate_stamps("deadbeef").await, DEFAULT_STAMP_LIMIT);
        assert!(matches!(
            client.broadcast("deadbeef").await,
            Err(NodeError::NotConnected)
        ));
    }
}

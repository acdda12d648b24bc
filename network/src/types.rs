//! Wire types for the node RPC endpoints.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;

/// The node encodes "absent / zero" state values as this base64 sentinel.
pub const EMPTY_SENTINEL: &str = "AA==";

/// Envelope of every `abci_query` response: the interesting part is the
/// base64 string at `result.response.value`.
#[derive(Debug, Deserialize)]
pub struct AbciQueryResponse {
    #[serde(default)]
    pub result: Option<AbciResult>,
}

#[derive(Debug, Deserialize)]
pub struct AbciResult {
    #[serde(default)]
    pub response: Option<AbciResponseValue>,
}

#[derive(Debug, Deserialize)]
pub struct AbciResponseValue {
    #[serde(default)]
    pub value: Option<String>,
}

impl AbciQueryResponse {
    pub fn value(&self) -> Option<&str> {
        self.result
            .as_ref()?
            .response
            .as_ref()?
            .value
            .as_deref()
    }
}

/// Decode an ABCI value: `None`, the empty string, and the `"AA=="`
/// sentinel all mean "absent", never an error. Invalid base64 or non-UTF-8
/// content also decodes to absent.
pub fn decode_abci_value(value: Option<&str>) -> Option<String> {
    let value = value?;
    if value.is_empty() || value == EMPTY_SENTINEL {
        return None;
    }
    let bytes = BASE64.decode(value).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    if decoded.is_empty() || decoded == "null" {
        return None;
    }
    Some(decoded)
}

#[derive(Debug, Deserialize)]
pub struct GenesisResponse {
    #[serde(default)]
    pub result: Option<GenesisResult>,
}

#[derive(Debug, Deserialize)]
pub struct GenesisResult {
    #[serde(default)]
    pub genesis: Option<GenesisDoc>,
}

#[derive(Debug, Deserialize)]
pub struct GenesisDoc {
    #[serde(default)]
    pub chain_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastResponse {
    #[serde(default)]
    pub error: Option<RpcError>,
    #[serde(default)]
    pub result: Option<BroadcastResult>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastResult {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default = "default_code")]
    pub code: i64,
    #[serde(default)]
    pub log: Option<String>,
}

fn default_code() -> i64 {
    -1
}

/// Stamp-estimation result carried inside the `calculate_stamps` value.
#[derive(Debug, Deserialize)]
pub struct StampEstimate {
    #[serde(default)]
    pub stamps_used: u64,
    #[serde(default = "default_status")]
    pub status: i64,
}

fn default_status() -> i64 {
    -1
}

/// Read-only simulation result (`balance_of` and similar calls).
#[derive(Debug, Deserialize)]
pub struct SimulationResult {
    pub result: Option<serde_json::Value>,
}

/// Outcome of a broadcast, as reported by the node.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionResult {
    pub tx_hash: String,
    pub success: bool,
    pub errors: Option<String>,
}

/// Token metadata resolved from contract state.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub contract: String,
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MethodArgument {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ContractMethod {
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<MethodArgument>,
}

#[derive(Debug, Deserialize)]
pub struct MethodsWrapper {
    #[serde(default)]
    pub methods: Option<Vec<ContractMethod>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_decodes_to_absent() {
        assert_eq!(decode_abci_value(Some(EMPTY_SENTINEL)), None);
        assert_eq!(decode_abci_value(Some("")), None);
        assert_eq!(decode_abci_value(None), None);
    }

    #[test]
    fn test_value_decodes_base64() {
        // base64("42") == "NDI="
        assert_eq!(decode_abci_value(Some("NDI=")), Some("42".to_string()));
    }

    #[test]
    fn test_invalid_base64_decodes_to_absent() {
        assert_eq!(decode_abci_value(Some("!!!not-base64!!!")), None);
    }

    #[test]
    fn test_null_literal_decodes_to_absent() {
        // base64("null") == "bnVsbA=="
        assert_eq!(decode_abci_value(Some("bnVsbA==")), None);
    }

    #[test]
    fn test_abci_envelope_extraction() {
        let body = r#"{"result":{"response":{"value":"NDI="}}}"#;
        let parsed: AbciQueryResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.value(), Some("NDI="));

        let empty = r#"{"result":{"response":{}}}"#;
        let parsed: AbciQueryResponse = serde_json::from_str(empty).unwrap();
        assert_eq!(parsed.value(), None);

        let bare = r#"{}"#;
        let parsed: AbciQueryResponse = serde_json::from_str(bare).unwrap();
        assert_eq!(parsed.value(), None);
    }

    #[test]
    fn test_stamp_estimate_parsing() {
        let decoded = r#"{"stamps_used":12345,"status":0}"#;
        let estimate: StampEstimate = serde_json::from_str(decoded).unwrap();
        assert_eq!(estimate.stamps_used, 12345);
        assert_eq!(estimate.status, 0);

        // Missing status defaults to failure.
        let decoded = r#"{"stamps_used":12345}"#;
        let estimate: StampEstimate = serde_json::from_str(decoded).unwrap();
        assert_eq!(estimate.status, -1);
    }

    #[test]
    fn test_contract_methods_parsing() {
        let decoded = r#"{"methods":[{"name":"transfer","arguments":[{"name":"amount","type":"float"},{"name":"to","type":"str"}]}]}"#;
        let wrapper: MethodsWrapper = serde_json::from_str(decoded).unwrap();
        let methods = wrapper.methods.unwrap();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name, "transfer");
        assert_eq!(methods[0].arguments[1].type_name, "str");
    }
}

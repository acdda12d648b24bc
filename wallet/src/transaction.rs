//! Transaction payload construction, canonicalization, and signing.
//!
//! Signature validity depends on exact bytes: the payload is serialized to
//! compact JSON with every object's keys in ascending lexicographic order
//! (nested kwargs maps included), and the signature is computed over those
//! UTF-8 bytes. Two payloads with identical content must canonicalize to
//! identical bytes regardless of how their maps were populated; `BTreeMap`
//! carries that invariant through `serde_json`.

use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use xian_crypto::{sign_transaction, verify_signature, CryptoError, XianKeyPair};

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Invalid decimal literal: {0}")]
    InvalidDecimal(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Tagged kwargs value with a deterministic serialization.
///
/// Numeric amounts travel as base-10 decimal strings (`Decimal`), never as
/// floats, so no precision is lost between the caller and the canonical
/// bytes. Plain integers (nonces, counts) stay JSON numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum TxValue {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(String),
    Str(String),
    List(Vec<TxValue>),
    Map(BTreeMap<String, TxValue>),
}

impl TxValue {
    /// Validated base-10 decimal literal, e.g. `"10"`, `"0.25"`, `"-3.5"`.
    pub fn decimal(literal: impl Into<String>) -> Result<Self, TransactionError> {
        let literal = literal.into();
        let unsigned = literal.strip_prefix('-').unwrap_or(&literal);
        let mut parts = unsigned.splitn(2, '.');
        let int_part = parts.next().unwrap_or("");
        let frac_part = parts.next();

        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        let valid = digits(int_part) && frac_part.map_or(true, digits);
        if !valid {
            return Err(TransactionError::InvalidDecimal(literal));
        }
        Ok(TxValue::Decimal(literal))
    }

    /// Convert parsed caller JSON (e.g. bridge kwargs) into tagged values.
    /// Floating-point numbers become decimal strings.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => TxValue::Null,
            Value::Bool(b) => TxValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => TxValue::Int(i),
                None => TxValue::Decimal(n.to_string()),
            },
            Value::String(s) => TxValue::Str(s.clone()),
            Value::Array(items) => TxValue::List(items.iter().map(TxValue::from_json).collect()),
            Value::Object(map) => TxValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), TxValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            TxValue::Null => Value::Null,
            TxValue::Bool(b) => Value::Bool(*b),
            TxValue::Int(i) => Value::Number(Number::from(*i)),
            TxValue::Decimal(s) => Value::String(s.clone()),
            TxValue::Str(s) => Value::String(s.clone()),
            TxValue::List(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
            TxValue::Map(map) => {
                let mut object = Map::new();
                for (key, value) in map {
                    object.insert(key.clone(), value.to_json());
                }
                Value::Object(object)
            }
        }
    }
}

/// The payload that gets canonicalized and signed.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionPayload {
    pub chain_id: String,
    pub sender: String,
    pub nonce: u64,
    pub contract: String,
    pub function: String,
    pub kwargs: BTreeMap<String, TxValue>,
    pub stamps_supplied: u64,
}

impl TransactionPayload {
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert("chain_id".into(), Value::String(self.chain_id.clone()));
        object.insert("sender".into(), Value::String(self.sender.clone()));
        object.insert("nonce".into(), Value::Number(Number::from(self.nonce)));
        object.insert("contract".into(), Value::String(self.contract.clone()));
        object.insert("function".into(), Value::String(self.function.clone()));
        let mut kwargs = Map::new();
        for (key, value) in &self.kwargs {
            kwargs.insert(key.clone(), value.to_json());
        }
        object.insert("kwargs".into(), Value::Object(kwargs));
        object.insert(
            "stamps_supplied".into(),
            Value::Number(Number::from(self.stamps_supplied)),
        );
        Value::Object(object)
    }

    /// Canonical UTF-8 bytes: compact JSON, keys ascending at every level.
    pub fn canonicalize(&self) -> Vec<u8> {
        // serde_json's default object representation is a BTreeMap, so the
        // string form comes out key-sorted at every nesting level.
        self.to_json().to_string().into_bytes()
    }

    /// Sign the canonical bytes with the sender's keypair.
    pub fn sign(&self, keypair: &XianKeyPair) -> Result<SignedTransaction, TransactionError> {
        let canonical = self.canonicalize();
        let signature =
            sign_transaction(&canonical, &keypair.seed(), &keypair.public_key_hex())?;
        Ok(SignedTransaction {
            payload: self.clone(),
            signature,
        })
    }

    /// Verify a signature over this payload's canonical bytes.
    pub fn verify(&self, signature_hex: &str, public_key_hex: &str) -> Result<(), CryptoError> {
        verify_signature(public_key_hex, &self.canonicalize(), signature_hex)
    }
}

/// A payload plus its signature metadata, ready for the wire.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub payload: TransactionPayload,
    pub signature: String,
}

impl SignedTransaction {
    pub fn to_json(&self) -> Value {
        let mut metadata = Map::new();
        metadata.insert("signature".into(), Value::String(self.signature.clone()));
        let mut object = Map::new();
        object.insert("payload".into(), self.payload.to_json());
        object.insert("metadata".into(), Value::Object(metadata));
        Value::Object(object)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_json().to_string().into_bytes()
    }

    /// Lowercase hex of the full signed-transaction JSON, the form the
    /// broadcast and stamp-estimation endpoints expect.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

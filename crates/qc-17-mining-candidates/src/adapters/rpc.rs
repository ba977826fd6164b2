//! JSON-RPC surface: `getminingcandidate` / `submitminingsolution`
//!
//! Requests arrive as `serde_json::Value` params (positional array or named
//! object); results are JSON values or an [`RpcError`] carrying the stable
//! error code.

use crate::domain::{Candidate, SubmissionInput, SubmitOutcome};
use crate::error::CandidateError;
use crate::ports::MiningCandidateApi;
use crate::utils::hash_to_display_hex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Error object returned to RPC callers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    /// Stable machine-checkable code
    pub code: i32,
    /// Human readable message
    pub message: String,
}

impl From<CandidateError> for RpcError {
    fn from(err: CandidateError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RPC Error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

/// Wire view of an issued candidate
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateView {
    /// Lease id
    pub id: String,
    /// Parent block hash, hex in display (byte-reversed) order
    #[serde(rename = "prevhash")]
    pub prev_hash: String,
    /// Server-built coinbase, hex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coinbase: Option<String>,
    /// Subsidy plus fees available to the coinbase
    pub coinbase_value: u64,
    /// Header version
    pub version: i32,
    /// Compact target, eight hex digits
    #[serde(rename = "nBits")]
    pub n_bits: String,
    /// Header time
    pub time: u32,
    /// Block height
    pub height: u64,
    /// Coinbase merkle branch, hex in display (byte-reversed) order
    pub merkle_proof: Vec<String>,
}

impl From<&Candidate> for CandidateView {
    fn from(candidate: &Candidate) -> Self {
        let template = &candidate.template;
        Self {
            id: candidate.id.to_string(),
            prev_hash: hash_to_display_hex(&template.prev_hash),
            coinbase: template.coinbase_template.as_ref().map(|tx| tx.to_hex()),
            coinbase_value: template.coinbase_value,
            version: template.version,
            n_bits: format!("{:08x}", template.bits),
            time: template.time,
            height: template.height,
            merkle_proof: template.merkle_proof.iter().map(hash_to_display_hex).collect(),
        }
    }
}

/// Wire result of a submission: `true` or a reject reason
pub fn outcome_to_value(outcome: &SubmitOutcome) -> Value {
    match outcome.reason() {
        None => Value::Bool(true),
        Some(reason) => Value::String(reason.to_string()),
    }
}

/// Named fields of the first param, whether sent positionally or by name
fn named_params(params: &Value) -> Option<&Map<String, Value>> {
    match params {
        Value::Object(map) => Some(map),
        Value::Array(items) => items.first().and_then(Value::as_object),
        _ => None,
    }
}

fn optional_u32(map: &Map<String, Value>, field: &str) -> Result<Option<u32>, CandidateError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| CandidateError::InvalidArgument(format!("{field} must be a 32-bit unsigned integer"))),
    }
}

/// Parse `submitminingsolution` params into a [`SubmissionInput`]
///
/// Missing `id` is `MissingInput("id")`; a missing `nonce` is left for the
/// validator so an unknown id is reported first.
pub fn parse_submission(params: &Value) -> Result<SubmissionInput, CandidateError> {
    let map = named_params(params).ok_or_else(|| {
        CandidateError::InvalidArgument("expected a solution object".to_string())
    })?;

    let id = match map.get("id") {
        None | Some(Value::Null) => return Err(CandidateError::MissingInput("id")),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(CandidateError::InvalidArgument("id must be a string".to_string())),
    };

    let coinbase = match map.get("coinbase") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(CandidateError::InvalidCoinbase),
    };

    let version = match map.get("version") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            value
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .ok_or_else(|| CandidateError::InvalidArgument("version must be a 32-bit integer".to_string()))?,
        ),
    };

    Ok(SubmissionInput {
        id,
        nonce: optional_u32(map, "nonce")?,
        coinbase,
        time: optional_u32(map, "time")?,
        version,
    })
}

/// Parse the optional `coinbase` flag of `getminingcandidate`
pub fn parse_include_coinbase(params: &Value) -> Result<bool, CandidateError> {
    let flag = match params {
        Value::Null => None,
        Value::Bool(b) => Some(Value::Bool(*b)),
        Value::Array(items) => items.first().cloned(),
        Value::Object(map) => map.get("coinbase").cloned(),
        _ => {
            return Err(CandidateError::InvalidArgument(
                "expected [coinbase] or {\"coinbase\": bool}".to_string(),
            ))
        }
    };
    match flag {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(b),
        Some(_) => Err(CandidateError::InvalidArgument("coinbase must be a boolean".to_string())),
    }
}

/// JSON-RPC front end over any [`MiningCandidateApi`]
pub struct RpcHandler {
    api: Arc<dyn MiningCandidateApi>,
}

impl RpcHandler {
    /// Wrap a candidate service
    pub fn new(api: Arc<dyn MiningCandidateApi>) -> Self {
        Self { api }
    }

    /// `getminingcandidate`
    pub async fn get_candidate(&self, params: &Value) -> Result<Value, RpcError> {
        let include_coinbase = parse_include_coinbase(params)?;
        let candidate = self.api.get_candidate(include_coinbase).await?;
        serde_json::to_value(CandidateView::from(candidate.as_ref()))
            .map_err(|e| CandidateError::Serialization(e.to_string()).into())
    }

    /// `submitminingsolution`
    pub async fn submit_solution(&self, params: &Value) -> Result<Value, RpcError> {
        let input = parse_submission(params)?;
        let outcome = self.api.submit_solution(input).await?;
        debug!("[qc-17] submitminingsolution -> {:?}", outcome);
        Ok(outcome_to_value(&outcome))
    }

    /// Dispatch by method name
    pub async fn handle(&self, method: &str, params: &Value) -> Result<Value, RpcError> {
        match method {
            "getminingcandidate" => self.get_candidate(params).await,
            "submitminingsolution" => self.submit_solution(params).await,
            other => Err(RpcError {
                code: -32601,
                message: format!("Method not found: {other}"),
            }),
        }
    }
}

use crate::model::DocType;
use crate::model::SessionState;
use serde::Deserialize;
use serde::Serialize;
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;
use std::fmt;

/// Version of the daemon's HTTP protocol. Distinct from the bundle schema
/// tag: this guards request/response compatibility, the bundle tag guards
/// the payload contract.
pub const PROTOCOL_VERSION: u32 = 1;

/// Body of `POST /v1/search`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchRequest {
    pub query: String,
    pub limit: usize,

    /// Empty means all collections.
    pub doc_types: Vec<DocType>,

    pub context: BTreeMap<String, String>,
    pub schema_version: u32,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            limit: 10,
            doc_types: Vec::new(),
            context: BTreeMap::new(),
            schema_version: PROTOCOL_VERSION,
        }
    }
}

/// Body of `GET /health`.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    pub state: SessionState,

    /// Per-collection availability as probed at bootstrap.
    pub collections: BTreeMap<DocType, bool>,

    /// Whether the embedding backend initialized.
    pub vector_backend: bool,

    pub schema_version: u32,
    pub notice: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unknown,
    InvalidQuery,
    VersionMismatch,
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

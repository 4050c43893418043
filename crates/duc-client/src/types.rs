//! Wire types for the DUC login and JSON-RPC endpoints

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DucClientError, Result};

/// JSON-RPC version string sent in every request envelope
pub const JSON_RPC_VERSION: &str = "2.0";

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "SESSION_ID";

// =============================================================================
// Login
// =============================================================================

/// The two salts issued by the controller for one login attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salts {
    #[serde(with = "salt_bytes")]
    pub salt_a: Vec<u8>,
    #[serde(with = "salt_bytes")]
    pub salt_b: Vec<u8>,
}

/// Salts travel as base64 strings; a plain array of byte values is accepted too.
mod salt_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Raw(Vec<u8>),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => STANDARD
                .decode(text.as_bytes())
                .map_err(|e| D::Error::custom(format!("invalid base64 salt: {}", e))),
            Repr::Raw(bytes) => Ok(bytes),
        }
    }
}

/// Identity returned by a successful login
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "userid")]
    pub user_id: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub city: String,
}

/// An authenticated session: who logged in and the token proving it
#[derive(Clone)]
pub struct Session {
    pub identity: Identity,
    token: String,
}

impl Session {
    pub fn new(identity: Identity, token: impl Into<String>) -> Self {
        Self {
            identity,
            token: token.into(),
        }
    }

    /// Opaque token from the `SESSION_ID` cookie
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("token", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// JSON-RPC envelope
// =============================================================================

/// Outgoing request envelope
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    #[serde(rename = "json-rpc")]
    pub json_rpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "<[Vec<String>]>::is_empty")]
    pub params: &'a [Vec<String>],
    pub id: u64,
}

/// Incoming response envelope
#[derive(Debug, Deserialize)]
pub struct RpcResponse<T> {
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    pub id: Option<u64>,
}

impl<T> RpcResponse<T> {
    /// Failure text carried by the envelope, if any.
    ///
    /// The controller leaves `error` untyped: absent, `null` and empty
    /// values all mean success.
    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(a) if a.is_empty() => None,
            serde_json::Value::Object(o) if o.is_empty() => None,
            other => Some(other.to_string()),
        }
    }

    /// Unwrap the result, surfacing a non-empty `error` as [`DucClientError::RpcError`].
    pub fn into_result(self, method: &str) -> Result<T> {
        if let Some(message) = self.error_message() {
            return Err(DucClientError::RpcError {
                method: method.to_string(),
                message,
            });
        }
        self.result
            .ok_or_else(|| DucClientError::ParseError(format!("{} response has no result", method)))
    }
}

// =============================================================================
// pdb.browse
// =============================================================================

/// One point exposed by the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub pid: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub acc: String,
    #[serde(rename = "type", default)]
    pub point_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,
}

/// Result of `pdb.browse`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseResult {
    #[serde(default)]
    pub devid: String,
    #[serde(default)]
    pub points: Vec<Point>,
}

// =============================================================================
// pdb.getvalue
// =============================================================================

/// One value as returned by `pdb.getvalue`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuePoint {
    pub pid: String,
    pub value: f64,
    #[serde(default, deserialize_with = "lenient_int")]
    pub decimals: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub decimals_shown: Option<i64>,
}

/// Result of `pdb.getvalue`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuesResult {
    #[serde(default)]
    pub timet: i64,
    #[serde(default)]
    pub times: String,
    #[serde(default)]
    pub points: Vec<ValuePoint>,
}

/// A raw reading, unitless until formatted by its classification
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSample {
    pub pid: String,
    pub value: f64,
    /// Controller time of the read (seconds since epoch)
    pub timestamp: i64,
}

impl ValuesResult {
    /// Flatten into samples stamped with the read time
    pub fn samples(&self) -> impl Iterator<Item = ValueSample> + '_ {
        self.points.iter().map(|p| ValueSample {
            pid: p.pid.clone(),
            value: p.value,
            timestamp: self.timet,
        })
    }
}

/// `decimals_shown` has been seen both as a number and as a string
fn lenient_int<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

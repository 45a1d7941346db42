use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Fixed product identification LibreView expects on every call.
const PRODUCT: &str = "llu.ios";
const VERSION: &str = "4.12.0";

/// Errors from the LibreView API. Upstream rejections (bad credentials,
/// expired tokens) are kept distinct from responses we could not make
/// sense of, so callers can tell the two apart.
#[derive(Debug, Error)]
pub enum LibreError {
    #[error("LibreView rejected the request: {0}")]
    Upstream(String),

    #[error("Malformed LibreView response: {0}")]
    MalformedResponse(String),

    #[error("No patient connections on this LibreView account")]
    NoConnections,

    #[error("LibreView request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Result of a LibreView login. The account id is already hashed; the raw
/// id never leaves this module.
#[derive(Debug, Clone)]
pub struct LibreLogin {
    pub token: String,
    pub libre_id: String,
}

#[derive(Clone)]
pub struct LibreClient {
    client: Client,
    base_url: String,
}

impl LibreClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_shared_client(client, base_url))
    }

    pub fn with_shared_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// POST credentials to the LibreView login endpoint. Requires the
    /// response to carry both an auth ticket token and a user id; either
    /// missing is reported as a malformed response rather than swallowed.
    pub async fn login(&self, email: &str, password: &str) -> Result<LibreLogin, LibreError> {
        let url = format!("{}/llu/auth/login", self.base_url);
        let body = serde_json::json!({ "email": email, "password": password });

        let response = self
            .client
            .post(&url)
            .headers(base_headers())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LibreError::Upstream(format!("{status} - {body}")));
        }

        let envelope: LoginEnvelope = response
            .json()
            .await
            .map_err(|e| LibreError::MalformedResponse(e.to_string()))?;

        let data = envelope
            .data
            .ok_or_else(|| LibreError::MalformedResponse("missing data".to_string()))?;

        let token = data
            .auth_ticket
            .and_then(|t| t.token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                LibreError::MalformedResponse("auth ticket token missing".to_string())
            })?;

        let account_id = data
            .user
            .and_then(|u| u.id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| LibreError::MalformedResponse("user id missing".to_string()))?;

        debug!("LibreView login succeeded");

        Ok(LibreLogin {
            token,
            libre_id: hash_account_id(&account_id),
        })
    }

    /// Id of the first patient connection on the account.
    pub async fn fetch_patient_id(&self, token: &str) -> Result<String, LibreError> {
        let url = format!("{}/llu/connections", self.base_url);

        let response = self
            .client
            .get(&url)
            .headers(auth_headers(token, None)?)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LibreError::Upstream(format!("{status} - {body}")));
        }

        let envelope: ConnectionsEnvelope = response
            .json()
            .await
            .map_err(|e| LibreError::MalformedResponse(e.to_string()))?;

        envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|c| c.patient_id)
            .ok_or(LibreError::NoConnections)
    }

    /// Glucose series for a patient: the historical graph first, then the
    /// current measurement appended if one is present. Samples pass
    /// through as raw JSON so no vendor field is dropped. An account with
    /// no readings yields an empty series, not an error.
    pub async fn fetch_glucose_series(
        &self,
        patient_id: &str,
        token: &str,
        libre_id: Option<&str>,
    ) -> Result<Vec<Value>, LibreError> {
        let url = format!("{}/llu/connections/{}/graph", self.base_url, patient_id);

        let response = self
            .client
            .get(&url)
            .headers(auth_headers(token, libre_id)?)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LibreError::Upstream(format!("{status} - {body}")));
        }

        let envelope: GraphEnvelope = response
            .json()
            .await
            .map_err(|e| LibreError::MalformedResponse(e.to_string()))?;

        let Some(data) = envelope.data else {
            return Ok(Vec::new());
        };

        Ok(merge_series(
            data.graph_data,
            data.connection.and_then(|c| c.glucose_measurement),
        ))
    }
}

/// History first, current measurement appended last; never re-sorted.
fn merge_series(history: Option<Vec<Value>>, current: Option<Value>) -> Vec<Value> {
    let mut entries = history.unwrap_or_default();
    if let Some(current) = current {
        entries.push(current);
    }
    entries
}

/// SHA-256 hex digest of the raw LibreView account id.
#[must_use]
pub fn hash_account_id(account_id: &str) -> String {
    let digest = Sha256::digest(account_id.as_bytes());

    digest.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

/// The fixed header set LibreView expects, built fresh for every call.
fn base_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("accept-encoding", HeaderValue::from_static("gzip, deflate, br"));
    headers.insert("cache-control", HeaderValue::from_static("no-cache"));
    headers.insert("connection", HeaderValue::from_static("Keep-Alive"));
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers.insert("product", HeaderValue::from_static(PRODUCT));
    headers.insert("version", HeaderValue::from_static(VERSION));
    headers
}

/// Base headers plus the per-call bearer token and, when available, the
/// hashed account id.
fn auth_headers(token: &str, libre_id: Option<&str>) -> Result<HeaderMap, LibreError> {
    let mut headers = base_headers();

    let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| LibreError::MalformedResponse(format!("invalid token value: {e}")))?;
    headers.insert(AUTHORIZATION, bearer);

    if let Some(libre_id) = libre_id {
        let value = HeaderValue::from_str(libre_id)
            .map_err(|e| LibreError::MalformedResponse(format!("invalid account id: {e}")))?;
        headers.insert("account-id", value);
    }

    Ok(headers)
}

#[derive(Debug, Deserialize)]
struct LoginEnvelope {
    data: Option<LoginData>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    #[serde(rename = "authTicket")]
    auth_ticket: Option<AuthTicket>,
    user: Option<VendorUser>,
}

#[derive(Debug, Deserialize)]
struct AuthTicket {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VendorUser {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConnectionsEnvelope {
    data: Option<Vec<ConnectionEntry>>,
}

#[derive(Debug, Deserialize)]
struct ConnectionEntry {
    #[serde(rename = "patientId")]
    patient_id: String,
}

#[derive(Debug, Deserialize)]
struct GraphEnvelope {
    data: Option<GraphData>,
}

#[derive(Debug, Deserialize)]
struct GraphData {
    #[serde(rename = "graphData")]
    graph_data: Option<Vec<Value>>,
    connection: Option<GraphConnection>,
}

#[derive(Debug, Deserialize)]
struct GraphConnection {
    #[serde(rename = "glucoseMeasurement")]
    glucose_measurement: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_appends_current_after_history() {
        let history = vec![json!({"v": 1}), json!({"v": 2}), json!({"v": 3})];
        let current = json!({"v": 4});

        let merged = merge_series(Some(history), Some(current));

        assert_eq!(merged.len(), 4);
        assert_eq!(merged[0]["v"], 1);
        assert_eq!(merged[3]["v"], 4);
    }

    #[test]
    fn merge_without_current_leaves_history_unchanged() {
        let history = vec![json!({"v": 1}), json!({"v": 2})];

        let merged = merge_series(Some(history.clone()), None);

        assert_eq!(merged, history);
    }

    #[test]
    fn merge_without_history_yields_only_current() {
        let merged = merge_series(None, Some(json!({"v": 9})));

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0]["v"], 9);
    }

    #[test]
    fn merge_empty_is_empty() {
        assert!(merge_series(None, None).is_empty());
    }

    #[test]
    fn account_id_hash_is_deterministic_hex() {
        let a = hash_account_id("U1");
        let b = hash_account_id("U1");

        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn account_id_hash_differs_per_account() {
        assert_ne!(hash_account_id("U1"), hash_account_id("U2"));
    }

    #[test]
    fn graph_envelope_tolerates_missing_fields() {
        let envelope: GraphEnvelope = serde_json::from_value(json!({"data": {}})).unwrap();
        let data = envelope.data.unwrap();

        assert!(data.graph_data.is_none());
        assert!(data.connection.is_none());
    }
}

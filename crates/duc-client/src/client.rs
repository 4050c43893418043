//! DUC JSON-RPC transport

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, info_span, trace, Span};
use url::Url;

use crate::error::{DucClientError, Result};
use crate::session::{login_in, ConnectionUrl};
use crate::types::*;

/// Path of the JSON-RPC endpoint, relative to the controller base URL
pub const RPC_PATH: &str = "if/json_rpc.js";

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default connection timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Authenticated JSON-RPC client for one DUC.
///
/// Owns the session token and the request-id counter. Calls take
/// `&mut self`, so at most one request is in flight per client.
#[derive(Debug)]
pub struct DucClient {
    client: Client,
    base_url: Url,
    rpc_url: Url,
    session: Session,
    next_id: u64,
    span: Span,
}

impl DucClient {
    /// Validate `url`, log in and return a ready client
    ///
    /// # Arguments
    /// * `url` - Controller URL with credentials (e.g., "http://user:pw@duc.local")
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_config(url, DEFAULT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Connect with custom HTTP timeouts
    pub async fn connect_with_config(
        url: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let target = ConnectionUrl::parse(url)?;
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;
        let span = info_span!("duc", host = %target.base.host_str().unwrap_or_default());

        debug!(parent: &span, "Connecting to DUC '{}'", target.base);
        let session = login_in(
            &span,
            &client,
            &target.base,
            &target.username,
            &target.password,
        )
        .await?;

        info!(
            parent: &span,
            user = %session.identity.name,
            company = %session.identity.company,
            city = %session.identity.city,
            "Connected to DUC '{}'",
            target.base
        );

        Self::with_session(client, target.base, session).map(|c| c.with_span(span))
    }

    /// Build a client around an existing session
    pub fn with_session(client: Client, base_url: Url, session: Session) -> Result<Self> {
        let rpc_url = base_url.join(RPC_PATH)?;
        Ok(Self {
            client,
            base_url,
            rpc_url,
            session,
            next_id: 1,
            span: Span::current(),
        })
    }

    /// Replace the span every event of this client is recorded under
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Get the base URL (without credentials)
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get the session this client authenticates with
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Id the next call will carry
    pub fn next_request_id(&self) -> u64 {
        self.next_id
    }

    /// Logging handle for this client
    pub fn span(&self) -> &Span {
        &self.span
    }

    // =========================================================================
    // Raw call
    // =========================================================================

    /// Issue one JSON-RPC call and return the raw response body.
    ///
    /// The id is consumed even if the call fails. The body is not
    /// inspected; callers decode it and check the envelope `error`.
    pub async fn call(&mut self, method: &str, params: &[Vec<String>]) -> Result<Bytes> {
        let id = self.next_id;
        self.next_id += 1;

        let request = RpcRequest {
            json_rpc: JSON_RPC_VERSION,
            method,
            params,
            id,
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| DucClientError::ParseError(format!("cannot encode request: {}", e)))?;
        trace!(parent: &self.span, id, body = %String::from_utf8_lossy(&body), "jsonRpc request");

        let response = self
            .client
            .post(self.rpc_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(COOKIE, format!("{}={}", SESSION_COOKIE, self.session.token()))
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            debug!(parent: &self.span, id, method, status = %status, "jsonRpc call rejected");
            return Err(DucClientError::server_error(
                status.as_u16(),
                format!("http error code {}", status.as_u16()),
            ));
        }

        let body = response.bytes().await?;
        trace!(parent: &self.span, id, body = %String::from_utf8_lossy(&body), "jsonRpc response");
        Ok(body)
    }

    /// Call and decode the envelope, surfacing `error` as [`DucClientError::RpcError`]
    pub async fn call_decoded<T: serde::de::DeserializeOwned>(
        &mut self,
        method: &str,
        params: &[Vec<String>],
    ) -> Result<T> {
        let body = self.call(method, params).await?;
        let envelope: RpcResponse<T> = serde_json::from_slice(&body)
            .map_err(|e| DucClientError::ParseError(format!("{}: {}", method, e)))?;
        envelope.into_result(method)
    }

    // =========================================================================
    // Point database
    // =========================================================================

    /// List every point the controller exposes (`pdb.browse`)
    pub async fn browse(&mut self) -> Result<BrowseResult> {
        let result: BrowseResult = self.call_decoded("pdb.browse", &[]).await?;
        for point in &result.points {
            debug!(
                parent: &self.span,
                pid = %point.pid,
                device = %result.devid,
                "Found point"
            );
        }
        Ok(result)
    }

    /// Read current values of `pids` in one call (`pdb.getvalue`)
    pub async fn get_values(&mut self, pids: &[String]) -> Result<ValuesResult> {
        let params = [pids.to_vec()];
        self.call_decoded("pdb.getvalue", &params).await
    }

    /// Controller firmware/protocol version (`pdb.version`)
    pub async fn version(&mut self) -> Result<serde_json::Value> {
        self.call_decoded("pdb.version", &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockDuc, TestServer};
    use tracing_test::traced_test;

    fn client() -> DucClient {
        DucClient::with_session(
            Client::new(),
            Url::parse("http://duc.local/").unwrap(),
            Session::new(Identity::default(), "tok"),
        )
        .unwrap()
    }

    #[test]
    fn test_rpc_url() {
        let client = client();
        assert_eq!(client.rpc_url.as_str(), "http://duc.local/if/json_rpc.js");
        assert_eq!(client.base_url().as_str(), "http://duc.local/");
    }

    #[test]
    fn test_request_ids_start_at_one() {
        assert_eq!(client().next_request_id(), 1);
    }

    #[tokio::test]
    async fn test_failed_call_still_consumes_id() {
        // Nothing listens on port 9 of the discard range
        let mut client = DucClient::with_session(
            Client::builder()
                .connect_timeout(Duration::from_millis(200))
                .build()
                .unwrap(),
            Url::parse("http://127.0.0.1:9/").unwrap(),
            Session::new(Identity::default(), "tok"),
        )
        .unwrap();

        let err = client.call("pdb.browse", &[]).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(client.next_request_id(), 2);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_connect_logs_identity_not_credentials() {
        let duc = MockDuc::new("operator", "hunter2", "tok");
        let server = TestServer::start(duc.router()).await.unwrap();

        let client = DucClient::connect(&server.connection_url("operator", "hunter2"))
            .await
            .unwrap();

        assert_eq!(client.session().token(), "tok");
        assert!(logs_contain("Connected to DUC"));
        assert!(logs_contain("Mock Operator"));
        assert!(!logs_contain("hunter2"));
    }
}

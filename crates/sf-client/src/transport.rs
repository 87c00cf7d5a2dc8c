//! SOAP transport seam and its reqwest-backed implementation.

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, info, instrument};

use crate::config::ClientConfig;
use crate::error::Result;

/// A SOAP request ready to be posted.
#[derive(Debug, Clone)]
pub struct SoapRequest {
    /// Endpoint URL.
    pub url: String,
    /// Operation name, sent as the `SOAPAction` header.
    pub action: String,
    /// Full envelope body.
    pub body: String,
}

impl SoapRequest {
    pub fn new(url: impl Into<String>, action: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            action: action.into(),
            body: body.into(),
        }
    }
}

/// Raw response returned by a [`Transport`].
///
/// Non-success statuses are returned as responses, not errors: SOAP faults
/// arrive with HTTP 500 and the caller decides how to interpret the body.
#[derive(Debug, Clone)]
pub struct SoapResponse {
    pub status: u16,
    pub body: String,
}

impl SoapResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for statuses below 400.
    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

/// Request/response collaborator used for every SOAP call.
///
/// Implementations only fail for transport-level problems (timeouts,
/// refused connections). HTTP error statuses come back as [`SoapResponse`].
pub trait Transport: Send + Sync {
    fn send(&self, request: SoapRequest) -> BoxFuture<'_, Result<SoapResponse>>;
}

/// HTTP transport for SOAP endpoints.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    inner: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let inner = config.http_client()?;
        Ok(Self { inner, config })
    }

    /// Create a new HTTP transport with default configuration.
    pub fn default_transport() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// Get the transport configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[instrument(skip(self, request), fields(action = %request.action, url = %request.url))]
    async fn post(&self, request: SoapRequest) -> Result<SoapResponse> {
        if self.config.enable_tracing {
            debug!(bytes = request.body.len(), "Sending SOAP request");
        }

        let response = self
            .inner
            .post(&request.url)
            .header("Content-Type", "text/xml;charset=UTF-8")
            .header("SOAPAction", request.action.as_str())
            .body(request.body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        if self.config.enable_tracing {
            if status < 400 {
                debug!(status, bytes = body.len(), "Response received");
            } else {
                info!(status, bytes = body.len(), "Non-success response");
            }
        }

        Ok(SoapResponse { status, body })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: SoapRequest) -> BoxFuture<'_, Result<SoapResponse>> {
        self.post(request).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_soap_response_success() {
        assert!(SoapResponse::new(200, "").is_success());
        assert!(SoapResponse::new(399, "").is_success());
        assert!(!SoapResponse::new(500, "").is_success());
    }

    #[tokio::test]
    async fn test_send_posts_envelope_with_soap_headers() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/services/Soap/m/62.0"))
            .and(header("content-type", "text/xml;charset=UTF-8"))
            .and(header("soapaction", "checkDeployStatus"))
            .and(body_string_contains("<asyncProcessId>0Af1</asyncProcessId>"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<ok/>"))
            .mount(&mock_server)
            .await;

        let transport = HttpTransport::default_transport().unwrap();
        let response = transport
            .send(SoapRequest::new(
                format!("{}/services/Soap/m/62.0", mock_server.uri()),
                "checkDeployStatus",
                "<asyncProcessId>0Af1</asyncProcessId>",
            ))
            .await
            .expect("send should succeed");

        assert_eq!(response.status, 200);
        assert_eq!(response.body, "<ok/>");
    }

    #[tokio::test]
    async fn test_send_returns_fault_status_as_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("<faultcode>x</faultcode>"))
            .mount(&mock_server)
            .await;

        let transport = HttpTransport::default_transport().unwrap();
        let response = transport
            .send(SoapRequest::new(mock_server.uri(), "deploy", "<x/>"))
            .await
            .expect("HTTP 500 is not a transport error");

        assert_eq!(response.status, 500);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_send_times_out() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&mock_server)
            .await;

        let config = ClientConfig::builder()
            .with_timeout(Duration::from_millis(50))
            .build();
        let transport = HttpTransport::new(config).unwrap();
        let err = transport
            .send(SoapRequest::new(mock_server.uri(), "retrieve", "<x/>"))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
    }
}

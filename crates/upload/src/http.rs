//! reqwest-backed [`Transport`] and the `/authenticate` call.

use std::time::Duration;

use pwrite_protocol::constants::{AUTHENTICATE_PATH, DATA_OBJECTS_PATH};
use pwrite_protocol::{FormParams, Frame};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, trace};

use crate::error::UploadError;
use crate::transport::{Transport, TransportFuture, TransportResponse};

/// Default API root of a local iRODS HTTP API deployment.
pub const DEFAULT_BASE_URL: &str = "http://localhost:9000/irods-http-api/0.5.0";

/// Connection settings shared by [`HttpTransport`] and [`authenticate`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// API root, e.g. `http://host:9000/irods-http-api/0.5.0`.
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Upper bound on one request, including the upload of its body.
    pub request_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(300),
        }
    }
}

impl HttpTransportConfig {
    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn client_builder(&self) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
    }
}

/// Authenticated client for the `/data-objects` endpoint.
///
/// One instance is shared by every stream of an upload; reqwest pools the
/// underlying connections.
pub struct HttpTransport {
    http: reqwest::Client,
    data_objects_url: String,
}

impl HttpTransport {
    /// Creates a transport sending `Authorization: Bearer <token>`.
    pub fn new(config: &HttpTransportConfig, bearer_token: &str) -> Result<Self, UploadError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {bearer_token}")).map_err(|_| {
                UploadError::InvalidArgument("bearer token is not a valid header value".into())
            })?,
        );

        let http = config.client_builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            data_objects_url: config.endpoint(DATA_OBJECTS_PATH),
        })
    }

    pub fn data_objects_url(&self) -> &str {
        &self.data_objects_url
    }
}

impl Transport for HttpTransport {
    fn post_form(&self, params: FormParams) -> TransportFuture<'_> {
        Box::pin(async move {
            debug!(url = %self.data_objects_url, op = ?params.first().map(|(_, v)| v), "POST form");
            let resp = self
                .http
                .post(&self.data_objects_url)
                .form(&params)
                .send()
                .await?;
            read_response(resp).await
        })
    }

    fn post_frame(&self, frame: Frame) -> TransportFuture<'_> {
        Box::pin(async move {
            let content_type = frame.content_type();
            let body = frame.into_body();
            trace!(url = %self.data_objects_url, len = body.len(), "POST frame");
            let resp = self
                .http
                .post(&self.data_objects_url)
                .header(CONTENT_TYPE, content_type)
                .body(body)
                .send()
                .await?;
            read_response(resp).await
        })
    }
}

async fn read_response(resp: reqwest::Response) -> Result<TransportResponse, UploadError> {
    let status = resp.status().as_u16();
    let body = resp.text().await?;
    Ok(TransportResponse { status, body })
}

/// Exchanges basic credentials for a bearer token.
///
/// The token is the whole response body.
pub async fn authenticate(
    config: &HttpTransportConfig,
    username: &str,
    password: &str,
) -> Result<String, UploadError> {
    let http = config.client_builder().build()?;
    let resp = http
        .post(config.endpoint(AUTHENTICATE_PATH))
        .basic_auth(username, Some(password))
        .send()
        .await?;

    let response = read_response(resp).await?.error_for_status()?;
    let token = response.body.trim();
    if token.is_empty() {
        return Err(UploadError::Protocol(
            "authentication response carried no token".into(),
        ));
    }

    debug!(username, "authenticated");
    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_join_without_double_slash() {
        let config = HttpTransportConfig {
            base_url: "http://irods:9000/api/".into(),
            ..Default::default()
        };
        assert_eq!(
            config.endpoint(DATA_OBJECTS_PATH),
            "http://irods:9000/api/data-objects"
        );
        assert_eq!(
            config.endpoint(AUTHENTICATE_PATH),
            "http://irods:9000/api/authenticate"
        );
    }

    #[test]
    fn transport_targets_data_objects() {
        let transport = HttpTransport::new(&HttpTransportConfig::default(), "tok").unwrap();
        assert_eq!(
            transport.data_objects_url(),
            "http://localhost:9000/irods-http-api/0.5.0/data-objects"
        );
    }

    #[test]
    fn invalid_token_rejected() {
        let result = HttpTransport::new(&HttpTransportConfig::default(), "bad\ntoken");
        assert!(matches!(result, Err(UploadError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let config = HttpTransportConfig {
            // Port 9 (discard) on loopback is closed in test environments.
            base_url: "http://127.0.0.1:9".into(),
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(2),
        };
        let err = authenticate(&config, "rods", "rods").await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Transport);
        assert!(err.is_retryable());
    }
}

//! HTTP transport for the tabular store.
//!
//! The gateway speaks to the backend only through [`Transport`], so tests and
//! callers can substitute an in-memory implementation. [`HttpTransport`] is
//! the production implementation on top of reqwest.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, instrument, trace};

use crate::config::{mask_token, Credentials};
use crate::error::{Error, Result};

/// HTTP method of a backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Read.
    Get,
    /// Create.
    Post,
    /// Partial update.
    Patch,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Patch => write!(f, "PATCH"),
        }
    }
}

/// A request against one table of the configured base.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Table name or table id.
    pub table: String,
    /// Record id for single-record calls.
    pub record_id: Option<String>,
    /// Query-string pairs, unencoded.
    pub query: Vec<(String, String)>,
    /// JSON body for create/update.
    pub body: Option<Value>,
}

impl ApiRequest {
    /// List records of a table.
    #[must_use]
    pub fn list(table: impl Into<String>, query: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Get,
            table: table.into(),
            record_id: None,
            query,
            body: None,
        }
    }

    /// Fetch one record.
    #[must_use]
    pub fn get(table: impl Into<String>, record_id: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            table: table.into(),
            record_id: Some(record_id.into()),
            query: Vec::new(),
            body: None,
        }
    }

    /// Create a record.
    #[must_use]
    pub fn create(table: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            table: table.into(),
            record_id: None,
            query: Vec::new(),
            body: Some(body),
        }
    }

    /// Patch a record.
    #[must_use]
    pub fn update(table: impl Into<String>, record_id: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Patch,
            table: table.into(),
            record_id: Some(record_id.into()),
            query: Vec::new(),
            body: Some(body),
        }
    }
}

/// Raw backend response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl ApiResponse {
    /// Create a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Check for a 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check for a 404 status.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Turn a non-2xx response into a connection error carrying status and body.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` for any non-2xx status.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::status(self.status, self.body))
        }
    }
}

/// Sends requests to the tabular store.
///
/// Implementations perform exactly one attempt per call. A response with any
/// status is `Ok`; only failures to get a response at all are `Err`.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Send one request.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` with no status when the request could not
    /// be completed.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
    headers: HeaderMap,
    token_hint: String,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base", &self.base.as_str())
            .field("token", &self.token_hint)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Build a transport for `{api_url}/{base_id}`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the URL or token cannot be used, and
    /// `Error::Internal` if the HTTP client cannot be built.
    pub fn new(api_url: &str, credentials: &Credentials, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(api_url)
            .map_err(|e| Error::configuration(format!("invalid api url {api_url}: {e}")))?;
        base.path_segments_mut()
            .map_err(|()| Error::configuration(format!("api url cannot be a base: {api_url}")))?
            .pop_if_empty()
            .push(&credentials.base_id);

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", credentials.access_token))
            .map_err(|e| Error::configuration(format!("invalid access token: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

        debug!(base = %base, token = %mask_token(&credentials.access_token), "HTTP transport ready");
        Ok(Self {
            client,
            base,
            headers,
            token_hint: mask_token(&credentials.access_token),
        })
    }

    /// Resolve the URL of a request. Table names and record ids are
    /// percent-encoded as path segments.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the base URL cannot take path segments.
    pub fn url_for(&self, request: &ApiRequest) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| Error::internal("base url cannot take path segments"))?;
            segments.push(&request.table);
            if let Some(id) = &request.record_id {
                segments.push(id);
            }
        }
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(name = "backend_send", skip(self, request), fields(method = %request.method, table = %request.table))]
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = self.url_for(&request)?;
        trace!(url = %url, "sending request");

        let builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Patch => self.client.patch(url),
        }
        .headers(self.headers.clone());
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| Error::unreachable(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::unreachable(format!("failed to read response body: {e}")))?;

        debug!(status, bytes = body.len(), "response received");
        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> HttpTransport {
        let creds = Credentials {
            access_token: "patTest.123".to_string(),
            base_id: "appBase123".to_string(),
        };
        HttpTransport::new("https://api.airtable.com/v0", &creds, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_url_for_list_encodes_table_name() {
        let url = transport()
            .url_for(&ApiRequest::list("Turno Pirolisis", Vec::new()))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.airtable.com/v0/appBase123/Turno%20Pirolisis"
        );
    }

    #[test]
    fn test_url_for_record() {
        let url = transport()
            .url_for(&ApiRequest::get("tbl8jLu1r5Noqd8WB", "recABC"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.airtable.com/v0/appBase123/tbl8jLu1r5Noqd8WB/recABC"
        );
    }

    #[test]
    fn test_url_for_encodes_query() {
        let query = vec![(
            "filterByFormula".to_string(),
            "{Cedula} = '1&2'".to_string(),
        )];
        let url = transport()
            .url_for(&ApiRequest::list("Equipo", query))
            .unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs[0].1, "{Cedula} = '1&2'");
        assert!(!url.as_str().contains("'1&2'"));
    }

    #[test]
    fn test_trailing_slash_in_api_url() {
        let creds = Credentials {
            access_token: "patTest.123".to_string(),
            base_id: "appBase123".to_string(),
        };
        let t = HttpTransport::new("http://localhost:8080/v0/", &creds, Duration::from_secs(5))
            .unwrap();
        let url = t.url_for(&ApiRequest::list("Personal", Vec::new())).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/v0/appBase123/Personal");
    }

    #[test]
    fn test_invalid_api_url() {
        let creds = Credentials {
            access_token: "patTest.123".to_string(),
            base_id: "appBase123".to_string(),
        };
        let err = HttpTransport::new("not a url", &creds, Duration::from_secs(5)).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_debug_hides_token() {
        let debug_str = format!("{:?}", transport());
        assert!(!debug_str.contains("patTest.123"));
    }

    #[test]
    fn test_response_status_helpers() {
        assert!(ApiResponse::new(200, "{}").is_success());
        assert!(ApiResponse::new(404, "").is_not_found());
        assert!(!ApiResponse::new(500, "").is_success());
    }

    #[test]
    fn test_error_for_status_keeps_body() {
        let err = ApiResponse::new(401, r#"{"error":"AUTHENTICATION_REQUIRED"}"#)
            .error_for_status()
            .unwrap_err();
        assert_eq!(err.http_status(), Some(401));
        assert!(err.to_string().contains("AUTHENTICATION_REQUIRED"));
    }

    #[test]
    fn test_method_display() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Post.to_string(), "POST");
        assert_eq!(Method::Patch.to_string(), "PATCH");
    }
}

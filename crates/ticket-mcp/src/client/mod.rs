//! Ticket REST backend client.
//!
//! Provides an async HTTP client with:
//! - Connection pooling via reqwest
//! - Retry middleware with exponential backoff
//! - `x-api-key` header injection when a backend key is configured
//! - Structured status-code mapping into `ClientError`

use std::time::Duration;

use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};

use crate::config::{Config, defaults};
use crate::error::{ClientError, ClientResult};
use crate::models::{TicketDetailPayload, TicketListPayload};

/// Typed HTTP client for the ticket REST API.
#[derive(Clone)]
pub struct TicketApiClient {
    /// HTTP client with middleware.
    client: ClientWithMiddleware,

    /// Backend base URL, no trailing slash.
    base_url: String,

    /// Backend API key (optional).
    api_key: Option<String>,
}

impl TicketApiClient {
    /// Create a new client from the gateway configuration.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            "application/json".parse().expect("valid content-type header"),
        );

        if let Some(ref key) = config.api_key {
            headers.insert(defaults::BACKEND_API_KEY_HEADER, key.parse()?);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .connect_timeout(defaults::CONNECT_TIMEOUT)
            .gzip(true)
            .build()?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_secs(1), Duration::from_secs(10))
            .build_with_max_retries(2);

        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Check if a backend API key is configured.
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// List tickets matching a free-text search term.
    ///
    /// # Errors
    ///
    /// Returns error on backend failure or an unrecognized payload shape.
    pub async fn list_tickets(
        &self,
        search_term: &str,
        limit: u32,
    ) -> ClientResult<TicketListPayload> {
        let params = vec![
            ("search_term".to_string(), search_term.to_string()),
            ("limit".to_string(), limit.to_string()),
        ];

        let value = self.get("tickets", &params).await?;
        serde_json::from_value(value).map_err(ClientError::from)
    }

    /// Get a single ticket by ID.
    ///
    /// # Errors
    ///
    /// Returns error on backend failure or an unrecognized payload shape.
    pub async fn ticket_detail(&self, ticket_id: &str) -> ClientResult<TicketDetailPayload> {
        let value = self.get(&format!("tickets/{ticket_id}"), &[]).await?;
        serde_json::from_value(value).map_err(ClientError::from)
    }

    /// Get a ticket's history entries.
    ///
    /// # Errors
    ///
    /// Returns error on backend failure.
    pub async fn ticket_history(&self, ticket_id: &str) -> ClientResult<serde_json::Value> {
        self.get(&format!("tickets/{ticket_id}/history"), &[]).await
    }

    /// Make a GET request.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or non-2xx status.
    pub async fn get(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> ClientResult<serde_json::Value> {
        let response = self.client.get(self.url(path)).query(params).send().await?;
        let response = self.handle_response(response).await?;
        Ok(response.json().await?)
    }

    /// Make a POST request.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or non-2xx status.
    pub async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> ClientResult<serde_json::Value> {
        let body_str = serde_json::to_string(body)?;
        let response = self.client.post(self.url(path)).body(body_str).send().await?;
        let response = self.handle_response(response).await?;
        Ok(response.json().await?)
    }

    /// Make a PUT request.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or non-2xx status.
    pub async fn put(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> ClientResult<serde_json::Value> {
        let body_str = serde_json::to_string(body)?;
        let response = self.client.put(self.url(path)).body(body_str).send().await?;
        let response = self.handle_response(response).await?;
        Ok(response.json().await?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Map non-2xx responses to structured errors carrying the body text.
    async fn handle_response(&self, response: reqwest::Response) -> ClientResult<reqwest::Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        match status.as_u16() {
            404 => Err(ClientError::not_found(text)),
            400 => Err(ClientError::bad_request(text)),
            500..=599 => Err(ClientError::server(status.as_u16(), text)),
            _ => Err(ClientError::UnexpectedStatus { status: status.as_u16(), message: text }),
        }
    }
}

impl std::fmt::Debug for TicketApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketApiClient")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.has_api_key())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_cleanly() {
        let config = Config::for_testing("http://backend:9000/");
        let client = TicketApiClient::new(&config).unwrap();
        assert_eq!(client.url("tickets"), "http://backend:9000/tickets");
        assert_eq!(client.url("/tickets/T1"), "http://backend:9000/tickets/T1");
    }

    #[test]
    fn test_has_api_key() {
        let mut config = Config::for_testing("http://backend:9000");
        assert!(!TicketApiClient::new(&config).unwrap().has_api_key());

        config.api_key = Some("backend-key".to_string());
        assert!(TicketApiClient::new(&config).unwrap().has_api_key());
    }
}

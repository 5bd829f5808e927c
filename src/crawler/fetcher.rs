//! Remote document fetcher
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests returning the raw document text
//! - Error classification (HTTP status vs. transport failure)
//!
//! The engine only sees the `DocumentFetcher` trait, so tests can script
//! responses without a network. No retry or backoff happens here.

use crate::config::UserAgentConfig;
use crate::TallyError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Result of a fetch operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// Successfully fetched the document
    Success {
        /// HTTP status code
        status_code: u16,
        /// Document body
        body: String,
    },

    /// Server answered with a non-success status
    HttpError {
        /// The HTTP status code
        status_code: u16,
    },

    /// Network error (connection refused, timeout, body read failure)
    NetworkError {
        /// Error description
        error: String,
        /// Whether the request timed out
        timed_out: bool,
    },
}

impl FetchResult {
    /// Extracts the body, mapping every failure to `FetchFailed`
    pub fn into_body(self, url: &str) -> Result<String, TallyError> {
        match self {
            Self::Success { body, .. } => Ok(body),
            Self::HttpError { status_code } => Err(TallyError::FetchFailed {
                url: url.to_string(),
                message: format!("HTTP {}", status_code),
            }),
            Self::NetworkError { error, .. } => Err(TallyError::FetchFailed {
                url: url.to_string(),
                message: error,
            }),
        }
    }
}

/// Fetches raw document text for a query URL
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchResult;
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use tumbl_tally::config::UserAgentConfig;
/// use tumbl_tally::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "TumblTally".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchResult {
        tracing::debug!(url, "GET");

        match self.client.get(url).send().await {
            Ok(response) => {
                let status = response.status();

                if !status.is_success() {
                    tracing::debug!(url, status = status.as_u16(), "non-success status");
                    return FetchResult::HttpError {
                        status_code: status.as_u16(),
                    };
                }

                match response.text().await {
                    Ok(body) => FetchResult::Success {
                        status_code: status.as_u16(),
                        body,
                    },
                    Err(e) => FetchResult::NetworkError {
                        error: e.to_string(),
                        timed_out: e.is_timeout(),
                    },
                }
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "request failed");
                if e.is_timeout() {
                    FetchResult::NetworkError {
                        error: "Request timeout".to_string(),
                        timed_out: true,
                    }
                } else if e.is_connect() {
                    FetchResult::NetworkError {
                        error: "Connection refused".to_string(),
                        timed_out: false,
                    }
                } else {
                    FetchResult::NetworkError {
                        error: e.to_string(),
                        timed_out: false,
                    }
                }
            }
        }
    }
}

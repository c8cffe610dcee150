//! The external document service, seen as "does this (customer, receipt, date) triple
//! resolve to a document?".

use async_trait::async_trait;
use thiserror::Error;

pub const DEFAULT_DOCUMENT_URL: &str =
    "https://servicioweb.enel.com/descarga-api-documento-bridge/descargarPDF";

/// One candidate triple to check against the document service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptQuery {
    pub customer_id: String,
    pub receipt_number: i64,
    /// `DD/MM/YYYY`
    pub date: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    #[error("document not found")]
    NotFound,

    #[error("unauthorized (status {0})")]
    Unauthorized(u16),

    #[error("rate limited")]
    RateLimited,

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),
}

impl EndpointError {
    /// Maps a non-success HTTP status onto the error taxonomy.
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => EndpointError::NotFound,
            401 | 403 => EndpointError::Unauthorized(status),
            429 => EndpointError::RateLimited,
            other => EndpointError::Status(other),
        }
    }

    /// Auth and throttling failures clear up on their own and are worth retrying.
    /// Everything else means the candidate is simply not there.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EndpointError::Unauthorized(_) | EndpointError::RateLimited
        )
    }
}

#[async_trait]
pub trait ReceiptEndpoint: Send + Sync {
    /// Cheap existence check (`HEAD`).
    async fn exists(&self, query: &ReceiptQuery) -> Result<(), EndpointError>;

    /// Downloads the document body (`GET`).
    async fn fetch(&self, query: &ReceiptQuery) -> Result<Vec<u8>, EndpointError>;

    /// Public URL the caller can use to download the document.
    fn document_url(&self, query: &ReceiptQuery) -> String;
}

impl ReceiptQuery {
    /// `ns`, `nd` and `fd` query parameters, in that order.
    pub fn params(&self) -> [(&'static str, String); 3] {
        [
            ("ns", self.customer_id.clone()),
            ("nd", self.receipt_number.to_string()),
            ("fd", self.date.clone()),
        ]
    }
}

/// Public download link. The customer id is expected to be validated as numeric.
pub fn build_document_url(base_url: &str, query: &ReceiptQuery) -> String {
    format!(
        "{}?ns={}&nd={}&fd={}",
        base_url, query.customer_id, query.receipt_number, query.date
    )
}

#[cfg(feature = "http")]
pub use http_client::HttpReceiptEndpoint;

#[cfg(feature = "http")]
mod http_client {
    use super::*;
    use reqwest::Client;
    use std::time::Duration;

    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    #[derive(Clone)]
    pub struct HttpReceiptEndpoint {
        client: Client,
        base_url: String,
    }

    impl HttpReceiptEndpoint {
        pub fn new() -> Result<Self, EndpointError> {
            Self::with_base_url(DEFAULT_DOCUMENT_URL)
        }

        pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, EndpointError> {
            let client = Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .map_err(|e| EndpointError::Transport(e.to_string()))?;
            Ok(Self {
                client,
                base_url: base_url.into(),
            })
        }
    }

    #[async_trait]
    impl ReceiptEndpoint for HttpReceiptEndpoint {
        async fn exists(&self, query: &ReceiptQuery) -> Result<(), EndpointError> {
            let res = self
                .client
                .head(&self.base_url)
                .query(&query.params())
                .send()
                .await
                .map_err(|e| EndpointError::Transport(e.to_string()))?;

            let status = res.status();
            if status.is_success() {
                Ok(())
            } else {
                Err(EndpointError::from_status(status.as_u16()))
            }
        }

        async fn fetch(&self, query: &ReceiptQuery) -> Result<Vec<u8>, EndpointError> {
            let res = self
                .client
                .get(&self.base_url)
                .query(&query.params())
                .send()
                .await
                .map_err(|e| EndpointError::Transport(e.to_string()))?;

            let status = res.status();
            if !status.is_success() {
                return Err(EndpointError::from_status(status.as_u16()));
            }
            let body = res
                .bytes()
                .await
                .map_err(|e| EndpointError::Transport(e.to_string()))?;
            Ok(body.to_vec())
        }

        fn document_url(&self, query: &ReceiptQuery) -> String {
            build_document_url(&self.base_url, query)
        }
    }
}

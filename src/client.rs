//! Client side of the filtering server's HTTP API.
//!
//! The upload engine talks to the server only through the [`FilterService`]
//! trait. [`HttpFilterService`] is the production implementation; tests plug
//! in scripted services instead.

use crate::config::ClientConfig;
use crate::error::UploadError;
use crate::protocol::{
    parse_retry_after, retry_after_from_secs, Batch, BufferStatus, BusyResponse,
    CloseContextRequest, CloseContextResponse, CloseOutcome, ContextId, CreateContextRequest,
    CreateContextResponse, ErrorResponse, ServerStatus, SubmitOutcome,
};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

/// Operations the upload engine needs from a filtering server.
#[async_trait]
pub trait FilterService: Send + Sync {
    /// `GET /server-status`.
    async fn server_status(&self) -> Result<ServerStatus, UploadError>;

    /// `POST /context/create`: open a context for the given file names.
    async fn create_context(&self, filenames: &[String]) -> Result<ContextId, UploadError>;

    /// `POST /context/{id}/reads`: submit one batch.
    ///
    /// Backpressure is an outcome, not an error. Every other non-success
    /// answer is returned as an error.
    async fn submit_reads(
        &self,
        context: &ContextId,
        batch: &Batch<'_>,
    ) -> Result<SubmitOutcome, UploadError>;

    /// `POST /context/{id}/close`: finalize the context and fetch the verdict.
    async fn close_context(&self, context: &ContextId) -> Result<CloseOutcome, UploadError>;
}

/// [`FilterService`] over HTTP(S) using `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFilterService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFilterService {
    /// Create a client for the API rooted at `config.server_url`.
    pub fn new(config: &ClientConfig) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build the full URL for an endpoint.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a response the protocol does not expect into an error.
    async fn unexpected(response: reqwest::Response) -> UploadError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(error) => error.message,
            Err(_) if body.is_empty() => "no details given".to_string(),
            Err(_) => body,
        };
        UploadError::UnexpectedStatus { status, message }
    }
}

/// Wait instruction from the `Retry-After` header, if present.
fn retry_after_header(response: &reqwest::Response) -> Option<Result<Duration, UploadError>> {
    let value = response.headers().get(RETRY_AFTER)?;
    Some(match value.to_str() {
        Ok(value) => parse_retry_after(value),
        Err(_) => Err(UploadError::ProtocolError(
            "Retry-After header is not valid text".to_string(),
        )),
    })
}

#[async_trait]
impl FilterService for HttpFilterService {
    async fn server_status(&self) -> Result<ServerStatus, UploadError> {
        let response = self.client.get(self.url("/server-status")).send().await?;
        if response.status() != StatusCode::OK {
            return Err(Self::unexpected(response).await);
        }
        Ok(response.json().await?)
    }

    async fn create_context(&self, filenames: &[String]) -> Result<ContextId, UploadError> {
        let response = self
            .client
            .post(self.url("/context/create"))
            .json(&CreateContextRequest { filenames })
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Err(Self::unexpected(response).await);
        }
        let created: CreateContextResponse = response.json().await?;
        ContextId::parse(&created.context)
    }

    async fn submit_reads(
        &self,
        context: &ContextId,
        batch: &Batch<'_>,
    ) -> Result<SubmitOutcome, UploadError> {
        let response = self
            .client
            .post(self.url(&format!("/context/{}/reads", context)))
            .json(batch)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(SubmitOutcome::Accepted(response.json().await?)),
            StatusCode::UNPROCESSABLE_ENTITY => {
                let retry_after = retry_after_header(&response).ok_or_else(|| {
                    UploadError::ProtocolError(
                        "Received an orderly timeout without Retry-After header".to_string(),
                    )
                })??;
                let status: BufferStatus = response.json().await?;
                debug!(%context, ?retry_after, "Server asked to slow down");
                Ok(SubmitOutcome::Backpressure { status, retry_after })
            }
            _ => Err(Self::unexpected(response).await),
        }
    }

    async fn close_context(&self, context: &ContextId) -> Result<CloseOutcome, UploadError> {
        let response = self
            .client
            .post(self.url(&format!("/context/{}/close", context)))
            .json(&CloseContextRequest { context: *context })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let closed: CloseContextResponse = response.json().await?;
                Ok(CloseOutcome::Closed(closed.into()))
            }
            StatusCode::SERVICE_UNAVAILABLE => {
                let header = retry_after_header(&response);
                let body = response.text().await?;
                let busy: BusyResponse = serde_json::from_str(&body).unwrap_or_default();
                let retry_after = match (header, busy.retry_after) {
                    (Some(header), _) => header?,
                    (None, Some(seconds)) => retry_after_from_secs(seconds)?,
                    (None, None) => {
                        return Err(UploadError::ProtocolError(
                            "Server is busy but did not say when to retry".to_string(),
                        ))
                    }
                };
                debug!(%context, ?retry_after, message = ?busy.message, "Close deferred by server");
                Ok(CloseOutcome::Busy {
                    status: busy.status,
                    retry_after,
                })
            }
            _ => Err(Self::unexpected(response).await),
        }
    }
}

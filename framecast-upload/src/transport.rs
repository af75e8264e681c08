//! Frame delivery transports
//!
//! [`UploadTransport`] performs exactly one attempt; retrying is the worker's
//! job. [`HttpTransport`] posts frames to an HTTP endpoint with reqwest.

use crate::error::{UploadError, UploadErrorKind};
use crate::protocol::{BodyMode, ServerReply, CAPTURED_AT_HEADER, FRAME_FIELD, SEQUENCE_HEADER};
use async_trait::async_trait;
use framecast_core::EncodedFrame;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, warn};

/// A successful delivery
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// HTTP status of the response
    pub status: u16,
    /// Parsed JSON acknowledgement, when the body was one
    pub reply: Option<ServerReply>,
}

/// One delivery attempt for one encoded frame
#[async_trait]
pub trait UploadTransport: Send + Sync + std::fmt::Debug {
    /// Send the frame once. Retrying is the caller's job.
    async fn send(&self, frame: &EncodedFrame) -> Result<Delivery, UploadError>;
}

/// HTTP transport settings
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// URL frames are POSTed to
    pub endpoint: String,
    /// How the image is placed in the body
    pub body_mode: BodyMode,
    /// Per-request timeout, covering connect through reading the body
    pub request_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5000/receive_frame".to_string(),
            body_mode: BodyMode::Multipart,
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// POSTs each frame to a fixed endpoint
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    /// Build the HTTP client.
    ///
    /// Fails only if the TLS backend cannot be initialised.
    pub fn new(config: HttpTransportConfig) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| UploadError::permanent(UploadErrorKind::Request(e.to_string())))?;
        Ok(Self { client, config })
    }

    /// Transport settings
    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    fn build_request(&self, frame: &EncodedFrame) -> Result<reqwest::RequestBuilder, UploadError> {
        let request = self
            .client
            .post(&self.config.endpoint)
            .header(SEQUENCE_HEADER, frame.sequence.to_string())
            .header(CAPTURED_AT_HEADER, frame.captured_at.to_rfc3339());

        let request = match self.config.body_mode {
            BodyMode::Multipart => {
                let part = Part::bytes(frame.payload.to_vec())
                    .file_name(frame.file_name())
                    .mime_str(frame.format.mime_type())
                    .map_err(|e| UploadError::permanent(UploadErrorKind::Request(e.to_string())))?;
                request.multipart(Form::new().part(FRAME_FIELD, part))
            }
            BodyMode::Raw => request
                .header(CONTENT_TYPE, frame.format.mime_type())
                .body(frame.payload.clone()),
        };
        Ok(request)
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn send(&self, frame: &EncodedFrame) -> Result<Delivery, UploadError> {
        let response = self
            .build_request(frame)?
            .send()
            .await
            .map_err(|e| UploadError::from_reqwest(&e))?;

        let status = response.status().as_u16();
        if let Some(err) = UploadError::from_status(status) {
            if let Ok(body) = response.text().await {
                debug!(sequence = frame.sequence, status, body = %body, "Upload rejected");
            }
            return Err(err);
        }

        let reply = match response.bytes().await {
            Ok(body) => {
                let reply = ServerReply::parse(&body);
                if reply.is_none() && !body.is_empty() {
                    warn!(
                        sequence = frame.sequence,
                        status, "Server acknowledged frame with a non-JSON body"
                    );
                }
                reply
            }
            Err(e) => {
                warn!(
                    sequence = frame.sequence,
                    status, "Failed to read acknowledgement body: {}", e
                );
                None
            }
        };

        Ok(Delivery { status, reply })
    }
}

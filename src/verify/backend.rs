//! Transport to the visual verification service.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client as HttpClient;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::error::{VerifyError, VerifyResult};
use super::types::{ServiceRequest, ServiceResponse, Usage};
use crate::constants::{
    DEFAULT_API_URL, DEFAULT_MAX_OUTPUT_UNITS, DEFAULT_MODEL, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::render::PageImage;

const API_VERSION: &str = "2023-06-01";
const MAX_ERROR_BODY_CHARS: usize = 512;

#[async_trait]
/// Sends one request and returns the raw reply. No retries, no parsing.
pub trait VerificationBackend: Send + Sync + 'static {
    async fn send(&self, request: &ServiceRequest) -> VerifyResult<ServiceResponse>;

    /// Most units `request` can be billed for. Budget is reserved against this before
    /// the call is sent.
    fn usage_bound(&self, request: &ServiceRequest) -> Usage {
        request.usage_bound(DEFAULT_MAX_OUTPUT_UNITS)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpBackendConfig {
    pub url: String,
    pub api_key: String,
    pub model: String,
    pub max_output_units: u32,
    pub timeout: Duration,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            max_output_units: DEFAULT_MAX_OUTPUT_UNITS,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Messages-style JSON API with inline base64 images.
#[derive(Debug, Clone)]
pub struct HttpVerificationBackend {
    http: HttpClient,
    config: HttpBackendConfig,
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    #[serde(default)]
    content: Vec<ApiBlock>,
    #[serde(default)]
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
struct ApiBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl HttpVerificationBackend {
    pub fn new(config: HttpBackendConfig) -> VerifyResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(VerifyError::Config {
                reason: "API key is empty".to_string(),
            });
        }
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VerifyError::Config {
                reason: e.to_string(),
            })?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &HttpBackendConfig {
        &self.config
    }

    fn image_block(image: &PageImage) -> Value {
        json!({
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": PageImage::MEDIA_TYPE,
                "data": BASE64.encode(&image.png),
            }
        })
    }

    /// Request body: instruction and context first, then left pages, then right pages.
    pub fn body(&self, request: &ServiceRequest) -> Value {
        let mut content = Vec::with_capacity(2 + request.left.len() + request.right.len());
        content.push(json!({ "type": "text", "text": request.instruction.as_ref() }));
        content.push(json!({ "type": "text", "text": request.context }));
        content.extend(request.left.iter().map(Self::image_block));
        content.extend(request.right.iter().map(Self::image_block));

        json!({
            "model": self.config.model,
            "max_tokens": self.config.max_output_units,
            "messages": [{ "role": "user", "content": content }],
        })
    }
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn truncate(body: String) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body;
    }
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[async_trait]
impl VerificationBackend for HttpVerificationBackend {
    async fn send(&self, request: &ServiceRequest) -> VerifyResult<ServiceResponse> {
        let resp = self
            .http
            .post(&self.config.url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.body(request))
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(VerifyError::RateLimited {
                retry_after: retry_after(resp.headers()),
            });
        }
        if !status.is_success() {
            let body = truncate(resp.text().await.unwrap_or_default());
            return Err(if status.is_server_error() {
                VerifyError::Service {
                    status: status.as_u16(),
                    body,
                }
            } else {
                VerifyError::Rejected {
                    status: status.as_u16(),
                    body,
                }
            });
        }

        let reply: ApiReply = resp.json().await.map_err(|e| VerifyError::Decode {
            reason: e.to_string(),
        })?;

        let text = reply
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");

        debug!(
            input_units = reply.usage.input_tokens,
            output_units = reply.usage.output_tokens,
            "Verification reply received"
        );

        Ok(ServiceResponse {
            text,
            usage: Usage {
                input_units: reply.usage.input_tokens,
                output_units: reply.usage.output_tokens,
            },
        })
    }

    fn usage_bound(&self, request: &ServiceRequest) -> Usage {
        request.usage_bound(self.config.max_output_units)
    }
}

#[cfg(any(test, feature = "mock"))]
pub use mock::MockVerificationBackend;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::VerificationBackend;
    use crate::verify::error::{VerifyError, VerifyResult};
    use crate::verify::types::{ServiceRequest, ServiceResponse, Usage};

    type Responder = dyn Fn(&ServiceRequest) -> VerifyResult<ServiceResponse> + Send + Sync;

    /// Scripted backend.
    ///
    /// Queued results are returned first, in order; after that every call goes to the
    /// responder.
    pub struct MockVerificationBackend {
        queue: Mutex<VecDeque<VerifyResult<ServiceResponse>>>,
        responder: Arc<Responder>,
        calls: AtomicUsize,
        requests: Mutex<Vec<String>>,
    }

    impl std::fmt::Debug for MockVerificationBackend {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MockVerificationBackend")
                .field("queued", &self.queue.lock().len())
                .field("calls", &self.calls())
                .finish_non_exhaustive()
        }
    }

    impl MockVerificationBackend {
        /// Answers every call with `text` and the given usage.
        pub fn replying(text: &str, usage: Usage) -> Self {
            let text = text.to_string();
            Self::with_responder(move |_| {
                Ok(ServiceResponse {
                    text: text.clone(),
                    usage,
                })
            })
        }

        pub fn with_responder<F>(responder: F) -> Self
        where
            F: Fn(&ServiceRequest) -> VerifyResult<ServiceResponse> + Send + Sync + 'static,
        {
            Self {
                queue: Mutex::new(VecDeque::new()),
                responder: Arc::new(responder),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Every call fails with a retryable service error.
        pub fn failing() -> Self {
            Self::with_responder(|_| {
                Err(VerifyError::Service {
                    status: 503,
                    body: "unavailable".to_string(),
                })
            })
        }

        pub fn push(self, result: VerifyResult<ServiceResponse>) -> Self {
            self.queue.lock().push_back(result);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Context text of every request, in call order.
        pub fn contexts(&self) -> Vec<String> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl VerificationBackend for MockVerificationBackend {
        async fn send(&self, request: &ServiceRequest) -> VerifyResult<ServiceResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().push(request.context.clone());
            if let Some(result) = self.queue.lock().pop_front() {
                return result;
            }
            (self.responder)(request)
        }
    }
}

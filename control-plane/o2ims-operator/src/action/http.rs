use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use o2ims_models::O2imsSpec;

use super::{ActionError, ActionExecutor, ActionOutcome};

/// Invokes `spec.url` with a GET and classifies the response.
#[derive(Clone)]
pub struct HttpActionExecutor {
    client: Client,
    log_limit: usize,
}

impl HttpActionExecutor {
    pub fn new(log_limit: usize) -> Result<Self, ActionError> {
        let client = Client::builder()
            .user_agent(concat!("o2ims-operator/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, log_limit })
    }

    pub fn with_client(client: Client, log_limit: usize) -> Self {
        Self { client, log_limit }
    }
}

fn parse_target(raw: &str) -> Result<Url, String> {
    if raw.trim().is_empty() {
        return Err("spec.url is empty".into());
    }
    let url = Url::parse(raw).map_err(|e| format!("invalid url '{raw}': {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported url scheme '{other}'")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusClass {
    Success,
    Retry,
    Fatal,
}

fn classify_status(status: StatusCode) -> StatusClass {
    if status.is_success() {
        StatusClass::Success
    } else if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        StatusClass::Retry
    } else if status.is_client_error() {
        StatusClass::Fatal
    } else {
        StatusClass::Retry
    }
}

/// Leading bytes of a response body kept for logging, plus its full length.
struct BodySample {
    head: Vec<u8>,
    total: usize,
    limit: usize,
}

impl BodySample {
    fn new(limit: usize) -> Self {
        Self {
            head: Vec::new(),
            total: 0,
            limit,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        self.total += chunk.len();
        let room = self.limit.saturating_sub(self.head.len());
        self.head.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    fn for_log(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.head).into_owned();
        if self.total > self.head.len() {
            text.push_str(&format!(
                "... ({} bytes truncated)",
                self.total - self.head.len()
            ));
        }
        text
    }
}

#[async_trait]
impl ActionExecutor for HttpActionExecutor {
    async fn execute(
        &self,
        spec: &O2imsSpec,
        deadline: Instant,
    ) -> ActionOutcome {
        let url = match parse_target(&spec.url) {
            Ok(u) => u,
            Err(msg) => return ActionOutcome::PermanentFailure(msg),
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return ActionOutcome::TransientFailure(format!(
                "deadline passed before calling {url}"
            ));
        }

        info!(%url, timeout_ms = remaining.as_millis() as u64, "http action: invoking endpoint");
        let mut response =
            match self.client.get(url.clone()).timeout(remaining).send().await {
                Ok(r) => r,
                Err(e) if e.is_builder() => {
                    return ActionOutcome::PermanentFailure(format!(
                        "cannot build request for {url}: {e}"
                    ));
                }
                Err(e) => {
                    warn!(%url, error = %e, "http action: request failed");
                    return ActionOutcome::TransientFailure(format!(
                        "GET {url} failed: {e}"
                    ));
                }
            };

        let status = response.status();
        let mut body = BodySample::new(self.log_limit);
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => body.push(&chunk),
                Ok(None) => break,
                Err(e) => {
                    warn!(%url, %status, error = %e, "http action: reading body failed");
                    return ActionOutcome::TransientFailure(format!(
                        "reading response from {url} failed: {e}"
                    ));
                }
            }
        }
        debug!(%url, %status, body = %body.for_log(), "http action: response");

        match classify_status(status) {
            StatusClass::Success => {
                info!(%url, %status, "http action: endpoint invoked");
                ActionOutcome::Success(format!(
                    "GET {url} returned {status} ({} bytes)",
                    body.total
                ))
            }
            StatusClass::Retry => ActionOutcome::TransientFailure(format!(
                "GET {url} returned {status}"
            )),
            StatusClass::Fatal => ActionOutcome::PermanentFailure(format!(
                "GET {url} returned {status}"
            )),
        }
    }
}

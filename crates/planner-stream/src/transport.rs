//! Opening the generation stream.
//!
//! `PlanTransport` is the seam between the run machinery and the network;
//! `HttpPlanTransport` is the reqwest implementation.

use std::pin::Pin;

use futures::StreamExt as _;
use tracing::debug;

use crate::config::PlannerClientConfig;
use crate::errors::GenerateError;
use crate::request::GeneratePlanRequest;

/// Chunked response body.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, std::io::Error>> + Send + 'static>>;

/// A response whose headers indicated success.
pub struct PlanResponse {
    /// HTTP status code (2xx).
    pub status: u16,
    /// Streamed body, `None` when the server sent none.
    pub body: Option<ByteStream>,
}

/// Starts a plan generation and hands back the streamed body.
///
/// Implementations map a 409 to [`GenerateError::Conflict`] and any other
/// non-2xx status to [`GenerateError::Server`].
#[async_trait::async_trait]
pub trait PlanTransport: Send + Sync {
    async fn open(
        &self,
        project_id: &str,
        request: &GeneratePlanRequest,
    ) -> Result<PlanResponse, GenerateError>;
}

/// Maps a non-success status to the matching error.
pub fn error_for_status(status: u16, body: &str) -> GenerateError {
    if status == 409 {
        return GenerateError::Conflict;
    }
    let message = if body.trim().is_empty() {
        format!("plan generation request failed with status {status}")
    } else {
        format!("plan generation request failed with status {status}: {}", body.trim())
    };
    GenerateError::Server { status, message }
}

/// reqwest-backed transport for the planner API.
pub struct HttpPlanTransport {
    client: reqwest::Client,
    config: PlannerClientConfig,
}

impl HttpPlanTransport {
    /// Creates a transport from explicit client configuration.
    pub fn new(config: PlannerClientConfig) -> Result<Self, GenerateError> {
        if config.base_url.trim().is_empty() {
            return Err(GenerateError::Config(
                "planner client base_url must not be empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| GenerateError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a transport from `PLANNER_*` environment variables.
    pub fn from_env() -> Result<Self, GenerateError> {
        Self::new(PlannerClientConfig::from_env()?)
    }
}

#[async_trait::async_trait]
impl PlanTransport for HttpPlanTransport {
    async fn open(
        &self,
        project_id: &str,
        request: &GeneratePlanRequest,
    ) -> Result<PlanResponse, GenerateError> {
        let url = self.config.generate_url(project_id);
        debug!(%project_id, version_name = %request.version_name, "requesting plan generation");

        let mut http_req = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request);
        if let Some(token) = self.config.api_token.as_deref() {
            http_req = http_req.bearer_auth(token);
        }

        let response = http_req
            .send()
            .await
            .map_err(|e| GenerateError::Transport(format!("plan generation request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(error_for_status(status.as_u16(), &body));
        }

        let body: ByteStream = Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(std::io::Error::other)),
        );
        Ok(PlanResponse {
            status: status.as_u16(),
            body: Some(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CONFLICT_MESSAGE;
    use crate::consumer::{CancelToken, ConsumeOutcome, consume};
    use crate::sink::NoopSink;
    use crate::state::StreamState;
    use futures::TryStreamExt as _;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn transport_for(server: &MockServer) -> HttpPlanTransport {
        HttpPlanTransport::new(PlannerClientConfig::new(server.uri()).api_token("secret"))
            .expect("transport")
    }

    #[test]
    fn status_mapping() {
        assert_eq!(error_for_status(409, "dup"), GenerateError::Conflict);
        assert_eq!(error_for_status(409, "").to_string(), CONFLICT_MESSAGE);
        assert!(matches!(
            error_for_status(502, " bad gateway "),
            GenerateError::Server { status: 502, message } if message.ends_with("bad gateway")
        ));
    }

    #[tokio::test]
    async fn posts_request_and_streams_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/projects/p1/plans/generate"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(serde_json::json!({"versionName": "v1"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("progress:10\n"))
            .expect(1)
            .mount(&server)
            .await;

        let response = transport_for(&server)
            .await
            .open("p1", &GeneratePlanRequest::new("v1"))
            .await
            .expect("open");
        assert_eq!(response.status, 200);
        let chunks: Vec<bytes::Bytes> = response
            .body
            .expect("body")
            .try_collect()
            .await
            .expect("read body");
        let text: Vec<u8> = chunks.concat();
        assert_eq!(text, b"progress:10\n");
    }

    #[tokio::test]
    async fn conflict_status_maps_to_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409).set_body_string("duplicate"))
            .mount(&server)
            .await;

        let err = transport_for(&server)
            .await
            .open("p1", &GeneratePlanRequest::new("v1"))
            .await
            .err()
            .expect("conflict");
        assert_eq!(err, GenerateError::Conflict);
    }

    #[tokio::test]
    async fn other_status_maps_to_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = transport_for(&server)
            .await
            .open("p1", &GeneratePlanRequest::new("v1"))
            .await
            .err()
            .expect("server error");
        assert!(matches!(err, GenerateError::Server { status: 500, .. }));
    }

    #[tokio::test]
    async fn slow_body_outlives_the_connect_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut request = Vec::new();
            let mut buf = [0_u8; 1024];
            while !String::from_utf8_lossy(&request).contains("versionName") {
                let n = socket.read(&mut buf).await.expect("read request");
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\nc\r\nprogress:10\n\r\n",
                )
                .await
                .expect("write head");
            tokio::time::sleep(Duration::from_millis(400)).await;
            socket
                .write_all(b"d\r\nprogress:100\n\r\n0\r\n\r\n")
                .await
                .expect("write tail");
        });

        let config = PlannerClientConfig::new(format!("http://{addr}"))
            .connect_timeout(Duration::from_millis(100));
        let response = HttpPlanTransport::new(config)
            .expect("transport")
            .open("p1", &GeneratePlanRequest::new("v1"))
            .await
            .expect("open");

        let mut state = StreamState::new();
        let outcome = consume(response.body, &mut state, &mut NoopSink, &CancelToken::new())
            .await
            .expect("stream read past the connect timeout");
        assert_eq!(outcome, ConsumeOutcome::Completed(None));
        assert_eq!(state.progress_percent, 100);
    }
}

//! `x-qtc` HTTP transport.

use std::time::Duration;

use async_trait::async_trait;
use qbatch_core::{ExecParams, Transport, TransportError, TransportResult};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, error, info, instrument};

use crate::error::{HttpError, HttpResult};

/// Connection retries before the engine is reported unreachable.
pub const MAX_RETRIES: u32 = 5;

/// Pause between connection retries and between result polls.
pub const RETRY_DELAY: Duration = Duration::from_millis(200);

/// Transport posting experiments to an engine's HTTP interface.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    request_timeout: Option<Duration>,
}

impl HttpTransport {
    /// Create a transport for the engine at `base_url`.
    pub fn new(base_url: impl Into<String>) -> HttpResult<Self> {
        let base_url = base_url.into();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(HttpError::InvalidUrl(base_url));
        }

        let client = Client::builder().build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: None,
        })
    }

    /// Give up on a submission after `timeout` and poll for the answer instead.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn timed(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.request_timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    fn submit_request(&self, payload: &[u8], params: &ExecParams) -> RequestBuilder {
        let mut builder = self
            .client
            .post(format!("{}/submit", self.base_url))
            .header("content-type", "application/json")
            .header("x-qtc-return", params.returns_joined())
            .header("x-qtc-shots", params.shots.to_string())
            .header("x-qtc-jobid", params.job_id.as_str());
        if let Some(seed) = params.seed.filter(|s| *s != 0) {
            builder = builder.header("x-qtc-seed", seed.to_string());
        }
        if let Some(level) = params.optimization_level.filter(|l| *l != 0) {
            builder = builder.header("x-qtc-optimization", level.to_string());
        }
        self.timed(builder.body(payload.to_vec()))
    }

    /// Fetch the answer for a job the engine already holds.
    ///
    /// Retries until the engine answers; only an HTTP error status ends the loop.
    #[instrument(skip(self))]
    async fn poll_result(&self, job_id: &str) -> TransportResult<Vec<u8>> {
        let url = format!("{}/pollresult/{}", self.base_url, job_id);
        loop {
            match self.timed(self.client.get(&url)).send().await {
                Ok(response) if response.status().is_success() => {
                    return read_body(response).await;
                }
                Ok(response) => return Err(status_error(response).await),
                Err(e) => {
                    debug!("Polling {} failed: {}", url, e);
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, payload, params), fields(job_id = %params.job_id))]
    async fn execute(&self, payload: &[u8], params: &ExecParams) -> TransportResult<Vec<u8>> {
        info!("Sending experiment to engine at {}", self.base_url);
        debug!(
            shots = params.shots,
            returns = %params.returns_joined(),
            seed = ?params.seed,
            optimization = ?params.optimization_level,
            "Simulation parameters"
        );

        let mut retries = 0;
        loop {
            match self.submit_request(payload, params).send().await {
                Ok(response) if response.status() == StatusCode::CONFLICT => {
                    debug!("Engine already holds {}, fetching result", params.job_id);
                    return self.poll_result(&params.job_id).await;
                }
                Ok(response) if response.status().is_success() => {
                    return read_body(response).await;
                }
                Ok(response) => return Err(status_error(response).await),
                Err(e) if e.is_timeout() => {
                    debug!("Submission timed out, fetching result: {}", e);
                    return self.poll_result(&params.job_id).await;
                }
                Err(e) if retries < MAX_RETRIES => {
                    retries += 1;
                    debug!("Connection failed, retrying (#{}): {}", retries, e);
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(_) => {
                    let err = TransportError::Connection {
                        target: self.base_url.clone(),
                        attempts: retries + 1,
                    };
                    error!("{}", err);
                    return Err(err);
                }
            }
        }
    }
}

async fn read_body(response: Response) -> TransportResult<Vec<u8>> {
    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| TransportError::Request(e.to_string()))
}

async fn status_error(response: Response) -> TransportError {
    let code = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    TransportError::Status { code, body }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_url() {
        assert!(matches!(
            HttpTransport::new("127.0.0.1:8001"),
            Err(HttpError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let transport = HttpTransport::new("http://127.0.0.1:8001/").unwrap();
        assert_eq!(transport.base_url(), "http://127.0.0.1:8001");
        assert_eq!(transport.name(), "http");
    }

    #[test]
    fn test_optional_headers_omitted_when_zero() {
        let transport = HttpTransport::new("http://127.0.0.1:8001").unwrap();
        let mut params = ExecParams::new("Exp_1_j", 10);
        params.seed = Some(0);
        params.optimization_level = Some(0);

        let request = transport.submit_request(b"{}", &params).build().unwrap();
        let headers = request.headers();
        assert_eq!(headers["x-qtc-shots"], "10");
        assert_eq!(headers["x-qtc-return"], "counts");
        assert_eq!(headers["x-qtc-jobid"], "Exp_1_j");
        assert!(!headers.contains_key("x-qtc-seed"));
        assert!(!headers.contains_key("x-qtc-optimization"));
        assert_eq!(request.url().path(), "/submit");
    }

    #[test]
    fn test_state_return_joined() {
        let transport = HttpTransport::new("http://127.0.0.1:8001")
            .unwrap()
            .with_request_timeout(Some(Duration::from_secs(5)));
        let params = ExecParams::new("Exp_1_j", 1).with_return(qbatch_core::ReturnKind::State);

        let request = transport.submit_request(b"{}", &params).build().unwrap();
        assert_eq!(request.headers()["x-qtc-return"], "counts,state");
        assert_eq!(request.timeout(), Some(&Duration::from_secs(5)));
    }
}

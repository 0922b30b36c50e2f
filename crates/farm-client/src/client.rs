use std::time::Duration;

use reqwest::{StatusCode, Url};

use crate::error::{DeviceClientError, Result};
use crate::wire::{
    CommandRequest, JobState, JobStateResponse, PrinterState, PrinterStateResponse,
    UploadResponse,
};

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// End-of-file sentinel appended to uploaded programs so the controller can
/// detect completion unambiguously, rather than racing the device's own
/// G-code cache.
pub const END_OF_FILE_SENTINEL: &str = "\nM400 \nM115";

/// Speaks the fixed printer-host REST dialect over HTTP.
#[derive(Debug, Clone)]
pub struct DeviceClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl DeviceClient {
    pub fn new(base_url: Url, api_key: impl Into<String>) -> Self {
        Self::with_timeouts(
            base_url,
            api_key,
            Duration::from_secs(5),
            Duration::from_secs(10),
        )
    }

    pub fn with_timeouts(
        base_url: Url,
        api_key: impl Into<String>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()
            .expect("reqwest client configuration is valid");
        Self {
            http,
            base_url,
            api_key: api_key.into(),
        }
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| DeviceClientError::Protocol(format!("bad path {path}: {e}")))
    }

    /// GET `/api/version`. Returns `true` iff the device answered 200.
    pub async fn ping(&self) -> bool {
        let Ok(url) = self.url("api/version") else {
            return false;
        };
        retry(|| async {
            let res = self
                .http
                .get(url.clone())
                .header("x-api-key", &self.api_key)
                .send()
                .await?;
            Ok(res.status() == StatusCode::OK)
        })
        .await
        .unwrap_or(false)
    }

    /// POST `{commands:[...]}` to `/api/printer/command`. Never blocks on command
    /// completion; a 204 means the device accepted the command for execution.
    pub async fn issue_commands(&self, lines: &[&str]) -> Result<()> {
        let url = self.url("api/printer/command")?;
        retry(|| async {
            let res = self
                .http
                .post(url.clone())
                .header("x-api-key", &self.api_key)
                .json(&CommandRequest {
                    commands: lines.to_vec(),
                })
                .send()
                .await?;
            expect_status(res, StatusCode::NO_CONTENT).await?;
            Ok(())
        })
        .await
    }

    /// Streams `content` (already carrying the end-of-file sentinel) to
    /// `/api/files/local` with `print=true`. Returns the filename the remote
    /// assigned, which the caller must hold onto to detect job tracking loss.
    pub async fn upload_and_start(&self, filename: &str, content: Vec<u8>) -> Result<String> {
        let url = self.url("api/files/local")?;
        retry(|| async {
            let form = reqwest::multipart::Form::new()
                .text("print", "true")
                .part(
                    "file",
                    reqwest::multipart::Part::bytes(content.clone())
                        .file_name(filename.to_string()),
                );
            let res = self
                .http
                .post(url.clone())
                .header("x-api-key", &self.api_key)
                .multipart(form)
                .send()
                .await?;
            let res = expect_status(res, StatusCode::OK).await?;
            let body: UploadResponse = res
                .json()
                .await
                .map_err(|e| DeviceClientError::Protocol(e.to_string()))?;
            if body.done {
                Ok(filename.to_string())
            } else {
                Err(DeviceClientError::Protocol(
                    "upload did not report done".to_string(),
                ))
            }
        })
        .await
    }

    /// GET `/api/printer`.
    pub async fn fetch_printer_state(&self) -> Result<PrinterState> {
        let url = self.url("api/printer")?;
        retry(|| async {
            let res = self
                .http
                .get(url.clone())
                .header("x-api-key", &self.api_key)
                .send()
                .await?;
            let res = expect_status(res, StatusCode::OK).await?;
            let body: PrinterStateResponse = res
                .json()
                .await
                .map_err(|e| DeviceClientError::Protocol(e.to_string()))?;
            Ok(PrinterState {
                flags: body.state.flags.into(),
                temperature: crate::wire::Temperatures {
                    tool: body.temperature.as_ref().and_then(|t| t.tool0.as_ref()).map(|p| p.actual),
                    bed: body.temperature.as_ref().and_then(|t| t.bed.as_ref()).map(|p| p.actual),
                },
            })
        })
        .await
    }

    /// GET `/api/job`.
    pub async fn fetch_job_state(&self) -> Result<JobState> {
        let url = self.url("api/job")?;
        retry(|| async {
            let res = self
                .http
                .get(url.clone())
                .header("x-api-key", &self.api_key)
                .send()
                .await?;
            let res = expect_status(res, StatusCode::OK).await?;
            let body: JobStateResponse = res
                .json()
                .await
                .map_err(|e| DeviceClientError::Protocol(e.to_string()))?;
            Ok(JobState {
                file_name: body.job.file.name,
                estimated_total_s: body.job.estimated_print_time,
                estimated_left_s: body.progress.print_time_left,
            })
        })
        .await
    }

    /// POST a job-cancel command.
    pub async fn cancel(&self) -> Result<()> {
        let url = self.url("api/job")?;
        retry(|| async {
            let res = self
                .http
                .post(url.clone())
                .header("x-api-key", &self.api_key)
                .json(&serde_json::json!({"command": "cancel"}))
                .send()
                .await?;
            expect_status(res, StatusCode::NO_CONTENT).await?;
            Ok(())
        })
        .await
    }
}

async fn expect_status(
    res: reqwest::Response,
    expected: StatusCode,
) -> Result<reqwest::Response> {
    if res.status() == expected {
        return Ok(res);
    }
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    Err(DeviceClientError::UnexpectedStatus { status, body })
}

/// Retries transient network errors and HTTP 405-500 up to `MAX_ATTEMPTS`
/// times with a fixed backoff between attempts. Other failures (4xx outside
/// that range, protocol mismatches) surface immediately.
async fn retry<F, Fut, T>(mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_err = None;
    for n in 0..MAX_ATTEMPTS {
        match attempt().await {
            Ok(v) => return Ok(v),
            Err(err) if is_retryable(&err) => {
                tracing::warn!(attempt = n + 1, error = %err, "device call failed, retrying");
                last_err = Some(err);
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_err.expect("loop runs at least once"))
}

fn is_retryable(err: &DeviceClientError) -> bool {
    match err {
        DeviceClientError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        DeviceClientError::UnexpectedStatus { status, .. } => {
            status.as_u16() >= 405 && status.as_u16() <= 500
        }
        DeviceClientError::Protocol(_) => false,
    }
}

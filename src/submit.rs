//! Submission collaborator
//!
//! The session hands snapshots to a [`Submitter`] and receives the server's
//! answer asynchronously. Returned futures own everything they need
//! (`'static`), so an outstanding call never borrows the session and can be
//! dropped to abandon it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::{FormError, SubmissionError};
use crate::page::{self, PageAnswer};
use crate::types::{BatchSummary, FeatureValue, SubmissionSummary};
use crate::upload::CsvUpload;

pub type SubmissionFuture =
    Pin<Box<dyn Future<Output = Result<SubmissionSummary, SubmissionError>> + Send>>;

pub type BatchFuture = Pin<Box<dyn Future<Output = Result<BatchSummary, SubmissionError>> + Send>>;

/// Submission collaborator
pub trait Submitter: Send + Sync {
    /// Score one record given as (name, value) pairs in schema order.
    fn submit_values(&self, values: Vec<FeatureValue>) -> SubmissionFuture;

    /// Score a CSV file in batch.
    fn submit_batch(&self, upload: CsvUpload) -> BatchFuture;
}

/// Server health as reported by `GET /health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
    #[serde(default)]
    pub model_type: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy" && self.model_loaded
    }
}

/// Talks to the prediction server over HTTP.
///
/// Single records are posted form-encoded to the endpoint root; CSV files
/// are posted as multipart field `file` to `batch_path`.
#[derive(Debug, Clone)]
pub struct HttpSubmitter {
    client: reqwest::Client,
    endpoint: String,
    batch_path: String,
}

impl HttpSubmitter {
    pub fn new(endpoint: &str, batch_path: &str, timeout: Duration) -> Result<Self, FormError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FormError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            batch_path: batch_path.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Query the server's health endpoint.
    pub async fn health(&self) -> Result<HealthReport, SubmissionError> {
        let url = join_url(&self.endpoint, "health");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(SubmissionError::Application(format!(
                "Server returned HTTP {}",
                status.as_u16()
            )));
        }
        serde_json::from_str(&body)
            .map_err(|e| SubmissionError::Application(format!("Malformed health report: {}", e)))
    }
}

impl Submitter for HttpSubmitter {
    fn submit_values(&self, values: Vec<FeatureValue>) -> SubmissionFuture {
        let client = self.client.clone();
        let url = self.endpoint.clone();
        let form: Vec<(String, String)> = values
            .into_iter()
            .map(|fv| (fv.name, fv.value.to_string()))
            .collect();

        Box::pin(async move {
            tracing::debug!(%url, fields = form.len(), "posting feature values");
            let response = client
                .post(&url)
                .header(reqwest::header::ACCEPT, "application/json, text/html;q=0.9")
                .form(&form)
                .send()
                .await
                .map_err(transport_error)?;
            let status = response.status().as_u16();
            let body = response.text().await.map_err(transport_error)?;
            parse_prediction(status, &body)
        })
    }

    fn submit_batch(&self, upload: CsvUpload) -> BatchFuture {
        let client = self.client.clone();
        let url = join_url(&self.endpoint, &self.batch_path);

        Box::pin(async move {
            tracing::debug!(%url, file = %upload.file_name, "posting CSV batch");
            let part = reqwest::multipart::Part::bytes(upload.bytes)
                .file_name(upload.file_name)
                .mime_str("text/csv")
                .map_err(transport_error)?;
            let form = reqwest::multipart::Form::new().part("file", part);

            let response = client
                .post(&url)
                .header(reqwest::header::ACCEPT, "application/json")
                .multipart(form)
                .send()
                .await
                .map_err(transport_error)?;
            let status = response.status().as_u16();
            let body = response.text().await.map_err(transport_error)?;
            parse_batch(status, &body)
        })
    }
}

fn transport_error(e: reqwest::Error) -> SubmissionError {
    if e.is_timeout() {
        SubmissionError::Transport("Request timed out".to_string())
    } else if e.is_connect() {
        SubmissionError::Transport("Cannot reach the analysis server".to_string())
    } else {
        SubmissionError::Transport(e.to_string())
    }
}

fn join_url(endpoint: &str, path: &str) -> String {
    format!(
        "{}/{}",
        endpoint.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Parse the server's JSON body into a structured JSON value, mapping
/// explicit error payloads and non-2xx statuses to application errors.
fn parse_body(status: u16, body: &str) -> Result<Value, SubmissionError> {
    let success = (200..300).contains(&status);

    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) if success => {
            return Err(SubmissionError::Application(
                "Unexpected response from server".to_string(),
            ))
        }
        Err(_) => {
            return Err(SubmissionError::Application(format!(
                "Server returned HTTP {}",
                status
            )))
        }
    };

    if let Some(msg) = value.get("error").and_then(Value::as_str) {
        return Err(SubmissionError::Application(msg.to_string()));
    }
    if !success {
        return Err(SubmissionError::Application(format!(
            "Server returned HTTP {}",
            status
        )));
    }
    Ok(value)
}

/// Interpret a single-record prediction response: JSON, or the HTML page
/// the reference server renders for its form.
pub fn parse_prediction(status: u16, body: &str) -> Result<SubmissionSummary, SubmissionError> {
    if (200..300).contains(&status) && page::is_html(body) {
        return match page::read_prediction_page(body) {
            PageAnswer::Prediction(summary) => Ok(summary),
            PageAnswer::Error(msg) => Err(SubmissionError::Application(msg)),
            PageAnswer::Nothing => Err(no_prediction()),
        };
    }

    let value = parse_body(status, body)?;

    let probabilities: Vec<f64> = value
        .get("probabilities")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_f64).collect())
        .unwrap_or_default();

    if let Some(emotion) = value.get("result").and_then(Value::as_str) {
        return Ok(SubmissionSummary {
            emotion: emotion.to_string(),
            confidence: value.get("confidence").and_then(Value::as_f64),
            probabilities,
        });
    }

    if let Some(class_id) = value.get("prediction").and_then(Value::as_i64) {
        return Ok(SubmissionSummary::from_class(class_id, probabilities));
    }

    Err(no_prediction())
}

fn no_prediction() -> SubmissionError {
    SubmissionError::Application("Response did not contain a prediction".to_string())
}

/// Interpret a batch upload response. The summary may be top-level or
/// nested under `summary`, with the download link on either level.
pub fn parse_batch(status: u16, body: &str) -> Result<BatchSummary, SubmissionError> {
    let value = parse_body(status, body)?;
    let summary_value = value.get("summary").unwrap_or(&value);

    let mut summary: BatchSummary = serde_json::from_value(summary_value.clone())
        .map_err(|e| SubmissionError::Application(format!("Malformed batch summary: {}", e)))?;

    if summary.download_url.is_none() {
        summary.download_url = ["download_url", "download_link"]
            .iter()
            .find_map(|k| value.get(*k).and_then(Value::as_str))
            .map(str::to_string);
    }
    Ok(summary)
}

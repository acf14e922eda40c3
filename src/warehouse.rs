use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::WarehouseConfig;
use crate::error::StepError;

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const MAX_POLLS: u32 = 150;

/// Destination seam for the load step. The production implementation talks to
/// BigQuery; tests substitute an in-memory sink.
#[async_trait]
pub trait WarehouseSink {
    /// Replaces the destination table's entire contents with one CSV batch
    /// and returns the number of rows the warehouse reports loaded. The swap
    /// is all-or-nothing, so submitting the same batch twice leaves the table
    /// unchanged.
    async fn replace_table(&self, csv: Vec<u8>) -> Result<u64, StepError>;
}

/// Submits a CSV load job against the BigQuery jobs API and polls it to
/// completion.
pub struct BigQueryLoader {
    http: reqwest::Client,
    config: WarehouseConfig,
}

impl BigQueryLoader {
    pub fn new(config: WarehouseConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn load_job_config(&self) -> Value {
        json!({
            "configuration": {
                "load": {
                    "destinationTable": {
                        "projectId": self.config.project,
                        "datasetId": self.config.dataset,
                        "tableId": self.config.table,
                    },
                    "schema": { "fields": table_schema() },
                    "writeDisposition": "WRITE_TRUNCATE",
                    "skipLeadingRows": 1,
                    "sourceFormat": "CSV",
                }
            }
        })
    }

    async fn submit_job(&self, csv: &[u8]) -> Result<String, StepError> {
        let boundary = format!("gradebook-{}", uuid::Uuid::new_v4());
        let body = multipart_body(&self.load_job_config(), csv, &boundary);
        let url = format!(
            "https://bigquery.googleapis.com/upload/bigquery/v2/projects/{}/jobs?uploadType=multipart",
            self.config.project
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.access_token)
            .header(
                "Content-Type",
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await
            .map_err(|err| StepError::Warehouse(err.to_string()))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|err| StepError::Warehouse(err.to_string()))?;
        if !status.is_success() {
            return Err(StepError::Warehouse(format!(
                "job submission returned {status}: {payload}"
            )));
        }

        payload["jobReference"]["jobId"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                StepError::Warehouse("job submission response missing jobReference.jobId".into())
            })
    }

    async fn wait_for_done(&self, job_id: &str) -> Result<u64, StepError> {
        let url = format!(
            "https://bigquery.googleapis.com/bigquery/v2/projects/{}/jobs/{}",
            self.config.project, job_id
        );

        for _ in 0..MAX_POLLS {
            let payload: Value = self
                .http
                .get(&url)
                .bearer_auth(&self.config.access_token)
                .send()
                .await
                .map_err(|err| StepError::Warehouse(err.to_string()))?
                .json()
                .await
                .map_err(|err| StepError::Warehouse(err.to_string()))?;

            if payload["status"]["state"].as_str() == Some("DONE") {
                if let Some(error) = payload["status"]["errorResult"].as_object() {
                    let message = error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error");
                    return Err(StepError::Warehouse(format!("job {job_id}: {message}")));
                }
                let rows = payload["statistics"]["load"]["outputRows"]
                    .as_str()
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(0);
                return Ok(rows);
            }

            debug!(job_id, "load job still running");
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        Err(StepError::Warehouse(format!(
            "job {job_id} did not finish within the polling window"
        )))
    }
}

#[async_trait]
impl WarehouseSink for BigQueryLoader {
    async fn replace_table(&self, csv: Vec<u8>) -> Result<u64, StepError> {
        let job_id = self.submit_job(&csv).await?;
        debug!(job_id, table = %self.config.table_id(), "load job submitted");
        self.wait_for_done(&job_id).await
    }
}

/// The fixed destination schema, in artifact column order: the float grade,
/// the record timestamp, and ten string columns.
pub fn table_schema() -> Value {
    let fields: Vec<Value> = crate::models::COLUMNS
        .iter()
        .map(|name| {
            let kind = match *name {
                "grade" => "FLOAT",
                "recorded_at" => "TIMESTAMP",
                _ => "STRING",
            };
            json!({ "name": name, "type": kind })
        })
        .collect();
    Value::Array(fields)
}

/// BigQuery's multipart upload wants `multipart/related`, which reqwest's
/// form support does not produce, so the body is assembled by hand.
fn multipart_body(job_config: &Value, csv: &[u8], boundary: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!("--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(job_config.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{boundary}\r\nContent-Type: text/csv\r\n\r\n").as_bytes());
    body.extend_from_slice(csv);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

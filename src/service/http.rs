//! reqwest implementation of the detection service

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use tracing::{debug, warn};

use super::http_client::{detection_client, health_client};
use super::{
    DetectionService, ErrorBody, ExportRequest, HistoryResponse, ProcessRequest, ProcessResponse,
    RedactionRecord, ServiceHealth, UploadBody, DOWNLOAD_FAILED, HISTORY_FAILED,
    PROCESSING_FAILED,
};
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::results::StructuredRow;

const PROCESS_PATH: &str = "/api/process-files";
const DOWNLOAD_PATH: &str = "/api/download-results";
const HISTORY_PATH: &str = "/api/redactions-history";
const HEALTH_PATH: &str = "/health";

/// Detection service reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpDetectionService {
    client: Client,
    health_client: Client,
    config: ServiceConfig,
}

impl HttpDetectionService {
    /// Use the shared pooled clients
    pub fn new(config: ServiceConfig) -> Self {
        Self::with_client(config, detection_client().clone())
    }

    pub fn with_client(config: ServiceConfig, client: Client) -> Self {
        Self {
            client,
            health_client: health_client().clone(),
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn build_form(request: ProcessRequest) -> Result<Form> {
        let mut form = Form::new();
        for file in request.files {
            let part = match file.body {
                UploadBody::Bytes(bytes) => Part::bytes(bytes),
                UploadBody::File { file, len } => Part::stream_with_length(file, len),
            };
            let part = part.file_name(file.name).mime_str(&file.mime_type)?;
            form = form.part("files", part);
        }
        if let Some(user_id) = request.user_id {
            form = form.text("userId", user_id);
        }
        Ok(form)
    }

    /// History URL with `user_id` escaped as a single path segment
    fn history_url(&self, user_id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.endpoint(HISTORY_PATH))
            .map_err(|e| Error::Config(format!("invalid service URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("invalid service URL: {}", self.config.base_url)))?
            .push(user_id);
        Ok(url)
    }
}

#[async_trait]
impl DetectionService for HttpDetectionService {
    async fn process_files(&self, request: ProcessRequest) -> Result<ProcessResponse> {
        let url = self.config.endpoint(PROCESS_PATH);
        debug!(url = %url, files = request.files.len(), bytes = request.total_bytes(), "Uploading files");

        let form = Self::build_form(request)?;
        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        match serde_json::from_slice::<ProcessResponse>(&body) {
            Ok(mut parsed) => {
                if !status.is_success() {
                    parsed.success = false;
                }
                Ok(parsed)
            }
            Err(e) if status.is_success() => {
                warn!(error = %e, "Unparsable processing response");
                Err(Error::BackendError(format!("Invalid response from service: {}", e)))
            }
            Err(_) => Err(Error::BackendError(format!(
                "{} ({})",
                PROCESSING_FAILED, status
            ))),
        }
    }

    async fn download_results(&self, rows: &[StructuredRow]) -> Result<Vec<u8>> {
        let url = self.config.endpoint(DOWNLOAD_PATH);
        debug!(url = %url, rows = rows.len(), "Requesting export");

        let response = self
            .client
            .post(&url)
            .json(&ExportRequest { rows })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.bytes().await?.to_vec());
        }

        let detail = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.detail)
            .filter(|d| !d.trim().is_empty());
        warn!(%status, detail = ?detail, "Export request failed");
        Err(Error::BackendError(
            detail.unwrap_or_else(|| DOWNLOAD_FAILED.to_string()),
        ))
    }

    async fn redactions_history(&self, user_id: &str) -> Result<Vec<RedactionRecord>> {
        let url = self.history_url(user_id)?;
        debug!(url = %url, "Loading redaction history");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        match serde_json::from_slice::<HistoryResponse>(&body) {
            Ok(parsed) if status.is_success() && parsed.success => Ok(parsed.history),
            parsed => {
                let detail = parsed
                    .ok()
                    .and_then(|body| body.detail)
                    .filter(|d| !d.trim().is_empty());
                warn!(%status, detail = ?detail, "History request failed");
                Err(Error::BackendError(
                    detail.unwrap_or_else(|| HISTORY_FAILED.to_string()),
                ))
            }
        }
    }

    async fn health(&self) -> Result<ServiceHealth> {
        let url = self.config.endpoint(HEALTH_PATH);
        let response = self
            .health_client
            .get(&url)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

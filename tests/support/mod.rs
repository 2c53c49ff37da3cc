#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use aviality_client::service::{
    DetectionService, ProcessRequest, ProcessResponse, RedactionRecord, ServiceHealth,
};
use aviality_client::{CandidateFile, Error, Result, ResultSet, StructuredRow};
use serde_json::json;
use tokio::sync::Notify;

/// Scripted answer to one processing request
#[derive(Debug, Clone)]
pub enum Reply {
    Respond(ProcessResponse),
    Transport(String),
    Backend(String),
}

/// What the double saw for one processing request
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub files: Vec<String>,
    pub user_id: Option<String>,
    pub total_bytes: u64,
}

/// In-memory detection service that replays scripted replies
#[derive(Default)]
pub struct ScriptedService {
    replies: Mutex<VecDeque<Reply>>,
    downloads: Mutex<VecDeque<std::result::Result<Vec<u8>, String>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    exported: Mutex<Vec<Vec<StructuredRow>>>,
    process_calls: AtomicUsize,
    download_calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
    delay: Option<Duration>,
    /// Signalled once a processing request is in flight
    pub entered: Notify,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, reply: Reply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn download(self, outcome: std::result::Result<Vec<u8>, String>) -> Self {
        self.downloads.lock().unwrap().push_back(outcome);
        self
    }

    /// Hold every processing request open until `gate` is notified
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Answer processing requests only after `delay`
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn process_calls(&self) -> usize {
        self.process_calls.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn exported(&self) -> Vec<Vec<StructuredRow>> {
        self.exported.lock().unwrap().clone()
    }
}

#[async_trait]
impl DetectionService for ScriptedService {
    async fn process_files(&self, request: ProcessRequest) -> Result<ProcessResponse> {
        self.process_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(RecordedRequest {
            files: request.files.iter().map(|f| f.name.clone()).collect(),
            user_id: request.user_id.clone(),
            total_bytes: request.total_bytes(),
        });
        self.entered.notify_one();

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Transport(msg)) => Err(Error::TransportFailure(msg)),
            Some(Reply::Backend(msg)) => Err(Error::BackendError(msg)),
            None => Err(Error::TransportFailure("no scripted reply".into())),
        }
    }

    async fn download_results(&self, rows: &[StructuredRow]) -> Result<Vec<u8>> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.exported.lock().unwrap().push(rows.to_vec());

        let outcome = self.downloads.lock().unwrap().pop_front();
        match outcome {
            Some(Ok(bytes)) => Ok(bytes),
            Some(Err(detail)) => Err(Error::BackendError(detail)),
            None => Ok(b"PK\x03\x04".to_vec()),
        }
    }

    async fn redactions_history(&self, _user_id: &str) -> Result<Vec<RedactionRecord>> {
        Ok(Vec::new())
    }

    async fn health(&self) -> Result<ServiceHealth> {
        Ok(ServiceHealth {
            status: "healthy".into(),
            service: Some("scripted".into()),
            timestamp: None,
            pii_detection_available: Some(true),
        })
    }
}

/// The single-row result from a successful `record.pdf` job
pub fn record_results() -> ResultSet {
    serde_json::from_value(json!({
        "filesProcessed": 1,
        "piiItemsRemoved": 3,
        "phiItemsDetected": 2,
        "processingTime": "1.2s",
        "piiPhiData": [{"PII_Name": "Jane Doe", "PHI_Diagnosis": "Flu"}]
    }))
    .unwrap()
}

pub fn success(results: ResultSet) -> Reply {
    Reply::Respond(ProcessResponse::succeeded(results))
}

pub fn failure(detail: &str) -> Reply {
    Reply::Respond(ProcessResponse::failed(Some(detail)))
}

pub fn record_pdf() -> CandidateFile {
    CandidateFile::from_bytes("record.pdf", vec![0u8; 2048])
}

pub fn row(value: serde_json::Value) -> StructuredRow {
    value.as_object().cloned().unwrap()
}

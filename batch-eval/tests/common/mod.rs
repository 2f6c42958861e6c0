#![allow(dead_code)]

use async_trait::async_trait;
use nlu_batch_eval::{
    BatchConfiguration, BatchInput, BatchTestClient, EntityModelStats, EntityStats,
    EvaluationResult, OperationState, OperationStatus, Result, UtteranceStats,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Configuration pointing at a fixed base URL.
pub struct StaticConfiguration {
    pub base: String,
    pub enabled: bool,
}

impl StaticConfiguration {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            enabled: true,
        }
    }
}

impl BatchConfiguration for StaticConfiguration {
    fn is_batch_enabled(&self) -> bool {
        self.enabled
    }

    fn evaluation_endpoint(&self) -> Result<String> {
        Ok(format!("{}/apps/test-app/slots/Production/evaluations", self.base))
    }

    fn credential(&self) -> Result<String> {
        Ok("test-key".to_string())
    }
}

type ResultBuilder = Box<dyn Fn(&BatchInput) -> EvaluationResult + Send + Sync>;

/// In-memory evaluation service.
pub struct MockBatchTestClient {
    statuses: Mutex<VecDeque<OperationStatus>>,
    build_result: ResultBuilder,
    operations: Mutex<HashMap<String, BatchInput>>,
    pub submitted: Mutex<Vec<BatchInput>>,
    pub submit_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub result_calls: AtomicUsize,
}

impl MockBatchTestClient {
    /// Succeeds on the first poll and returns `result` for every batch.
    pub fn returning(result: EvaluationResult) -> Self {
        Self::with_builder(Box::new(move |_| result.clone()))
    }

    /// Succeeds on the first poll and echoes each batch back with no errors.
    pub fn echoing() -> Self {
        Self::with_builder(Box::new(echo_result))
    }

    pub fn with_builder(build_result: ResultBuilder) -> Self {
        Self {
            statuses: Mutex::new(VecDeque::new()),
            build_result,
            operations: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            result_calls: AtomicUsize::new(0),
        }
    }

    /// Statuses handed out before the default `succeeded`.
    pub fn with_statuses(self, statuses: Vec<OperationStatus>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    pub fn network_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
            + self.status_calls.load(Ordering::SeqCst)
            + self.result_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchTestClient for MockBatchTestClient {
    async fn submit(&self, input: &BatchInput, _cancellation: &CancellationToken) -> Result<String> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let operation_id = Uuid::new_v4().to_string();
        self.submitted.lock().unwrap().push(input.clone());
        self.operations
            .lock()
            .unwrap()
            .insert(operation_id.clone(), input.clone());
        Ok(operation_id)
    }

    async fn poll_status(
        &self,
        operation_id: &str,
        _cancellation: &CancellationToken,
    ) -> Result<OperationStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        assert!(self.operations.lock().unwrap().contains_key(operation_id));
        let next = self.statuses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| OperationStatus::new(OperationState::Succeeded)))
    }

    async fn fetch_result(
        &self,
        operation_id: &str,
        _cancellation: &CancellationToken,
    ) -> Result<EvaluationResult> {
        self.result_calls.fetch_add(1, Ordering::SeqCst);
        let input = self
            .operations
            .lock()
            .unwrap()
            .remove(operation_id)
            .expect("unknown operation id");
        Ok((self.build_result)(&input))
    }
}

pub fn echo_result(input: &BatchInput) -> EvaluationResult {
    let mut models: Vec<String> = input
        .utterances
        .iter()
        .flat_map(|u| u.entities.iter().map(|e| e.entity.clone()))
        .collect();
    models.sort();
    models.dedup();

    EvaluationResult {
        entity_models_stats: models.into_iter().map(model).collect(),
        utterances_stats: input
            .utterances
            .iter()
            .map(|u| utterance_stats(&u.text, u.intent.as_deref()))
            .collect(),
    }
}

pub fn model(name: impl Into<String>) -> EntityModelStats {
    EntityModelStats {
        model_name: name.into(),
        model_type: None,
    }
}

pub fn utterance_stats(text: &str, intent: Option<&str>) -> UtteranceStats {
    UtteranceStats {
        text: text.to_string(),
        predicted_intent_name: intent.map(|s| s.to_string()),
        labeled_intent_name: intent.map(|s| s.to_string()),
        false_positive_entities: Vec::new(),
        false_negative_entities: Vec::new(),
    }
}

pub fn entity_stats(name: &str, start: usize, end: usize) -> EntityStats {
    EntityStats {
        entity_name: name.to_string(),
        start_char_index: start,
        end_char_index: end,
    }
}

#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CannedResponse {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// HTTP server on localhost that answers each connection with the next
/// canned response and then closes it.
pub struct CannedServer {
    pub url: String,
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl CannedServer {
    pub async fn start(responses: Vec<CannedResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        tokio::spawn(async move {
            let mut responses: VecDeque<CannedResponse> = responses.into();
            while let Ok((mut stream, _)) = listener.accept().await {
                let Some(request) = read_request(&mut stream).await else {
                    continue;
                };
                recorded.lock().unwrap().push(request);

                let response = responses
                    .pop_front()
                    .unwrap_or_else(|| CannedResponse::json(500, "{}"));
                let mut raw = format!(
                    "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
                    response.status,
                    response.body.len()
                );
                for (name, value) in &response.headers {
                    raw.push_str(&format!("{}: {}\r\n", name, value));
                }
                raw.push_str("\r\n");
                raw.push_str(&response.body);

                let _ = stream.write_all(raw.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self { url, requests }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> Option<RecordedRequest> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(position) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break position + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);

    while buffer.len() < header_end + content_length {
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
    }

    let body_end = (header_end + content_length).min(buffer.len());
    let body = String::from_utf8_lossy(&buffer[header_end..body_end]).to_string();

    Some(RecordedRequest {
        method,
        path,
        headers,
        body,
    })
}

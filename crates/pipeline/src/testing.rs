//! Scripted backend for tests
//!
//! Replies are queued per call kind: structured extraction, structured
//! validation and raw (non-JSON) generation. Each call pops one reply and
//! bumps a counter, so tests can assert exactly which stages ran.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use expense_agent_llm::cancel::run_cancellable;
use expense_agent_llm::{GenerateRequest, LlmBackend, LlmError, ModelRole};

type Reply = Result<String, LlmError>;

#[derive(Default)]
pub struct MockBackend {
    extraction: Mutex<VecDeque<Reply>>,
    validation: Mutex<VecDeque<Reply>>,
    raw: Mutex<VecDeque<Reply>>,
    extraction_calls: AtomicUsize,
    validation_calls: AtomicUsize,
    raw_calls: AtomicUsize,
    requests: Mutex<Vec<GenerateRequest>>,
    delay: Option<Duration>,
    unavailable: bool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extraction_json(self, value: Value) -> Self {
        self.with_extraction_reply(Ok(value.to_string()))
    }

    pub fn with_extraction_reply(self, reply: Reply) -> Self {
        push(&self.extraction, reply);
        self
    }

    pub fn with_validation_json(self, value: Value) -> Self {
        self.with_validation_reply(Ok(value.to_string()))
    }

    pub fn with_validation_reply(self, reply: Reply) -> Self {
        push(&self.validation, reply);
        self
    }

    pub fn with_raw_reply(self, reply: Reply) -> Self {
        push(&self.raw, reply);
        self
    }

    /// Every call waits this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn extraction_calls(&self) -> usize {
        self.extraction_calls.load(Ordering::SeqCst)
    }

    pub fn validation_calls(&self) -> usize {
        self.validation_calls.load(Ordering::SeqCst)
    }

    pub fn raw_calls(&self) -> usize {
        self.raw_calls.load(Ordering::SeqCst)
    }

    /// Every request received, in order
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

fn push(queue: &Mutex<VecDeque<Reply>>, reply: Reply) {
    if let Ok(mut queue) = queue.lock() {
        queue.push_back(reply);
    }
}

fn pop(queue: &Mutex<VecDeque<Reply>>, kind: &str) -> Reply {
    queue
        .lock()
        .ok()
        .and_then(|mut q| q.pop_front())
        .unwrap_or_else(|| Err(LlmError::BackendUnavailable(format!("no scripted {} reply", kind))))
}

#[async_trait]
impl LlmBackend for MockBackend {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let (queue, counter, kind) = match (request.json_mode, request.role) {
            (false, _) => (&self.raw, &self.raw_calls, "raw"),
            (true, ModelRole::Extraction) => (&self.extraction, &self.extraction_calls, "extraction"),
            (true, ModelRole::Validation) => (&self.validation, &self.validation_calls, "validation"),
        };
        counter.fetch_add(1, Ordering::SeqCst);

        let delay = self.delay;
        run_cancellable(request.cancel.as_ref(), async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(())
        })
        .await?;

        pop(queue, kind)
    }

    async fn is_available(&self) -> bool {
        !self.unavailable
    }

    fn provider(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

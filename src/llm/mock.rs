//! Scripted language model for testing purposes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{ChatRequest, LanguageModel, LlmError};

type Handler = dyn Fn(&ChatRequest, usize) -> Result<String, LlmError> + Send + Sync;

/// A model that answers every request from a closure.
///
/// The closure receives the request and the zero-based index of the call.
/// Every request is recorded, and the peak number of calls in flight is
/// tracked so tests can check concurrency limits.
pub struct ScriptedModel {
    handler: Box<Handler>,
    delay: Option<Duration>,
    calls: Mutex<Vec<ChatRequest>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl std::fmt::Debug for ScriptedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedModel")
            .field("delay", &self.delay)
            .field("calls", &self.call_count())
            .finish()
    }
}

impl ScriptedModel {
    /// Answer with the closure's result.
    pub fn from_fn<F>(handler: F) -> Self
    where
        F: Fn(&ChatRequest, usize) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            delay: None,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Always answer with the same text.
    pub fn constant(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::from_fn(move |_, _| Ok(reply.clone()))
    }

    /// Hold each call open for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far, in arrival order.
    pub fn calls(&self) -> Vec<ChatRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Requests whose system message equals `system`.
    pub fn calls_with_system(&self, system: &str) -> Vec<ChatRequest> {
        self.calls()
            .into_iter()
            .filter(|call| call.system == system)
            .collect()
    }

    /// Highest number of calls that were in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn model_id(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(request.clone());
            calls.len() - 1
        };

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let result = (self.handler)(request, index);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

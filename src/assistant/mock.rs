//! Scripted assistant for driving the loop without a real process

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{Assistant, AssistantError, AssistantRequest};

type Step = Box<dyn Fn() -> Result<String, AssistantError> + Send + Sync>;

/// Replays queued responses in order; once the queue is empty, the fallback
/// response is returned for every further call
pub struct ScriptedAssistant {
    steps: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl Default for ScriptedAssistant {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedAssistant {
    /// Assistant that answers every call with an empty success
    pub fn new() -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            fallback: Box::new(|| Ok(String::new())),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn respond(self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.push(Box::new(move || Ok(text.clone())))
    }

    /// Queue a response produced by a closure, e.g. one that writes files
    pub fn respond_with<F>(self, step: F) -> Self
    where
        F: Fn() -> Result<String, AssistantError> + Send + Sync + 'static,
    {
        self.push(Box::new(step))
    }

    /// Response used after the queue runs out
    pub fn otherwise<F>(mut self, step: F) -> Self
    where
        F: Fn() -> Result<String, AssistantError> + Send + Sync + 'static,
    {
        self.fallback = Box::new(step);
        self
    }

    /// Number of invocations so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, in order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn push(self, step: Step) -> Self {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push_back(step);
        }
        self
    }
}

#[async_trait]
impl Assistant for ScriptedAssistant {
    async fn invoke(&self, request: &AssistantRequest) -> Result<String, AssistantError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.clone());
        }

        let step = self.steps.lock().ok().and_then(|mut steps| steps.pop_front());
        match step {
            Some(step) => step(),
            None => (self.fallback)(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_replays_in_order_then_falls_back() {
        let assistant = ScriptedAssistant::new()
            .respond("first")
            .respond_with(|| Err(AssistantError::Timeout(Duration::from_secs(1))))
            .otherwise(|| Ok("again".to_string()));
        let request = AssistantRequest::new("prompt", "Read", 1);

        assert_eq!(assistant.invoke(&request).await.unwrap(), "first");
        assert!(assistant.invoke(&request).await.is_err());
        assert_eq!(assistant.invoke(&request).await.unwrap(), "again");
        assert_eq!(assistant.invoke(&request).await.unwrap(), "again");
        assert_eq!(assistant.calls(), 4);
        assert_eq!(assistant.prompts().len(), 4);
    }
}

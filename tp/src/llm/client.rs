//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// Stateless LLM client - each call is independent
///
/// Agents never hold a conversation with the model; every decision is a
/// single request carrying all the context it needs.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single completion request (blocking until complete)
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::debug;

    /// Mock LLM client for unit tests
    ///
    /// Replies with scripted responses in order. When `repeat_last` is set,
    /// the final response is reused once the script runs out.
    pub struct MockLlmClient {
        responses: Vec<CompletionResponse>,
        repeat_last: bool,
        call_count: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl MockLlmClient {
        pub fn new(responses: Vec<CompletionResponse>) -> Self {
            debug!(response_count = %responses.len(), "MockLlmClient::new: called");
            Self {
                responses,
                repeat_last: false,
                call_count: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        /// Mock that answers every request with the same text
        pub fn always(text: &str) -> Self {
            let mut mock = Self::new(vec![CompletionResponse::text(text)]);
            mock.repeat_last = true;
            mock
        }

        pub fn call_count(&self) -> usize {
            debug!("MockLlmClient::call_count: called");
            self.call_count.load(Ordering::SeqCst)
        }

        /// User messages received so far
        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            debug!("MockLlmClient::complete: called");
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.extend(request.messages.iter().map(|m| m.content.clone()));
            }
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            debug!(%idx, "MockLlmClient::complete: fetching response");
            let reply = if self.repeat_last {
                self.responses.get(idx).or_else(|| self.responses.last())
            } else {
                self.responses.get(idx)
            };
            reply.cloned().ok_or_else(|| {
                debug!("MockLlmClient::complete: no more mock responses");
                LlmError::Unusable("No more mock responses".to_string())
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::llm::Message;

        fn request() -> CompletionRequest {
            CompletionRequest {
                system_prompt: "Test".to_string(),
                messages: vec![Message::user("hello")],
                max_tokens: 1000,
                temperature: 0.3,
                json_mode: false,
            }
        }

        #[tokio::test]
        async fn test_mock_client_returns_responses() {
            let client = MockLlmClient::new(vec![
                CompletionResponse::text("Response 1"),
                CompletionResponse::text("Response 2"),
            ]);

            let resp1 = client.complete(request()).await.unwrap();
            assert_eq!(resp1.content, Some("Response 1".to_string()));

            let resp2 = client.complete(request()).await.unwrap();
            assert_eq!(resp2.content, Some("Response 2".to_string()));

            assert_eq!(client.call_count(), 2);
            assert_eq!(client.prompts(), vec!["hello".to_string(), "hello".to_string()]);
        }

        #[tokio::test]
        async fn test_mock_client_errors_when_exhausted() {
            let client = MockLlmClient::new(vec![]);
            assert!(client.complete(request()).await.is_err());
        }

        #[tokio::test]
        async fn test_always_repeats() {
            let client = MockLlmClient::always("same");
            for _ in 0..3 {
                let resp = client.complete(request()).await.unwrap();
                assert_eq!(resp.content.as_deref(), Some("same"));
            }
        }
    }
}

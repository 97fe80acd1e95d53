//! Deadline + fallback decorator

use async_trait::async_trait;
use hq_application::{GatewayError, LlmGateway, ModelRequest};
use hq_domain::Model;
use std::time::Duration;
use tracing::{info, warn};

/// Wraps a gateway with a per-call deadline and one fallback retry.
///
/// A call fails when the inner gateway errors, returns blank text, or misses
/// the deadline. A failed primary call is retried once against `fallback`
/// (unless the primary already was the fallback model); if that fails too
/// the result is [`GatewayError::FallbackExhausted`].
pub struct FallbackGateway<G> {
    inner: G,
    fallback: Model,
    timeout: Duration,
}

impl<G: LlmGateway> FallbackGateway<G> {
    pub fn new(inner: G, fallback: Model, timeout: Duration) -> Self {
        Self {
            inner,
            fallback,
            timeout,
        }
    }

    async fn attempt(&self, request: &ModelRequest) -> Result<String, GatewayError> {
        match tokio::time::timeout(self.timeout, self.inner.complete(request)).await {
            Ok(Ok(text)) if text.trim().is_empty() => Err(GatewayError::EmptyResponse),
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl<G: LlmGateway> LlmGateway for FallbackGateway<G> {
    async fn complete(&self, request: &ModelRequest) -> Result<String, GatewayError> {
        let primary = match self.attempt(request).await {
            Ok(text) => return Ok(text),
            Err(e) => e,
        };
        if request.model == self.fallback {
            return Err(primary);
        }

        warn!(
            "Model {} failed ({}), retrying with {}",
            request.model, primary, self.fallback
        );
        match self.attempt(&request.for_model(self.fallback.clone())).await {
            Ok(text) => {
                info!("Fallback model {} answered", self.fallback);
                Ok(text)
            }
            Err(secondary) => Err(GatewayError::FallbackExhausted {
                model: request.model.to_string(),
                primary: primary.to_string(),
                fallback: self.fallback.to_string(),
                secondary: secondary.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Clone)]
    enum Reply {
        Text(&'static str),
        Fail,
        Hang,
    }

    /// Replies by model id and records every model it was asked for
    struct FakeGateway {
        replies: HashMap<Model, Reply>,
        calls: Mutex<Vec<Model>>,
    }

    impl FakeGateway {
        fn new(replies: impl IntoIterator<Item = (Model, Reply)>) -> Self {
            Self {
                replies: replies.into_iter().collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmGateway for FakeGateway {
        async fn complete(&self, request: &ModelRequest) -> Result<String, GatewayError> {
            self.calls.lock().unwrap().push(request.model.clone());
            match self.replies.get(&request.model).cloned().unwrap_or(Reply::Fail) {
                Reply::Text(text) => Ok(text.to_string()),
                Reply::Fail => Err(GatewayError::RequestFailed("boom".to_string())),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok("too late".to_string())
                }
            }
        }
    }

    fn gateway(replies: Vec<(Model, Reply)>) -> FallbackGateway<FakeGateway> {
        FallbackGateway::new(
            FakeGateway::new(replies),
            Model::Gpt5Mini,
            Duration::from_secs(5),
        )
    }

    fn request() -> ModelRequest {
        ModelRequest::new(Model::ClaudeSonnet45).user("hello")
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let gateway = gateway(vec![(Model::ClaudeSonnet45, Reply::Text("hi"))]);
        assert_eq!(gateway.complete(&request()).await.unwrap(), "hi");
        assert_eq!(*gateway.inner.calls.lock().unwrap(), vec![Model::ClaudeSonnet45]);
    }

    #[tokio::test]
    async fn test_failure_retries_fallback_once() {
        let gateway = gateway(vec![(Model::Gpt5Mini, Reply::Text("from fallback"))]);
        assert_eq!(gateway.complete(&request()).await.unwrap(), "from fallback");
        assert_eq!(
            *gateway.inner.calls.lock().unwrap(),
            vec![Model::ClaudeSonnet45, Model::Gpt5Mini]
        );
    }

    #[tokio::test]
    async fn test_blank_reply_counts_as_failure() {
        let gateway = gateway(vec![
            (Model::ClaudeSonnet45, Reply::Text("   ")),
            (Model::Gpt5Mini, Reply::Text("ok")),
        ]);
        assert_eq!(gateway.complete(&request()).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_both_failing_is_exhausted() {
        let gateway = gateway(vec![]);
        let err = gateway.complete(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            GatewayError::FallbackExhausted { ref model, .. } if model == "anthropic/claude-sonnet-4.5"
        ));
    }

    #[tokio::test]
    async fn test_fallback_model_is_not_retried_against_itself() {
        let gateway = gateway(vec![]);
        let err = gateway
            .complete(&ModelRequest::new(Model::Gpt5Mini).user("hello"))
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::RequestFailed("boom".to_string()));
        assert_eq!(gateway.inner.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_triggers_fallback() {
        let gateway = gateway(vec![
            (Model::ClaudeSonnet45, Reply::Hang),
            (Model::Gpt5Mini, Reply::Text("fast")),
        ]);
        assert_eq!(gateway.complete(&request()).await.unwrap(), "fast");

        let hung = FallbackGateway::new(
            FakeGateway::new(vec![(Model::ClaudeSonnet45, Reply::Hang)]),
            Model::ClaudeSonnet45,
            Duration::from_secs(5),
        );
        assert_eq!(
            hung.complete(&request()).await.unwrap_err(),
            GatewayError::Timeout(Duration::from_secs(5))
        );
    }
}

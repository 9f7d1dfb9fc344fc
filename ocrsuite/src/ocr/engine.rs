use async_trait::async_trait;
use thiserror::Error;

use super::preprocessing::PreprocessProfile;

/// A text recognizer operating on an already-preprocessed image.
///
/// Implementations never fail the request: internal errors are logged and turned
/// into tagged fallback text (see [`DegradedReason`]).
#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Preprocessing the coordinator must apply before calling [`recognize_text`].
    ///
    /// [`recognize_text`]: OcrEngine::recognize_text
    fn profile(&self) -> PreprocessProfile;

    async fn recognize_text(&self, image: Vec<u8>) -> String;
}

/// Why an engine fell back to degraded output.
#[derive(Error, Debug)]
pub enum DegradedReason {
    #[error("engine initialisation failed: {0}")]
    Init(String),

    #[error("image rejected by engine: {0}")]
    Image(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("output could not be decoded: {0}")]
    Output(String),

    #[error("recognition worker failed: {0}")]
    Worker(String),
}

/// Awaits a blocking recognition job and flattens worker panics into the
/// degraded path.
pub(crate) async fn run_blocking<F>(job: F) -> Result<String, DegradedReason>
where
    F: FnOnce() -> Result<String, DegradedReason> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| DegradedReason::Worker(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_blocking_passes_result_through() {
        let text = run_blocking(|| Ok("hello".to_string())).await.unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn test_run_blocking_converts_panic() {
        let result = run_blocking(|| panic!("boom")).await;
        assert!(matches!(result, Err(DegradedReason::Worker(_))));
    }

    #[test]
    fn test_degraded_reason_display() {
        let reason = DegradedReason::Init("missing tessdata".to_string());
        assert_eq!(
            reason.to_string(),
            "engine initialisation failed: missing tessdata"
        );
    }
}

use crate::{error::InferenceError, preprocess::NormalizedTensor};

/// Raw, unnormalized class scores produced by a classifier.
pub type RawScores = Vec<f32>;

/// Scoring function behind the predictor.
///
/// Implementations are loaded once at startup and shared across requests, so
/// `invoke` must be callable concurrently from several threads.
pub trait ClassifierModel: Send + Sync + 'static {
    fn invoke(&self, input: &NormalizedTensor) -> Result<RawScores, InferenceError>;
}

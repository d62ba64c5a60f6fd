mod decoder;
mod error;
mod model_service;
mod ort_service;
mod predictor;
mod preprocess;

pub mod config;

pub use decoder::{decode, CanonicalImage};
pub use error::{DecodeError, InferenceError, ModelLoadError, PredictionFailure, PreprocessError};
pub use model_service::{ClassifierModel, RawScores};
pub use ort_service::OrtClassifier;
pub use predictor::{softmax, ClassProbabilities, Predictor};
pub use preprocess::{preprocess, preprocess_default, NormalizedTensor, RESIZE_FILTER};

/// Input size the classifier was trained on, as (width, height).
pub const IMAGE_SIZE: (u32, u32) = (224, 224);

pub const NORMALIZATION_FACTOR: f32 = 255.0;

/// Class labels in the order of the model's output vector.
pub const FLOWER_CLASSES: [&str; 5] = ["dandelion", "daisy", "tulips", "sunflowers", "roses"];

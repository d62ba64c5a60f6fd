use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("image payload is empty")]
    Empty,
    #[error("failed to read image payload: {0}")]
    Io(#[from] std::io::Error),
    #[error("unrecognized image format")]
    UnknownFormat,
    #[error("failed to decode image: {0}")]
    Image(#[source] image::ImageError),
}

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("invalid target size {width}x{height}")]
    InvalidTargetSize { width: u32, height: u32 },
    #[error("tensor has batch size {0}, expected 1")]
    BatchSize(usize),
    #[error("image has {0} channels, expected 3")]
    ChannelCount(usize),
    #[error("failed to build input tensor: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("tensor value {value} at index {index} is outside [0, 1]")]
    OutOfRange { index: usize, value: f32 },
}

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("session mutex poisoned: {0}")]
    SessionPoisoned(String),
    #[error("failed to build input tensor: {0}")]
    InputTensor(#[source] ort::Error),
    #[error("inference failed: {0}")]
    Run(#[source] ort::Error),
    #[error("model output `{0}` is missing")]
    MissingOutput(String),
    #[error("failed to extract output tensor: {0}")]
    Extract(#[source] ort::Error),
    #[error("model returned {actual} scores but {expected} classes are known")]
    OutputLength { expected: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum PredictionFailure {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("model prediction failed: {0}")]
    Inference(#[from] InferenceError),
}

impl PredictionFailure {
    /// Short, stable label for the failing stage.
    pub fn kind(&self) -> &'static str {
        match self {
            PredictionFailure::Decode(_) => "decode",
            PredictionFailure::Preprocess(_) => "preprocess",
            PredictionFailure::Inference(_) => "inference",
        }
    }
}

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("model file not found: {0:?}")]
    NotFound(PathBuf),
    #[error("at least one model instance is required")]
    NoInstances,
    #[error("failed to initialise onnx runtime: {0}")]
    Runtime(#[source] ort::Error),
    #[error("failed to build session from {path:?}: {source}")]
    Session {
        path: PathBuf,
        #[source]
        source: ort::Error,
    },
    #[error("model has no outputs")]
    NoOutputs,
    #[error("output `{name}` not found, available outputs: {available:?}")]
    UnknownOutput { name: String, available: Vec<String> },
}

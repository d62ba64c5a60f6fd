use crate::{
    config::ModelConfig,
    error::{InferenceError, ModelLoadError},
    model_service::{ClassifierModel, RawScores},
    preprocess::NormalizedTensor,
};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

/// ONNX Runtime classifier backed by a small pool of sessions.
///
/// `Session::run` needs exclusive access, so each session sits behind its own
/// mutex and requests are spread round-robin. Up to `num_instances` requests
/// run in parallel; further callers wait on a session lock.
#[derive(Clone)]
pub struct OrtClassifier {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    output_name: String,
}

impl OrtClassifier {
    pub fn load(model_config: &ModelConfig) -> Result<Self, ModelLoadError> {
        model_config.validate()?;
        ort::init()
            .with_name("flower_prediction")
            .commit()
            .map_err(ModelLoadError::Runtime)?;

        let path = model_config.get_path();
        let sessions = (0..model_config.num_instances)
            .map(|_| {
                Session::builder()
                    .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
                    .and_then(|b| b.commit_from_file(&path))
                    .map_err(|source| ModelLoadError::Session {
                        path: path.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, ModelLoadError>>()?;

        let first = sessions.first().ok_or(ModelLoadError::NoInstances)?;
        let output_name = select_output(
            first.outputs.iter().map(|o| o.name.as_str()),
            model_config.output_name.as_deref(),
        )?;

        tracing::info!(
            path = ?path,
            sessions = sessions.len(),
            output = %output_name,
            "Loaded classifier model"
        );

        let sessions: Vec<_> = sessions
            .into_iter()
            .map(|session| Arc::new(Mutex::new(session)))
            .collect();

        Ok(Self {
            sessions: Arc::new(sessions),
            counter: Arc::new(AtomicUsize::new(0)),
            output_name,
        })
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }
}

/// Picks the configured output, or the first declared one when none is configured.
fn select_output<'a>(
    declared: impl Iterator<Item = &'a str>,
    configured: Option<&str>,
) -> Result<String, ModelLoadError> {
    let declared: Vec<&str> = declared.collect();
    match configured {
        Some(name) if declared.contains(&name) => Ok(name.to_string()),
        Some(name) => Err(ModelLoadError::UnknownOutput {
            name: name.to_string(),
            available: declared.iter().map(|s| s.to_string()).collect(),
        }),
        None => declared
            .first()
            .map(|s| s.to_string())
            .ok_or(ModelLoadError::NoOutputs),
    }
}

impl ClassifierModel for OrtClassifier {
    fn invoke(&self, input: &NormalizedTensor) -> Result<RawScores, InferenceError> {
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| InferenceError::SessionPoisoned(e.to_string()))?;

        tracing::debug!("Handling request with session {}", index);
        let tensor_ref =
            TensorRef::from_array_view(input.view()).map_err(InferenceError::InputTensor)?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(InferenceError::Run)?;

        let output = outputs
            .get(&self.output_name)
            .ok_or_else(|| InferenceError::MissingOutput(self.output_name.clone()))?;
        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(InferenceError::Extract)?;
        tracing::debug!(shape = ?shape, "Model output");

        // Output is (1, classes) for a single image.
        Ok(data.to_vec())
    }
}

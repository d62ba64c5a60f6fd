use crate::error::ModelLoadError;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub model_dir: PathBuf,
    pub model_file: String,
    /// Output read from the session. Falls back to the first declared output.
    #[serde(default)]
    pub output_name: Option<String>,
    #[serde(default = "default_model_instances")]
    pub num_instances: usize,
}

fn default_model_instances() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl ModelConfig {
    pub fn get_path(&self) -> PathBuf {
        self.model_dir.join(&self.model_file)
    }

    pub fn validate(&self) -> Result<(), ModelLoadError> {
        if self.num_instances == 0 {
            return Err(ModelLoadError::NoInstances);
        }
        let path = self.get_path();
        if !path.is_file() {
            return Err(ModelLoadError::NotFound(path));
        }
        Ok(())
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CleanError {
    #[error("could not decode audio: {0}")]
    Decode(String),

    #[error("unsupported channel layout: {channels} channels (at most 2 are accepted)")]
    UnsupportedChannelLayout { channels: usize },

    #[error("resampling failed: {0}")]
    Resample(String),

    #[error("model inference failed: {0}")]
    ModelInference(String),

    #[error("could not load model: {0}")]
    ModelLoad(String),

    #[error("source label mismatch: {0}")]
    SourceLabelMismatch(String),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("checksum mismatch for {path}")]
    Checksum { path: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl From<ort::Error> for CleanError {
    fn from(e: ort::Error) -> Self {
        CleanError::ModelInference(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CleanError>;

mod error;
mod types;

pub mod core {
    pub mod audio;
    pub mod cleaner;
    pub mod engine;
    pub mod extract;
    pub mod resample;
    pub mod shape;
}

pub mod model {
    pub mod model_manager;
    pub mod registry;
}

pub mod io {
    pub mod crypto;
    pub mod net;
    pub mod paths;
    pub mod progress;
}

// Public API
pub use crate::core::audio::{probe_audio, read_audio, write_audio};
pub use crate::core::cleaner::{clean_file, default_output_path, VoiceCleaner};
pub use crate::core::engine::{OrtSeparator, SeparationModel};
pub use crate::core::extract::{extract_voice, resolve_source_index, SourceBundle, VOCALS};
pub use crate::core::shape::{prepare_input, to_model_layout, AdapterOptions};
pub use crate::error::{CleanError, Result};
pub use crate::io::progress::{
    set_clean_progress_callback, set_download_progress_callback, CleanProgress,
};
pub use crate::model::model_manager::{
    ensure_model, load_model_from_path, resolve_model, ModelHandle,
};
pub use crate::types::{
    AudioInfo, ChannelPolicy, CleanOptions, ModelManifest, ProcessingResult, ResampleQuality,
    WavEncoding, Waveform, MUSDB_VOCALS_INDEX,
};

/// Resolve (downloading if needed) and load the configured model.
pub fn prepare_model(opts: &CleanOptions) -> Result<OrtSeparator> {
    let handle = resolve_model(opts)?;
    OrtSeparator::load(&handle)
}

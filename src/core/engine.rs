use crate::{
    error::{CleanError, Result},
    model::model_manager::ModelHandle,
};

use ndarray::{Array4, ArrayView3};
use once_cell::sync::OnceCell;
use ort::{
    execution_providers::ExecutionProviderDispatch,
    session::{
        builder::{GraphOptimizationLevel, SessionBuilder},
        Session,
    },
    value::{Tensor, Value},
};
use std::{path::Path, sync::Mutex};

// CUDA: Linux and Windows only
#[cfg(all(feature = "cuda", any(target_os = "linux", target_os = "windows")))]
use ort::execution_providers::CUDAExecutionProvider;
// CoreML: macOS only (Apple Silicon)
#[cfg(all(feature = "coreml", target_os = "macos"))]
use ort::execution_providers::CoreMLExecutionProvider;
// DirectML: Windows only
#[cfg(all(feature = "directml", target_os = "windows"))]
use ort::execution_providers::{DirectMLExecutionProvider, ExecutionProvider};
// oneDNN: All platforms
#[cfg(feature = "onednn")]
use ort::execution_providers::OneDNNExecutionProvider;

static ORT_INIT: OnceCell<()> = OnceCell::new();

/// ONNX custom metadata key holding comma-separated source labels.
pub const SOURCES_METADATA_KEY: &str = "sources";

/// A pretrained multi-source separation network.
///
/// `separate` maps `(batch, channel, time)` to `(batch, source, channel, time)`.
/// Implementations must not carry state from one call into the next.
pub trait SeparationModel {
    /// Rate the model was trained at; inputs must already be at this rate.
    fn sample_rate(&self) -> u32;

    /// Source names in output order, if the model reports them.
    fn source_labels(&self) -> Option<&[String]>;

    fn separate(&self, mix: ArrayView3<'_, f32>) -> Result<Array4<f32>>;
}

impl<M: SeparationModel + ?Sized> SeparationModel for Box<M> {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn source_labels(&self) -> Option<&[String]> {
        (**self).source_labels()
    }

    fn separate(&self, mix: ArrayView3<'_, f32>) -> Result<Array4<f32>> {
        (**self).separate(mix)
    }
}

#[allow(unused_mut)]
fn get_execution_providers() -> Vec<ExecutionProviderDispatch> {
    let mut providers: Vec<ExecutionProviderDispatch> = Vec::new();

    #[cfg(all(feature = "cuda", any(target_os = "linux", target_os = "windows")))]
    {
        providers.push(CUDAExecutionProvider::default().build());
    }

    #[cfg(all(feature = "coreml", target_os = "macos"))]
    {
        // CoreML can produce silent outputs on some exports; opt-in only.
        if std::env::var("ENABLE_COREML").is_ok() {
            log::info!("CoreML enabled via ENABLE_COREML");
            providers.push(CoreMLExecutionProvider::default().build());
        }
    }

    #[cfg(all(feature = "directml", target_os = "windows"))]
    {
        for device_id in 0..4 {
            let dml_provider = DirectMLExecutionProvider::default().with_device_id(device_id);
            if let Ok(true) = dml_provider.is_available() {
                log::info!("DirectML is available (device_id: {})", device_id);
                providers.push(dml_provider.build());
                break;
            }
        }
    }

    #[cfg(feature = "onednn")]
    {
        providers.push(OneDNNExecutionProvider::default().build());
    }

    providers
}

fn cpu_session(path: &Path, num_threads: usize) -> std::result::Result<Session, ort::Error> {
    SessionBuilder::new()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(num_threads)?
        .with_inter_threads(num_threads)?
        .commit_from_file(path)
}

fn build_session(path: &Path) -> Result<Session> {
    ORT_INIT.get_or_try_init::<_, CleanError>(|| {
        ort::init()
            .commit()
            .map_err(|e| CleanError::ModelLoad(e.to_string()))?;
        Ok(())
    })?;

    let num_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    let providers = get_execution_providers();
    let load_err = |e: ort::Error| CleanError::ModelLoad(format!("{}: {e}", path.display()));

    if providers.is_empty() {
        log::info!("using CPU ({num_threads} threads)");
        return cpu_session(path, num_threads).map_err(load_err);
    }

    let accelerated = (|| -> std::result::Result<Session, ort::Error> {
        SessionBuilder::new()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_execution_providers(providers)?
            .with_intra_threads(num_threads)?
            .with_inter_threads(num_threads)?
            .commit_from_file(path)
    })();

    match accelerated {
        Ok(session) => Ok(session),
        Err(e) => {
            log::warn!("execution providers failed ({e}); falling back to CPU ({num_threads} threads)");
            cpu_session(path, num_threads).map_err(load_err)
        }
    }
}

fn parse_labels(raw: &str) -> Option<Vec<String>> {
    let labels: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if labels.is_empty() {
        None
    } else {
        Some(labels)
    }
}

/// ONNX Runtime backed separator. Build it once and hand it to a
/// [`VoiceCleaner`](crate::VoiceCleaner).
pub struct OrtSeparator {
    session: Mutex<Session>,
    sample_rate: u32,
    labels: Option<Vec<String>>,
    input_name: String,
    output_name: String,
}

impl OrtSeparator {
    pub fn load(handle: &ModelHandle) -> Result<Self> {
        if !handle.local_path.exists() {
            return Err(CleanError::ModelLoad(format!(
                "model file not found: {}",
                handle.local_path.display()
            )));
        }
        if handle.manifest.sample_rate == 0 {
            return Err(CleanError::Manifest("manifest sample_rate is 0".into()));
        }

        let session = build_session(&handle.local_path)?;

        let embedded = session
            .metadata()
            .ok()
            .and_then(|m| m.custom(SOURCES_METADATA_KEY).ok().flatten())
            .and_then(|raw| parse_labels(&raw));
        let labels = embedded.or_else(|| handle.manifest.source_labels());
        match &labels {
            Some(l) => log::info!("model sources: {:?}", l),
            None => log::warn!("model reports no source labels"),
        }

        let input_name = match handle.manifest.inputs.first() {
            Some(desc) => desc.name.clone(),
            None => session
                .inputs
                .first()
                .map(|i| i.name.clone())
                .ok_or_else(|| CleanError::ModelLoad("model has no inputs".into()))?,
        };
        let output_name = match handle.manifest.outputs.first() {
            Some(desc) => desc.name.clone(),
            None => session
                .outputs
                .first()
                .map(|o| o.name.clone())
                .ok_or_else(|| CleanError::ModelLoad("model has no outputs".into()))?,
        };

        Ok(Self {
            session: Mutex::new(session),
            sample_rate: handle.manifest.sample_rate,
            labels,
            input_name,
            output_name,
        })
    }
}

impl SeparationModel for OrtSeparator {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn source_labels(&self) -> Option<&[String]> {
        self.labels.as_deref()
    }

    fn separate(&self, mix: ArrayView3<'_, f32>) -> Result<Array4<f32>> {
        let (b, c, t) = mix.dim();
        if b != 1 || c != 2 {
            return Err(CleanError::ModelInference(format!(
                "expected input [1, 2, T], got [{b}, {c}, {t}]"
            )));
        }

        let planar: Vec<f32> = mix.iter().copied().collect();
        let input: Value = Tensor::from_array((vec![b, c, t], planar))?.into_dyn();

        let mut session = self
            .session
            .lock()
            .map_err(|_| CleanError::ModelInference("session lock poisoned".into()))?;
        let outputs = session.run(vec![(self.input_name.clone(), input)])?;

        let mut found: Option<Value> = None;
        for (name, val) in outputs.into_iter() {
            if name == self.output_name {
                found = Some(val);
            }
        }
        let out = found.ok_or_else(|| {
            CleanError::ModelInference(format!("model did not return '{}'", self.output_name))
        })?;

        let (shape, data) = out.try_extract_tensor::<f32>()?;
        if shape.len() != 4 || shape[0] != 1 || shape[2] != 2 {
            return Err(CleanError::ModelInference(format!(
                "unexpected output shape {:?}, expected [1, S, 2, T]",
                &shape[..]
            )));
        }
        let dims = (
            shape[0] as usize,
            shape[1] as usize,
            shape[2] as usize,
            shape[3] as usize,
        );
        Ok(Array4::from_shape_vec(dims, data.to_vec())?)
    }
}

use crate::{
    error::{CleanError, Result},
    io::{
        crypto::verify_sha256,
        net::{download_with_progress, http_client},
        paths::models_cache_dir,
    },
    model::registry::resolve_manifest_url,
    types::{digest_prefix, CleanOptions, ModelManifest},
};

use std::{
    fs,
    path::{Path, PathBuf},
};

pub struct ModelHandle {
    pub manifest: ModelManifest,
    pub local_path: PathBuf,
}

/// Load a model from a custom local path.
///
/// A sidecar manifest (`model.onnx` -> `model.json`) is used when present.
/// Otherwise the model is assumed to run at 44.1 kHz and its source labels
/// must come from the ONNX metadata or the configured fallback index.
pub fn load_model_from_path(model_path: &str) -> Result<ModelHandle> {
    let path = PathBuf::from(model_path);
    if !path.exists() {
        return Err(CleanError::ModelLoad(format!(
            "model file not found: {model_path}"
        )));
    }

    let sidecar = path.with_extension("json");
    let manifest = if sidecar.is_file() {
        log::info!("using manifest {}", sidecar.display());
        serde_json::from_str(&fs::read_to_string(&sidecar)?)?
    } else {
        ModelManifest {
            name: "custom".to_string(),
            version: String::new(),
            backend: "onnx".to_string(),
            format: "onnx".to_string(),
            sample_rate: 44100,
            stems: vec![],
            inputs: vec![],
            outputs: vec![],
            artifacts: vec![],
            entry: String::new(),
            url: String::new(),
            sha256: String::new(),
            filesize: 0,
        }
    };

    Ok(ModelHandle {
        manifest,
        local_path: path,
    })
}

/// Fetch the manifest for `model_name`, then download and verify its
/// artifact into `cache_dir` (per-user cache when `None`) unless a verified
/// copy is already there.
pub fn ensure_model(
    model_name: &str,
    manifest_url_override: Option<&str>,
    cache_dir: Option<&Path>,
) -> Result<ModelHandle> {
    let manifest_url = match manifest_url_override {
        Some(url) => url.to_string(),
        None => resolve_manifest_url(model_name)?,
    };

    let client = http_client();
    log::debug!("fetching manifest {manifest_url}");
    let manifest: ModelManifest = client
        .get(&manifest_url)
        .send()?
        .error_for_status()?
        .json()?;

    let a = manifest
        .resolve_primary_artifact()
        .map_err(CleanError::Manifest)?;
    let short = digest_prefix(&a.sha256).ok_or_else(|| {
        CleanError::Manifest(format!("artifact '{}' has no usable sha256", a.file))
    })?;

    let cache_dir = match cache_dir {
        Some(dir) => dir.to_path_buf(),
        None => models_cache_dir()?,
    };
    fs::create_dir_all(&cache_dir)?;
    let ext = a
        .file
        .rsplit_once('.')
        .map(|(_, ext)| format!(".{ext}"))
        .unwrap_or_default();
    let file_name = format!("{}-{}{}", manifest.name, short, ext);
    let local_path = cache_dir.join(file_name);

    let need_download = !matches!(verify_sha256(&local_path, &a.sha256), Ok(true));
    if need_download {
        download_with_progress(&client, &a.url, &local_path)?;
        if !verify_sha256(&local_path, &a.sha256)? {
            let _ = fs::remove_file(&local_path);
            return Err(CleanError::Checksum {
                path: local_path.display().to_string(),
            });
        }
        if a.size_bytes > 0 {
            let size = fs::metadata(&local_path).map(|m| m.len()).unwrap_or(0);
            if size != a.size_bytes {
                log::warn!(
                    "size mismatch for {}, expected {}, got {}",
                    local_path.display(),
                    a.size_bytes,
                    size
                );
            }
        }
    } else {
        log::info!("using cached model {}", local_path.display());
    }

    Ok(ModelHandle {
        manifest,
        local_path,
    })
}

/// Local path from the options when given, otherwise the registry/download path.
pub fn resolve_model(opts: &CleanOptions) -> Result<ModelHandle> {
    match &opts.model_path {
        Some(path) => load_model_from_path(path),
        None => ensure_model(
            &opts.model_name,
            opts.manifest_url_override.as_deref(),
            opts.cache_dir.as_deref().map(Path::new),
        ),
    }
}

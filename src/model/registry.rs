use crate::error::{CleanError, Result};

/// Where manifests for the names below are published. `VOICE_CLEANER_REGISTRY`
/// overrides it, e.g. for a mirror.
pub const DEFAULT_REGISTRY_BASE: &str =
    "https://github.com/voice-cleaner/voice-cleaner-core/releases/download/models";

const KNOWN_MODELS: &[(&str, &str)] = &[
    ("hdemucs_high_musdb", "hdemucs_high_musdb.manifest.json"),
    ("htdemucs", "htdemucs.manifest.json"),
];

pub fn known_models() -> impl Iterator<Item = &'static str> {
    KNOWN_MODELS.iter().map(|(name, _)| *name)
}

pub fn resolve_manifest_url(model_name: &str) -> Result<String> {
    let file = KNOWN_MODELS
        .iter()
        .find(|(name, _)| *name == model_name)
        .map(|(_, file)| *file)
        .ok_or_else(|| {
            CleanError::Manifest(format!(
                "unknown model '{model_name}' (known: {})",
                known_models().collect::<Vec<_>>().join(", ")
            ))
        })?;
    let base = std::env::var("VOICE_CLEANER_REGISTRY")
        .unwrap_or_else(|_| DEFAULT_REGISTRY_BASE.to_string());
    Ok(format!("{}/{}", base.trim_end_matches('/'), file))
}

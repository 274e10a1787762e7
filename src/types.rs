use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{CleanError, Result};

/// Channel-major audio: `samples` is shaped `(channels, frames)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Waveform {
    pub samples: Array2<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Array2<f32>, sample_rate: u32) -> Result<Self> {
        if samples.nrows() == 0 {
            return Err(CleanError::Decode("waveform has no channels".into()));
        }
        if sample_rate == 0 {
            return Err(CleanError::Decode("sample rate must be positive".into()));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        let n = samples.len();
        Self::new(Array2::from_shape_vec((1, n), samples)?, sample_rate)
    }

    /// Build from frame-interleaved samples (`L R L R ...`).
    pub fn from_interleaved(samples: Vec<f32>, channels: usize, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(CleanError::Decode("waveform has no channels".into()));
        }
        let frames = samples.len() / channels;
        let mut samples = samples;
        samples.truncate(frames * channels);
        let planar = Array2::from_shape_vec((frames, channels), samples)?
            .reversed_axes()
            .as_standard_layout()
            .into_owned();
        Self::new(planar, sample_rate)
    }

    pub fn channels(&self) -> usize {
        self.samples.nrows()
    }

    pub fn frames(&self) -> usize {
        self.samples.ncols()
    }

    pub fn channel(&self, index: usize) -> ArrayView1<'_, f32> {
        self.samples.index_axis(Axis(0), index)
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Frame-interleaved copy, the layout WAV writers expect.
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.samples.len());
        for frame in self.samples.axis_iter(Axis(1)) {
            out.extend(frame.iter().copied());
        }
        out
    }
}

/// What `probe_audio` reports about an input file.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: usize,
    pub frames: usize,
    pub duration_secs: f64,
}

/// The isolated voice, mono, at the model's native rate.
#[derive(Clone, Debug)]
pub struct ProcessingResult {
    pub vocals: Waveform,
    pub sample_rate: u32,
}

/// How inputs with more than two channels are handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelPolicy {
    #[default]
    Reject,
    /// Average channels 3.. into one signal and blend it equally into L and R.
    DownmixToStereo,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleQuality {
    #[default]
    Normal,
    High,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WavEncoding {
    /// 16-bit integer PCM, samples clamped to [-1, 1].
    #[default]
    Pcm16,
    Float32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanOptions {
    pub output_dir: String,
    pub model_name: String,
    pub manifest_url_override: Option<String>,
    /// Custom local path to the ONNX model file.
    /// If set, skips downloading and uses this file directly.
    pub model_path: Option<String>,
    /// Where downloaded models are cached. Defaults to the per-user cache dir.
    pub cache_dir: Option<String>,
    /// Index of the vocals source, used only when the model carries no labels.
    pub fallback_vocals_index: Option<usize>,
    pub channel_policy: ChannelPolicy,
    pub resample_quality: ResampleQuality,
    pub output_encoding: WavEncoding,
}

/// MusDB ordering: drums, bass, other, vocals.
pub const MUSDB_VOCALS_INDEX: usize = 3;

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            output_dir: ".".into(),
            model_name: "hdemucs_high_musdb".into(),
            manifest_url_override: None,
            model_path: None,
            cache_dir: None,
            fallback_vocals_index: Some(MUSDB_VOCALS_INDEX),
            channel_policy: ChannelPolicy::default(),
            resample_quality: ResampleQuality::default(),
            output_encoding: WavEncoding::default(),
        }
    }
}

impl CleanOptions {
    pub fn from_json_file(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Artifact {
    pub file: String,
    pub sha256: String,
    #[serde(alias = "size_bytes")]
    pub size_bytes: u64,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IODesc {
    pub name: String,
    #[serde(default)]
    pub layout: String,
    #[serde(default)]
    pub dtype: String,
    #[serde(default)]
    pub shape: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelManifest {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub backend: String,
    #[serde(default)]
    pub format: String,

    #[serde(alias = "sample_rate_hz")]
    pub sample_rate: u32,

    /// Source labels in the order the model emits them.
    #[serde(default)]
    pub stems: Vec<String>,

    #[serde(default)]
    pub inputs: Vec<IODesc>,
    #[serde(default)]
    pub outputs: Vec<IODesc>,

    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub entry: String,

    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub sha256: String,
    #[serde(default)]
    pub filesize: u64,
}

#[derive(Debug, Clone)]
pub struct ResolvedArtifact {
    pub file: String,
    pub sha256: String,
    pub size_bytes: u64,
    pub url: String,
}

impl From<&Artifact> for ResolvedArtifact {
    fn from(a: &Artifact) -> Self {
        Self {
            file: a.file.clone(),
            sha256: a.sha256.clone(),
            size_bytes: a.size_bytes,
            url: a.url.clone(),
        }
    }
}

impl ModelManifest {
    pub fn resolve_primary_artifact(&self) -> std::result::Result<ResolvedArtifact, String> {
        if !self.artifacts.is_empty() {
            if !self.entry.is_empty() {
                return self
                    .artifacts
                    .iter()
                    .find(|a| a.file == self.entry)
                    .map(ResolvedArtifact::from)
                    .ok_or_else(|| format!("entry '{}' not found in artifacts[]", self.entry));
            }
            if self.artifacts.len() == 1 {
                return Ok(ResolvedArtifact::from(&self.artifacts[0]));
            }
            return Err("multiple artifacts present but no 'entry' specified".into());
        }

        if self.url.is_empty() || self.filesize == 0 {
            return Err("manifest missing artifacts and legacy url/sha256/filesize".into());
        }
        let short = digest_prefix(&self.sha256)
            .ok_or_else(|| format!("legacy sha256 '{}' is not a hex digest", self.sha256))?;
        let file = infer_filename_from_url(&self.url)
            .unwrap_or_else(|| format!("{}-{}.onnx", self.name, short));
        Ok(ResolvedArtifact {
            file,
            sha256: self.sha256.clone(),
            size_bytes: self.filesize,
            url: self.url.clone(),
        })
    }

    /// Labels as reported by the manifest, `None` when it lists none.
    pub fn source_labels(&self) -> Option<Vec<String>> {
        if self.stems.is_empty() {
            None
        } else {
            Some(self.stems.clone())
        }
    }
}

/// First 8 characters of a hex SHA-256 digest, `None` if `sha256` is not one.
pub(crate) fn digest_prefix(sha256: &str) -> Option<&str> {
    if sha256.len() >= 8 && sha256.bytes().all(|b| b.is_ascii_hexdigit()) {
        Some(&sha256[..8])
    } else {
        None
    }
}

fn infer_filename_from_url(url: &str) -> Option<String> {
    url.rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

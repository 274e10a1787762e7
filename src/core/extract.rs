use crate::{
    error::{CleanError, Result},
    types::Waveform,
};

use ndarray::{s, Array2, Array4, Axis};

pub const VOCALS: &str = "vocals";

/// One inference's output with the labels that name its sources.
#[derive(Clone, Debug)]
pub struct SourceBundle {
    /// `(batch, source, channel, time)`
    pub data: Array4<f32>,
    pub labels: Option<Vec<String>>,
    pub sample_rate: u32,
}

impl SourceBundle {
    pub fn new(data: Array4<f32>, labels: Option<&[String]>, sample_rate: u32) -> Self {
        Self {
            data,
            labels: labels.map(|l| l.to_vec()),
            sample_rate,
        }
    }

    pub fn num_sources(&self) -> usize {
        self.data.shape()[1]
    }

    /// Index of `name`, resolved the same way as for vocals.
    pub fn index_of(&self, name: &str, fallback: Option<usize>) -> Result<usize> {
        resolve_source_index(self.labels.as_deref(), name, fallback, self.num_sources())
    }

    /// A labelled source as a `(channels, time)` waveform.
    pub fn stem(&self, name: &str) -> Result<Waveform> {
        let idx = self.index_of(name, None)?;
        self.source(idx)
    }

    fn source(&self, idx: usize) -> Result<Waveform> {
        if self.data.shape()[0] != 1 {
            return Err(CleanError::ModelInference(format!(
                "expected a single clip in the batch, got {}",
                self.data.shape()[0]
            )));
        }
        let block = self.data.slice(s![0, idx, .., ..]).to_owned();
        model_waveform(block, self.sample_rate)
    }
}

/// A waveform built from model output; a malformed one is an inference fault.
fn model_waveform(samples: Array2<f32>, sample_rate: u32) -> Result<Waveform> {
    Waveform::new(samples, sample_rate).map_err(|e| match e {
        CleanError::Decode(msg) => CleanError::ModelInference(msg),
        other => other,
    })
}

/// Find the output position of source `name`.
///
/// Labels, when present, are authoritative: a missing name is an error even if
/// a fallback index is configured. The fallback is used only when the model
/// reports no labels at all.
pub fn resolve_source_index(
    labels: Option<&[String]>,
    name: &str,
    fallback: Option<usize>,
    num_sources: usize,
) -> Result<usize> {
    match labels {
        Some(labels) => {
            if labels.len() != num_sources {
                return Err(CleanError::SourceLabelMismatch(format!(
                    "model reports {} labels {:?} but produced {} sources",
                    labels.len(),
                    labels,
                    num_sources
                )));
            }
            labels
                .iter()
                .position(|l| l.eq_ignore_ascii_case(name))
                .ok_or_else(|| {
                    CleanError::SourceLabelMismatch(format!(
                        "'{name}' not among model sources {labels:?}"
                    ))
                })
        }
        None => match fallback {
            Some(idx) if idx < num_sources => {
                log::warn!("model has no source labels; assuming '{name}' is source {idx}");
                Ok(idx)
            }
            Some(idx) => Err(CleanError::SourceLabelMismatch(format!(
                "fallback index {idx} for '{name}' out of range ({num_sources} sources)"
            ))),
            None => Err(CleanError::SourceLabelMismatch(format!(
                "model has no source labels and no fallback index is configured for '{name}'"
            ))),
        },
    }
}

/// Select source `index`, drop the batch axis and average the two channels.
///
/// The time length is whatever the model returned; it is not re-aligned to
/// the input.
pub fn extract_voice(bundle: &SourceBundle, index: usize) -> Result<Waveform> {
    if index >= bundle.num_sources() {
        return Err(CleanError::SourceLabelMismatch(format!(
            "source index {index} out of range ({} sources)",
            bundle.num_sources()
        )));
    }
    let stereo = bundle.source(index)?;
    if stereo.channels() != 2 {
        return Err(CleanError::ModelInference(format!(
            "expected 2 channels per source, got {}",
            stereo.channels()
        )));
    }

    let left = stereo.samples.index_axis(Axis(0), 0);
    let right = stereo.samples.index_axis(Axis(0), 1);
    let mono = Array2::from_shape_fn((1, stereo.frames()), |(_, i)| 0.5 * (left[i] + right[i]));
    model_waveform(mono, bundle.sample_rate)
}

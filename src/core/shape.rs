//! Adapts decoded audio to the separation model's input contract:
//! `(1, 2, time)` at the model's sample rate, normalized.
//!
//! Normalization is one-way. The model output is used at whatever scale the
//! model produces and is never mapped back to the input's loudness.

use crate::{
    core::resample::resample,
    error::{CleanError, Result},
    types::{ChannelPolicy, ResampleQuality, Waveform},
};

use ndarray::{s, Array2, Array3, ArrayView2, Axis};

const NORM_EPS: f32 = 1e-8;

#[derive(Clone, Copy, Debug, Default)]
pub struct AdapterOptions {
    pub channel_policy: ChannelPolicy,
    pub resample_quality: ResampleQuality,
}

/// Apply the channel policy. Mono and stereo pass through.
fn fit_channels(samples: ArrayView2<'_, f32>, policy: ChannelPolicy) -> Result<Array2<f32>> {
    let channels = samples.nrows();
    if channels <= 2 {
        return Ok(samples.to_owned());
    }
    match policy {
        ChannelPolicy::Reject => Err(CleanError::UnsupportedChannelLayout { channels }),
        ChannelPolicy::DownmixToStereo => {
            log::info!("down-mixing {channels} channels to stereo");
            let extra = samples
                .slice(s![2.., ..])
                .mean_axis(Axis(0))
                .ok_or_else(|| CleanError::UnsupportedChannelLayout { channels })?;
            let mut out = samples.slice(s![0..2, ..]).to_owned();
            for mut row in out.rows_mut() {
                row.zip_mut_with(&extra, |x, &e| *x = 0.5 * (*x + e));
            }
            Ok(out)
        }
    }
}

/// Channel policy, resampling and mono duplication: a `(2, time)` block at
/// `target_rate`, not yet normalized.
pub fn to_model_layout(
    audio: &Waveform,
    target_rate: u32,
    opts: &AdapterOptions,
) -> Result<Array2<f32>> {
    let fitted = fit_channels(audio.samples.view(), opts.channel_policy)?;

    let resampled = if audio.sample_rate != target_rate {
        log::info!("resampling from {} to {} Hz", audio.sample_rate, target_rate);
        resample(
            fitted.view(),
            audio.sample_rate,
            target_rate,
            opts.resample_quality,
        )?
    } else {
        fitted
    };

    if resampled.nrows() == 1 {
        let mono = resampled.row(0);
        let mut stereo = Array2::zeros((2, resampled.ncols()));
        stereo.row_mut(0).assign(&mono);
        stereo.row_mut(1).assign(&mono);
        Ok(stereo)
    } else {
        Ok(resampled)
    }
}

/// Shift and scale every sample by the mean and standard deviation of the
/// channel-averaged signal. The same scalars apply to all channels.
pub fn normalize(batch: &mut Array3<f32>) {
    let (m, sd) = reference_stats(batch);
    let scale = 1.0 / (sd + NORM_EPS);
    batch.mapv_inplace(|x| (x - m) * scale);
}

/// Mean and unbiased standard deviation of the mean-over-channels signal.
fn reference_stats(batch: &Array3<f32>) -> (f32, f32) {
    let n = batch.shape()[2];
    if n == 0 {
        return (0.0, 0.0);
    }
    let reference = match batch.index_axis(Axis(0), 0).mean_axis(Axis(0)) {
        Some(r) => r,
        None => return (0.0, 0.0),
    };

    let mean = reference.iter().map(|&x| x as f64).sum::<f64>() / n as f64;
    if n < 2 {
        return (mean as f32, 0.0);
    }
    let var = reference
        .iter()
        .map(|&x| {
            let d = x as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / (n - 1) as f64;
    (mean as f32, var.sqrt() as f32)
}

/// Full adapter: `(1, 2, time)` at `target_rate`, normalized.
pub fn prepare_input(
    audio: &Waveform,
    target_rate: u32,
    opts: &AdapterOptions,
) -> Result<Array3<f32>> {
    let stereo = to_model_layout(audio, target_rate, opts)?;
    let mut batch = stereo.insert_axis(Axis(0));
    normalize(&mut batch);
    Ok(batch)
}

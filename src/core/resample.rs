//! Band-limited sample rate conversion using rubato.
//!
//! Every channel runs through the same sinc resampler but is processed
//! independently, so no energy moves between channels. The lag the
//! resampler actually introduces is measured with an impulse and trimmed
//! from the front, and the tail is flushed with silence, so the output
//! holds exactly `ceil(frames * to / from)` frames aligned with the input.

use crate::{
    error::{CleanError, Result},
    types::ResampleQuality,
};

use ndarray::{Array2, ArrayView2};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

const CHUNK: usize = 1024;
const IMPULSE_AT: usize = CHUNK / 2;

fn sinc_params(quality: ResampleQuality) -> SincInterpolationParameters {
    match quality {
        ResampleQuality::Normal => SincInterpolationParameters {
            sinc_len: 128,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 128,
            window: WindowFunction::BlackmanHarris2,
        },
        ResampleQuality::High => SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        },
    }
}

fn sinc_resampler(ratio: f64, quality: ResampleQuality, channels: usize) -> Result<SincFixedIn<f32>> {
    SincFixedIn::<f32>::new(ratio, 1.0, sinc_params(quality), CHUNK, channels)
        .map_err(|e| CleanError::Resample(e.to_string()))
}

/// Output frames between where an input frame should land and where a fresh
/// resampler with these settings puts it.
///
/// `output_delay()` does not describe the chunked `process` output, so the
/// lag is read off the peak of a resampled impulse instead.
fn alignment_lag(ratio: f64, quality: ResampleQuality) -> Result<usize> {
    let mut resampler = sinc_resampler(ratio, quality, 1)?;
    let mut impulse = vec![vec![0f32; CHUNK]];
    impulse[0][IMPULSE_AT] = 1.0;
    let silence = vec![vec![0f32; CHUNK]];

    let mut out = Vec::new();
    for chunk in [&impulse, &silence, &silence] {
        let produced = resampler
            .process(chunk, None)
            .map_err(|e| CleanError::Resample(e.to_string()))?;
        out.extend_from_slice(&produced[0]);
    }

    let peak = out
        .iter()
        .enumerate()
        .fold((0usize, 0f32), |best, (i, s)| {
            if s.abs() > best.1 {
                (i, s.abs())
            } else {
                best
            }
        })
        .0;
    let target = (IMPULSE_AT as f64 * ratio).round() as usize;
    Ok(peak.saturating_sub(target))
}

/// Number of frames produced when converting `frames` from `from` Hz to `to` Hz.
pub fn resampled_len(frames: usize, from: u32, to: u32) -> usize {
    let (n, from, to) = (frames as u128, from as u128, to as u128);
    ((n * to + from - 1) / from) as usize
}

/// Resample a `(channels, frames)` block from `from` Hz to `to` Hz.
///
/// Equal rates return the input untouched.
pub fn resample(
    samples: ArrayView2<'_, f32>,
    from: u32,
    to: u32,
    quality: ResampleQuality,
) -> Result<Array2<f32>> {
    if from == 0 || to == 0 {
        return Err(CleanError::Resample(format!(
            "invalid rates: {from} Hz -> {to} Hz"
        )));
    }
    if from == to {
        return Ok(samples.to_owned());
    }

    let (channels, n) = samples.dim();
    let expected = resampled_len(n, from, to);
    if n == 0 || channels == 0 {
        return Ok(Array2::zeros((channels, expected)));
    }

    let ratio = to as f64 / from as f64;
    let delay = alignment_lag(ratio, quality)?;
    let mut resampler = sinc_resampler(ratio, quality, channels)?;

    log::debug!(
        "resampling {channels} ch x {n} frames: {from} -> {to} Hz ({}, lag {delay})",
        if to > from { "up" } else { "down" }
    );

    let mut out: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay + CHUNK); channels];
    let mut chunk = vec![vec![0f32; CHUNK]; channels];
    let mut pos = 0usize;

    while out[0].len() < delay + expected {
        for (c, buf) in chunk.iter_mut().enumerate() {
            let row = samples.row(c);
            for (i, slot) in buf.iter_mut().enumerate() {
                let idx = pos + i;
                *slot = if idx < n { row[idx] } else { 0.0 };
            }
        }

        let produced = resampler
            .process(&chunk, None)
            .map_err(|e| CleanError::Resample(e.to_string()))?;
        for (dst, src) in out.iter_mut().zip(produced) {
            dst.extend_from_slice(&src);
        }
        pos += CHUNK;
    }

    let mut flat = Vec::with_capacity(channels * expected);
    for ch in &out {
        flat.extend_from_slice(&ch[delay..delay + expected]);
    }
    Ok(Array2::from_shape_vec((channels, expected), flat)?)
}

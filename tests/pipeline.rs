use std::{path::Path, sync::Mutex};

use hound::{SampleFormat, WavSpec, WavWriter};
use ndarray::{Array4, ArrayView3, Axis};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tempfile::tempdir;
use voice_cleaner_core::{
    ChannelPolicy, CleanError, CleanOptions, Result, SeparationModel, VoiceCleaner,
};

const MODEL_RATE: u32 = 44100;

fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Every source is a copy of the mix, scaled by `gains[source]`.
/// Optionally pads the output by `extra` frames, like a model that frames internally.
struct StubModel {
    labels: Option<Vec<String>>,
    gains: Vec<f32>,
    extra: usize,
    seen: Mutex<Vec<Vec<usize>>>,
}

impl StubModel {
    fn musdb() -> Self {
        Self::new(
            Some(labels(&["drums", "bass", "other", "vocals"])),
            vec![1.0, 1.0, 1.0, 1.0],
        )
    }

    fn new(labels: Option<Vec<String>>, gains: Vec<f32>) -> Self {
        Self {
            labels,
            gains,
            extra: 0,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<Vec<usize>> {
        self.seen.lock().unwrap().clone()
    }
}

impl SeparationModel for StubModel {
    fn sample_rate(&self) -> u32 {
        MODEL_RATE
    }

    fn source_labels(&self) -> Option<&[String]> {
        self.labels.as_deref()
    }

    fn separate(&self, mix: ArrayView3<'_, f32>) -> Result<Array4<f32>> {
        self.seen.lock().unwrap().push(mix.shape().to_vec());
        let (b, c, t) = mix.dim();
        let out = Array4::from_shape_fn((b, self.gains.len(), c, t + self.extra), |(bi, s, ci, i)| {
            if i < t {
                self.gains[s] * mix[[bi, ci, i]]
            } else {
                0.0
            }
        });
        Ok(out)
    }
}

struct FailingModel;

impl SeparationModel for FailingModel {
    fn sample_rate(&self) -> u32 {
        MODEL_RATE
    }

    fn source_labels(&self) -> Option<&[String]> {
        None
    }

    fn separate(&self, _mix: ArrayView3<'_, f32>) -> Result<Array4<f32>> {
        Err(CleanError::ModelInference("out of memory".into()))
    }
}

fn write_wav(path: &Path, channels: u16, rate: u32, frames: Vec<Vec<f32>>) {
    let spec = WavSpec {
        channels,
        sample_rate: rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut w = WavWriter::create(path, spec).unwrap();
    for frame in frames {
        assert_eq!(frame.len(), channels as usize);
        for s in frame {
            w.write_sample(s).unwrap();
        }
    }
    w.finalize().unwrap();
}

fn noise(frames: usize, channels: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..frames)
        .map(|_| (0..channels).map(|_| rng.gen_range(-0.5..0.5)).collect())
        .collect()
}

#[test]
fn silent_clip_end_to_end() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("silence.wav");
    write_wav(&input, 1, 22050, vec![vec![0.0]; 22050]);

    let cleaner = VoiceCleaner::new(StubModel::musdb(), CleanOptions::default());
    let result = cleaner.clean_voice(&input).unwrap();

    assert_eq!(result.sample_rate, MODEL_RATE);
    assert_eq!(result.vocals.sample_rate, MODEL_RATE);
    assert_eq!(result.vocals.channels(), 1);
    // Regression baseline: one second at 22.05 kHz -> one second at 44.1 kHz.
    assert_eq!(result.vocals.frames(), 44100);
    assert!(result.vocals.samples.iter().all(|s| *s == 0.0));
}

#[test]
fn model_always_receives_batched_stereo_at_its_rate() {
    let dir = tempdir().unwrap();
    let mono = dir.path().join("mono16k.wav");
    let stereo = dir.path().join("stereo48k.wav");
    let native = dir.path().join("stereo441.wav");
    write_wav(&mono, 1, 16000, noise(1600, 1, 1));
    write_wav(&stereo, 2, 48000, noise(4800, 2, 2));
    write_wav(&native, 2, 44100, noise(4410, 2, 3));

    let cleaner = VoiceCleaner::new(StubModel::musdb(), CleanOptions::default());
    for p in [&mono, &stereo, &native] {
        cleaner.clean_voice(p).unwrap();
    }

    let calls = cleaner.model().calls();
    assert_eq!(calls, vec![vec![1, 2, 4410], vec![1, 2, 4410], vec![1, 2, 4410]]);
}

#[test]
fn vocals_are_found_by_label_not_position() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.wav");
    write_wav(&input, 2, MODEL_RATE, noise(2000, 2, 4));

    // Vocals first: gain 1. Position 3 (the MusDB slot) has gain 0.
    let model = StubModel::new(
        Some(labels(&["vocals", "drums", "bass", "other"])),
        vec![1.0, 0.5, 0.25, 0.0],
    );
    let cleaner = VoiceCleaner::new(model, CleanOptions::default());
    let out = cleaner.clean_voice(&input).unwrap();
    assert!(out.vocals.samples.iter().any(|s| s.abs() > 0.01));
}

#[test]
fn missing_vocals_label_is_an_error() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.wav");
    write_wav(&input, 1, MODEL_RATE, noise(512, 1, 5));

    let model = StubModel::new(
        Some(labels(&["drums", "bass", "other", "guitar"])),
        vec![1.0; 4],
    );
    let cleaner = VoiceCleaner::new(model, CleanOptions::default());
    assert!(matches!(
        cleaner.clean_voice(&input),
        Err(CleanError::SourceLabelMismatch(_))
    ));
}

#[test]
fn unlabelled_model_uses_fallback_only_when_configured() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.wav");
    write_wav(&input, 1, MODEL_RATE, noise(512, 1, 6));

    let with_fallback = VoiceCleaner::new(
        StubModel::new(None, vec![0.0, 0.0, 0.0, 1.0]),
        CleanOptions::default(),
    );
    let out = with_fallback.clean_voice(&input).unwrap();
    assert!(out.vocals.samples.iter().any(|s| s.abs() > 0.01));

    let opts = CleanOptions {
        fallback_vocals_index: None,
        ..CleanOptions::default()
    };
    let without = VoiceCleaner::new(StubModel::new(None, vec![1.0; 4]), opts);
    assert!(matches!(
        without.clean_voice(&input),
        Err(CleanError::SourceLabelMismatch(_))
    ));
}

#[test]
fn output_is_not_denormalized() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("quiet.wav");
    let frames: Vec<Vec<f32>> = noise(4000, 1, 7)
        .into_iter()
        .map(|f| vec![f[0] * 0.01])
        .collect();
    write_wav(&input, 1, MODEL_RATE, frames);

    let cleaner = VoiceCleaner::new(StubModel::musdb(), CleanOptions::default());
    let out = cleaner.clean_voice(&input).unwrap();

    // Identity stems of a normalized input: unit std, not the input's ~3e-3.
    let v = out.vocals.channel(0);
    let n = v.len() as f32;
    let mean = v.sum() / n;
    let var = v.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / (n - 1.0);
    assert!((var.sqrt() - 1.0).abs() < 1e-2, "std = {}", var.sqrt());
}

#[test]
fn length_change_inside_the_model_passes_through() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.wav");
    write_wav(&input, 2, MODEL_RATE, noise(1000, 2, 8));

    let mut model = StubModel::musdb();
    model.extra = 24;
    let cleaner = VoiceCleaner::new(model, CleanOptions::default());
    let out = cleaner.clean_voice(&input).unwrap();
    assert_eq!(out.vocals.frames(), 1024);
}

#[test]
fn inference_failure_aborts_the_call() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.wav");
    write_wav(&input, 1, MODEL_RATE, noise(256, 1, 9));

    let cleaner = VoiceCleaner::new(FailingModel, CleanOptions::default());
    let out_path = dir.path().join("never.wav");
    assert!(matches!(
        cleaner.clean_to_file(&input, &out_path),
        Err(CleanError::ModelInference(_))
    ));
    assert!(!out_path.exists());
}

#[test]
fn corrupt_input_never_reaches_the_model() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("bad.mp3");
    std::fs::write(&input, [0u8; 64]).unwrap();

    let cleaner = VoiceCleaner::new(StubModel::musdb(), CleanOptions::default());
    assert!(matches!(
        cleaner.clean_voice(&input),
        Err(CleanError::Decode(_))
    ));
    assert!(cleaner.model().calls().is_empty());
}

#[test]
fn surround_input_follows_channel_policy() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("surround.wav");
    write_wav(&input, 6, MODEL_RATE, noise(800, 6, 10));

    let strict = VoiceCleaner::new(StubModel::musdb(), CleanOptions::default());
    assert!(matches!(
        strict.clean_voice(&input),
        Err(CleanError::UnsupportedChannelLayout { channels: 6 })
    ));

    let opts = CleanOptions {
        channel_policy: ChannelPolicy::DownmixToStereo,
        ..CleanOptions::default()
    };
    let lenient = VoiceCleaner::new(StubModel::musdb(), opts);
    let out = lenient.clean_voice(&input).unwrap();
    assert_eq!(out.vocals.frames(), 800);
    assert_eq!(lenient.model().calls(), vec![vec![1, 2, 800]]);
}

#[test]
fn written_result_is_mono_wav_at_model_rate() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("take.wav");
    write_wav(&input, 2, 32000, noise(3200, 2, 11));

    let cleaner = VoiceCleaner::new(StubModel::musdb(), CleanOptions::default());
    let out = cleaner
        .clean_to_file(&input, dir.path().join("nested/take_vocals.wav"))
        .unwrap();

    let reader = hound::WavReader::open(&out).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, MODEL_RATE);
    assert_eq!(spec.sample_format, SampleFormat::Int);
    assert_eq!(reader.duration(), 4410);
}

#[test]
fn antiphase_stereo_cancels_in_the_mono_result() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("lr.wav");
    // Right is the negated left channel.
    let frames: Vec<Vec<f32>> = noise(1000, 1, 12)
        .into_iter()
        .map(|f| vec![f[0], -f[0]])
        .collect();
    write_wav(&input, 2, MODEL_RATE, frames);

    let cleaner = VoiceCleaner::new(StubModel::musdb(), CleanOptions::default());
    let out = cleaner.clean_voice(&input).unwrap();
    let peak = out
        .vocals
        .samples
        .index_axis(Axis(0), 0)
        .iter()
        .fold(0.0f32, |m, s| m.max(s.abs()));
    assert!(peak < 1e-6, "peak = {peak}");
}

use crate::{
    core::{
        audio::{read_audio, write_audio},
        engine::{OrtSeparator, SeparationModel},
        extract::{extract_voice, SourceBundle, VOCALS},
        shape::{prepare_input, AdapterOptions},
    },
    error::{CleanError, Result},
    io::progress::{emit_clean_progress, CleanProgress},
    model::model_manager::resolve_model,
    types::{CleanOptions, ProcessingResult},
};

use std::{
    fs,
    path::{Path, PathBuf},
};

/// Runs one clip at a time through load, adapt, separate and extract.
///
/// The model is built once by the caller and owned here; nothing is retried
/// and no partial result survives a failed stage.
///
/// # Example
/// ```no_run
/// use voice_cleaner_core::{resolve_model, CleanOptions, OrtSeparator, VoiceCleaner};
///
/// let opts = CleanOptions::default();
/// let model = OrtSeparator::load(&resolve_model(&opts)?)?;
/// let cleaner = VoiceCleaner::new(model, opts);
/// let out = cleaner.clean_to_file("noisy.mp3", "clean.wav")?;
/// println!("wrote {}", out.display());
/// # Ok::<(), voice_cleaner_core::CleanError>(())
/// ```
pub struct VoiceCleaner<M: SeparationModel> {
    model: M,
    opts: CleanOptions,
}

impl<M: SeparationModel> VoiceCleaner<M> {
    pub fn new(model: M, opts: CleanOptions) -> Self {
        Self { model, opts }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn options(&self) -> &CleanOptions {
        &self.opts
    }

    /// Isolate the voice in `input`. Returns mono audio at the model's rate.
    pub fn clean_voice<P: AsRef<Path>>(&self, input: P) -> Result<ProcessingResult> {
        let rate = self.model.sample_rate();
        if rate == 0 {
            return Err(CleanError::ModelInference("model reports a 0 Hz rate".into()));
        }

        emit_clean_progress(CleanProgress::Stage("read_audio"));
        let audio = read_audio(input.as_ref())?;
        log::info!(
            "loaded {}: {} Hz, {} ch, {:.2} s",
            input.as_ref().display(),
            audio.sample_rate,
            audio.channels(),
            audio.duration_secs()
        );

        emit_clean_progress(CleanProgress::Stage("prepare_input"));
        let adapter = AdapterOptions {
            channel_policy: self.opts.channel_policy,
            resample_quality: self.opts.resample_quality,
        };
        let batch = prepare_input(&audio, rate, &adapter)?;

        emit_clean_progress(CleanProgress::Stage("infer"));
        let separated = self.model.separate(batch.view())?;
        let bundle = SourceBundle::new(separated, self.model.source_labels(), rate);
        if bundle.data.shape()[3] != batch.shape()[2] {
            log::warn!(
                "model changed the clip length: {} -> {} frames",
                batch.shape()[2],
                bundle.data.shape()[3]
            );
        }

        emit_clean_progress(CleanProgress::Stage("extract_voice"));
        let idx = bundle.index_of(VOCALS, self.opts.fallback_vocals_index)?;
        let vocals = extract_voice(&bundle, idx)?;

        Ok(ProcessingResult {
            vocals,
            sample_rate: rate,
        })
    }

    /// [`clean_voice`](Self::clean_voice) and write the result as WAV.
    pub fn clean_to_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input: P,
        output: Q,
    ) -> Result<PathBuf> {
        let result = self.clean_voice(input)?;
        let output = output.as_ref();
        if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        emit_clean_progress(CleanProgress::Writing {
            path: output.display().to_string(),
        });
        write_audio(output, &result.vocals, self.opts.output_encoding)?;
        emit_clean_progress(CleanProgress::Finished);
        Ok(output.to_path_buf())
    }
}

/// `<output_dir>/<input stem>_vocals.wav`
pub fn default_output_path(input: &Path, output_dir: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    PathBuf::from(output_dir).join(format!("{stem}_vocals.wav"))
}

/// One-shot: resolve and load the model, clean `input_path`, write the
/// vocals next to the other outputs in `opts.output_dir`.
///
/// Loading the model is the expensive part; keep a [`VoiceCleaner`] around
/// when cleaning more than one file.
pub fn clean_file(input_path: &str, opts: &CleanOptions) -> Result<PathBuf> {
    emit_clean_progress(CleanProgress::Stage("resolve_model"));
    let handle = resolve_model(opts)?;

    emit_clean_progress(CleanProgress::Stage("engine_preload"));
    let model = OrtSeparator::load(&handle)?;

    let output = default_output_path(Path::new(input_path), &opts.output_dir);
    VoiceCleaner::new(model, opts.clone()).clean_to_file(input_path, output)
}

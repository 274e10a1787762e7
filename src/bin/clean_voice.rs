//! Isolate the voice in a noisy recording.
//!
//! Usage: clean-voice input.mp3 [-o out.wav] [--model-path model.onnx]

use anyhow::{Context, Result};
use clap::Parser;
use std::{path::PathBuf, time::Instant};

use voice_cleaner_core::{
    default_output_path, prepare_model, probe_audio, ChannelPolicy, CleanOptions, CleanProgress,
    ResampleQuality, VoiceCleaner, WavEncoding,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Extract the voice from a noisy WAV/MP3 recording")]
struct Args {
    /// Input audio (WAV or MP3)
    input: PathBuf,

    /// Output WAV file [default: <output-dir>/<input>_vocals.wav]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON file with CleanOptions; flags below override it
    #[arg(short, long)]
    config: Option<String>,

    /// Local ONNX model (skips the download)
    #[arg(long)]
    model_path: Option<String>,

    /// Registry model name
    #[arg(long)]
    model_name: Option<String>,

    #[arg(long)]
    manifest_url: Option<String>,

    #[arg(long)]
    output_dir: Option<String>,

    /// Down-mix inputs with more than two channels instead of rejecting them
    #[arg(long)]
    downmix: bool,

    /// Slower, higher quality resampling
    #[arg(long)]
    hq_resample: bool,

    /// Write 32-bit float instead of 16-bit PCM
    #[arg(long)]
    float: bool,

    /// Only print input sample rate, channels and duration
    #[arg(long)]
    info: bool,
}

fn options(args: &Args) -> Result<CleanOptions> {
    let mut opts = match &args.config {
        Some(path) => CleanOptions::from_json_file(path)
            .with_context(|| format!("reading config {path}"))?,
        None => CleanOptions::default(),
    };
    if let Some(p) = &args.model_path {
        opts.model_path = Some(p.clone());
    }
    if let Some(n) = &args.model_name {
        opts.model_name = n.clone();
    }
    if let Some(u) = &args.manifest_url {
        opts.manifest_url_override = Some(u.clone());
    }
    if let Some(d) = &args.output_dir {
        opts.output_dir = d.clone();
    }
    if args.downmix {
        opts.channel_policy = ChannelPolicy::DownmixToStereo;
    }
    if args.hq_resample {
        opts.resample_quality = ResampleQuality::High;
    }
    if args.float {
        opts.output_encoding = WavEncoding::Float32;
    }
    Ok(opts)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let info = probe_audio(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    eprintln!(
        "Input: {} Hz, {}, {:.2} s",
        info.sample_rate,
        if info.channels > 1 { "stereo" } else { "mono" },
        info.duration_secs
    );
    if args.info {
        return Ok(());
    }

    voice_cleaner_core::set_download_progress_callback(|d, t| {
        if t > 0 {
            let pct = (d as f64 / t as f64 * 100.0).round() as u64;
            eprint!("\rModel: {:>3}% ({}/{})", pct, d, t);
            if d >= t {
                eprintln!();
            }
        } else {
            eprint!("\rModel: {} bytes", d);
        }
    });
    voice_cleaner_core::set_clean_progress_callback(|p| match p {
        CleanProgress::Stage(s) => eprintln!("> {}", s),
        CleanProgress::Writing { path } => eprintln!("Writing {}", path),
        CleanProgress::Finished => eprintln!("Finished."),
    });

    let opts = options(&args)?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input, &opts.output_dir));

    let model = prepare_model(&opts).context("loading separation model")?;
    let cleaner = VoiceCleaner::new(model, opts);

    let start = Instant::now();
    let written = cleaner.clean_to_file(&args.input, &output)?;
    eprintln!(
        "Done in {:.2} s: {}",
        start.elapsed().as_secs_f64(),
        written.display()
    );
    Ok(())
}

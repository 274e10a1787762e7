use crate::{
    error::{CleanError, Result},
    types::{AudioInfo, WavEncoding, Waveform},
};

use hound::{SampleFormat, WavSpec, WavWriter};
use std::{fs::File, path::Path};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};

/// Decode a WAV or MP3 file into a channel-major waveform at its native rate.
pub fn read_audio<P: AsRef<Path>>(path: P) -> Result<Waveform> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| CleanError::Decode(format!("cannot open {}: {e}", path.display())))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| CleanError::Decode(format!("{}: {e}", path.display())))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| CleanError::Decode(format!("{}: no audio track", path.display())))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| CleanError::Decode(format!("{}: {e}", path.display())))?;

    let mut interleaved: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                return Err(CleanError::Decode(format!("{}: {e}", path.display())));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("skipping undecodable packet at ts={}: {e}", packet.ts());
                continue;
            }
            Err(e) => {
                return Err(CleanError::Decode(format!("{}: {e}", path.display())));
            }
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        channels.get_or_insert(spec.channels.count());

        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(buf.samples());
    }

    let sample_rate = sample_rate
        .ok_or_else(|| CleanError::Decode(format!("{}: unknown sample rate", path.display())))?;
    let channels = channels
        .filter(|&c| c > 0)
        .ok_or_else(|| CleanError::Decode(format!("{}: unknown channel count", path.display())))?;
    if interleaved.len() < channels {
        return Err(CleanError::Decode(format!(
            "{}: no audio frames decoded",
            path.display()
        )));
    }
    if let Some(i) = interleaved.iter().position(|s| !s.is_finite()) {
        return Err(CleanError::Decode(format!(
            "{}: non-finite sample at frame {}",
            path.display(),
            i / channels
        )));
    }

    log::debug!(
        "decoded {}: {} Hz, {} ch, {} frames",
        path.display(),
        sample_rate,
        channels,
        interleaved.len() / channels
    );
    Waveform::from_interleaved(interleaved, channels, sample_rate)
}

/// Sample rate, channel count and duration of an input file.
pub fn probe_audio<P: AsRef<Path>>(path: P) -> Result<AudioInfo> {
    let w = read_audio(path)?;
    Ok(AudioInfo {
        sample_rate: w.sample_rate,
        channels: w.channels(),
        frames: w.frames(),
        duration_secs: w.duration_secs(),
    })
}

pub fn write_audio<P: AsRef<Path>>(path: P, audio: &Waveform, encoding: WavEncoding) -> Result<()> {
    let path = path.as_ref();
    let channels = u16::try_from(audio.channels())
        .map_err(|_| anyhow::anyhow!("too many channels to write: {}", audio.channels()))?;
    let spec = match encoding {
        WavEncoding::Pcm16 => WavSpec {
            channels,
            sample_rate: audio.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        },
        WavEncoding::Float32 => WavSpec {
            channels,
            sample_rate: audio.sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    };

    let mut writer = WavWriter::create(path, spec).map_err(wav_err)?;
    for s in audio.to_interleaved() {
        match encoding {
            WavEncoding::Pcm16 => {
                let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
                writer.write_sample(v).map_err(wav_err)?;
            }
            WavEncoding::Float32 => writer.write_sample(s).map_err(wav_err)?,
        }
    }
    writer.finalize().map_err(wav_err)?;
    Ok(())
}

fn wav_err(e: hound::Error) -> CleanError {
    match e {
        hound::Error::IoError(io) => CleanError::Io(io),
        other => CleanError::Anyhow(anyhow::anyhow!("wav write failed: {other}")),
    }
}

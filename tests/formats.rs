use std::path::Path;

use symphonia::core::codecs::{CODEC_TYPE_ADPCM_IMA_WAV, CODEC_TYPE_FLAC, CODEC_TYPE_VORBIS};
use tempfile::tempdir;
use voice_cleaner_core::{read_audio, CleanError};

/// Sixteen silent MPEG-1 Layer III frames: 128 kbps, 48 kHz, stereo.
const SILENT_MP3: &[u8] = include_bytes!("fixtures/silence_48k_stereo.mp3");

/// `fLaC` marker plus a STREAMINFO block for 44.1 kHz stereo 16-bit audio.
fn flac_header() -> Vec<u8> {
    let mut b = b"fLaC".to_vec();
    b.extend_from_slice(&[0x80, 0x00, 0x00, 0x22]);
    b.extend_from_slice(&[0x10, 0x00, 0x10, 0x00]);
    b.extend_from_slice(&[0x00; 6]);
    b.extend_from_slice(&[0x0A, 0xC4, 0x42, 0xF0, 0x00, 0x00, 0x00, 0x00]);
    b.extend_from_slice(&[0x00; 16]);
    b
}

fn write(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let p = dir.join(name);
    std::fs::write(&p, bytes).unwrap();
    p
}

#[test]
fn mp3_decodes_at_its_native_rate() {
    let dir = tempdir().unwrap();
    let p = write(dir.path(), "silence.mp3", SILENT_MP3);

    let w = read_audio(&p).unwrap();
    assert_eq!(w.sample_rate, 48000);
    assert_eq!(w.channels(), 2);
    assert!(w.frames() > 0);
    assert!(w.frames() <= 16 * 1152);
    assert!(w.samples.iter().all(|s| s.abs() < 1e-6));
}

#[test]
fn only_wav_and_mp3_codecs_are_registered() {
    let codecs = symphonia::default::get_codecs();
    for codec in [CODEC_TYPE_FLAC, CODEC_TYPE_VORBIS, CODEC_TYPE_ADPCM_IMA_WAV] {
        assert!(codecs.get_codec(codec).is_none(), "{codec:?} is registered");
    }
}

#[test]
fn other_containers_are_a_decode_error() {
    let dir = tempdir().unwrap();
    let flac = write(dir.path(), "take.flac", &flac_header());
    assert!(matches!(read_audio(&flac), Err(CleanError::Decode(_))));

    let ogg = write(dir.path(), "take.ogg", b"OggS\x00\x02\x00\x00\x00\x00\x00\x00\x00\x00");
    assert!(matches!(read_audio(&ogg), Err(CleanError::Decode(_))));
}

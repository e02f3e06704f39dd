//! Mono 16-bit PCM WAV output.

use std::path::Path;

use {
    hound::{SampleFormat, WavSpec, WavWriter},
    tracing::{info, warn},
};

use crate::error::{Error, Result};

/// Little-endian 16-bit PCM of `samples`, clamping out-of-range values.
///
/// Returns the bytes and the number of clamped samples.
pub fn pcm16_bytes(samples: &[i64]) -> (Vec<u8>, usize) {
    let mut clipped = 0;
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let value = match i16::try_from(sample) {
            Ok(v) => v,
            Err(_) => {
                clipped += 1;
                sample.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16
            },
        };
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    if clipped > 0 {
        warn!(clipped, total = samples.len(), "samples outside 16-bit range were clamped");
    }
    (bytes, clipped)
}

/// Write `pcm` (16-bit little-endian, mono) to a WAV file at `path`.
pub fn save_signal(path: &Path, pcm: &[u8], sample_rate: u32) -> Result<()> {
    if pcm.len() % 2 != 0 {
        return Err(Error::OddPcmLength(pcm.len()));
    }
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let audio = |source: hound::Error| Error::Audio {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = WavWriter::create(path, spec).map_err(audio)?;
    for pair in pcm.chunks_exact(2) {
        writer
            .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
            .map_err(audio)?;
    }
    writer.finalize().map_err(audio)?;
    info!(path = %path.display(), sample_rate, samples = pcm.len() / 2, "saved recording");
    Ok(())
}

/*!
Audio decoding and loudness analysis.
*/

use std::{io::Read, path::Path};

use hound::{SampleFormat, WavReader};
use rayon::prelude::*;

use crate::{
    error::{Error, Result},
    model::LoudnessSample,
};

/// Default loudness hop, 10ms.
pub const DEFAULT_HOP_SECONDS: f64 = 0.01;
/// Loudness below this is treated as silence.
pub const DEFAULT_RMS_THRESHOLD: f64 = 0.02;

/// Mono audio normalized to [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct Audio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Audio {
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }

        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Read a WAV file from disk.
pub fn read_wav(path: &Path) -> Result<Audio> {
    let reader = WavReader::open(path).map_err(|e| match Error::from(e) {
        Error::Io { error, .. } => Error::io(path, error),
        e => e,
    })?;

    log::debug!("Decoding {}", path.display());

    decode(reader)
}

/// Decode WAV data from any reader.
pub fn decode_wav<R: Read>(reader: R) -> Result<Audio> {
    decode(WavReader::new(reader)?)
}

fn decode<R: Read>(mut reader: WavReader<R>) -> Result<Audio> {
    let spec = reader.spec();

    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<std::result::Result<Vec<f32>, hound::Error>>()?,
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, hound::Error>>()?,
        (format, bits) => {
            return Err(Error::Format(format!(
                "unsupported sample format {format:?} with {bits} bits, expected 16-bit int or 32-bit float"
            )));
        }
    };

    let samples = if spec.channels > 1 {
        let ch = spec.channels as usize;
        samples
            .chunks(ch)
            .map(|frame| frame.iter().sum::<f32>() / ch as f32)
            .collect()
    } else {
        samples
    };

    log::debug!(
        "Decoded {} samples at {}Hz from {} channel(s)",
        samples.len(),
        spec.sample_rate,
        spec.channels
    );

    Ok(Audio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Loudness of `samples` measured on a fixed hop.
///
/// Every hop yields `sqrt(mean(x^2))`, stamped at `i * hop_seconds`. Values
/// below `threshold` are clamped to 0. The final hop may be shorter.
pub fn rms_timeline(
    samples: &[f32],
    sample_rate: u32,
    hop_seconds: f64,
    threshold: f64,
) -> Vec<LoudnessSample> {
    if samples.is_empty() || sample_rate == 0 || hop_seconds <= 0.0 {
        return vec![];
    }

    let hop = ((sample_rate as f64 * hop_seconds).floor() as usize).max(1);

    samples
        .par_chunks(hop)
        .enumerate()
        .map(|(i, chunk)| {
            let mean = chunk.iter().map(|&x| (x as f64).powi(2)).sum::<f64>() / chunk.len() as f64;
            let rms = mean.sqrt();

            LoudnessSample::new(
                i as f64 * hop_seconds,
                if rms < threshold { 0.0 } else { rms },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use hound::{WavSpec, WavWriter};

    use super::*;

    fn wav_bytes<S: hound::Sample + Copy>(spec: WavSpec, samples: &[S]) -> Vec<u8> {
        let mut cursor = Cursor::new(vec![]);
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }

        cursor.into_inner()
    }

    fn spec(channels: u16, bits: u16, format: SampleFormat) -> WavSpec {
        WavSpec {
            channels,
            sample_rate: 100,
            bits_per_sample: bits,
            sample_format: format,
        }
    }

    mod decode {
        use super::*;

        #[test]
        fn int16_is_normalized() {
            let bytes = wav_bytes(
                spec(1, 16, SampleFormat::Int),
                &[0i16, i16::MIN, 16384, i16::MAX],
            );
            let audio = decode_wav(Cursor::new(bytes)).unwrap();

            assert_eq!(audio.sample_rate, 100);
            assert_eq!(&audio.samples[..3], &[0.0, -1.0, 0.5]);
            assert!(audio.samples.iter().all(|v| (-1.0..=1.0).contains(v)));
            assert!(audio.samples[3] < 1.0);
        }

        #[test]
        fn float32_passes_through() {
            let bytes = wav_bytes(spec(1, 32, SampleFormat::Float), &[0.25f32, -0.5]);
            let audio = decode_wav(Cursor::new(bytes)).unwrap();

            assert_eq!(audio.samples, vec![0.25, -0.5]);
        }

        #[test]
        fn stereo_is_downmixed() {
            let bytes = wav_bytes(
                spec(2, 32, SampleFormat::Float),
                &[0.5f32, 0.0, 1.0, 1.0],
            );
            let audio = decode_wav(Cursor::new(bytes)).unwrap();

            assert_eq!(audio.samples, vec![0.25, 1.0]);
            assert!((audio.duration() - 0.02).abs() < 1e-12);
        }

        #[test]
        fn other_widths_are_format_errors() {
            let bytes = wav_bytes(spec(1, 8, SampleFormat::Int), &[0i8, 1, 2]);

            assert!(matches!(
                decode_wav(Cursor::new(bytes)),
                Err(Error::Format(_))
            ));
        }

        #[test]
        fn garbage_is_a_format_error() {
            assert!(matches!(
                decode_wav(Cursor::new(b"not a wav file".to_vec())),
                Err(Error::Format(_))
            ));
        }

        #[test]
        fn missing_file_is_an_io_error() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("missing.wav");

            match read_wav(&path) {
                Err(Error::Io { path: Some(p), .. }) => assert_eq!(p, path),
                r => assert!(false, "{r:?}"),
            }
        }
    }

    mod rms {
        use super::*;

        #[test]
        fn constant_signal() {
            let timeline = rms_timeline(&[0.5; 10], 100, 0.02, 0.0);

            assert_eq!(timeline.len(), 5);
            for (i, s) in timeline.iter().enumerate() {
                assert!((s.time - i as f64 * 0.02).abs() < 1e-12);
                assert!((s.amplitude - 0.5).abs() < 1e-9);
            }
        }

        #[test]
        fn short_tail_hop() {
            let timeline = rms_timeline(&[1.0, 1.0, 1.0], 100, 0.02, 0.0);

            assert_eq!(timeline.len(), 2);
            assert!((timeline[1].amplitude - 1.0).abs() < 1e-9);
        }

        #[test]
        fn quiet_hops_are_clamped() {
            let mut samples = vec![0.01f32; 4];
            samples.extend([0.5f32; 4]);

            let timeline = rms_timeline(&samples, 100, 0.04, DEFAULT_RMS_THRESHOLD);

            assert_eq!(timeline[0].amplitude, 0.0);
            assert!(timeline[1].amplitude > 0.4);
        }

        #[test]
        fn empty_input() {
            assert!(rms_timeline(&[], 16000, DEFAULT_HOP_SECONDS, 0.0).is_empty());
            assert!(rms_timeline(&[0.1], 0, DEFAULT_HOP_SECONDS, 0.0).is_empty());
        }
    }
}

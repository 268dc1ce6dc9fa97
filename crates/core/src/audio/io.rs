//! Audio I/O: WAV read/write, container decoding, resampling, trimming.

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

/// Read a WAV file and return (samples_f64_normalized, sample_rate).
///
/// - Normalizes int16/int32 to f64 in [-1, 1]
/// - Passes through float WAVs as f64
/// - Takes the first channel if stereo/multi-channel
pub fn read_wav(path: &Path) -> Result<(Vec<f64>, u32)> {
    let reader = WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

    let spec = reader.spec();
    let sample_rate = spec.sample_rate;
    let channels = spec.channels as usize;

    let samples: Vec<f64> = match spec.sample_format {
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .into_samples::<i32>()
                .step_by(channels)
                .map(|s| s.map(|v| v as f64 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("Failed to read WAV samples")?
        }
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .step_by(channels)
            .map(|s| s.map(|v| v as f64))
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read WAV samples")?,
    };

    Ok((samples, sample_rate))
}

/// Write samples as 16-bit PCM after peak normalization.
///
/// The loudest sample maps to `max_wav_value` on the int16 scale (values
/// are clipped to the int16 range). Creates parent directories if needed.
pub fn write_wav_pcm16(path: &Path, samples: &[f64], sample_rate: u32, max_wav_value: f64) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;

    let peak = samples.iter().map(|v| v.abs()).fold(0.0f64, f64::max);
    let gain = if peak > 0.0 { max_wav_value / peak } else { 0.0 };

    for &sample in samples {
        let scaled = (sample * gain).clamp(i16::MIN as f64, i16::MAX as f64);
        writer.write_sample(scaled as i16)?;
    }

    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}

/// Cut `[start_s, end_s)` out of a waveform.
///
/// Sample indices are `floor(rate * t)`, clamped to the buffer.
pub fn trim(samples: &[f64], sample_rate: u32, start_s: f64, end_s: f64) -> &[f64] {
    let start_idx = ((start_s * sample_rate as f64).max(0.0) as usize).min(samples.len());
    let end_idx = ((end_s * sample_rate as f64).max(0.0) as usize).min(samples.len());
    if start_idx >= end_idx {
        return &[];
    }
    &samples[start_idx..end_idx]
}

/// Resample audio from source sample rate to target sample rate.
///
/// Uses rubato for high-quality resampling.
pub fn resample(samples: &[f64], from_sr: u32, to_sr: u32) -> Result<Vec<f64>> {
    if from_sr == to_sr {
        return Ok(samples.to_vec());
    }

    if samples.is_empty() {
        return Ok(vec![]);
    }

    use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_sr as f64 / from_sr as f64;
    let mut resampler = SincFixedIn::<f64>::new(ratio, 2.0, params, samples.len(), 1)?;

    let input = vec![samples.to_vec()];
    let output = resampler.process(&input, None)?;

    Ok(output.into_iter().next().unwrap_or_default())
}

/// Decode any supported container (WAV, MP3, MP4/AAC) to mono samples.
///
/// Returns (samples, source_sample_rate). Channels are averaged.
pub fn decode_audio(input_path: &Path) -> Result<(Vec<f64>, u32)> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
    use symphonia::core::errors::Error as SymphError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = std::fs::File::open(input_path)
        .with_context(|| format!("Failed to open: {}", input_path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = input_path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("Unsupported format: {}", input_path.display()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No audio track found")?;

    let track_id = track.id;
    let source_sr = track.codec_params.sample_rate.unwrap_or(44100);
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Unsupported codec")?;

    let mut all_samples: Vec<f64> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let num_frames = decoded.frames();
                let mut sample_buf = SampleBuffer::<f64>::new(num_frames as u64, spec);
                sample_buf.copy_interleaved_ref(decoded);
                let interleaved = sample_buf.samples();

                if channels > 1 {
                    for frame in interleaved.chunks_exact(channels) {
                        all_samples.push(frame.iter().sum::<f64>() / channels as f64);
                    }
                } else {
                    all_samples.extend_from_slice(interleaved);
                }
            }
            Err(SymphError::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    if all_samples.is_empty() {
        anyhow::bail!("No audio decoded from {}", input_path.display());
    }

    Ok((all_samples, source_sr))
}

/// Load a waveform at `target_sr`.
///
/// WAV goes through hound; anything else through symphonia.
pub fn load_audio(path: &Path, target_sr: u32) -> Result<Vec<f64>> {
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("wav"))
        .unwrap_or(false);
    let (samples, sr) = if is_wav { read_wav(path)? } else { decode_audio(path)? };
    resample(&samples, sr, target_sr)
        .with_context(|| format!("Failed to resample {} from {} Hz to {} Hz", path.display(), sr, target_sr))
}

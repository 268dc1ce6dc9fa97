//! Corpus preparation ahead of forced alignment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::audio::io::{load_audio, write_wav_pcm16};
use crate::config::PreprocessConfig;
use crate::text::clean_text;

/// Speaker directory used for the single-speaker LJSpeech layout.
pub const LJSPEECH_SPEAKER: &str = "LJSpeech";

/// Copy an LJSpeech corpus into the raw layout the aligner expects:
/// `<raw_path>/LJSpeech/<id>.wav` (resampled, peak-normalized) next to a
/// `<id>.lab` holding the cleaned transcript.
///
/// Rows whose wav is missing are skipped. Returns the number of utterances
/// written.
pub fn prepare_align(config: &PreprocessConfig) -> Result<usize> {
    let corpus = &config.path.corpus_path;
    let metadata = corpus.join("metadata.csv");
    let contents = std::fs::read_to_string(&metadata)
        .with_context(|| format!("Failed to read {}", metadata.display()))?;

    let p = &config.preprocessing;
    let out_dir = config.path.raw_path.join(LJSPEECH_SPEAKER);
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create directory: {}", out_dir.display()))?;

    let mut written = 0;
    let mut missing = 0;
    for (lineno, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() < 3 {
            bail!("{}:{}: expected id|text|normalized", metadata.display(), lineno + 1);
        }
        let base_name = parts[0];
        let text = clean_text(parts[2], &p.text.text_cleaners)?;

        let wav_path = corpus.join("wavs").join(format!("{}.wav", base_name));
        if !wav_path.exists() {
            missing += 1;
            continue;
        }

        let wav = load_audio(&wav_path, p.audio.sampling_rate)
            .with_context(|| format!("Failed to load {}", wav_path.display()))?;
        write_wav_pcm16(
            &out_dir.join(format!("{}.wav", base_name)),
            &wav,
            p.audio.sampling_rate,
            p.audio.max_wav_value,
        )?;
        std::fs::write(out_dir.join(format!("{}.lab", base_name)), &text)?;
        written += 1;
    }

    if missing > 0 {
        log::warn!("{} metadata rows had no wav file", missing);
    }
    log::info!("Prepared {} utterances in {}", written, out_dir.display());
    Ok(written)
}

/// `<data_root>/*/*.mp4`, sorted.
fn find_videos(data_root: &Path) -> Result<Vec<PathBuf>> {
    let mut videos = Vec::new();
    let dirs = std::fs::read_dir(data_root)
        .with_context(|| format!("Failed to read directory: {}", data_root.display()))?;
    for dir in dirs {
        let dir = dir?.path();
        if !dir.is_dir() {
            continue;
        }
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("mp4") {
                videos.push(path);
            }
        }
    }
    videos.sort();
    Ok(videos)
}

/// Output location for one video: `<output_root>/<dir>/<video>/audio.wav`.
pub fn dump_target(output_root: &Path, video: &Path) -> Option<PathBuf> {
    let vid_name = video.file_stem()?;
    let dir_name = video.parent()?.file_name()?;
    Some(output_root.join(dir_name).join(vid_name).join("audio.wav"))
}

fn dump_one(video: &Path, target: &Path, config: &PreprocessConfig) -> Result<()> {
    let p = &config.preprocessing;
    let samples = load_audio(video, p.audio.sampling_rate)?;
    write_wav_pcm16(target, &samples, p.audio.sampling_rate, p.audio.max_wav_value)
}

/// Extract the audio track of every LRS2 video to a wav at the configured
/// sampling rate. Failures are logged and skipped. Returns the number of
/// files written.
pub fn dump_audio(data_root: &Path, output_root: &Path, config: &PreprocessConfig) -> Result<usize> {
    let videos = find_videos(data_root)?;
    log::info!("Dumping audio for {} videos from {}", videos.len(), data_root.display());

    let mut written = 0;
    for video in &videos {
        let Some(target) = dump_target(output_root, video) else {
            log::warn!("Skipping {}: unexpected path layout", video.display());
            continue;
        };
        match dump_one(video, &target, config) {
            Ok(()) => written += 1,
            Err(e) => log::warn!("Failed to dump {}: {:#}", video.display(), e),
        }
    }

    log::info!("Dumped {}/{} audio tracks", written, videos.len());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::io::read_wav;

    fn config(root: &Path) -> PreprocessConfig {
        let mut c = PreprocessConfig::default();
        c.preprocessing.audio.sampling_rate = 16000;
        c.path.corpus_path = root.join("LJSpeech-1.1");
        c.path.raw_path = root.join("raw");
        c
    }

    fn tone(n: usize) -> Vec<f64> {
        (0..n).map(|i| (i as f64 * 0.1).sin() * 0.2).collect()
    }

    #[test]
    fn test_prepare_align_writes_wav_and_lab() {
        let dir = tempfile::tempdir().unwrap();
        let c = config(dir.path());
        let wavs = c.path.corpus_path.join("wavs");
        std::fs::create_dir_all(&wavs).unwrap();
        write_wav_pcm16(&wavs.join("LJ001-0001.wav"), &tone(1600), 16000, 16384.0).unwrap();
        std::fs::write(
            c.path.corpus_path.join("metadata.csv"),
            "LJ001-0001|Printing, in Dr. Smith's|Printing,  in Doctor Smith's\nLJ001-0002|gone|Gone\n",
        )
        .unwrap();

        assert_eq!(prepare_align(&c).unwrap(), 1);

        let out = c.path.raw_path.join(LJSPEECH_SPEAKER);
        let lab = std::fs::read_to_string(out.join("LJ001-0001.lab")).unwrap();
        assert_eq!(lab, "printing, in doctor smith's");
        assert!(!out.join("LJ001-0002.lab").exists());

        let (samples, sr) = read_wav(&out.join("LJ001-0001.wav")).unwrap();
        assert_eq!(sr, 16000);
        assert_eq!(samples.len(), 1600);
        let peak = samples.iter().fold(0.0f64, |m, s| m.max(s.abs()));
        assert!(peak > 0.95);
    }

    #[test]
    fn test_prepare_align_rejects_short_rows() {
        let dir = tempfile::tempdir().unwrap();
        let c = config(dir.path());
        std::fs::create_dir_all(&c.path.corpus_path).unwrap();
        std::fs::write(c.path.corpus_path.join("metadata.csv"), "LJ001-0001|only two\n").unwrap();
        assert!(prepare_align(&c).is_err());
    }

    #[test]
    fn test_dump_target_layout() {
        let t = dump_target(Path::new("/out"), Path::new("/lrs2/main/5535415699068794046/00001.mp4")).unwrap();
        assert_eq!(t, PathBuf::from("/out/5535415699068794046/00001/audio.wav"));
    }

    #[test]
    fn test_dump_audio_skips_undecodable() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("lrs2");
        std::fs::create_dir_all(root.join("spk1")).unwrap();
        std::fs::write(root.join("spk1").join("00001.mp4"), b"not a video").unwrap();
        std::fs::write(root.join("spk1").join("notes.txt"), b"").unwrap();

        let c = config(dir.path());
        let written = dump_audio(&root, &dir.path().join("out"), &c).unwrap();
        assert_eq!(written, 0);
    }
}

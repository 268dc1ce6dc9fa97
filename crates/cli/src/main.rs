//! Prosodia CLI: corpus preparation and feature preprocessing for speech
//! datasets.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use prosodia_core::config::PreprocessConfig;
use prosodia_core::corpus::{Preprocessor, dump_audio, prepare_align};

// ─── Top-level CLI ───────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "prosodia",
    about = "Speech corpus preprocessing: durations, pitch, energy and mel features",
    version,
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Copy an LJSpeech corpus into per-speaker wav/lab pairs for alignment
    PrepareAlign(PrepareAlignArgs),
    /// Extract and normalize features, then write the train/val filelists
    Preprocess(PreprocessArgs),
    /// Extract audio tracks from an LRS2 video tree
    DumpAudio(DumpAudioArgs),
}

// ─── Shared arguments (embedded in each subcommand) ──────────────

#[derive(Parser, Debug)]
struct SharedArgs {
    /// Preprocessing config (.yaml, .yml or .json); LJSpeech defaults if omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl SharedArgs {
    fn load_config(&self) -> Result<PreprocessConfig> {
        match &self.config {
            Some(path) => PreprocessConfig::load(path),
            None => {
                log::info!("No --config given, using LJSpeech defaults");
                Ok(PreprocessConfig::default())
            }
        }
    }
}

// ─── Subcommands ─────────────────────────────────────────────────

#[derive(Parser, Debug)]
struct PrepareAlignArgs {
    #[command(flatten)]
    shared: SharedArgs,
}

#[derive(Parser, Debug)]
struct PreprocessArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// RNG seed for a reproducible train/val shuffle
    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads for the feature pass
    #[arg(long)]
    workers: Option<usize>,

    /// Number of utterances in the validation set
    #[arg(long)]
    val_size: Option<usize>,
}

#[derive(Parser, Debug)]
struct DumpAudioArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// LRS2 root containing <dir>/<video>.mp4 (overrides path.lrs2_root)
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Output root for <dir>/<video>/audio.wav (overrides path.lrs2_output)
    #[arg(long)]
    output_root: Option<PathBuf>,
}

// ─── Main ────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    // Init logging
    let verbose = match &cli.command {
        Command::PrepareAlign(a) => a.shared.verbose,
        Command::Preprocess(a) => a.shared.verbose,
        Command::DumpAudio(a) => a.shared.verbose,
    };
    let log_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Command::PrepareAlign(args) => run_prepare_align(args),
        Command::Preprocess(args) => run_preprocess(args),
        Command::DumpAudio(args) => run_dump_audio(args),
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run_prepare_align(args: PrepareAlignArgs) -> Result<()> {
    let config = args.shared.load_config()?;
    let n = prepare_align(&config)?;
    println!("Prepared {} utterance(s)", n);
    println!("Output: {}", config.path.raw_path.display());
    Ok(())
}

fn run_preprocess(args: PreprocessArgs) -> Result<()> {
    let mut config = args.shared.load_config()?;
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(val_size) = args.val_size {
        config.preprocessing.val_size = val_size;
    }
    config.validate()?;

    let preprocessor = Preprocessor::from_config(config)?;
    let summary = preprocessor.build_from_path()?;

    let report = &summary.report;
    println!(
        "Built {} of {} utterance(s) ({} discarded, {} failed)",
        report.built,
        report.total(),
        report.discarded_total(),
        report.failed.len()
    );
    for (kind, n) in &report.discarded {
        println!("  discarded ({}): {}", kind, n);
    }
    println!("Train/val: {}/{}", summary.n_train, summary.n_val);
    println!("Speakers: {}", summary.speakers.len());
    println!("Total time: {:.3} hours", summary.hours);
    println!("Filelists: {}", preprocessor.config().path.filelist_path.display());
    Ok(())
}

fn run_dump_audio(args: DumpAudioArgs) -> Result<()> {
    let config = args.shared.load_config()?;
    let data_root = args
        .data_root
        .or_else(|| config.path.lrs2_root.clone())
        .context("No LRS2 root: pass --data-root or set path.lrs2_root")?;
    let output_root = args
        .output_root
        .or_else(|| config.path.lrs2_output.clone())
        .context("No output root: pass --output-root or set path.lrs2_output")?;

    let n = dump_audio(&data_root, &output_root, &config)?;
    println!("Dumped {} audio track(s)", n);
    println!("Output: {}", output_root.display());
    Ok(())
}

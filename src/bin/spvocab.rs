use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use serde_json::json;
use spvocab::config::{IngestConfig, TrainerBuilder};
use spvocab::{
    InputFormat, ModelArtifact, ModelType, NormalizationRule, PieceKind, Trainer, TrainingSpec,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Subword vocabulary trainer", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train a vocabulary from text inputs
    Train(TrainArgs),
    /// Encode text with a trained model
    Encode(EncodeArgs),
    /// Inspect model metadata
    Info(InfoArgs),
    /// Replay the self-test samples stored in a model
    Verify(VerifyArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Files or directories to ingest
    inputs: Vec<PathBuf>,

    /// JSON training spec; command line flags override its values
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output prefix for <PREFIX>.model and <PREFIX>.vocab
    #[arg(short = 'o', long, value_name = "PREFIX")]
    model_prefix: Option<String>,

    /// Model type (unigram, bpe, word, char)
    #[arg(long, value_name = "TYPE")]
    model_type: Option<ModelType>,

    /// Target vocabulary size including meta pieces
    #[arg(long, value_name = "SIZE")]
    vocab_size: Option<usize>,

    /// Fraction of character occurrences the alphabet must cover
    #[arg(long, value_name = "FRACTION")]
    character_coverage: Option<f64>,

    /// Input line format (text, tsv)
    #[arg(long, value_name = "FORMAT")]
    input_format: Option<InputFormat>,

    /// Maximum number of sentences used for training (0 = all)
    #[arg(long, value_name = "COUNT")]
    input_sentence_size: Option<usize>,

    /// Take the first sentences instead of sampling uniformly
    #[arg(long)]
    no_shuffle: bool,

    /// Skip lines longer than this many bytes
    #[arg(long, value_name = "BYTES")]
    max_sentence_length: Option<usize>,

    /// Worker threads for normalisation
    #[arg(long, value_name = "N")]
    threads: Option<usize>,

    /// Number of self-test samples stored in the model
    #[arg(long, value_name = "COUNT")]
    self_test_sample_size: Option<usize>,

    /// Keep every character and word regardless of coverage (word/char only)
    #[arg(long)]
    use_all_vocab: bool,

    /// Allow the final vocabulary to be smaller than requested
    #[arg(long)]
    soft_vocab_limit: bool,

    /// Reserve a control symbol (repeat flag)
    #[arg(long = "control-symbol", value_name = "TEXT")]
    control_symbols: Vec<String>,

    /// Reserve a user defined symbol (repeat flag)
    #[arg(long = "user-defined-symbol", value_name = "TEXT")]
    user_defined_symbols: Vec<String>,

    /// Seed for sentence and self-test sampling
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Normalisation rule (identity, nfc, nfkc)
    #[arg(long, value_name = "RULE")]
    normalization: Option<NormalizationRule>,

    /// Do not prepend a whitespace marker to each sentence
    #[arg(long)]
    no_dummy_prefix: bool,

    /// Keep runs of whitespace instead of collapsing them
    #[arg(long)]
    keep_extra_whitespace: bool,

    /// Write training metrics as JSON
    #[arg(long, value_name = "PATH")]
    metrics_json: Option<PathBuf>,

    /// Disable progress logging and the spinner
    #[arg(long)]
    no_progress: bool,

    /// Disable recursive directory traversal
    #[arg(long)]
    no_recursive: bool,

    /// Follow symlinks during traversal
    #[arg(long)]
    follow_symlinks: bool,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Model file to load
    #[arg(short = 'm', long, value_name = "PATH")]
    model: PathBuf,

    /// Sentences to encode; reads stdin line by line when omitted
    text: Vec<String>,

    /// Print token ids instead of pieces
    #[arg(long)]
    ids: bool,

    /// Emit JSON lines instead of human-readable output
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Model file to inspect
    #[arg(short = 'm', long, value_name = "PATH")]
    model: PathBuf,

    /// Emit JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// Model file to verify
    #[arg(short = 'm', long, value_name = "PATH")]
    model: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Train(args) => run_train(args),
        Commands::Encode(args) => run_encode(args),
        Commands::Info(args) => run_info(args),
        Commands::Verify(args) => run_verify(args),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let level = if quiet > 0 {
        match quiet {
            1 => LevelFilter::Warn,
            _ => LevelFilter::Error,
        }
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}

fn load_spec(args: &TrainArgs) -> Result<TrainingSpec> {
    let mut spec = match &args.config {
        Some(path) => TrainingSpec::from_json_file(path)
            .with_context(|| format!("failed to load training spec {}", path.display()))?,
        None => TrainingSpec::default(),
    };
    if let Some(rule) = args.normalization {
        spec.normalizer.rule = rule;
    }
    if args.no_dummy_prefix {
        spec.normalizer.add_dummy_prefix = false;
    }
    if args.keep_extra_whitespace {
        spec.normalizer.remove_extra_whitespaces = false;
    }
    Ok(spec)
}

fn apply_overrides(mut cfg: TrainerBuilder, args: &TrainArgs) -> TrainerBuilder {
    if !args.inputs.is_empty() {
        cfg = cfg.inputs(args.inputs.iter().cloned());
    }
    if let Some(prefix) = &args.model_prefix {
        cfg = cfg.model_prefix(prefix.clone());
    }
    if let Some(model_type) = args.model_type {
        cfg = cfg.model_type(model_type);
    }
    if let Some(vocab_size) = args.vocab_size {
        cfg = cfg.vocab_size(vocab_size);
    }
    if let Some(coverage) = args.character_coverage {
        cfg = cfg.character_coverage(coverage);
    }
    if let Some(format) = args.input_format {
        cfg = cfg.input_format(format);
    }
    if let Some(limit) = args.input_sentence_size {
        cfg = cfg.input_sentence_size(limit);
    }
    if args.no_shuffle {
        cfg = cfg.shuffle_input_sentence(false);
    }
    if let Some(length) = args.max_sentence_length {
        cfg = cfg.max_sentence_length(length);
    }
    if let Some(threads) = args.threads {
        cfg = cfg.num_threads(threads);
    }
    if let Some(size) = args.self_test_sample_size {
        cfg = cfg.self_test_sample_size(size);
    }
    if args.use_all_vocab {
        cfg = cfg.use_all_vocab(true);
    }
    if args.soft_vocab_limit {
        cfg = cfg.hard_vocab_limit(false);
    }
    if !args.control_symbols.is_empty() {
        cfg = cfg.control_symbols(args.control_symbols.iter().cloned());
    }
    if !args.user_defined_symbols.is_empty() {
        cfg = cfg.user_defined_symbols(args.user_defined_symbols.iter().cloned());
    }
    if args.seed.is_some() {
        cfg = cfg.random_seed(args.seed);
    }
    if args.no_recursive || args.follow_symlinks {
        cfg = cfg.ingest(IngestConfig {
            recursive: !args.no_recursive,
            follow_symlinks: args.follow_symlinks,
        });
    }
    cfg.show_progress(!args.no_progress)
}

fn run_train(args: TrainArgs) -> Result<()> {
    let spec = load_spec(&args)?;
    let mut builder = TrainerBuilder::from_config(spec.trainer);
    builder = apply_overrides(builder, &args);
    let trainer_cfg = builder.build().context("invalid training configuration")?;
    let prefix = trainer_cfg.model_prefix.clone();

    let trainer = Trainer::new(trainer_cfg, spec.normalizer)?;

    let spinner = if args.no_progress {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} training vocabulary... {elapsed}")
            .context("invalid progress template")?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(80));
        Some(pb)
    };

    let start = Instant::now();
    let result = trainer.train();
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let artifacts = result.context("training failed")?;
    let elapsed = start.elapsed();

    let (model_path, vocab_path) = artifacts
        .model
        .save(&prefix)
        .with_context(|| format!("failed to save model with prefix {prefix}"))?;

    if let Some(path) = &args.metrics_json {
        let body = serde_json::to_string_pretty(&artifacts.metrics)?;
        fs::write(path, body)
            .with_context(|| format!("failed to write metrics to {}", path.display()))?;
    }

    let load = &artifacts.metrics.load;
    info!(
        "training complete: vocab={} sentences={} too_long={} reserved={} duration={elapsed:.2?}",
        artifacts.model.vocab_size(),
        load.selected,
        load.too_long,
        load.reserved_marker
    );
    println!(
        "✅ wrote {} model with vocab {} to {} and {}",
        artifacts.model.trainer_config().model_type,
        artifacts.model.vocab_size(),
        model_path.display(),
        vocab_path.display()
    );
    println!(
        "   sentences {} | alphabet {} | coverage {:.4} | duration {:.2?}",
        load.selected,
        artifacts.metrics.coverage.alphabet_size,
        artifacts.metrics.coverage.coverage,
        elapsed
    );

    Ok(())
}

fn load_model(path: &Path) -> Result<ModelArtifact> {
    ModelArtifact::load(path).with_context(|| format!("failed to load model from {}", path.display()))
}

fn run_encode(args: EncodeArgs) -> Result<()> {
    let model = load_model(&args.model)?;
    let encoder = model.encoder()?;

    let lines: Vec<String> = if args.text.is_empty() {
        io::stdin()
            .lock()
            .lines()
            .collect::<io::Result<_>>()
            .context("failed to read stdin")?
    } else {
        args.text
    };

    for line in &lines {
        let encoded = encoder.encode(line)?;
        if args.json {
            let (pieces, ids): (Vec<&str>, Vec<u32>) =
                encoded.iter().map(|(piece, id)| (piece.as_str(), *id)).unzip();
            let record = json!({
                "input": line,
                "pieces": pieces,
                "ids": ids,
            });
            println!("{}", serde_json::to_string(&record)?);
        } else if args.ids {
            let ids: Vec<String> = encoded.iter().map(|(_, id)| id.to_string()).collect();
            println!("{}", ids.join(" "));
        } else {
            let pieces: Vec<&str> = encoded.iter().map(|(piece, _)| piece.as_str()).collect();
            println!("{}", pieces.join(" "));
        }
    }

    Ok(())
}

fn run_info(args: InfoArgs) -> Result<()> {
    let model = load_model(&args.model)?;
    let cfg = model.trainer_config();
    let meta: Vec<_> = model
        .pieces()
        .iter()
        .enumerate()
        .filter(|(_, piece)| piece.kind != PieceKind::Normal)
        .map(|(id, piece)| json!({"id": id, "piece": piece.text, "kind": piece.kind}))
        .collect();
    let summary = json!({
        "path": args.model.display().to_string(),
        "model_type": cfg.model_type,
        "vocab_size": model.vocab_size(),
        "normal_pieces": model.count_kind(PieceKind::Normal),
        "character_coverage": cfg.character_coverage,
        "normalization": model.normalizer_config().rule,
        "self_test_samples": model.self_test_samples().len(),
        "meta_pieces": meta,
    });

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Model type   : {}", cfg.model_type);
        println!("Vocab size   : {}", model.vocab_size());
        println!("Normal pieces: {}", model.count_kind(PieceKind::Normal));
        println!("Coverage     : {}", cfg.character_coverage);
        println!("Normalization: {:?}", model.normalizer_config().rule);
        println!("Self-tests   : {}", model.self_test_samples().len());
        let listed = model
            .pieces()
            .iter()
            .enumerate()
            .filter(|(_, piece)| piece.kind != PieceKind::Normal)
            .map(|(id, piece)| format!("{}={id}", piece.text))
            .collect::<Vec<_>>();
        println!("Meta pieces  : {}", listed.join(", "));
    }

    Ok(())
}

fn run_verify(args: VerifyArgs) -> Result<()> {
    let model = load_model(&args.model)?;
    let encoder = model.encoder()?;
    let mismatches = model.verify_self_test(&encoder)?;
    let total = model.self_test_samples().len();
    for mismatch in &mismatches {
        println!(
            "MISMATCH {:?}\n  expected: {}\n  actual:   {}",
            mismatch.input, mismatch.expected, mismatch.actual
        );
    }
    if mismatches.is_empty() {
        println!("all {total} self-test samples passed");
        Ok(())
    } else {
        Err(anyhow!(
            "{} of {total} self-test samples changed",
            mismatches.len()
        ))
    }
}

//! Configuration builders controlling corpus ingestion, normalisation, and training.

use std::convert::TryFrom;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Result, SpvocabError};
use serde::{Deserialize, Serialize};

/// Seed used for reservoir sampling when [`TrainerConfig::random_seed`] is unset.
pub const DEFAULT_SAMPLING_SEED: u64 = 12_345_678;

/// Family of model the vocabulary is trained for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    /// Statistical unigram language model.
    Unigram,
    /// Statistical byte pair encoding.
    Bpe,
    /// Whitespace delimited words.
    Word,
    /// Single characters.
    Char,
}

impl ModelType {
    /// Returns `true` for the model types whose alphabet is bounded by the vocabulary size.
    #[must_use]
    pub fn is_statistical(self) -> bool {
        matches!(self, Self::Unigram | Self::Bpe)
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unigram => "unigram",
            Self::Bpe => "bpe",
            Self::Word => "word",
            Self::Char => "char",
        };
        f.write_str(name)
    }
}

impl FromStr for ModelType {
    type Err = SpvocabError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "unigram" => Ok(Self::Unigram),
            "bpe" => Ok(Self::Bpe),
            "word" => Ok(Self::Word),
            "char" => Ok(Self::Char),
            other => Err(SpvocabError::config(
                "model_type",
                format!("unknown model type `{other}`"),
            )),
        }
    }
}

/// Layout of the input corpus files.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// One sentence per line, each with frequency one.
    #[default]
    Text,
    /// `word<TAB>frequency` per line.
    Tsv,
}

impl FromStr for InputFormat {
    type Err = SpvocabError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "text" => Ok(Self::Text),
            "tsv" => Ok(Self::Tsv),
            other => Err(SpvocabError::config(
                "input_format",
                format!("supported formats are `text` and `tsv`, got `{other}`"),
            )),
        }
    }
}

/// Configuration controlling how input paths are discovered on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IngestConfig {
    /// Enables recursive traversal of directory inputs.
    pub recursive: bool,
    /// Follows symlinks encountered during traversal.
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            follow_symlinks: false,
        }
    }
}

/// Configuration for vocabulary training.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainerConfig {
    /// Output prefix; the model is written to `<prefix>.model` and `<prefix>.vocab`.
    pub model_prefix: String,
    /// Input files (or directories) read in the given order.
    pub inputs: Vec<PathBuf>,
    /// Layout of each input line.
    pub input_format: InputFormat,
    /// Model family the vocabulary is built for.
    pub model_type: ModelType,
    /// Target vocabulary size including meta pieces.
    pub vocab_size: usize,
    /// Fraction of character occurrences the required alphabet must cover.
    pub character_coverage: f64,
    /// Maximum number of sentences kept for training; `0` keeps everything.
    pub input_sentence_size: usize,
    /// Samples `input_sentence_size` sentences uniformly instead of taking the head.
    pub shuffle_input_sentence: bool,
    /// Lines longer than this many bytes are skipped.
    pub max_sentence_length: usize,
    /// Maximum length of a learned piece in characters.
    pub max_piece_length: usize,
    /// Worker threads used by the normalisation stage.
    pub num_threads: usize,
    /// EM sub-iterations for statistical learners.
    pub num_sub_iterations: usize,
    /// Fraction of pieces kept per pruning round for statistical learners.
    pub shrinking_factor: f64,
    /// Number of raw sentences sampled for self-test records.
    pub self_test_sample_size: usize,
    /// Keeps every character regardless of coverage (word and char models only).
    pub use_all_vocab: bool,
    /// Requires the final vocabulary to match `vocab_size` exactly.
    pub hard_vocab_limit: bool,
    /// Identifier of the unknown piece.
    pub unk_id: Option<u32>,
    /// Identifier of the begin-of-sentence piece; `None` disables it.
    pub bos_id: Option<u32>,
    /// Identifier of the end-of-sentence piece; `None` disables it.
    pub eos_id: Option<u32>,
    /// Identifier of the padding piece; `None` disables it.
    pub pad_id: Option<u32>,
    /// Surface text of the unknown piece.
    pub unk_piece: String,
    /// Surface text of the begin-of-sentence piece.
    pub bos_piece: String,
    /// Surface text of the end-of-sentence piece.
    pub eos_piece: String,
    /// Surface text of the padding piece.
    pub pad_piece: String,
    /// Control symbols reserved in the vocabulary.
    pub control_symbols: Vec<String>,
    /// User defined symbols reserved in the vocabulary.
    pub user_defined_symbols: Vec<String>,
    /// Seed for sentence and self-test sampling; defaults to [`DEFAULT_SAMPLING_SEED`].
    pub random_seed: Option<u64>,
    /// Enables periodic progress logging through the `log` facade.
    pub show_progress: bool,
    /// Directory discovery settings for `inputs`.
    pub ingest: IngestConfig,
}

impl TrainerConfig {
    /// Returns a builder initialised with [`TrainerConfig::default`].
    #[must_use]
    pub fn builder() -> TrainerBuilder {
        TrainerBuilder::default()
    }

    /// Seed used for reservoir sampling.
    #[must_use]
    pub fn sampling_seed(&self) -> u64 {
        self.random_seed.unwrap_or(DEFAULT_SAMPLING_SEED)
    }

    /// Validates the invariants required before any corpus is read.
    pub fn validate(&self) -> Result<()> {
        if self.model_prefix.is_empty() {
            return Err(SpvocabError::config(
                "model_prefix",
                "model prefix must not be empty",
            ));
        }
        if self.inputs.is_empty() {
            return Err(SpvocabError::config(
                "inputs",
                "at least one input source is required",
            ));
        }
        if self.vocab_size == 0 {
            return Err(SpvocabError::config(
                "vocab_size",
                "vocab_size must be greater than zero",
            ));
        }
        let max_vocab = usize::try_from(u32::MAX).unwrap_or(usize::MAX);
        if self.vocab_size > max_vocab {
            return Err(SpvocabError::config(
                "vocab_size",
                format!(
                    "vocab_size ({}) exceeds {max_vocab}, the maximum representable id",
                    self.vocab_size
                ),
            ));
        }
        if self.model_type.is_statistical() && self.use_all_vocab {
            return Err(SpvocabError::config(
                "use_all_vocab",
                "use_all_vocab is only valid for word and char models",
            ));
        }

        check_range(
            "character_coverage",
            self.character_coverage,
            0.98,
            1.0,
        )?;
        check_range("max_piece_length", self.max_piece_length, 1, 512)?;
        check_range("num_sub_iterations", self.num_sub_iterations, 1, 10)?;
        check_range("num_threads", self.num_threads, 1, 128)?;
        check_range("self_test_sample_size", self.self_test_sample_size, 0, 1000)?;
        check_range("shrinking_factor", self.shrinking_factor, 0.5, 0.95)?;
        check_range(
            "max_sentence_length",
            self.max_sentence_length,
            10,
            1 << 30,
        )?;

        if self.input_sentence_size != 0 && self.input_sentence_size <= 100 {
            return Err(SpvocabError::config(
                "input_sentence_size",
                format!(
                    "input_sentence_size must be 0 (unlimited) or greater than 100, got {}",
                    self.input_sentence_size
                ),
            ));
        }

        for (field, piece) in [
            ("unk_piece", &self.unk_piece),
            ("bos_piece", &self.bos_piece),
            ("eos_piece", &self.eos_piece),
            ("pad_piece", &self.pad_piece),
        ] {
            if piece.is_empty() {
                return Err(SpvocabError::config(field, "reserved piece must not be empty"));
            }
        }
        Ok(())
    }
}

fn check_range<T>(field: &'static str, value: T, min: T, max: T) -> Result<()>
where
    T: PartialOrd + fmt::Display + Copy,
{
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(SpvocabError::config(
            field,
            format!("{value} is outside the allowed range [{min}, {max}]"),
        ))
    }
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            model_prefix: String::new(),
            inputs: Vec::new(),
            input_format: InputFormat::Text,
            model_type: ModelType::Unigram,
            vocab_size: 8_000,
            character_coverage: 0.9995,
            input_sentence_size: 0,
            shuffle_input_sentence: true,
            max_sentence_length: 4_192,
            max_piece_length: 16,
            num_threads: 16,
            num_sub_iterations: 2,
            shrinking_factor: 0.75,
            self_test_sample_size: 0,
            use_all_vocab: false,
            hard_vocab_limit: true,
            unk_id: Some(0),
            bos_id: Some(1),
            eos_id: Some(2),
            pad_id: None,
            unk_piece: "<unk>".into(),
            bos_piece: "<s>".into(),
            eos_piece: "</s>".into(),
            pad_piece: "<pad>".into(),
            control_symbols: Vec::new(),
            user_defined_symbols: Vec::new(),
            random_seed: None,
            show_progress: true,
            ingest: IngestConfig::default(),
        }
    }
}

/// Builder for [`TrainerConfig`].
#[derive(Debug, Default, Clone)]
pub struct TrainerBuilder {
    cfg: TrainerConfig,
}

impl TrainerBuilder {
    /// Creates a builder with [`TrainerConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration, e.g. one loaded from JSON.
    #[must_use]
    pub fn from_config(cfg: TrainerConfig) -> Self {
        Self { cfg }
    }

    /// Sets the output prefix.
    #[must_use]
    pub fn model_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cfg.model_prefix = prefix.into();
        self
    }

    /// Replaces the list of input sources.
    #[must_use]
    pub fn inputs<I, P>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.cfg.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the input line format.
    #[must_use]
    pub fn input_format(mut self, format: InputFormat) -> Self {
        self.cfg.input_format = format;
        self
    }

    /// Sets the model type.
    #[must_use]
    pub fn model_type(mut self, model_type: ModelType) -> Self {
        self.cfg.model_type = model_type;
        self
    }

    /// Sets the desired vocabulary size (including meta pieces).
    #[must_use]
    pub fn vocab_size(mut self, value: usize) -> Self {
        self.cfg.vocab_size = value;
        self
    }

    /// Sets the character coverage target.
    #[must_use]
    pub fn character_coverage(mut self, value: f64) -> Self {
        self.cfg.character_coverage = value;
        self
    }

    /// Limits the number of training sentences (0 keeps every sentence).
    #[must_use]
    pub fn input_sentence_size(mut self, limit: usize) -> Self {
        self.cfg.input_sentence_size = limit;
        self
    }

    /// Chooses between reservoir sampling and taking the first sentences.
    #[must_use]
    pub fn shuffle_input_sentence(mut self, shuffle: bool) -> Self {
        self.cfg.shuffle_input_sentence = shuffle;
        self
    }

    /// Sets the maximum sentence length in bytes.
    #[must_use]
    pub fn max_sentence_length(mut self, value: usize) -> Self {
        self.cfg.max_sentence_length = value;
        self
    }

    /// Sets the maximum piece length in characters.
    #[must_use]
    pub fn max_piece_length(mut self, value: usize) -> Self {
        self.cfg.max_piece_length = value;
        self
    }

    /// Sets the number of normalisation workers.
    #[must_use]
    pub fn num_threads(mut self, value: usize) -> Self {
        self.cfg.num_threads = value;
        self
    }

    /// Sets the number of self-test samples recorded in the model.
    #[must_use]
    pub fn self_test_sample_size(mut self, value: usize) -> Self {
        self.cfg.self_test_sample_size = value;
        self
    }

    /// Keeps every character regardless of coverage.
    #[must_use]
    pub fn use_all_vocab(mut self, enabled: bool) -> Self {
        self.cfg.use_all_vocab = enabled;
        self
    }

    /// Chooses between exact (hard) and upper-bound (soft) vocabulary sizing.
    #[must_use]
    pub fn hard_vocab_limit(mut self, enabled: bool) -> Self {
        self.cfg.hard_vocab_limit = enabled;
        self
    }

    /// Overrides the reserved piece identifiers; `None` disables a piece.
    #[must_use]
    pub fn reserved_ids(
        mut self,
        unk: Option<u32>,
        bos: Option<u32>,
        eos: Option<u32>,
        pad: Option<u32>,
    ) -> Self {
        self.cfg.unk_id = unk;
        self.cfg.bos_id = bos;
        self.cfg.eos_id = eos;
        self.cfg.pad_id = pad;
        self
    }

    /// Overrides the control symbols.
    #[must_use]
    pub fn control_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cfg.control_symbols = symbols.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the user defined symbols.
    #[must_use]
    pub fn user_defined_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cfg.user_defined_symbols = symbols.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the sampling seed.
    #[must_use]
    pub fn random_seed(mut self, seed: Option<u64>) -> Self {
        self.cfg.random_seed = seed;
        self
    }

    /// Enables or disables progress logging.
    #[must_use]
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.cfg.show_progress = enabled;
        self
    }

    /// Overrides directory discovery settings.
    #[must_use]
    pub fn ingest(mut self, ingest: IngestConfig) -> Self {
        self.cfg.ingest = ingest;
        self
    }

    /// Finalises the builder, returning a validated [`TrainerConfig`].
    pub fn build(self) -> Result<TrainerConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

/// Normalisation rule applied before whitespace handling.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationRule {
    /// Leaves characters untouched.
    Identity,
    /// Unicode canonical composition.
    Nfc,
    /// Unicode compatibility composition.
    #[default]
    Nfkc,
}

impl FromStr for NormalizationRule {
    type Err = SpvocabError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "identity" => Ok(Self::Identity),
            "nfc" => Ok(Self::Nfc),
            "nfkc" => Ok(Self::Nfkc),
            other => Err(SpvocabError::config(
                "normalizer.rule",
                format!("unknown normalization rule `{other}`"),
            )),
        }
    }
}

/// Configuration of the reference text normaliser stored alongside the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Character level rule.
    pub rule: NormalizationRule,
    /// Prepends a space so the first word carries a whitespace marker.
    pub add_dummy_prefix: bool,
    /// Trims and collapses runs of whitespace.
    pub remove_extra_whitespaces: bool,
    /// Replaces spaces with the visible whitespace marker.
    pub escape_whitespaces: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            rule: NormalizationRule::Nfkc,
            add_dummy_prefix: true,
            remove_extra_whitespaces: true,
            escape_whitespaces: true,
        }
    }
}

impl NormalizerConfig {
    /// Returns the default configuration with the identity rule.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            rule: NormalizationRule::Identity,
            ..Self::default()
        }
    }
}

/// Complete training specification as stored in a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingSpec {
    /// Trainer settings.
    pub trainer: TrainerConfig,
    /// Normaliser settings.
    pub normalizer: NormalizerConfig,
}

impl TrainingSpec {
    /// Loads a specification from a JSON file; missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|err| SpvocabError::io(err, Some(path.to_path_buf())))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> TrainerBuilder {
        TrainerConfig::builder()
            .model_prefix("m")
            .inputs(["corpus.txt"])
            .show_progress(false)
    }

    #[test]
    fn builder_accepts_defaults_with_prefix_and_inputs() {
        let cfg = valid().build().expect("config should be valid");
        assert_eq!(cfg.vocab_size, 8_000);
        assert_eq!(cfg.inputs, vec![PathBuf::from("corpus.txt")]);
    }

    #[test]
    fn validate_rejects_missing_prefix() {
        let err = TrainerConfig {
            inputs: vec!["a".into()],
            ..TrainerConfig::default()
        }
        .validate()
        .expect_err("validation should fail");
        assert!(matches!(
            err,
            SpvocabError::InvalidConfig { field: "model_prefix", .. }
        ));
    }

    #[test]
    fn validate_rejects_out_of_range_coverage() {
        let err = valid()
            .character_coverage(0.5)
            .build()
            .expect_err("coverage below 0.98");
        assert!(matches!(
            err,
            SpvocabError::InvalidConfig { field: "character_coverage", .. }
        ));
    }

    #[test]
    fn validate_rejects_use_all_vocab_for_statistical_models() {
        let err = valid()
            .model_type(ModelType::Bpe)
            .use_all_vocab(true)
            .build()
            .expect_err("use_all_vocab with bpe");
        assert!(matches!(
            err,
            SpvocabError::InvalidConfig { field: "use_all_vocab", .. }
        ));
        valid()
            .model_type(ModelType::Char)
            .use_all_vocab(true)
            .build()
            .expect("use_all_vocab is fine for char models");
    }

    #[test]
    fn validate_rejects_thread_and_length_bounds() {
        assert!(valid().num_threads(0).build().is_err());
        assert!(valid().num_threads(129).build().is_err());
        assert!(valid().max_sentence_length(9).build().is_err());
        assert!(valid().max_piece_length(513).build().is_err());
        assert!(valid().self_test_sample_size(1001).build().is_err());
    }

    #[test]
    fn validate_rejects_tiny_sentence_limits() {
        let err = valid()
            .input_sentence_size(50)
            .build()
            .expect_err("limit of 50 is too small");
        assert!(matches!(
            err,
            SpvocabError::InvalidConfig { field: "input_sentence_size", .. }
        ));
    }

    #[test]
    fn validate_rejects_empty_reserved_piece() {
        let cfg = TrainerConfig {
            eos_piece: String::new(),
            ..valid().build().expect("valid")
        };
        assert!(matches!(
            cfg.validate(),
            Err(SpvocabError::InvalidConfig { field: "eos_piece", .. })
        ));
    }

    #[test]
    fn training_spec_fills_missing_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("spec.json");
        fs::write(
            &path,
            r#"{"trainer": {"model_type": "char", "vocab_size": 64}, "normalizer": {"rule": "identity"}}"#,
        )
        .expect("write spec");
        let spec = TrainingSpec::from_json_file(&path).expect("parse spec");
        assert_eq!(spec.trainer.model_type, ModelType::Char);
        assert_eq!(spec.trainer.vocab_size, 64);
        assert_eq!(spec.trainer.unk_piece, "<unk>");
        assert_eq!(spec.normalizer.rule, NormalizationRule::Identity);
        assert!(spec.normalizer.escape_whitespaces);
    }

    #[test]
    fn model_type_parses_case_insensitively() {
        assert_eq!("CHAR".parse::<ModelType>().expect("parse"), ModelType::Char);
        assert!("sentencepiece".parse::<ModelType>().is_err());
    }
}

//! Training pipeline turning a raw corpus into a packaged vocabulary.

mod character;
mod word;

use std::fmt;
use std::time::Instant;

use log::info;

use crate::config::{ModelType, NormalizerConfig, TrainerBuilder, TrainerConfig};
use crate::corpus::{CorpusLoader, Sentence};
use crate::coverage::CharacterCoverage;
use crate::encoder::{LongestMatchEncoder, PieceEncoder};
use crate::error::{Result, SpvocabError};
use crate::meta_pieces::MetaPieces;
use crate::metrics::{sample_rss_kb, TrainingMetrics};
use crate::model::{LearnedPiece, ModelArtifact, PieceKind};
use crate::normalizer::{normalize_sentences, MetaPieceMatcher, Normalizer, TextNormalizer};
use crate::serialization::{assemble_pieces, attach_self_test};

pub use character::CharLearner;
pub use word::WordLearner;

/// Algorithm choosing the non-meta pieces of the vocabulary.
///
/// Learners receive the normalised corpus (characters outside the required
/// alphabet already replaced by the unknown marker) and return pieces in
/// final identifier order.  They must not return meta piece texts, and
/// candidates should be filtered with [`crate::text::is_valid_piece`].
pub trait PieceLearner: Send + Sync {
    /// Produces the learned pieces.
    fn learn(
        &self,
        corpus: &PreparedCorpus,
        meta: &MetaPieces,
        cfg: &TrainerConfig,
    ) -> Result<Vec<LearnedPiece>>;
}

/// Corpus state handed to a [`PieceLearner`].
#[derive(Debug, Clone)]
pub struct PreparedCorpus {
    /// Normalised, coverage-rewritten sentences.
    pub sentences: Vec<Sentence>,
    /// Required alphabet with weighted counts.
    pub coverage: CharacterCoverage,
    /// Raw sentences to encode for self-test records.
    pub self_test_samples: Vec<String>,
    /// Metrics gathered while preparing the corpus.
    pub metrics: TrainingMetrics,
}

/// High-level façade configuring and executing training runs.
#[derive(Debug, Clone)]
pub struct Trainer {
    cfg: TrainerConfig,
    normalizer: NormalizerConfig,
    meta: MetaPieces,
}

/// Artifacts returned after a training session completes.
#[must_use]
#[derive(Debug, Clone)]
pub struct TrainerArtifacts {
    /// Trained model.
    pub model: ModelArtifact,
    /// Metrics captured during training.
    pub metrics: TrainingMetrics,
}

impl Trainer {
    /// Validates the configuration and allocates meta piece identifiers.
    ///
    /// No input is read until one of the training methods is called.
    pub fn new(cfg: TrainerConfig, normalizer: NormalizerConfig) -> Result<Self> {
        cfg.validate()?;
        let meta = MetaPieces::from_config(&cfg)?;
        Ok(Self {
            cfg,
            normalizer,
            meta,
        })
    }

    /// Returns a [`TrainerBuilder`] with default settings.
    #[must_use]
    pub fn builder() -> TrainerBuilder {
        TrainerConfig::builder()
    }

    /// Returns an immutable reference to the underlying configuration.
    #[must_use]
    pub fn config(&self) -> &TrainerConfig {
        &self.cfg
    }

    /// Returns the normaliser configuration stored with trained models.
    #[must_use]
    pub fn normalizer_config(&self) -> &NormalizerConfig {
        &self.normalizer
    }

    /// Returns the allocated meta pieces.
    #[must_use]
    pub fn meta_pieces(&self) -> &MetaPieces {
        &self.meta
    }

    /// Loads, normalises, and coverage-filters the corpus with the reference normaliser.
    pub fn prepare(&self) -> Result<PreparedCorpus> {
        self.prepare_with(&TextNormalizer::new(self.normalizer.clone()))
    }

    /// Same as [`Trainer::prepare`] with a caller supplied normaliser.
    pub fn prepare_with(&self, normalizer: &dyn Normalizer) -> Result<PreparedCorpus> {
        let load_start = Instant::now();
        let loaded = CorpusLoader::new(&self.cfg).load()?;
        let mut metrics = TrainingMetrics {
            load: loaded.stats,
            load_duration: load_start.elapsed(),
            rss_kb: sample_rss_kb(),
            ..TrainingMetrics::default()
        };

        let mut sentences = loaded.sentences;
        let matcher = MetaPieceMatcher::new(self.meta.texts());
        let normalize_start = Instant::now();
        metrics.load.empty_after_normalization =
            normalize_sentences(&mut sentences, normalizer, &matcher, self.cfg.num_threads)?;
        metrics.normalize_duration = normalize_start.elapsed();

        let coverage = CharacterCoverage::build(&sentences, &self.cfg)?;
        coverage.check_vocabulary(self.meta.len(), &self.cfg)?;
        coverage.rewrite(&mut sentences);
        metrics.coverage = coverage.stats().clone();

        if self.cfg.show_progress {
            info!(
                "prepared {} sentences ({} dropped after normalization) in {:.2?}",
                sentences.len(),
                metrics.load.empty_after_normalization,
                metrics.load_duration + metrics.normalize_duration
            );
        }

        Ok(PreparedCorpus {
            sentences,
            coverage,
            self_test_samples: loaded.self_test_samples,
            metrics,
        })
    }

    /// Trains with the built-in learner for the configured model type.
    ///
    /// Only `word` and `char` models have a built-in learner; statistical
    /// models need [`Trainer::train_with`].
    pub fn train(&self) -> Result<TrainerArtifacts> {
        match self.cfg.model_type {
            ModelType::Char => self.train_with(&CharLearner),
            ModelType::Word => self.train_with(&WordLearner),
            other @ (ModelType::Unigram | ModelType::Bpe) => Err(SpvocabError::config(
                "model_type",
                format!("no built-in learner for `{other}` models; supply one through train_with"),
            )),
        }
    }

    /// Trains with `learner`, recording self-tests with the longest-match encoder.
    pub fn train_with(&self, learner: &dyn PieceLearner) -> Result<TrainerArtifacts> {
        self.train_with_encoder(learner, LongestMatchEncoder::from_model)
    }

    /// Trains with `learner`, recording self-tests with the encoder built by `make_encoder`.
    ///
    /// The encoder is only built when self-test samples were collected.
    pub fn train_with_encoder<F, E>(
        &self,
        learner: &dyn PieceLearner,
        make_encoder: F,
    ) -> Result<TrainerArtifacts>
    where
        F: FnOnce(&ModelArtifact) -> Result<E>,
        E: PieceEncoder,
    {
        let start = Instant::now();
        let prepared = self.prepare()?;
        let artifacts = self.package(prepared, learner, make_encoder, start)?;
        if self.cfg.show_progress {
            info!(
                "trained {} model with {} pieces in {:.2?}",
                self.cfg.model_type,
                artifacts.model.vocab_size(),
                artifacts.metrics.total_duration
            );
        }
        Ok(artifacts)
    }

    fn package<F, E>(
        &self,
        prepared: PreparedCorpus,
        learner: &dyn PieceLearner,
        make_encoder: F,
        start: Instant,
    ) -> Result<TrainerArtifacts>
    where
        F: FnOnce(&ModelArtifact) -> Result<E>,
        E: PieceEncoder,
    {
        let learn_start = Instant::now();
        let learned = learner.learn(&prepared, &self.meta, &self.cfg)?;
        let mut metrics = prepared.metrics;
        metrics.learn_duration = learn_start.elapsed();
        metrics.learned_pieces = learned.len();

        let mut cfg = self.cfg.clone();
        if cfg.use_all_vocab && !cfg.model_type.is_statistical() {
            cfg.vocab_size = learned.len() + self.meta.len();
        }
        let (pieces, effective) = assemble_pieces(&self.meta, &learned, &cfg)?;
        let mut model = ModelArtifact::new(pieces, effective, self.normalizer.clone());

        if !prepared.self_test_samples.is_empty() {
            let encoder = make_encoder(&model)?;
            attach_self_test(&mut model, &prepared.self_test_samples, &encoder)?;
        }

        metrics.vocab_size = model.vocab_size();
        metrics.total_duration = start.elapsed();
        if self.cfg.show_progress {
            info!(
                "{} normal, {} control, {} user defined pieces",
                model.count_kind(PieceKind::Normal),
                model.count_kind(PieceKind::Control),
                model.count_kind(PieceKind::UserDefined)
            );
        }
        Ok(TrainerArtifacts { model, metrics })
    }
}

impl fmt::Display for TrainerArtifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cfg = self.model.trainer_config();
        writeln!(
            f,
            "{} model with vocab size {}",
            cfg.model_type,
            self.model.vocab_size()
        )?;
        writeln!(
            f,
            "Sentences: {} selected of {} candidates",
            self.metrics.load.selected, self.metrics.load.candidates
        )?;
        writeln!(
            f,
            "Alphabet: {} characters, coverage {:.4}",
            self.metrics.coverage.alphabet_size, self.metrics.coverage.coverage
        )?;
        writeln!(f, "Total duration: {:?}", self.metrics.total_duration)?;
        Ok(())
    }
}

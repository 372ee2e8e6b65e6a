//! Model artifact types produced by a training run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{NormalizerConfig, TrainerConfig};
use crate::encoder::{LongestMatchEncoder, PieceEncoder};
use crate::error::Result;
use crate::serialization;

/// Token identifier used throughout the crate.
pub type TokenId = u32;

/// Category of a vocabulary entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PieceKind {
    /// Piece produced by the learner.
    Normal,
    /// The unknown piece.
    Unknown,
    /// Control symbol, never produced from raw text.
    Control,
    /// User defined symbol, always matched as a whole.
    UserDefined,
}

/// A piece produced by an external learning algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedPiece {
    /// Surface text.
    pub text: String,
    /// Score assigned by the learner (log probability for the built-in learners).
    pub score: f32,
}

impl LearnedPiece {
    /// Creates a learned piece.
    pub fn new(text: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            score,
        }
    }
}

/// One entry of the final vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPiece {
    /// Surface text.
    pub text: String,
    /// Score; always `0.0` for meta pieces.
    pub score: f32,
    /// Category of the piece.
    pub kind: PieceKind,
}

/// Raw input paired with the space-joined pieces the finished model produced for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfTestSample {
    /// Raw sentence as read from the corpus.
    pub input: String,
    /// Expected encoding, pieces joined by a single space.
    pub expected: String,
}

/// Self-test sample whose current encoding no longer matches the stored one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfTestMismatch {
    /// Raw sentence.
    pub input: String,
    /// Encoding recorded at training time.
    pub expected: String,
    /// Encoding produced now.
    pub actual: String,
}

/// Trained vocabulary together with the configuration that produced it.
#[must_use]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pieces: Vec<ModelPiece>,
    trainer: TrainerConfig,
    normalizer: NormalizerConfig,
    self_test: Vec<SelfTestSample>,
}

impl ModelArtifact {
    /// Constructs an artifact from assembled pieces and the effective configuration.
    pub fn new(
        pieces: Vec<ModelPiece>,
        trainer: TrainerConfig,
        normalizer: NormalizerConfig,
    ) -> Self {
        Self {
            pieces,
            trainer,
            normalizer,
            self_test: Vec::new(),
        }
    }

    /// Returns the pieces in identifier order.
    #[must_use]
    pub fn pieces(&self) -> &[ModelPiece] {
        &self.pieces
    }

    /// Returns the effective trainer configuration.
    #[must_use]
    pub fn trainer_config(&self) -> &TrainerConfig {
        &self.trainer
    }

    /// Returns the normaliser configuration used during training.
    #[must_use]
    pub fn normalizer_config(&self) -> &NormalizerConfig {
        &self.normalizer
    }

    /// Returns the recorded self-test samples.
    #[must_use]
    pub fn self_test_samples(&self) -> &[SelfTestSample] {
        &self.self_test
    }

    /// Replaces the recorded self-test samples.
    pub fn set_self_test_samples(&mut self, samples: Vec<SelfTestSample>) {
        self.self_test = samples;
    }

    /// Returns the number of pieces.
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.pieces.len()
    }

    /// Identifier of the unknown piece.
    #[must_use]
    pub fn unknown_id(&self) -> Option<TokenId> {
        self.pieces
            .iter()
            .position(|piece| piece.kind == PieceKind::Unknown)
            .and_then(|idx| TokenId::try_from(idx).ok())
    }

    /// Counts pieces of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: PieceKind) -> usize {
        self.pieces.iter().filter(|piece| piece.kind == kind).count()
    }

    /// Builds the greedy longest-match encoder for this model.
    pub fn encoder(&self) -> Result<LongestMatchEncoder> {
        LongestMatchEncoder::from_model(self)
    }

    /// Writes `<prefix>.model` and `<prefix>.vocab`, returning both paths.
    pub fn save<P: AsRef<Path>>(&self, prefix: P) -> Result<(PathBuf, PathBuf)> {
        let prefix = prefix.as_ref().as_os_str().to_owned();
        let mut model_path = prefix.clone();
        model_path.push(".model");
        let mut vocab_path = prefix;
        vocab_path.push(".vocab");
        let (model_path, vocab_path) = (PathBuf::from(model_path), PathBuf::from(vocab_path));
        serialization::save_model(self, &model_path)?;
        serialization::save_vocab(self, &vocab_path)?;
        Ok((model_path, vocab_path))
    }

    /// Loads a binary model written by [`ModelArtifact::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        serialization::load_model(path)
    }

    /// Re-encodes every stored self-test input and reports the samples that changed.
    pub fn verify_self_test<E>(&self, encoder: &E) -> Result<Vec<SelfTestMismatch>>
    where
        E: PieceEncoder + ?Sized,
    {
        let mut mismatches = Vec::new();
        for sample in &self.self_test {
            let actual = encoder.encode_pieces(&sample.input)?.join(" ");
            if actual != sample.expected {
                mismatches.push(SelfTestMismatch {
                    input: sample.input.clone(),
                    expected: sample.expected.clone(),
                    actual,
                });
            }
        }
        Ok(mismatches)
    }
}

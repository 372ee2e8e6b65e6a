//! Subword vocabulary training: corpus ingestion, character coverage, and model packaging.
//!
//! The crate exposes both a library API and a `spvocab` command line interface.
//! A training run streams sentences from text or `word<TAB>freq` files,
//! optionally subsamples them, normalises them in parallel, selects the
//! characters needed to reach a coverage target, reserves identifiers for meta
//! pieces, and packages the learned pieces into a `.model`/`.vocab` pair with
//! self-test records.  Character and word models are learned by the crate
//! itself; statistical learners plug in through [`PieceLearner`].
//!
//! ```no_run
//! use spvocab::{ModelType, NormalizerConfig, Trainer, TrainerConfig};
//!
//! # fn main() -> spvocab::Result<()> {
//! let cfg = TrainerConfig::builder()
//!     .model_prefix("char")
//!     .inputs(["/path/to/corpus.txt"])
//!     .model_type(ModelType::Char)
//!     .vocab_size(256)
//!     .show_progress(false)
//!     .build()?;
//! let trainer = Trainer::new(cfg, NormalizerConfig::default())?;
//! let artifacts = trainer.train()?;
//! artifacts.model.save("char")?;
//! # Ok(())
//! # }
//! ```
//!
//! The CLI is enabled by default through the `cli` feature.  Users targeting the
//! library portion only can disable default features to avoid the CLI
//! dependencies: `spvocab = { version = "...", default-features = false }`.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    clippy::all,
    rust_2018_idioms,
    future_incompatible,
    unused_lifetimes,
    unreachable_pub
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod corpus;
pub mod coverage;
pub mod encoder;
pub mod error;
pub mod meta_pieces;
pub mod metrics;
pub mod model;
pub mod normalizer;
pub mod selector;
pub mod serialization;
pub mod text;
pub mod trainer;

pub use config::{
    IngestConfig, InputFormat, ModelType, NormalizationRule, NormalizerConfig, TrainerBuilder,
    TrainerConfig, TrainingSpec,
};
pub use encoder::{LongestMatchEncoder, PieceEncoder};
pub use error::{Result, SpvocabError};
pub use meta_pieces::MetaPieces;
pub use metrics::{LoadStats, TrainingMetrics};
pub use model::{LearnedPiece, ModelArtifact, ModelPiece, PieceKind, TokenId};
pub use normalizer::{Normalizer, TextNormalizer};
pub use text::is_valid_piece;
pub use trainer::{CharLearner, PieceLearner, PreparedCorpus, Trainer, TrainerArtifacts, WordLearner};

use crate::config::TrainerConfig;
use crate::error::Result;
use crate::meta_pieces::MetaPieces;
use crate::model::LearnedPiece;

use super::{PieceLearner, PreparedCorpus};

/// Character model learner: every required character becomes a piece.
///
/// Characters are emitted most frequent first, scored with their log
/// probability among the required characters.  Without `use_all_vocab` the
/// list is cut so that it fits next to the meta pieces.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharLearner;

impl PieceLearner for CharLearner {
    fn learn(
        &self,
        corpus: &PreparedCorpus,
        meta: &MetaPieces,
        cfg: &TrainerConfig,
    ) -> Result<Vec<LearnedPiece>> {
        let required = corpus.coverage.required();
        let total: u64 = required.iter().map(|&(_, freq)| freq).sum();
        let log_total = (total as f64).ln();
        let limit = if cfg.use_all_vocab {
            required.len()
        } else {
            cfg.vocab_size.saturating_sub(meta.len())
        };
        Ok(required
            .iter()
            .take(limit)
            .map(|&(c, freq)| LearnedPiece::new(c.to_string(), ((freq as f64).ln() - log_total) as f32))
            .collect())
    }
}

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::config::TrainerConfig;
use crate::corpus::Sentence;
use crate::error::Result;
use crate::meta_pieces::MetaPieces;
use crate::model::LearnedPiece;
use crate::text::{split_into_words, UNK_CHAR};

use super::{PieceLearner, PreparedCorpus};

/// Word model learner: whitespace delimited words become pieces.
///
/// Words keep their leading whitespace marker.  Words containing the unknown
/// marker are never emitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordLearner;

impl PieceLearner for WordLearner {
    fn learn(
        &self,
        corpus: &PreparedCorpus,
        meta: &MetaPieces,
        cfg: &TrainerConfig,
    ) -> Result<Vec<LearnedPiece>> {
        let counts = count_words(&corpus.sentences);
        let total: u64 = counts.values().sum();
        let log_total = (total as f64).ln();

        let mut sorted: Vec<(&str, u64)> = counts.into_iter().collect();
        sorted.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let limit = cfg.vocab_size.saturating_sub(meta.len());
        let mut pieces = Vec::new();
        for (word, freq) in sorted {
            if word.contains(UNK_CHAR) {
                continue;
            }
            if !cfg.use_all_vocab && pieces.len() == limit {
                break;
            }
            pieces.push(LearnedPiece::new(word, ((freq as f64).ln() - log_total) as f32));
        }
        Ok(pieces)
    }
}

fn count_words(sentences: &[Sentence]) -> FxHashMap<&str, u64> {
    sentences
        .par_iter()
        .fold(FxHashMap::default, |mut local, sentence| {
            for word in split_into_words(&sentence.text) {
                *local.entry(word).or_insert(0) += sentence.freq;
            }
            local
        })
        .reduce(FxHashMap::default, |mut acc, local| {
            for (word, count) in local {
                *acc.entry(word).or_insert(0) += count;
            }
            acc
        })
}

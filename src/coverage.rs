//! Frequency based selection of the characters the vocabulary must contain.

use log::{debug, info};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::TrainerConfig;
use crate::corpus::Sentence;
use crate::error::{Result, SpvocabError};
use crate::metrics::CoverageStats;
use crate::text::{BOUNDARY_CHAR, UNK_CHAR};

/// Characters retained to reach the configured coverage, with their weighted counts.
#[derive(Debug, Clone, Default)]
pub struct CharacterCoverage {
    required: Vec<(char, u64)>,
    lookup: FxHashSet<char>,
    stats: CoverageStats,
}

impl CharacterCoverage {
    /// Counts characters across `sentences` (weighted by frequency) and keeps
    /// the most frequent ones until `character_coverage` is reached.
    ///
    /// Ties are broken by code point so the result does not depend on hash
    /// iteration order.  The meta piece boundary is counted but never
    /// required.
    pub fn build(sentences: &[Sentence], cfg: &TrainerConfig) -> Result<Self> {
        let mut counts: FxHashMap<char, u64> = FxHashMap::default();
        for sentence in sentences {
            for c in sentence.text.chars() {
                if c == '\0' {
                    continue;
                }
                if c == ' ' {
                    return Err(SpvocabError::NormalizationInvariant(format!(
                        "raw space in normalized sentence {:?}",
                        sentence.text
                    )));
                }
                *counts.entry(c).or_insert(0) += sentence.freq;
            }
        }

        let total: u64 = counts.values().sum();
        if total == 0 {
            return Err(SpvocabError::VocabularyTooSmall(
                "no training sentences remain after loading and normalization".into(),
            ));
        }

        let mut sorted: Vec<(char, u64)> = counts.into_iter().collect();
        sorted.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let distinct_chars = sorted.len();

        let mut accumulated = 0u64;
        let mut required = Vec::new();
        for (c, freq) in sorted {
            if !cfg.use_all_vocab && accumulated as f64 / total as f64 >= cfg.character_coverage {
                debug!("coverage target reached with {} characters", required.len());
                break;
            }
            accumulated += freq;
            if c == BOUNDARY_CHAR {
                continue;
            }
            if c == UNK_CHAR {
                return Err(SpvocabError::NormalizationInvariant(
                    "the unknown character marker cannot be a required character".into(),
                ));
            }
            required.push((c, freq));
        }

        let stats = CoverageStats {
            total_chars: total,
            distinct_chars,
            alphabet_size: required.len(),
            coverage: accumulated as f64 / total as f64,
        };
        info!(
            "alphabet size={} character coverage={:.6}",
            stats.alphabet_size, stats.coverage
        );

        let lookup = required.iter().map(|&(c, _)| c).collect();
        Ok(Self {
            required,
            lookup,
            stats,
        })
    }

    /// Fails when a statistical model cannot hold the alphabet plus the meta pieces.
    pub fn check_vocabulary(&self, meta_count: usize, cfg: &TrainerConfig) -> Result<()> {
        if self.required.is_empty() {
            return Err(SpvocabError::VocabularyTooSmall(
                "the required alphabet is empty".into(),
            ));
        }
        let needed = self.required.len() + meta_count;
        if cfg.model_type.is_statistical() && needed > cfg.vocab_size {
            return Err(SpvocabError::VocabularyTooSmall(format!(
                "vocabulary size is smaller than required characters plus meta pieces ({} vs {needed}); \
                 increase vocab_size or decrease character_coverage",
                cfg.vocab_size
            )));
        }
        Ok(())
    }

    /// Replaces every character outside the required alphabet with the unknown marker.
    ///
    /// The meta piece boundary is left untouched.  Returns the number of sentences changed.
    pub fn rewrite(&self, sentences: &mut [Sentence]) -> usize {
        let mut changed = 0;
        for sentence in sentences.iter_mut() {
            if sentence.text.chars().all(|c| self.keeps(c)) {
                continue;
            }
            sentence.text = sentence
                .text
                .chars()
                .map(|c| if self.keeps(c) { c } else { UNK_CHAR })
                .collect();
            changed += 1;
        }
        if changed > 0 {
            debug!("replaced rare characters in {changed} sentences");
        }
        changed
    }

    fn keeps(&self, c: char) -> bool {
        c == BOUNDARY_CHAR || self.lookup.contains(&c)
    }

    /// Returns `true` when `c` belongs to the required alphabet.
    #[must_use]
    pub fn contains(&self, c: char) -> bool {
        self.lookup.contains(&c)
    }

    /// Required characters, most frequent first.
    #[must_use]
    pub fn required(&self) -> &[(char, u64)] {
        &self.required
    }

    /// Summary of the computation.
    #[must_use]
    pub fn stats(&self) -> &CoverageStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelType;

    fn cfg(coverage: f64) -> TrainerConfig {
        TrainerConfig {
            character_coverage: coverage,
            show_progress: false,
            ..TrainerConfig::default()
        }
    }

    fn corpus(texts: &[(&str, u64)]) -> Vec<Sentence> {
        texts.iter().map(|&(t, f)| Sentence::new(t, f)).collect()
    }

    #[test]
    fn orders_by_weighted_count_then_code_point() {
        let sentences = corpus(&[("aab", 1), ("c", 3), ("b", 1)]);
        let coverage = CharacterCoverage::build(&sentences, &cfg(1.0)).expect("coverage");
        assert_eq!(coverage.required(), &[('c', 3), ('a', 2), ('b', 2)]);
        assert!((coverage.stats().coverage - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stops_once_target_is_met_and_rewrites_the_rest() {
        let mut sentences = corpus(&[("a".repeat(99).as_str(), 1), ("z", 1)]);
        let coverage = CharacterCoverage::build(&sentences, &cfg(0.99)).expect("coverage");
        assert_eq!(coverage.required(), &[('a', 99)]);
        assert_eq!(coverage.rewrite(&mut sentences), 1);
        assert_eq!(sentences[1].text, "\u{2585}");
    }

    #[test]
    fn use_all_vocab_keeps_every_character() {
        let sentences = corpus(&[("a".repeat(99).as_str(), 1), ("z", 1)]);
        let config = TrainerConfig {
            use_all_vocab: true,
            model_type: ModelType::Char,
            ..cfg(0.98)
        };
        let coverage = CharacterCoverage::build(&sentences, &config).expect("coverage");
        assert!(coverage.contains('z'));
    }

    #[test]
    fn boundary_is_counted_but_never_required() {
        let mut sentences = corpus(&[("a\tb\t", 1)]);
        let coverage = CharacterCoverage::build(&sentences, &cfg(1.0)).expect("coverage");
        assert!(!coverage.contains('\t'));
        assert_eq!(coverage.stats().total_chars, 4);
        assert_eq!(coverage.rewrite(&mut sentences), 0);
        assert_eq!(sentences[0].text, "a\tb\t");
    }

    #[test]
    fn empty_corpus_is_too_small() {
        let err = CharacterCoverage::build(&[], &cfg(1.0)).expect_err("empty corpus");
        assert!(matches!(err, SpvocabError::VocabularyTooSmall(_)));
    }

    #[test]
    fn spaces_violate_normalization() {
        let err = CharacterCoverage::build(&corpus(&[("a b", 1)]), &cfg(1.0))
            .expect_err("space must be rejected");
        assert!(matches!(err, SpvocabError::NormalizationInvariant(_)));
    }

    #[test]
    fn noncharacters_are_counted_like_any_other() {
        let sentences = corpus(&[("\u{2581}ab\u{FFFF}\u{FFFE}", 1)]);
        let coverage = CharacterCoverage::build(&sentences, &cfg(1.0)).expect("coverage");
        assert!(coverage.contains('\u{FFFF}'));
        assert!(coverage.contains('\u{FFFE}'));
        assert_eq!(coverage.stats().total_chars, 5);
    }

    #[test]
    fn statistical_models_need_room_for_the_alphabet() {
        let sentences = corpus(&[("abcdef", 1)]);
        let config = TrainerConfig {
            vocab_size: 8,
            ..cfg(1.0)
        };
        let coverage = CharacterCoverage::build(&sentences, &config).expect("coverage");
        assert!(matches!(
            coverage.check_vocabulary(3, &config),
            Err(SpvocabError::VocabularyTooSmall(_))
        ));
        coverage
            .check_vocabulary(2, &config)
            .expect("alphabet plus meta pieces fits");

        let char_model = TrainerConfig {
            model_type: ModelType::Char,
            ..config
        };
        coverage
            .check_vocabulary(3, &char_model)
            .expect("char models are sized by the learner");
    }
}

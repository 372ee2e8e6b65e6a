//! Text normalisation applied to every retained sentence before coverage analysis.

use log::{debug, info};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use unicode_normalization::UnicodeNormalization;

use crate::config::{NormalizationRule, NormalizerConfig};
use crate::corpus::Sentence;
use crate::error::{Result, SpvocabError};
use crate::text::{BOUNDARY_STR, WS_STR};

/// Pluggable text normalisation capability.
///
/// Implementations are shared across the normalisation workers and therefore
/// must be `Sync`.  Plain functions and closures of type `Fn(&str) -> String`
/// implement the trait directly.
pub trait Normalizer: Send + Sync {
    /// Normalises a single raw sentence.
    fn normalize(&self, text: &str) -> Result<String>;
}

impl<F> Normalizer for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn normalize(&self, text: &str) -> Result<String> {
        Ok(self(text))
    }
}

/// Reference normaliser driven by a [`NormalizerConfig`].
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    cfg: NormalizerConfig,
}

impl TextNormalizer {
    /// Creates a normaliser for the supplied configuration.
    #[must_use]
    pub fn new(cfg: NormalizerConfig) -> Self {
        Self { cfg }
    }

    /// Returns the underlying configuration.
    #[must_use]
    pub fn config(&self) -> &NormalizerConfig {
        &self.cfg
    }

    fn apply_rule(&self, text: &str) -> String {
        match self.cfg.rule {
            NormalizationRule::Identity => text.to_owned(),
            NormalizationRule::Nfc => text.nfc().collect(),
            NormalizationRule::Nfkc => text.nfkc().collect(),
        }
    }
}

impl Normalizer for TextNormalizer {
    fn normalize(&self, text: &str) -> Result<String> {
        let ruled = self.apply_rule(text);
        let body = if self.cfg.remove_extra_whitespaces {
            ruled.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            ruled
                .chars()
                .map(|c| if c.is_whitespace() { ' ' } else { c })
                .collect()
        };
        if body.is_empty() {
            return Ok(body);
        }

        let mut out = String::with_capacity(body.len() + 1);
        if self.cfg.add_dummy_prefix {
            out.push(' ');
        }
        out.push_str(&body);
        if self.cfg.escape_whitespaces {
            out = out.replace(' ', WS_STR);
        }
        Ok(out)
    }
}

/// Longest-match substitution of meta piece texts.
#[derive(Debug, Clone, Default)]
pub struct MetaPieceMatcher {
    patterns: Vec<String>,
}

impl MetaPieceMatcher {
    /// Builds a matcher over the supplied patterns; empty patterns are ignored.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut patterns: Vec<String> = patterns
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| !p.is_empty())
            .collect();
        // Longest first so the first hit at a position is the longest match.
        patterns.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        patterns.dedup();
        Self { patterns }
    }

    /// Returns the length in bytes of the longest pattern that prefixes `text`.
    #[must_use]
    pub fn longest_prefix(&self, text: &str) -> Option<usize> {
        self.patterns
            .iter()
            .find(|pattern| text.starts_with(pattern.as_str()))
            .map(String::len)
    }

    /// Rewrites every non-overlapping longest match with `replacement`, scanning left to right.
    #[must_use]
    pub fn replace_all(&self, text: &str, replacement: &str) -> String {
        if self.patterns.is_empty() {
            return text.to_owned();
        }
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(c) = rest.chars().next() {
            if let Some(len) = self.longest_prefix(rest) {
                out.push_str(replacement);
                rest = &rest[len..];
            } else {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
        out
    }
}

/// Normalises `sentences` in place on `num_threads` workers and drops empty results.
///
/// Sentence `i` is owned by worker `i % num_threads`; each worker runs
/// `matcher.replace_all(normalizer.normalize(text), "\t")` over its own
/// slots, and the call returns only after every worker has finished.  Returns
/// the number of sentences removed because they normalised to nothing.
pub fn normalize_sentences(
    sentences: &mut Vec<Sentence>,
    normalizer: &dyn Normalizer,
    matcher: &MetaPieceMatcher,
    num_threads: usize,
) -> Result<usize> {
    let workers = num_threads.max(1);
    info!(
        "normalizing {} sentences with {workers} workers",
        sentences.len()
    );

    let mut buckets: Vec<Vec<&mut Sentence>> = (0..workers).map(|_| Vec::new()).collect();
    for (idx, sentence) in sentences.iter_mut().enumerate() {
        buckets[idx % workers].push(sentence);
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|idx| format!("spvocab-normalize-{idx}"))
        .build()
        .map_err(|err| SpvocabError::Internal(format!("unable to build worker pool: {err}")))?;

    pool.install(|| {
        buckets.into_par_iter().try_for_each(|bucket| {
            for sentence in bucket {
                let normalized = normalizer.normalize(&sentence.text)?;
                sentence.text = matcher.replace_all(&normalized, BOUNDARY_STR);
            }
            Ok::<(), SpvocabError>(())
        })
    })?;

    if let Some(bad) = sentences.iter().find(|s| s.text.contains(' ')) {
        return Err(SpvocabError::NormalizationInvariant(format!(
            "normalized sentence must not contain spaces: {:?}",
            bad.text
        )));
    }

    let before = sentences.len();
    sentences.retain(|s| !s.text.is_empty());
    let removed = before - sentences.len();
    if removed > 0 {
        debug!("removed {removed} sentences that normalized to empty text");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentences(texts: &[&str]) -> Vec<Sentence> {
        texts.iter().map(|t| Sentence::new(*t, 1)).collect()
    }

    #[test]
    fn reference_normalizer_escapes_and_prefixes() {
        let normalizer = TextNormalizer::new(NormalizerConfig::identity());
        assert_eq!(
            normalizer.normalize("  I  have\ta pen ").expect("normalize"),
            "\u{2581}I\u{2581}have\u{2581}a\u{2581}pen"
        );
        assert_eq!(normalizer.normalize("   ").expect("normalize"), "");
    }

    #[test]
    fn nfkc_rule_folds_compatibility_characters() {
        let normalizer = TextNormalizer::new(NormalizerConfig {
            add_dummy_prefix: false,
            ..NormalizerConfig::default()
        });
        assert_eq!(normalizer.normalize("ｆｕｌｌ").expect("normalize"), "full");
    }

    #[test]
    fn matcher_prefers_longest_pattern() {
        let matcher = MetaPieceMatcher::new(["<s>", "<sep>", ""]);
        assert_eq!(matcher.replace_all("a<sep>b<s>c", "\t"), "a\tb\tc");
        assert_eq!(matcher.replace_all("<se", "\t"), "<se");
    }

    #[test]
    fn stage_result_is_independent_of_worker_count() {
        let texts = ["alpha beta", "gamma", "  ", "delta <sep> eps", "zeta"];
        let normalizer = TextNormalizer::new(NormalizerConfig::identity());
        let matcher = MetaPieceMatcher::new(["<sep>"]);

        let mut single = sentences(&texts);
        let removed = normalize_sentences(&mut single, &normalizer, &matcher, 1)
            .expect("single worker");
        let mut many = sentences(&texts);
        normalize_sentences(&mut many, &normalizer, &matcher, 3).expect("three workers");

        assert_eq!(removed, 1);
        assert_eq!(single, many);
        assert_eq!(single[2].text, "\u{2581}delta\u{2581}\t\u{2581}eps");
    }

    #[test]
    fn stage_rejects_spaces_in_output() {
        let mut corpus = sentences(&["a b"]);
        let identity = |text: &str| text.to_owned();
        let err = normalize_sentences(&mut corpus, &identity, &MetaPieceMatcher::default(), 2)
            .expect_err("spaces must be rejected");
        assert!(matches!(err, SpvocabError::NormalizationInvariant(_)));
    }

    struct RejectingNormalizer(&'static str);

    impl Normalizer for RejectingNormalizer {
        fn normalize(&self, text: &str) -> Result<String> {
            if text == self.0 {
                return Err(SpvocabError::NormalizationInvariant(format!(
                    "cannot normalize {text:?}"
                )));
            }
            Ok(text.to_owned())
        }
    }

    #[test]
    fn failing_worker_aborts_the_stage() {
        let mut corpus = sentences(&["a", "b", "c", "bad", "d", "e"]);
        let err = normalize_sentences(
            &mut corpus,
            &RejectingNormalizer("bad"),
            &MetaPieceMatcher::default(),
            4,
        )
        .expect_err("worker failure must surface");
        match err {
            SpvocabError::NormalizationInvariant(message) => assert!(message.contains("bad")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn stage_removes_empty_sentences_without_skipping() {
        let mut corpus = sentences(&["x", "", "", "y", ""]);
        let identity = |text: &str| text.to_owned();
        let removed = normalize_sentences(&mut corpus, &identity, &MetaPieceMatcher::default(), 2)
            .expect("normalize");
        assert_eq!(removed, 3);
        let texts: Vec<&str> = corpus.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["x", "y"]);
    }
}

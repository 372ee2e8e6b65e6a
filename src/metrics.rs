//! Diagnostics describing what a training run read, dropped, and kept.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Counters collected while streaming and normalising the corpus.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadStats {
    /// Input files opened.
    pub files_read: usize,
    /// Raw lines read across all files.
    pub lines_read: u64,
    /// Lines skipped because they exceeded `max_sentence_length`.
    pub too_long: u64,
    /// Lines skipped because they contained the unknown-character marker.
    pub reserved_marker: u64,
    /// Candidates offered to the sentence selector.
    pub candidates: u64,
    /// Sentences retained by the selector.
    pub selected: usize,
    /// Sentences removed because they normalised to empty text.
    pub empty_after_normalization: usize,
    /// Raw sentences kept for self-testing.
    pub self_test_samples: usize,
}

/// Outcome of the character coverage computation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CoverageStats {
    /// Weighted count of every counted character occurrence.
    pub total_chars: u64,
    /// Number of distinct characters observed.
    pub distinct_chars: usize,
    /// Number of characters in the required alphabet.
    pub alphabet_size: usize,
    /// Fraction of occurrences covered by the required alphabet.
    pub coverage: f64,
}

/// Aggregate metrics produced by a training session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrainingMetrics {
    /// Corpus streaming counters.
    pub load: LoadStats,
    /// Character coverage summary.
    pub coverage: CoverageStats,
    /// Number of pieces returned by the learner.
    pub learned_pieces: usize,
    /// Final vocabulary size.
    pub vocab_size: usize,
    /// Time spent reading and sampling the corpus.
    pub load_duration: Duration,
    /// Time spent in the parallel normalisation stage.
    pub normalize_duration: Duration,
    /// Time spent in the learner.
    pub learn_duration: Duration,
    /// Total duration of the training session.
    pub total_duration: Duration,
    /// Resident set size sampled after the corpus was loaded.
    pub rss_kb: Option<usize>,
}

#[cfg(target_os = "linux")]
fn current_rss_kb() -> Option<usize> {
    use std::fs::File;
    use std::io::{BufRead, BufReader};

    let file = File::open("/proc/self/status").ok()?;
    for line in BufReader::new(file).lines().map_while(Result::ok) {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            return rest
                .split_whitespace()
                .find_map(|part| part.parse::<usize>().ok());
        }
    }
    None
}

#[cfg(not(target_os = "linux"))]
fn current_rss_kb() -> Option<usize> {
    None
}

/// Samples the current resident set size (RSS) on supported platforms.
pub fn sample_rss_kb() -> Option<usize> {
    current_rss_kb()
}

//! Streaming sentence selection: keep everything, keep the head, or reservoir sample.

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::TrainerConfig;
use crate::corpus::Sentence;

/// Number of retained sentences above which training is flagged as likely slow.
pub const TOO_MANY_SENTENCES: usize = 1_000_000;

/// Fixed-capacity uniform sample over a stream of unknown length (Algorithm R).
#[derive(Debug)]
pub struct ReservoirSampler<T> {
    items: Vec<T>,
    capacity: usize,
    seen: u64,
    rng: StdRng,
}

impl<T> ReservoirSampler<T> {
    /// Creates a sampler keeping at most `capacity` items, seeded deterministically.
    #[must_use]
    pub fn new(capacity: usize, seed: u64) -> Self {
        Self {
            items: Vec::with_capacity(capacity.min(1 << 16)),
            capacity,
            seen: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Offers an item to the reservoir; returns `true` if it was stored.
    pub fn add(&mut self, item: T) -> bool {
        self.seen += 1;
        if self.capacity == 0 {
            return false;
        }
        if self.items.len() < self.capacity {
            self.items.push(item);
            return true;
        }
        let slot = self.rng.gen_range(0..self.seen);
        match usize::try_from(slot) {
            Ok(slot) if slot < self.capacity => {
                self.items[slot] = item;
                true
            }
            _ => false,
        }
    }

    /// Total number of items offered so far.
    #[must_use]
    pub fn total_seen(&self) -> u64 {
        self.seen
    }

    /// Number of items currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` when nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Consumes the sampler, returning the sampled items.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

/// Outcome of offering a sentence to the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The sentence is currently retained.
    Accepted,
    /// The sentence is retained and no further input is needed.
    AcceptedAndStop,
    /// The sentence was not retained.
    Rejected,
}

#[derive(Debug)]
enum Mode {
    All(Vec<Sentence>),
    Head { kept: Vec<Sentence>, limit: usize },
    Reservoir(ReservoirSampler<Sentence>),
}

/// Decides, sentence by sentence, which candidates survive into training.
#[derive(Debug)]
pub struct SentenceSelector {
    mode: Mode,
    seen: u64,
    show_progress: bool,
}

impl SentenceSelector {
    /// Chooses the selection mode from `input_sentence_size` and `shuffle_input_sentence`.
    #[must_use]
    pub fn new(cfg: &TrainerConfig) -> Self {
        let limit = cfg.input_sentence_size;
        let mode = if limit == 0 {
            Mode::All(Vec::new())
        } else if cfg.shuffle_input_sentence {
            Mode::Reservoir(ReservoirSampler::new(limit, cfg.sampling_seed()))
        } else {
            info!("first {limit} sentences are selected; remaining sentences are discarded");
            Mode::Head {
                kept: Vec::with_capacity(limit.min(1 << 16)),
                limit,
            }
        };
        Self {
            mode,
            seen: 0,
            show_progress: cfg.show_progress,
        }
    }

    /// Offers a candidate sentence.
    pub fn offer(&mut self, sentence: Sentence) -> Admission {
        self.seen += 1;
        if self.show_progress && self.seen % TOO_MANY_SENTENCES as u64 == 0 {
            info!("loaded {} lines", self.seen);
        }
        match &mut self.mode {
            Mode::All(kept) => {
                kept.push(sentence);
                Admission::Accepted
            }
            Mode::Head { kept, limit } => {
                kept.push(sentence);
                if kept.len() >= *limit {
                    Admission::AcceptedAndStop
                } else {
                    Admission::Accepted
                }
            }
            Mode::Reservoir(sampler) => {
                if sampler.add(sentence) {
                    Admission::Accepted
                } else {
                    Admission::Rejected
                }
            }
        }
    }

    /// Total number of candidates offered.
    #[must_use]
    pub fn total_seen(&self) -> u64 {
        self.seen
    }

    /// Consumes the selector and returns the retained sentences in stream order
    /// (reservoir order for sampled runs).
    #[must_use]
    pub fn finish(self) -> Vec<Sentence> {
        let kept = match self.mode {
            Mode::All(kept) | Mode::Head { kept, .. } => kept,
            Mode::Reservoir(sampler) => sampler.into_items(),
        };
        if kept.len() > TOO_MANY_SENTENCES {
            warn!(
                "too many sentences are loaded ({}), which may slow down training",
                kept.len()
            );
            warn!("consider setting input_sentence_size with shuffle_input_sentence to sample the corpus");
        }
        kept
    }
}

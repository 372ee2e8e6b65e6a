//! Facilities for discovering input files and streaming sentences out of them.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::vec;

use bstr::io::{BufReadExt, ByteLines};
use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{IngestConfig, InputFormat, TrainerConfig};
use crate::error::{Result, SpvocabError};
use crate::metrics::LoadStats;
use crate::selector::{Admission, ReservoirSampler, SentenceSelector};
use crate::text::UNK_STR;

const SELF_TEST_SEED_SALT: u64 = 0x5345_4c46_5445_5354; // "SELFTEST"

/// A training sentence and the number of times it occurs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    /// Sentence text.
    pub text: String,
    /// Occurrence count; `1` for plain text input.
    pub freq: u64,
}

impl Sentence {
    /// Creates a sentence.
    pub fn new(text: impl Into<String>, freq: u64) -> Self {
        Self {
            text: text.into(),
            freq,
        }
    }
}

/// Discovers files rooted at the provided input paths according to the ingest configuration.
///
/// Inputs keep their given order.  Directories expand to the files beneath them
/// sorted by file name, recursively unless [`IngestConfig::recursive`] is
/// `false`.  Symlink traversal is controlled through [`IngestConfig::follow_symlinks`].
pub fn collect_paths<P: AsRef<Path>>(inputs: &[P], cfg: &IngestConfig) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let path = input.as_ref();
        if !path.exists() {
            return Err(SpvocabError::config(
                "inputs",
                format!("input path {path:?} does not exist"),
            ));
        }
        let metadata = path
            .metadata()
            .map_err(|err| SpvocabError::io(err, Some(path.to_path_buf())))?;
        if metadata.is_dir() {
            if cfg.recursive {
                let walker = WalkDir::new(path)
                    .follow_links(cfg.follow_symlinks)
                    .sort_by_file_name();
                for entry in walker {
                    let entry = entry.map_err(|err| SpvocabError::Internal(err.to_string()))?;
                    if entry.file_type().is_file() {
                        files.push(entry.path().to_path_buf());
                    }
                }
            } else {
                let mut level = Vec::new();
                for entry in
                    fs::read_dir(path).map_err(|err| SpvocabError::io(err, Some(path.to_path_buf())))?
                {
                    let entry =
                        entry.map_err(|err| SpvocabError::io(err, Some(path.to_path_buf())))?;
                    let entry_path = entry.path();
                    if entry_path.is_file() {
                        level.push(entry_path);
                    }
                }
                level.sort();
                files.extend(level);
            }
        } else {
            files.push(path.to_path_buf());
        }
    }
    if files.is_empty() {
        return Err(SpvocabError::config(
            "inputs",
            "no files discovered in provided inputs",
        ));
    }
    Ok(files)
}

struct OpenSource {
    path: PathBuf,
    lines: ByteLines<BufReader<File>>,
    line: usize,
}

/// Lazy sequence of candidate sentences read line by line from the input files.
///
/// Only one file is open at a time and files are consumed in order.  Empty
/// lines, lines longer than `max_sentence_length` bytes, and lines containing
/// the unknown-character marker are skipped; the last two are counted in
/// [`SentenceStream::stats`].
pub struct SentenceStream<'a> {
    cfg: &'a TrainerConfig,
    pending: vec::IntoIter<PathBuf>,
    current: Option<OpenSource>,
    stats: LoadStats,
}

impl<'a> SentenceStream<'a> {
    /// Creates a stream over `paths` using the format and limits in `cfg`.
    #[must_use]
    pub fn new(paths: Vec<PathBuf>, cfg: &'a TrainerConfig) -> Self {
        Self {
            cfg,
            pending: paths.into_iter(),
            current: None,
            stats: LoadStats::default(),
        }
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn stats(&self) -> &LoadStats {
        &self.stats
    }

    fn open_next(&mut self) -> Option<Result<()>> {
        let path = self.pending.next()?;
        info!("loading corpus: {}", path.display());
        match File::open(&path) {
            Ok(file) => {
                self.stats.files_read += 1;
                self.current = Some(OpenSource {
                    path,
                    lines: BufReader::new(file).byte_lines(),
                    line: 0,
                });
                Some(Ok(()))
            }
            Err(err) => Some(Err(SpvocabError::io(err, Some(path)))),
        }
    }
}

impl Iterator for SentenceStream<'_> {
    type Item = Result<Sentence>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(source) = self.current.as_mut() else {
                match self.open_next()? {
                    Ok(()) => continue,
                    Err(err) => return Some(Err(err)),
                }
            };
            match source.lines.next() {
                None => {
                    self.current = None;
                }
                Some(Err(err)) => {
                    let path = source.path.clone();
                    self.current = None;
                    return Some(Err(SpvocabError::io(err, Some(path))));
                }
                Some(Ok(raw)) => {
                    source.line += 1;
                    self.stats.lines_read += 1;
                    match classify_line(self.cfg, &mut self.stats, raw, &source.path, source.line)
                    {
                        Ok(Some(sentence)) => return Some(Ok(sentence)),
                        Ok(None) => {}
                        Err(err) => return Some(Err(err)),
                    }
                }
            }
        }
    }
}

fn classify_line(
    cfg: &TrainerConfig,
    stats: &mut LoadStats,
    raw: Vec<u8>,
    path: &Path,
    line: usize,
) -> Result<Option<Sentence>> {
    if raw.is_empty() {
        return Ok(None);
    }
    let format_error = |reason: String| SpvocabError::CorpusFormat {
        path: path.to_path_buf(),
        line,
        reason,
    };
    let text = String::from_utf8(raw)
        .map_err(|err| format_error(format!("invalid UTF-8: {}", err.utf8_error())))?;
    let (text, freq) = match cfg.input_format {
        InputFormat::Text => (text, 1),
        InputFormat::Tsv => parse_tsv(&text).map_err(format_error)?,
    };

    if text.is_empty() {
        return Ok(None);
    }
    if text.len() > cfg.max_sentence_length {
        if stats.too_long == 0 {
            warn!(
                "found too long line ({} > {}); too long lines are skipped in training",
                text.len(),
                cfg.max_sentence_length
            );
        }
        stats.too_long += 1;
        return Ok(None);
    }
    if text.contains(UNK_STR) {
        debug!("reserved characters are found; skipped: {text}");
        stats.reserved_marker += 1;
        return Ok(None);
    }
    Ok(Some(Sentence { text, freq }))
}

fn parse_tsv(line: &str) -> std::result::Result<(String, u64), String> {
    let mut fields = line.split('\t');
    match (fields.next(), fields.next(), fields.next()) {
        (Some(word), Some(freq), None) => {
            let freq: u64 = freq
                .trim()
                .parse()
                .map_err(|_| format!("frequency `{freq}` is not a positive integer"))?;
            if freq < 1 {
                return Err("frequency must be at least 1".into());
            }
            Ok((word.to_owned(), freq))
        }
        _ => Err(format!("input format must be: word <tab> freq, got {line:?}")),
    }
}

/// Sentences retained by the loader, plus the raw self-test samples.
#[derive(Debug, Clone, Default)]
pub struct LoadedCorpus {
    /// Selected sentences, not yet normalised.
    pub sentences: Vec<Sentence>,
    /// Raw sentences sampled for self-testing.
    pub self_test_samples: Vec<String>,
    /// Streaming counters.
    pub stats: LoadStats,
}

/// Streams the configured inputs through the self-test sampler and sentence selector.
#[derive(Debug, Clone, Copy)]
pub struct CorpusLoader<'a> {
    cfg: &'a TrainerConfig,
}

impl<'a> CorpusLoader<'a> {
    /// Creates a loader for the supplied configuration.
    #[must_use]
    pub fn new(cfg: &'a TrainerConfig) -> Self {
        Self { cfg }
    }

    /// Loads the inputs named in the configuration.
    pub fn load(&self) -> Result<LoadedCorpus> {
        let paths = collect_paths(&self.cfg.inputs, &self.cfg.ingest)?;
        self.load_paths(paths)
    }

    /// Loads an explicit list of files, stopping early when the selector has enough.
    pub fn load_paths(&self, paths: Vec<PathBuf>) -> Result<LoadedCorpus> {
        let cfg = self.cfg;
        let mut stream = SentenceStream::new(paths, cfg);
        let mut selector = SentenceSelector::new(cfg);
        let mut self_test = ReservoirSampler::new(
            cfg.self_test_sample_size,
            cfg.sampling_seed() ^ SELF_TEST_SEED_SALT,
        );

        for candidate in stream.by_ref() {
            let sentence = candidate?;
            if cfg.self_test_sample_size > 0 {
                self_test.add(sentence.text.clone());
            }
            if selector.offer(sentence) == Admission::AcceptedAndStop {
                debug!("sentence limit reached; remaining input is not read");
                break;
            }
        }

        let mut stats = stream.stats().clone();
        stats.candidates = selector.total_seen();
        let sentences = selector.finish();
        stats.selected = sentences.len();
        let self_test_samples = self_test.into_items();
        stats.self_test_samples = self_test_samples.len();

        if stats.selected as u64 == stats.candidates {
            info!("loaded all {} sentences", stats.selected);
        } else {
            info!(
                "sampled {} sentences from {} sentences",
                stats.selected, stats.candidates
            );
        }
        if stats.too_long > 0 {
            info!("skipped {} too long sentences", stats.too_long);
        }
        if stats.reserved_marker > 0 {
            info!(
                "skipped {} sentences containing the reserved marker",
                stats.reserved_marker
            );
        }
        if !self_test_samples.is_empty() {
            info!("loaded {} test sentences", self_test_samples.len());
        }

        Ok(LoadedCorpus {
            sentences,
            self_test_samples,
            stats,
        })
    }
}

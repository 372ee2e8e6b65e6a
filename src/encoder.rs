//! Greedy longest-match encoder over a trained vocabulary.

use ahash::AHashMap;
use rustc_hash::FxHashSet;

use crate::error::{Result, SpvocabError};
use crate::model::{ModelArtifact, PieceKind, TokenId};
use crate::normalizer::{Normalizer, TextNormalizer};
use crate::text::{WS_CHAR, WS_STR};

/// Turns raw text into a sequence of piece texts.
///
/// Used to record and replay self-test samples; any inference-time tokenizer
/// can be plugged in by implementing this trait.
pub trait PieceEncoder {
    /// Encodes raw text into piece texts.
    fn encode_pieces(&self, text: &str) -> Result<Vec<String>>;
}

/// Normalises input with the model's normaliser configuration, then repeatedly
/// takes the longest vocabulary piece matching at the current position.
///
/// Only normal and user defined pieces can be matched.  A character that no
/// piece starts with is emitted on its own and mapped to the unknown id.
#[derive(Debug, Clone)]
pub struct LongestMatchEncoder {
    normalizer: TextNormalizer,
    vocab: AHashMap<String, TokenId>,
    pieces: Vec<String>,
    control_ids: FxHashSet<TokenId>,
    max_piece_chars: usize,
    unk_id: TokenId,
    strip_dummy_prefix: bool,
}

impl LongestMatchEncoder {
    /// Builds an encoder for a trained model.
    pub fn from_model(model: &ModelArtifact) -> Result<Self> {
        let unk_id = model.unknown_id().ok_or_else(|| {
            SpvocabError::Serialization("model does not contain an unknown piece".into())
        })?;
        let mut vocab = AHashMap::with_capacity(model.vocab_size());
        let mut control_ids = FxHashSet::default();
        let mut max_piece_chars = 1;
        for (idx, piece) in model.pieces().iter().enumerate() {
            let id = TokenId::try_from(idx)
                .map_err(|_| SpvocabError::Internal(format!("piece index {idx} exceeds u32")))?;
            match piece.kind {
                PieceKind::Normal | PieceKind::UserDefined => {
                    max_piece_chars = max_piece_chars.max(piece.text.chars().count());
                    vocab.insert(piece.text.clone(), id);
                }
                PieceKind::Control => {
                    control_ids.insert(id);
                }
                PieceKind::Unknown => {}
            }
        }
        let normalizer_cfg = model.normalizer_config().clone();
        let strip_dummy_prefix = normalizer_cfg.add_dummy_prefix;
        Ok(Self {
            normalizer: TextNormalizer::new(normalizer_cfg),
            vocab,
            pieces: model.pieces().iter().map(|p| p.text.clone()).collect(),
            control_ids,
            max_piece_chars,
            unk_id,
            strip_dummy_prefix,
        })
    }

    /// Encodes raw text into `(piece, id)` pairs.
    pub fn encode(&self, text: &str) -> Result<Vec<(String, TokenId)>> {
        let normalized = self.normalizer.normalize(text)?;
        let mut boundaries: Vec<usize> = normalized.char_indices().map(|(idx, _)| idx).collect();
        boundaries.push(normalized.len());

        let mut out = Vec::new();
        let mut start = 0;
        while start + 1 < boundaries.len() {
            let longest = (start + self.max_piece_chars).min(boundaries.len() - 1);
            let hit = (start + 1..=longest).rev().find_map(|end| {
                let candidate = &normalized[boundaries[start]..boundaries[end]];
                self.vocab.get(candidate).map(|&id| (end, candidate, id))
            });
            match hit {
                Some((end, piece, id)) => {
                    out.push((piece.to_owned(), id));
                    start = end;
                }
                None => {
                    let piece = &normalized[boundaries[start]..boundaries[start + 1]];
                    out.push((piece.to_owned(), self.unk_id));
                    start += 1;
                }
            }
        }
        Ok(out)
    }

    /// Encodes raw text into identifiers.
    pub fn encode_ids(&self, text: &str) -> Result<Vec<TokenId>> {
        Ok(self.encode(text)?.into_iter().map(|(_, id)| id).collect())
    }

    /// Joins the pieces for `ids` back into text, skipping control pieces.
    pub fn decode(&self, ids: &[TokenId]) -> Result<String> {
        let mut joined = String::new();
        for &id in ids {
            let piece = self.pieces.get(id as usize).ok_or_else(|| {
                SpvocabError::Internal(format!(
                    "token id {id} exceeds vocab size {}",
                    self.pieces.len()
                ))
            })?;
            if self.control_ids.contains(&id) {
                continue;
            }
            joined.push_str(piece);
        }
        let text = joined.replace(WS_STR, " ");
        match text.strip_prefix(' ') {
            Some(rest) if self.strip_dummy_prefix && joined.starts_with(WS_CHAR) => {
                Ok(rest.to_owned())
            }
            _ => Ok(text),
        }
    }
}

impl PieceEncoder for LongestMatchEncoder {
    fn encode_pieces(&self, text: &str) -> Result<Vec<String>> {
        Ok(self.encode(text)?.into_iter().map(|(piece, _)| piece).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NormalizerConfig, TrainerConfig};
    use crate::model::ModelPiece;

    fn piece(text: &str, kind: PieceKind) -> ModelPiece {
        ModelPiece {
            text: text.into(),
            score: 0.0,
            kind,
        }
    }

    fn model() -> ModelArtifact {
        let pieces = vec![
            piece("<unk>", PieceKind::Unknown),
            piece("<s>", PieceKind::Control),
            piece("<sep>", PieceKind::UserDefined),
            piece("\u{2581}", PieceKind::Normal),
            piece("\u{2581}pen", PieceKind::Normal),
            piece("a", PieceKind::Normal),
            piece("p", PieceKind::Normal),
            piece("e", PieceKind::Normal),
            piece("n", PieceKind::Normal),
        ];
        ModelArtifact::new(pieces, TrainerConfig::default(), NormalizerConfig::identity())
    }

    #[test]
    fn prefers_longest_piece() {
        let encoder = model().encoder().expect("encoder");
        assert_eq!(
            encoder.encode_pieces("pen  a").expect("encode"),
            vec!["\u{2581}pen", "\u{2581}", "a"]
        );
        assert_eq!(encoder.encode_ids("pen").expect("encode"), vec![4]);
    }

    #[test]
    fn user_defined_pieces_match_whole() {
        let encoder = model().encoder().expect("encoder");
        assert_eq!(
            encoder.encode_pieces("a<sep>").expect("encode"),
            vec!["\u{2581}", "a", "<sep>"]
        );
    }

    #[test]
    fn unmatched_characters_map_to_unknown() {
        let encoder = model().encoder().expect("encoder");
        let encoded = encoder.encode("pez").expect("encode");
        assert_eq!(encoded.last(), Some(&("z".to_owned(), 0)));
        assert_eq!(encoded[0], ("\u{2581}".to_owned(), 3));
    }

    #[test]
    fn decode_restores_text() {
        let encoder = model().encoder().expect("encoder");
        let ids = encoder.encode_ids("pen a").expect("encode");
        let mut with_control = vec![1];
        with_control.extend(ids);
        assert_eq!(encoder.decode(&with_control).expect("decode"), "pen a");
        assert!(encoder.decode(&[99]).is_err());
    }
}

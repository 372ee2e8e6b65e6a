//! Interleaving of meta pieces and learned pieces into the final vocabulary.

use log::info;
use rustc_hash::FxHashSet;

use crate::config::{ModelType, TrainerConfig};
use crate::encoder::PieceEncoder;
use crate::error::{Result, SpvocabError};
use crate::meta_pieces::MetaPieces;
use crate::model::{LearnedPiece, ModelArtifact, ModelPiece, PieceKind, SelfTestSample, TokenId};
use crate::text::piece_defect;

/// Builds the final piece list and the effective trainer configuration.
///
/// Identifiers `0..vocab_size` are visited in order: a registered meta piece
/// takes its own identifier, every other slot takes the next learned piece.
/// Every learned piece must be consumed.  Under soft enforcement (and always
/// for character models) the returned configuration records the actual piece
/// count as `vocab_size`; under hard enforcement the count must match exactly.
pub fn assemble_pieces(
    meta: &MetaPieces,
    learned: &[LearnedPiece],
    cfg: &TrainerConfig,
) -> Result<(Vec<ModelPiece>, TrainerConfig)> {
    let mut pieces: Vec<ModelPiece> = Vec::with_capacity(cfg.vocab_size.min(meta.len() + learned.len()));
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut remaining = learned.iter();

    for slot in 0..cfg.vocab_size {
        let id = TokenId::try_from(slot)
            .map_err(|_| SpvocabError::Internal(format!("slot {slot} exceeds u32")))?;
        let piece = if let Some(meta_piece) = meta.get(id) {
            if pieces.len() != slot {
                return Err(SpvocabError::Serialization(format!(
                    "meta piece `{}` requires id {slot}, but only {} pieces precede it",
                    meta_piece.text,
                    pieces.len()
                )));
            }
            ModelPiece {
                text: meta_piece.text.clone(),
                score: 0.0,
                kind: meta_piece.kind,
            }
        } else if let Some(learned_piece) = remaining.next() {
            ModelPiece {
                text: learned_piece.text.clone(),
                score: learned_piece.score,
                kind: PieceKind::Normal,
            }
        } else {
            continue;
        };

        if let Some(reason) = piece_defect(&piece.text) {
            return Err(SpvocabError::Serialization(format!(
                "invalid piece {:?} at id {slot}: {reason}",
                piece.text
            )));
        }
        if !seen.insert(piece.text.clone()) {
            return Err(SpvocabError::Serialization(format!(
                "piece {:?} is already defined",
                piece.text
            )));
        }
        pieces.push(piece);
    }

    let leftover = remaining.count();
    if leftover > 0 {
        return Err(SpvocabError::Serialization(format!(
            "{leftover} learned pieces do not fit into vocab_size {}",
            cfg.vocab_size
        )));
    }

    let mut effective = cfg.clone();
    let count = pieces.len();
    if !cfg.hard_vocab_limit || cfg.model_type == ModelType::Char {
        if count > cfg.vocab_size {
            return Err(SpvocabError::Serialization(format!(
                "{count} pieces exceed vocab_size {}",
                cfg.vocab_size
            )));
        }
        if count != cfg.vocab_size {
            info!("vocabulary size adjusted from {} to {count}", cfg.vocab_size);
        }
        effective.vocab_size = count;
    } else if count != cfg.vocab_size || seen.len() != cfg.vocab_size {
        return Err(SpvocabError::Serialization(format!(
            "vocabulary size too high ({}); the learner produced {count} pieces. \
             Set vocab_size <= {count} or disable hard_vocab_limit",
            cfg.vocab_size
        )));
    }

    Ok((pieces, effective))
}

/// Encodes each raw sample with `encoder` and stores the results in `model`.
pub fn attach_self_test<E>(model: &mut ModelArtifact, samples: &[String], encoder: &E) -> Result<()>
where
    E: PieceEncoder + ?Sized,
{
    let mut records = Vec::with_capacity(samples.len());
    for input in samples {
        let expected = encoder.encode_pieces(input)?.join(" ");
        records.push(SelfTestSample {
            input: input.clone(),
            expected,
        });
    }
    model.set_self_test_samples(records);
    Ok(())
}

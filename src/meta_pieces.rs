//! Identifier allocation for reserved and user supplied meta pieces.

use std::collections::{BTreeMap, HashSet};

use log::debug;

use crate::config::TrainerConfig;
use crate::error::{Result, SpvocabError};
use crate::model::{PieceKind, TokenId};
use crate::text::piece_defect;

/// A reserved vocabulary entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaPiece {
    /// Surface text of the piece.
    pub text: String,
    /// Category of the piece; never [`PieceKind::Normal`].
    pub kind: PieceKind,
}

/// Mapping from identifier to meta piece, built once per training run.
///
/// Allocation is deterministic: the four reserved pieces take their configured
/// identifiers first, then control symbols and user defined symbols (in
/// configuration order) take the smallest free identifiers.  A symbol whose
/// text equals an enabled `bos`/`eos`/`pad` piece re-categorises that entry
/// instead of consuming a new identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaPieces {
    pieces: BTreeMap<TokenId, MetaPiece>,
}

impl MetaPieces {
    /// Allocates meta piece identifiers for the supplied configuration.
    pub fn from_config(cfg: &TrainerConfig) -> Result<Self> {
        let mut registry = Self::default();
        let vocab_size = cfg.vocab_size;

        let reserved = [
            ("unk_id", cfg.unk_id, &cfg.unk_piece),
            ("bos_id", cfg.bos_id, &cfg.bos_piece),
            ("eos_id", cfg.eos_id, &cfg.eos_piece),
            ("pad_id", cfg.pad_id, &cfg.pad_piece),
        ];
        for (field, id, text) in reserved {
            let Some(id) = id else { continue };
            if id as usize >= vocab_size {
                return Err(SpvocabError::config(
                    field,
                    format!("id {id} is outside the vocabulary [0, {vocab_size})"),
                ));
            }
            if let Some(existing) = registry.pieces.get(&id) {
                return Err(SpvocabError::config(
                    field,
                    format!("id {id} is already assigned to `{}`", existing.text),
                ));
            }
            if registry.pieces.values().any(|piece| &piece.text == text) {
                return Err(SpvocabError::config(
                    field,
                    format!("`{text}` is already registered under another id"),
                ));
            }
            let kind = if field == "unk_id" {
                PieceKind::Unknown
            } else {
                PieceKind::Control
            };
            registry.pieces.insert(
                id,
                MetaPiece {
                    text: text.clone(),
                    kind,
                },
            );
        }

        if registry.unknown_id().is_none() {
            return Err(SpvocabError::config(
                "unk_id",
                format!("{} must be defined", cfg.unk_piece),
            ));
        }

        let mut seen = HashSet::new();
        let mut next_id: TokenId = 0;
        let symbols = cfg
            .control_symbols
            .iter()
            .map(|text| ("control_symbols", text, PieceKind::Control))
            .chain(
                cfg.user_defined_symbols
                    .iter()
                    .map(|text| ("user_defined_symbols", text, PieceKind::UserDefined)),
            );
        for (field, text, kind) in symbols {
            if let Some(reason) = piece_defect(text) {
                return Err(SpvocabError::config(field, format!("{text:?}: {reason}")));
            }
            if !seen.insert(text.as_str()) {
                return Err(SpvocabError::config(
                    field,
                    format!("{text} is already defined"),
                ));
            }
            if *text == cfg.unk_piece {
                return Err(SpvocabError::config(
                    field,
                    format!(
                        "{} must not be defined as a control or user defined symbol",
                        cfg.unk_piece
                    ),
                ));
            }

            let alias = [
                (&cfg.bos_piece, cfg.bos_id),
                (&cfg.eos_piece, cfg.eos_id),
                (&cfg.pad_piece, cfg.pad_id),
            ]
            .into_iter()
            .find_map(|(reserved, id)| if reserved == text { id } else { None });

            if let Some(id) = alias {
                debug!("meta piece {text} re-categorised as {kind:?} at id {id}");
                if let Some(piece) = registry.pieces.get_mut(&id) {
                    piece.kind = kind;
                }
                continue;
            }

            while registry.pieces.contains_key(&next_id) {
                next_id += 1;
            }
            if next_id as usize >= vocab_size {
                return Err(SpvocabError::config(
                    field,
                    format!("no free id below vocab_size {vocab_size} for {text}"),
                ));
            }
            registry.pieces.insert(
                next_id,
                MetaPiece {
                    text: text.clone(),
                    kind,
                },
            );
        }

        Ok(registry)
    }

    /// Returns the meta piece registered at `id`, if any.
    #[must_use]
    pub fn get(&self, id: TokenId) -> Option<&MetaPiece> {
        self.pieces.get(&id)
    }

    /// Number of registered meta pieces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    /// Returns `true` when no meta piece is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Iterates over `(id, piece)` pairs in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (TokenId, &MetaPiece)> {
        self.pieces.iter().map(|(&id, piece)| (id, piece))
    }

    /// Iterates over the surface texts of all meta pieces.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.pieces.values().map(|piece| piece.text.as_str())
    }

    /// Identifier of the unknown piece.
    #[must_use]
    pub fn unknown_id(&self) -> Option<TokenId> {
        self.iter()
            .find(|(_, piece)| piece.kind == PieceKind::Unknown)
            .map(|(id, _)| id)
    }
}

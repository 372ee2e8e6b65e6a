//! Plain text `.vocab` listing.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{Result, SpvocabError};
use crate::model::{ModelArtifact, ModelPiece};

/// Writes one `piece<TAB>score` line per piece.
///
/// Scores use the shortest representation that parses back to the same `f32`.
pub fn write_vocab<W: Write>(pieces: &[ModelPiece], mut writer: W) -> std::io::Result<()> {
    for piece in pieces {
        writeln!(writer, "{}\t{}", piece.text, piece.score)?;
    }
    writer.flush()
}

/// Writes the vocabulary listing of `model` to `path`.
pub fn save_vocab<P: AsRef<Path>>(model: &ModelArtifact, path: P) -> Result<()> {
    let path = path.as_ref();
    let io_err = |err| SpvocabError::io(err, Some(path.to_path_buf()));
    let file = File::create(path).map_err(io_err)?;
    write_vocab(model.pieces(), BufWriter::new(file)).map_err(io_err)
}

/// Reads a listing written by [`save_vocab`] back into `(piece, score)` pairs.
pub fn read_vocab<P: AsRef<Path>>(path: P) -> Result<Vec<(String, f32)>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| SpvocabError::io(err, Some(path.to_path_buf())))?;
    let mut entries = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|err| SpvocabError::io(err, Some(path.to_path_buf())))?;
        let (piece, score) = line.rsplit_once('\t').ok_or_else(|| {
            SpvocabError::Serialization(format!(
                "{}:{}: expected `piece<TAB>score`",
                path.display(),
                idx + 1
            ))
        })?;
        let score: f32 = score.parse().map_err(|_| {
            SpvocabError::Serialization(format!(
                "{}:{}: invalid score `{score}`",
                path.display(),
                idx + 1
            ))
        })?;
        entries.push((piece.to_owned(), score));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PieceKind;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn listing_reproduces_pieces_and_scores() {
        let pieces: Vec<ModelPiece> = [("<unk>", 0.0), ("\u{2581}", -1.609_438), ("abc", -0.1)]
            .into_iter()
            .map(|(text, score)| ModelPiece {
                text: text.into(),
                score,
                kind: PieceKind::Normal,
            })
            .collect();
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("m.vocab");
        write_vocab(&pieces, File::create(&path).expect("create")).expect("write");

        let raw = fs::read_to_string(&path).expect("read raw");
        assert!(raw.starts_with("<unk>\t0\n"));

        let entries = read_vocab(&path).expect("read vocab");
        let expected: Vec<(String, f32)> = pieces.iter().map(|p| (p.text.clone(), p.score)).collect();
        assert_eq!(entries, expected);
    }

    #[test]
    fn malformed_listing_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("bad.vocab");
        fs::write(&path, "a\t0\nb\tnope\n").expect("write");
        assert!(matches!(
            read_vocab(&path),
            Err(SpvocabError::Serialization(_))
        ));
    }
}

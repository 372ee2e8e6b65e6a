//! Binary `.model` record.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::debug;

use crate::error::{Result, SpvocabError};
use crate::model::ModelArtifact;

const MAGIC: &[u8; 8] = b"SPVOCAB\x01";

/// Writes `model` to `path` as a magic header followed by a bincode record.
pub fn save_model<P: AsRef<Path>>(model: &ModelArtifact, path: P) -> Result<()> {
    let path = path.as_ref();
    let io_err = |err| SpvocabError::io(err, Some(path.to_path_buf()));
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(MAGIC).map_err(io_err)?;
    bincode::serialize_into(&mut writer, model)?;
    writer.flush().map_err(io_err)?;
    debug!("wrote {} pieces to {}", model.vocab_size(), path.display());
    Ok(())
}

/// Reads a model written by [`save_model`].
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<ModelArtifact> {
    let path = path.as_ref();
    let io_err = |err| SpvocabError::io(err, Some(path.to_path_buf()));
    let file = File::open(path).map_err(io_err)?;
    let mut reader = BufReader::new(file);
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic).map_err(io_err)?;
    if &magic != MAGIC {
        return Err(SpvocabError::Serialization(format!(
            "{} is not a spvocab model file",
            path.display()
        )));
    }
    Ok(bincode::deserialize_from(reader)?)
}

//! Final vocabulary assembly and the on-disk model formats.
//!
//! A trained model is written as two files sharing a prefix:
//!
//! * `<prefix>.model`: a bincode record of the [`crate::model::ModelArtifact`],
//!   preceded by a short magic header.
//! * `<prefix>.vocab`: one `piece<TAB>score` line per piece in identifier order.

pub mod assemble;
pub mod binary;
pub mod vocab;

pub use assemble::{assemble_pieces, attach_self_test};
pub use binary::{load_model, save_model};
pub use vocab::{read_vocab, save_vocab, write_vocab};

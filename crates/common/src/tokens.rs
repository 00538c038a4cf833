//! Reserved token ids, shared between the data pipeline and the trainer.
//!
//! The ids are fixed by the corpus preprocessing; every vocabulary places
//! the four specials at the same indices.

/// Padding id. Positions equal to PAD are excluded from the reconstruction
/// loss and from accuracy, numerator and denominator both.
pub const PAD: u32 = 0;
/// Out-of-vocabulary id.
pub const UNK: u32 = 1;
/// Beginning-of-sequence id, fed to the decoder at step zero.
pub const BOS: u32 = 2;
/// End-of-sequence id; greedy decoding stops when the model emits it.
pub const EOS: u32 = 3;

pub const PAD_TOKEN: &str = "<pad>";
pub const UNK_TOKEN: &str = "<unk>";
pub const BOS_TOKEN: &str = "<s>";
pub const EOS_TOKEN: &str = "</s>";

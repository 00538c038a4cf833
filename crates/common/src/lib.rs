//! # dualgraph-common — Shared Primitives
//!
//! Types and contracts shared across the workspace:
//!
//! * **[`TrainConfig`]** — run hyper-parameters (serialised as JSON).
//! * **[`Batch`]** / **[`ModelOutput`]** — the tensor-level data model.
//! * **[`Graph2seq`]** — the contract the trainer drives the model through.
//! * **[`BatchSource`]** — restartable per-epoch batch supplier.
//! * **[`Vocab`]** — id → display-token lookup for sampling output.
//! * **[`tokens`]** — reserved token ids (PAD, UNK, BOS, EOS).

pub mod batch;
pub mod config;
pub mod tokens;
pub mod vocab;

pub use batch::{Batch, BatchSource, Graph2seq, ModelOutput};
pub use config::{SaveMode, TrainConfig};
pub use vocab::Vocab;

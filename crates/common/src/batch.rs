//! Batch data model and the two external-collaborator contracts.
//!
//! The trainer is generic over its seams: [`Graph2seq`] (the neural model)
//! and [`BatchSource`] (the data pipeline). Batches arrive already collated
//! and padded; the trainer only moves them to the compute device and feeds
//! them through the model.

use candle_core::{Device, Result, Tensor};

// ── Batch ───────────────────────────────────────────────────────────────────

/// One collated mini-batch. Every tensor shares the leading batch dimension.
///
/// Invariants maintained by the collator: `tgt_seq` is padded with PAD to
/// the corpus-wide maximum reference length, and node lengths never exceed
/// the second dimension of the matching adjacency tensor.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Equation-graph node features, `(batch, equ_nodes, ...)`.
    pub equ_nodes: Tensor,
    /// Equation-graph adjacency, `(batch, equ_nodes, equ_nodes)`.
    pub equ_adj: Tensor,
    /// Real equation-graph node count per example, `(batch,)`.
    pub equ_node_lens: Tensor,
    /// Commonsense-graph node features, `(batch, sns_nodes, ...)`.
    pub sns_nodes: Tensor,
    /// Commonsense-graph adjacency, `(batch, sns_nodes, sns_nodes)`.
    pub sns_adj: Tensor,
    /// Real commonsense-graph node count per example, `(batch,)`.
    pub sns_node_lens: Tensor,
    /// Gold token ids, `(batch, max_token_seq_len)`, PAD-padded.
    pub tgt_seq: Tensor,
    /// Scene feature vector, `(batch, scene_dim)`.
    pub scene: Tensor,
}

impl Batch {
    /// Copy every field to `device`.
    ///
    /// A blocking host-to-accelerator transfer, performed once per batch.
    /// Spelled out field by field so the transfer contract stays visible at
    /// the type level rather than hidden behind a generic move-everything.
    pub fn to_device(&self, device: &Device) -> Result<Batch> {
        Ok(Batch {
            equ_nodes: self.equ_nodes.to_device(device)?,
            equ_adj: self.equ_adj.to_device(device)?,
            equ_node_lens: self.equ_node_lens.to_device(device)?,
            sns_nodes: self.sns_nodes.to_device(device)?,
            sns_adj: self.sns_adj.to_device(device)?,
            sns_node_lens: self.sns_node_lens.to_device(device)?,
            tgt_seq: self.tgt_seq.to_device(device)?,
            scene: self.scene.to_device(device)?,
        })
    }

    /// Number of examples in the batch.
    pub fn n_sequences(&self) -> Result<usize> {
        self.tgt_seq.dim(0)
    }
}

// ── ModelOutput ─────────────────────────────────────────────────────────────

/// Everything one forward pass produces.
#[derive(Debug)]
pub struct ModelOutput {
    /// Token logits flattened to `(batch · seq_len, vocab_size)`, one row
    /// per predicted position of the flattened gold sequence.
    pub logits: Tensor,
    /// Posterior (recognition) Gaussian mean, conditioned on the gold target.
    pub recog_mu: Tensor,
    /// Posterior log-variance.
    pub recog_logvar: Tensor,
    /// Prior Gaussian mean, conditioned on the input graphs alone.
    pub prior_mu: Tensor,
    /// Prior log-variance.
    pub prior_logvar: Tensor,
    /// Decoder attention over commonsense-graph nodes, one tensor per
    /// decoded position.
    pub plan_attns: Vec<Tensor>,
}

// ── Contracts ───────────────────────────────────────────────────────────────

/// The model contract the training loop drives.
///
/// The architecture behind it (graph encoders, latent sampling, attention
/// decoder) is the model crate's concern; the trainer only relies on the
/// shapes documented on [`ModelOutput`].
pub trait Graph2seq {
    /// Teacher-forced forward pass over a whole batch.
    fn forward(&self, batch: &Batch, device: &Device) -> Result<ModelOutput>;

    /// Greedy autoregressive decoding of the example at `index`.
    ///
    /// Returns the generated token ids (terminated by EOS or by reaching
    /// `max_len`) and the per-step attention distribution over the
    /// commonsense-graph nodes.
    fn decode(
        &self,
        batch: &Batch,
        index: usize,
        device: &Device,
        max_len: usize,
    ) -> Result<(Vec<u32>, Vec<Tensor>)>;
}

/// A finite, restartable-per-epoch supplier of batches.
///
/// Each call to [`batches`](Self::batches) starts a fresh pass; shuffling
/// (for training sources) happens inside the implementation.
pub trait BatchSource {
    /// Number of batches one pass will yield, for progress display.
    fn n_batches(&self) -> usize;

    /// Start one pass over the source.
    fn batches(&self) -> Box<dyn Iterator<Item = Batch> + '_>;
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;

    fn toy_batch(device: &Device) -> Batch {
        let b = 2usize;
        let n = 3usize;
        Batch {
            equ_nodes: Tensor::zeros((b, n), DType::U32, device).unwrap(),
            equ_adj: Tensor::zeros((b, n, n), DType::F32, device).unwrap(),
            equ_node_lens: Tensor::new(&[2u32, 3], device).unwrap(),
            sns_nodes: Tensor::zeros((b, n), DType::U32, device).unwrap(),
            sns_adj: Tensor::zeros((b, n, n), DType::F32, device).unwrap(),
            sns_node_lens: Tensor::new(&[3u32, 1], device).unwrap(),
            tgt_seq: Tensor::new(&[[1u32, 2, 0], [1, 2, 3]], device).unwrap(),
            scene: Tensor::zeros((b, 4), DType::F32, device).unwrap(),
        }
    }

    #[test]
    fn to_device_preserves_shapes() {
        let device = Device::Cpu;
        let batch = toy_batch(&device);
        let moved = batch.to_device(&device).unwrap();
        assert_eq!(moved.tgt_seq.dims(), batch.tgt_seq.dims());
        assert_eq!(moved.equ_adj.dims(), batch.equ_adj.dims());
        assert_eq!(moved.scene.dims(), batch.scene.dims());
    }

    #[test]
    fn n_sequences_is_leading_dim() {
        let batch = toy_batch(&Device::Cpu);
        assert_eq!(batch.n_sequences().unwrap(), 2);
    }
}

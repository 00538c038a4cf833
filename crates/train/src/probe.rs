//! Qualitative sampling during training.

use candle_core::{Device, Tensor};

use dualgraph_common::{Batch, Graph2seq, Vocab};

/// Greedy-decoding probe over a fixed held-out batch.
///
/// Runs whenever the `best` checkpoint is refreshed, purely for human
/// progress inspection: nothing it computes feeds back into metrics or
/// parameters. The batch is chosen explicitly up front rather than reusing
/// whatever a loader last yielded.
pub struct SamplingProbe {
    batch: Batch,
    vocab: Vocab,
    max_len: usize,
    n_show: usize,
}

impl SamplingProbe {
    /// Probe over `batch`, decoding up to `max_len` tokens per example.
    /// Shows the first three examples.
    pub fn new(batch: Batch, vocab: Vocab, max_len: usize) -> Self {
        Self {
            batch,
            vocab,
            max_len,
            n_show: 3,
        }
    }

    /// Decode the show-case examples and log the generated strings plus one
    /// stacked attention tensor.
    pub fn run<M: Graph2seq>(&self, model: &M, device: &Device) -> anyhow::Result<()> {
        let batch = self.batch.to_device(device)?;
        let n = self.n_show.min(batch.n_sequences()?);
        tracing::info!("show case during training");
        let mut last_attns: Vec<Tensor> = Vec::new();
        for i in 0..n {
            let (ids, attns) = model.decode(&batch, i, device, self.max_len)?;
            tracing::info!(example = i, text = %self.vocab.decode(&ids), "sampled");
            last_attns = attns;
        }
        if !last_attns.is_empty() {
            // One per-step distribution per decoded token, stacked on the
            // step axis for eyeballing.
            let stacked = Tensor::stack(&last_attns, 1)?;
            tracing::info!(attention = ?stacked, "probe attention");
        }
        Ok(())
    }
}

//! Mock implementations of the trainer's seams for testing without a real
//! graph encoder/decoder stack.
//!
//! [`MockModel`] emits logits from a single trainable `Var`, so the full
//! backward → optimiser-step path is exercised, and Gaussian parameters
//! with a configurable posterior/prior gap, so KL behaviour is observable.

use candle_core::{DType, Device, Result, Tensor, Var};
use candle_nn::VarMap;

use dualgraph_common::{tokens, Batch, BatchSource, Graph2seq, ModelOutput};

/// Latent width every mock output uses.
const MOCK_Z_DIM: usize = 2;

// ── MockModel ───────────────────────────────────────────────────────────────

/// Model double: fixed, trainable logits; zero-variance-gap Gaussians with
/// an optional mean shift between posterior and prior.
pub struct MockModel {
    logits: Var,
    /// Posterior mean minus prior mean, per latent dimension.
    pub recog_mu_shift: f64,
}

impl MockModel {
    /// Build a mock whose logits put a sharp peak on each position of
    /// `gold` (row-major, `rows × vocab_size`), registered in `varmap` so
    /// the trainer's optimiser owns it.
    pub fn peaked(
        varmap: &VarMap,
        gold: &[u32],
        vocab_size: usize,
        device: &Device,
    ) -> Result<Self> {
        let mut values = vec![0.0f32; gold.len() * vocab_size];
        for (row, &id) in gold.iter().enumerate() {
            values[row * vocab_size + id as usize] = 5.0;
        }
        let logits = Var::from_tensor(&Tensor::from_vec(
            values,
            (gold.len(), vocab_size),
            device,
        )?)?;
        varmap
            .data()
            .lock()
            .unwrap()
            .insert("mock_logits".to_string(), logits.clone());
        Ok(Self {
            logits,
            recog_mu_shift: 0.0,
        })
    }

    pub fn with_recog_shift(mut self, shift: f64) -> Self {
        self.recog_mu_shift = shift;
        self
    }
}

impl Graph2seq for MockModel {
    fn forward(&self, batch: &Batch, device: &Device) -> Result<ModelOutput> {
        let b = batch.n_sequences()?;
        let recog_mu = Tensor::full(self.recog_mu_shift as f32, (b, MOCK_Z_DIM), device)?;
        let zeros = Tensor::zeros((b, MOCK_Z_DIM), DType::F32, device)?;
        Ok(ModelOutput {
            logits: self.logits.as_tensor().clone(),
            recog_mu,
            recog_logvar: zeros.clone(),
            prior_mu: zeros.clone(),
            prior_logvar: zeros,
            plan_attns: vec![Tensor::zeros((b, 3), DType::F32, device)?; 2],
        })
    }

    fn decode(
        &self,
        _batch: &Batch,
        _index: usize,
        device: &Device,
        max_len: usize,
    ) -> Result<(Vec<u32>, Vec<Tensor>)> {
        let ids: Vec<u32> = [4, 5, tokens::EOS]
            .into_iter()
            .take(max_len)
            .collect();
        let attns = ids
            .iter()
            .map(|_| Tensor::zeros((1, 3), DType::F32, device))
            .collect::<Result<Vec<_>>>()?;
        Ok((ids, attns))
    }
}

// ── VecBatchSource ──────────────────────────────────────────────────────────

/// In-memory batch source; each pass replays the same batches in order.
pub struct VecBatchSource {
    batches: Vec<Batch>,
}

impl VecBatchSource {
    pub fn new(batches: Vec<Batch>) -> Self {
        Self { batches }
    }
}

impl BatchSource for VecBatchSource {
    fn n_batches(&self) -> usize {
        self.batches.len()
    }

    fn batches(&self) -> Box<dyn Iterator<Item = Batch> + '_> {
        Box::new(self.batches.iter().cloned())
    }
}

// ── Batch builder ───────────────────────────────────────────────────────────

/// Minimal well-formed batch around a padded gold matrix (`batch × seq_len`
/// token ids, row-major).
pub fn batch_from_gold(
    gold: Vec<u32>,
    batch_size: usize,
    seq_len: usize,
    device: &Device,
) -> Result<Batch> {
    let n = 3usize;
    Ok(Batch {
        equ_nodes: Tensor::zeros((batch_size, n), DType::U32, device)?,
        equ_adj: Tensor::zeros((batch_size, n, n), DType::F32, device)?,
        equ_node_lens: Tensor::full(n as u32, (batch_size,), device)?,
        sns_nodes: Tensor::zeros((batch_size, n), DType::U32, device)?,
        sns_adj: Tensor::zeros((batch_size, n, n), DType::F32, device)?,
        sns_node_lens: Tensor::full(n as u32, (batch_size,), device)?,
        tgt_seq: Tensor::from_vec(gold, (batch_size, seq_len), device)?,
        scene: Tensor::zeros((batch_size, 4), DType::F32, device)?,
    })
}

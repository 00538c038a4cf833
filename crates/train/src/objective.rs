//! The variational objective: masked reconstruction plus analytic Gaussian
//! KL, scaled by the epoch's anneal weight.

use candle_core::{DType, Result, Tensor, D};
use candle_nn::ops;

use dualgraph_common::tokens::PAD;

// ── LossBundle ──────────────────────────────────────────────────────────────

/// Losses for one batch.
///
/// `total` stays attached to the autograd graph so the caller can run
/// backward; the component terms are plain scalars for bookkeeping.
/// Invariant: `total = reconstruction + kl`, with the anneal weight already
/// folded into `kl`.
#[derive(Debug)]
pub struct LossBundle {
    /// `reconstruction + β·KL`, graph-attached.
    pub total: Tensor,
    /// Summed cross-entropy over non-PAD positions.
    pub reconstruction: f64,
    /// β-scaled KL, summed over latent dimensions and batch.
    pub kl: f64,
    /// Non-PAD positions where `argmax(logits)` equals gold.
    pub n_correct: usize,
}

// ── Objective ───────────────────────────────────────────────────────────────

/// Compute the batch objective.
///
/// * `logits` — `(batch · seq_len, vocab_size)`, one row per flattened
///   position of `gold`.
/// * `gold` — `(batch, seq_len)` PAD-padded token ids.
///
/// Reconstruction is *summed* (not averaged) cross-entropy over non-PAD
/// positions; PAD positions contribute to neither the loss nor `n_correct`.
/// The KL between the diagonal-Gaussian posterior and prior is summed over
/// latent dimensions, then over the batch, then scaled by `beta`.
///
/// The closed form assumes `prior_logvar` is well-scaled: nothing clamps
/// the `exp(prior_logvar)` denominator, so a strongly negative prior
/// log-variance blows the quotients up.
pub fn variational_loss(
    logits: &Tensor,
    gold: &Tensor,
    recog_mu: &Tensor,
    recog_logvar: &Tensor,
    prior_mu: &Tensor,
    prior_logvar: &Tensor,
    beta: f64,
) -> Result<LossBundle> {
    let gold = gold.flatten_all()?.to_dtype(DType::U32)?;
    let mask = gold.ne(PAD)?.to_dtype(DType::F32)?;

    // Summed cross-entropy with PAD excluded (candle has no ignore_index).
    let log_probs = ops::log_softmax(logits, D::Minus1)?;
    let picked = log_probs
        .gather(&gold.unsqueeze(D::Minus1)?, D::Minus1)?
        .squeeze(D::Minus1)?;
    let reconstruction = picked.neg()?.mul(&mask)?.sum_all()?;

    let kl = gaussian_kld(recog_mu, recog_logvar, prior_mu, prior_logvar)?.affine(beta, 0.0)?;
    let total = (&reconstruction + &kl)?;

    let pred = logits.argmax(D::Minus1)?;
    let n_correct = pred
        .eq(&gold)?
        .to_dtype(DType::F32)?
        .mul(&mask)?
        .sum_all()?
        .to_scalar::<f32>()? as usize;

    Ok(LossBundle {
        reconstruction: reconstruction.to_scalar::<f32>()? as f64,
        kl: kl.to_scalar::<f32>()? as f64,
        n_correct,
        total,
    })
}

/// Closed-form `KL( N(recog_mu, recog_logvar) ‖ N(prior_mu, prior_logvar) )`
/// for diagonal Gaussians, summed over latent dimensions and over the batch:
///
/// `-0.5 · Σ [ 1 + (logσ²_q - logσ²_p) - (μ_p - μ_q)² / σ²_p - σ²_q / σ²_p ]`
pub fn gaussian_kld(
    recog_mu: &Tensor,
    recog_logvar: &Tensor,
    prior_mu: &Tensor,
    prior_logvar: &Tensor,
) -> Result<Tensor> {
    let prior_var = prior_logvar.exp()?;
    let logvar_diff = (recog_logvar - prior_logvar)?;
    let mu_term = ((prior_mu - recog_mu)?.sqr()? / &prior_var)?;
    let var_term = (recog_logvar.exp()? / &prior_var)?;
    let inner = ((logvar_diff.affine(1.0, 1.0)? - mu_term)? - var_term)?;
    inner.sum_all()?.affine(-0.5, 0.0)
}

/// Non-PAD position count of a padded gold tensor — the token denominator
/// for loss and accuracy normalisation.
pub fn non_pad_count(gold: &Tensor) -> Result<usize> {
    let count = gold
        .flatten_all()?
        .ne(PAD)?
        .to_dtype(DType::F32)?
        .sum_all()?
        .to_scalar::<f32>()?;
    Ok(count as usize)
}

// ── Tests ───────────────────────────────────────────────────────────────────

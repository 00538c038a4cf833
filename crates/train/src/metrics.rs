//! Epoch-level metric accumulation.

// ── EpochMetrics ────────────────────────────────────────────────────────────

/// Running sums for one pass over a batch source.
///
/// Created fresh at epoch start, folded once per batch, consumed exactly
/// once by [`finish`](EpochMetrics::finish).
#[derive(Debug, Clone, Default)]
pub struct EpochMetrics {
    total_loss: f64,
    total_recon: f64,
    total_kl: f64,
    n_correct: usize,
    n_tokens: usize,
    n_sequences: usize,
}

impl EpochMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one batch. `n_tokens` is the batch's non-PAD position count,
    /// `n_sequences` its example count.
    pub fn record(
        &mut self,
        loss: f64,
        reconstruction: f64,
        kl: f64,
        n_correct: usize,
        n_tokens: usize,
        n_sequences: usize,
    ) {
        self.total_loss += loss;
        self.total_recon += reconstruction;
        self.total_kl += kl;
        self.n_correct += n_correct;
        self.n_tokens += n_tokens;
        self.n_sequences += n_sequences;
    }

    /// Normalise into the four epoch scalars.
    ///
    /// Loss, accuracy, and reconstruction are per *token*; KL is per
    /// *sequence*. The KL is a per-example quantity, so the denominators
    /// differ on purpose — collapsing them would shift every reported KL by
    /// a factor of the mean sequence length and break comparability with
    /// existing runs.
    ///
    /// A pass that saw zero non-PAD tokens divides by zero here; that is a
    /// precondition violation of the batch source, surfaced as NaN/inf in
    /// the logs rather than caught.
    pub fn finish(self) -> EpochSummary {
        EpochSummary {
            loss_per_token: self.total_loss / self.n_tokens as f64,
            accuracy: self.n_correct as f64 / self.n_tokens as f64,
            recon_per_token: self.total_recon / self.n_tokens as f64,
            kl_per_sequence: self.total_kl / self.n_sequences as f64,
        }
    }
}

// ── EpochSummary ────────────────────────────────────────────────────────────

/// The four normalised scalars one epoch pass reports.
#[derive(Debug, Clone, Copy)]
pub struct EpochSummary {
    pub loss_per_token: f64,
    /// Fraction of non-PAD positions predicted exactly.
    pub accuracy: f64,
    pub recon_per_token: f64,
    pub kl_per_sequence: f64,
}

impl EpochSummary {
    /// `exp(min(loss, 100))` — the clamp keeps a diverging loss from
    /// overflowing the exponential in display output.
    pub fn perplexity(&self) -> f64 {
        self.loss_per_token.min(100.0).exp()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

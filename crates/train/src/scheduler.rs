//! KL annealing and learning-rate scheduling.

use candle_core::backprop::GradStore;
use candle_core::Result;
use candle_nn::{AdamW, Optimizer};

// ── Cyclical KL annealing ───────────────────────────────────────────────────

/// Cyclical linear annealing of the KL weight.
///
/// The run is split into `n_cycle` equal segments; within each, β rises
/// linearly from `start` to `stop` over the first `ratio` of the segment
/// and holds at `stop` for the rest. Withholding the KL penalty early —
/// and repeatedly — keeps the posterior from collapsing onto the prior
/// before the decoder has learned to use the latent.
///
/// Positions no ramp reaches (including everything past the last cycle)
/// hold at `stop`.
pub fn frange_cycle_linear(
    start: f64,
    stop: f64,
    n_epoch: usize,
    n_cycle: usize,
    ratio: f64,
) -> Vec<f64> {
    let mut weights = vec![stop; n_epoch];
    if n_epoch == 0 || n_cycle == 0 {
        return weights;
    }
    let period = n_epoch as f64 / n_cycle as f64;
    let step = (stop - start) / (period * ratio);
    for cycle in 0..n_cycle {
        let mut v = start;
        let mut i = 0usize;
        loop {
            let idx = (i as f64 + cycle as f64 * period) as usize;
            if v > stop || idx >= n_epoch {
                break;
            }
            weights[idx] = v;
            v += step;
            i += 1;
        }
    }
    weights
}

/// Precomputed per-epoch KL weights. Immutable once built; the training
/// loop only ever reads it.
#[derive(Debug, Clone)]
pub struct KlAnneal {
    weights: Vec<f64>,
}

impl KlAnneal {
    /// Default cyclic schedule: four cycles, ramp over the first half of
    /// each.
    pub fn new(start: f64, stop: f64, n_epoch: usize) -> Self {
        Self::with_cycles(start, stop, n_epoch, 4, 0.5)
    }

    pub fn with_cycles(start: f64, stop: f64, n_epoch: usize, n_cycle: usize, ratio: f64) -> Self {
        Self {
            weights: frange_cycle_linear(start, stop, n_epoch, n_cycle, ratio),
        }
    }

    /// β for `epoch`. Panics past `n_epoch`; the loop never asks.
    pub fn beta(&self, epoch: usize) -> f64 {
        self.weights[epoch]
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

// ── Scheduled optimiser ─────────────────────────────────────────────────────

/// Adam behind the warmup / inverse-square-root schedule:
///
/// `lr = hidden_size^-0.5 · min(t^-0.5, t · warmup^-1.5)`
///
/// — linear rise for `t ≤ warmup`, `t^-0.5` decay after, no fixed total
/// step count. The step counter spans the whole run and is never reset at
/// epoch boundaries.
pub struct ScheduledAdam {
    inner: AdamW,
    scale: f64,
    warmup: f64,
    n_steps: usize,
}

impl ScheduledAdam {
    pub fn new(inner: AdamW, hidden_size: usize, n_warmup_steps: usize) -> Self {
        Self {
            inner,
            scale: (hidden_size as f64).powf(-0.5),
            warmup: n_warmup_steps as f64,
            n_steps: 0,
        }
    }

    /// Learning rate the schedule assigns to step `t` (1-based).
    pub fn lr_at(&self, t: usize) -> f64 {
        let t = t as f64;
        self.scale * t.powf(-0.5).min(t * self.warmup.powf(-1.5))
    }

    /// Advance the counter, write the new rate into the wrapped optimiser,
    /// and apply the parameter update. Gradient zeroing is the caller's
    /// responsibility before the next forward pass.
    pub fn step_and_update_lr(&mut self, grads: &GradStore) -> Result<()> {
        self.n_steps += 1;
        let lr = self.lr_at(self.n_steps);
        self.inner.set_learning_rate(lr);
        self.inner.step(grads)
    }

    /// Steps taken so far across the whole run.
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Rate currently set on the wrapped optimiser.
    pub fn learning_rate(&self) -> f64 {
        self.inner.learning_rate()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

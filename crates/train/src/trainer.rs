//! Trainer: epoch runner and the outer training loop.
//!
//! [`Trainer`] owns the model, the scheduled optimiser, and the run-scoped
//! state (step counter, validation-accuracy history). A single call to
//! [`Trainer::fit`] drives the whole run: per epoch a training pass with the
//! scheduled β, an evaluation pass pinned to β = 1, console and file
//! logging, checkpointing under the configured policy, and a qualitative
//! sampling pass whenever the best checkpoint is refreshed.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::Device;
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarMap};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

use dualgraph_common::{Batch, BatchSource, Graph2seq, SaveMode, TrainConfig};

use crate::metrics::{EpochMetrics, EpochSummary};
use crate::objective::{non_pad_count, variational_loss, LossBundle};
use crate::probe::SamplingProbe;
use crate::scheduler::{KlAnneal, ScheduledAdam};

/// Adam moment decays; β₂ = 0.98 pairs with the warmup/inverse-sqrt rule.
const ADAM_BETAS: (f64, f64) = (0.9, 0.98);
const ADAM_EPS: f64 = 1e-9;

// ── Trainer ─────────────────────────────────────────────────────────────────

/// The training engine. Owns the model, its parameter map, the scheduled
/// optimiser, and the validation-accuracy history; lives for exactly one
/// run.
pub struct Trainer<M: Graph2seq> {
    pub model: M,
    pub varmap: VarMap,
    optimizer: ScheduledAdam,
    config: TrainConfig,
    device: Device,
    valid_accus: Vec<f64>,
}

impl<M: Graph2seq> Trainer<M> {
    /// Build a trainer around an already-constructed model and the `VarMap`
    /// holding its parameters.
    pub fn new(
        model: M,
        varmap: VarMap,
        config: TrainConfig,
        device: Device,
    ) -> anyhow::Result<Self> {
        let adam = AdamW::new(
            varmap.all_vars(),
            ParamsAdamW {
                lr: 0.0, // overwritten before the first step
                beta1: ADAM_BETAS.0,
                beta2: ADAM_BETAS.1,
                eps: ADAM_EPS,
                weight_decay: 0.0,
            },
        )?;
        let optimizer = ScheduledAdam::new(adam, config.hidden_size, config.n_warmup_steps);
        Ok(Self {
            model,
            varmap,
            optimizer,
            config,
            device,
            valid_accus: Vec::new(),
        })
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Optimiser steps taken so far; spans epochs without resetting.
    pub fn global_step(&self) -> usize {
        self.optimizer.n_steps()
    }

    // ── Epoch runner ────────────────────────────────────────────────────────

    /// One training pass over `source` with the epoch's KL weight `beta`.
    ///
    /// Per batch: device transfer, forward, objective, backward, scheduled
    /// optimiser step. A fresh gradient store is produced by each backward
    /// call, which is what stands in for explicit gradient zeroing.
    pub fn train_epoch(
        &mut self,
        source: &dyn BatchSource,
        beta: f64,
    ) -> anyhow::Result<EpochSummary> {
        let mut metrics = EpochMetrics::new();
        let bar = epoch_bar(source.n_batches(), "training");
        for batch in source.batches() {
            let batch = batch.to_device(&self.device)?;
            let output = self.model.forward(&batch, &self.device)?;
            let loss = variational_loss(
                &output.logits,
                &batch.tgt_seq,
                &output.recog_mu,
                &output.recog_logvar,
                &output.prior_mu,
                &output.prior_logvar,
                beta,
            )?;
            let grads = loss.total.backward()?;
            self.optimizer.step_and_update_lr(&grads)?;
            record_batch(&mut metrics, &batch, &loss)?;
            bar.inc(1);
        }
        bar.finish_and_clear();
        Ok(metrics.finish())
    }

    /// One evaluation pass. No backward, no optimiser step, and β pinned to
    /// 1 regardless of the epoch schedule, so validation always measures the
    /// unannealed objective.
    pub fn eval_epoch(&self, source: &dyn BatchSource) -> anyhow::Result<EpochSummary> {
        let mut metrics = EpochMetrics::new();
        let bar = epoch_bar(source.n_batches(), "validation");
        for batch in source.batches() {
            let batch = batch.to_device(&self.device)?;
            let output = self.model.forward(&batch, &self.device)?;
            let loss = variational_loss(
                &output.logits,
                &batch.tgt_seq,
                &output.recog_mu,
                &output.recog_logvar,
                &output.prior_mu,
                &output.prior_logvar,
                1.0,
            )?;
            record_batch(&mut metrics, &batch, &loss)?;
            bar.inc(1);
        }
        bar.finish_and_clear();
        Ok(metrics.finish())
    }

    // ── Training loop ───────────────────────────────────────────────────────

    /// Run the full schedule: `config.epochs` epochs, train then eval, no
    /// early stopping. `probe` runs after every refresh of the `best`
    /// checkpoint.
    pub fn fit(
        &mut self,
        training_data: &dyn BatchSource,
        validation_data: &dyn BatchSource,
        probe: Option<&SamplingProbe>,
    ) -> anyhow::Result<()> {
        let anneal = KlAnneal::new(0.0, 1.0, self.config.epochs);
        let mut logs = match &self.config.log {
            Some(dir) => {
                tracing::info!(dir = %dir.display(), "writing per-epoch records");
                Some(EpochLogs::create(dir)?)
            }
            None => None,
        };

        for epoch in 0..self.config.epochs {
            let beta = anneal.beta(epoch);
            tracing::info!(epoch, beta, "epoch start");

            let start = Instant::now();
            let train = self.train_epoch(training_data, beta)?;
            log_pass("training", epoch, &train, start.elapsed().as_secs_f64());

            let start = Instant::now();
            let valid = self.eval_epoch(validation_data)?;
            log_pass("validation", epoch, &valid, start.elapsed().as_secs_f64());

            self.valid_accus.push(valid.accuracy);

            if let Some(prefix) = self.config.save_model.clone() {
                match self.config.save_mode {
                    SaveMode::All => {
                        let base = checkpoint_base(&prefix, SaveMode::All, valid.accuracy);
                        self.save_checkpoint(&base, epoch)?;
                    }
                    SaveMode::Best => {
                        if is_new_best(&self.valid_accus, valid.accuracy) {
                            let base = checkpoint_base(&prefix, SaveMode::Best, valid.accuracy);
                            self.save_checkpoint(&base, epoch)?;
                            tracing::info!(epoch, "checkpoint file updated");
                            if let Some(probe) = probe {
                                probe.run(&self.model, &self.device)?;
                            }
                        }
                    }
                }
            }

            if let Some(logs) = logs.as_mut() {
                logs.append(epoch, &train, &valid)?;
            }
        }
        Ok(())
    }

    // ── Checkpointing ───────────────────────────────────────────────────────

    /// Write the parameter snapshot to `<base>.safetensors` and a JSON
    /// sidecar `<base>.json` holding the configuration and epoch index.
    pub fn save_checkpoint(&self, base: &Path, epoch: usize) -> anyhow::Result<PathBuf> {
        if let Some(dir) = base.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let weights = PathBuf::from(format!("{}.safetensors", base.display()));
        self.varmap.save(&weights)?;
        let meta = CheckpointMeta {
            settings: self.config.clone(),
            epoch,
        };
        let json = serde_json::to_string_pretty(&meta)?;
        std::fs::write(format!("{}.json", base.display()), json)?;
        Ok(weights)
    }
}

// ── Checkpoint metadata ─────────────────────────────────────────────────────

/// Sidecar record stored next to the weights, enough to resume or audit a
/// run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub settings: TrainConfig,
    pub epoch: usize,
}

/// Checkpoint path (extension-less) under the configured naming policy.
fn checkpoint_base(prefix: &Path, mode: SaveMode, accuracy: f64) -> PathBuf {
    match mode {
        SaveMode::All => PathBuf::from(format!(
            "{}_accu_{:.3}.chkpt",
            prefix.display(),
            100.0 * accuracy
        )),
        SaveMode::Best => PathBuf::from(format!("{}.chkpt", prefix.display())),
    }
}

/// `best` save rule, applied after the current accuracy has been pushed to
/// the history: save when it ties or beats everything seen so far (ties
/// refresh the checkpoint).
fn is_new_best(history: &[f64], current: f64) -> bool {
    history.iter().all(|&a| current >= a)
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn record_batch(
    metrics: &mut EpochMetrics,
    batch: &Batch,
    loss: &LossBundle,
) -> anyhow::Result<()> {
    let n_tokens = non_pad_count(&batch.tgt_seq)?;
    let n_sequences = batch.n_sequences()?;
    let total = loss.total.to_scalar::<f32>()? as f64;
    metrics.record(
        total,
        loss.reconstruction,
        loss.kl,
        loss.n_correct,
        n_tokens,
        n_sequences,
    );
    Ok(())
}

fn log_pass(phase: &str, epoch: usize, summary: &EpochSummary, elapsed_secs: f64) {
    tracing::info!(
        phase,
        epoch,
        ppl = format!("{:8.5}", summary.perplexity()),
        accuracy = format!("{:3.3}", 100.0 * summary.accuracy),
        recon = format!("{:8.5}", summary.recon_per_token),
        kl = format!("{:8.5}", summary.kl_per_sequence),
        elapse_min = format!("{:3.3}", elapsed_secs / 60.0),
        "epoch pass"
    );
}

fn epoch_bar(len: usize, phase: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} {bar:40} {pos}/{len} batches")
            .unwrap()
            .progress_chars("=>-"),
    );
    pb.set_message(phase.to_string());
    pb
}

// ── Epoch log files ─────────────────────────────────────────────────────────

/// The two append-only per-epoch records (`train.log`, `valid.log`):
/// a header row, then one comma-separated record per epoch.
struct EpochLogs {
    train: File,
    valid: File,
}

impl EpochLogs {
    /// Create (truncating) both files and write the header row.
    fn create(dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let mut train = File::create(dir.join("train.log"))?;
        let mut valid = File::create(dir.join("valid.log"))?;
        writeln!(train, "epoch, loss, ppl, accuracy")?;
        writeln!(valid, "epoch, loss, ppl, accuracy")?;
        Ok(Self { train, valid })
    }

    fn append(
        &mut self,
        epoch: usize,
        train: &EpochSummary,
        valid: &EpochSummary,
    ) -> anyhow::Result<()> {
        write_record(&mut self.train, epoch, train)?;
        write_record(&mut self.valid, epoch, valid)?;
        Ok(())
    }
}

fn write_record(file: &mut File, epoch: usize, summary: &EpochSummary) -> anyhow::Result<()> {
    writeln!(
        file,
        "{epoch}, {loss:8.5}, {ppl:8.5}, {accu:3.3}",
        loss = summary.loss_per_token,
        ppl = summary.perplexity(),
        accu = 100.0 * summary.accuracy,
    )?;
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────────────

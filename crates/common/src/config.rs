//! Training-run configuration.
//!
//! Serialised as JSON and snapshotted into every checkpoint so a run can be
//! reproduced from its artefacts alone. Backwards-compatible: missing fields
//! fall back to their `#[serde(default)]` values.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Hyper-parameters and artefact paths for one training run.
///
/// Owned by whatever front-end assembles the run (CLI, script, test); the
/// trainer consumes it as a plain options bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    // ── Run length ──────────────────────────────────────────────────────────
    /// Number of epochs; the loop always runs all of them (no early stop).
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    // ── Model dimensions (consumed by the model, snapshotted here) ──────────
    /// Target vocabulary size (must match the corpus dictionary).
    pub vocab_size: usize,
    /// Node / token embedding dimension.
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    /// Graph-encoder message-passing hops.
    #[serde(default = "default_n_hop")]
    pub n_hop: usize,
    /// Decoder hidden size; also sets the learning-rate scale constant.
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,
    /// Latent variable dimension.
    #[serde(default = "default_z_dim")]
    pub z_dim: usize,
    /// Width every target sequence is padded to: the maximum reference
    /// length over the whole training corpus, computed once by the loader.
    pub max_token_seq_len: usize,

    // ── Optimisation ────────────────────────────────────────────────────────
    /// Optimiser steps over which the learning rate rises linearly before
    /// inverse-square-root decay takes over.
    #[serde(default = "default_n_warmup_steps")]
    pub n_warmup_steps: usize,
    /// Probability of feeding the gold previous token to the decoder.
    #[serde(default = "default_teacher_forcing")]
    pub teacher_forcing: f64,
    #[serde(default = "default_dropout")]
    pub dropout: f64,
    /// Reserved knob; the objective does not currently smooth labels.
    #[serde(default)]
    pub label_smoothing: bool,

    // ── Artefacts ───────────────────────────────────────────────────────────
    /// Directory for the two per-epoch log files; `None` disables file logs.
    #[serde(default)]
    pub log: Option<PathBuf>,
    /// Checkpoint path prefix; `None` disables checkpointing.
    #[serde(default)]
    pub save_model: Option<PathBuf>,
    #[serde(default)]
    pub save_mode: SaveMode,
    /// Maximum length of greedily decoded probe sequences.
    #[serde(default = "default_max_decode_len")]
    pub max_decode_len: usize,
}

/// Checkpoint retention policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveMode {
    /// Overwrite one fixed file whenever validation accuracy ties or beats
    /// the best seen so far.
    #[default]
    Best,
    /// Keep every epoch, filename suffixed with its validation accuracy.
    All,
}

impl SaveMode {
    pub fn from_str(s: &str) -> Self {
        match s {
            "all" => Self::All,
            _ => Self::Best,
        }
    }
}

// ── Default value functions ─────────────────────────────────────────────────

fn default_epochs() -> usize {
    200
}
fn default_batch_size() -> usize {
    16
}
fn default_embedding_dim() -> usize {
    128
}
fn default_n_hop() -> usize {
    3
}
fn default_hidden_size() -> usize {
    512
}
fn default_z_dim() -> usize {
    128
}
fn default_n_warmup_steps() -> usize {
    500
}
fn default_teacher_forcing() -> f64 {
    0.5
}
fn default_dropout() -> f64 {
    0.1
}
fn default_max_decode_len() -> usize {
    50
}

// ── Impl ────────────────────────────────────────────────────────────────────

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 200,
            batch_size: 16,
            vocab_size: 4,
            embedding_dim: 128,
            n_hop: 3,
            hidden_size: 512,
            z_dim: 128,
            max_token_seq_len: 50,
            n_warmup_steps: 500,
            teacher_forcing: 0.5,
            dropout: 0.1,
            label_smoothing: false,
            log: None,
            save_model: None,
            save_mode: SaveMode::Best,
            max_decode_len: 50,
        }
    }
}

impl TrainConfig {
    /// Save config to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load config from a JSON file.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_json_round_trip() {
        let config = TrainConfig {
            vocab_size: 12_000,
            max_token_seq_len: 64,
            save_mode: SaveMode::All,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let loaded: TrainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.vocab_size, 12_000);
        assert_eq!(loaded.max_token_seq_len, 64);
        assert_eq!(loaded.save_mode, SaveMode::All);
        assert_eq!(loaded.hidden_size, 512);
    }

    #[test]
    fn minimal_json_uses_defaults() {
        let loaded: TrainConfig =
            serde_json::from_str(r#"{"vocab_size": 100, "max_token_seq_len": 30}"#).unwrap();
        assert_eq!(loaded.epochs, 200);
        assert_eq!(loaded.batch_size, 16);
        assert_eq!(loaded.n_warmup_steps, 500);
        assert_eq!(loaded.save_mode, SaveMode::Best);
        assert!(loaded.log.is_none());
        assert!(!loaded.label_smoothing);
    }

    #[test]
    fn save_mode_from_str() {
        assert_eq!(SaveMode::from_str("all"), SaveMode::All);
        assert_eq!(SaveMode::from_str("best"), SaveMode::Best);
        assert_eq!(SaveMode::from_str("anything"), SaveMode::Best);
    }

    #[test]
    fn config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = TrainConfig {
            vocab_size: 321,
            max_token_seq_len: 17,
            ..Default::default()
        };
        config.save(&path).unwrap();
        let loaded = TrainConfig::load(&path).unwrap();
        assert_eq!(loaded.vocab_size, 321);
        assert_eq!(loaded.max_token_seq_len, 17);
    }
}

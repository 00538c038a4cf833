//! End-to-end runs of the training loop against the mock model: artefact
//! layout, checkpoint policy, and the train/eval β asymmetry.

use candle_core::Device;
use candle_nn::VarMap;

use dualgraph_common::{SaveMode, TrainConfig, Vocab};
use dualgraph_train::mocks::{batch_from_gold, MockModel, VecBatchSource};
use dualgraph_train::{CheckpointMeta, SamplingProbe, Trainer};

const VOCAB_SIZE: usize = 8;
const SEQ_LEN: usize = 3;

/// Two examples, gold `[1, 2, PAD]` each: four non-PAD tokens per batch.
fn gold() -> Vec<u32> {
    vec![1, 2, 0, 1, 2, 0]
}

fn test_config(epochs: usize) -> TrainConfig {
    TrainConfig {
        epochs,
        batch_size: 2,
        vocab_size: VOCAB_SIZE,
        hidden_size: 8,
        n_warmup_steps: 4,
        max_token_seq_len: SEQ_LEN,
        ..Default::default()
    }
}

fn build_trainer(config: TrainConfig, recog_shift: f64) -> (Trainer<MockModel>, VecBatchSource) {
    let device = Device::Cpu;
    let varmap = VarMap::new();
    let model = MockModel::peaked(&varmap, &gold(), VOCAB_SIZE, &device)
        .unwrap()
        .with_recog_shift(recog_shift);
    let batch = batch_from_gold(gold(), 2, SEQ_LEN, &device).unwrap();
    let source = VecBatchSource::new(vec![batch]);
    let trainer = Trainer::new(model, varmap, config, device).unwrap();
    (trainer, source)
}

fn probe_vocab() -> Vocab {
    Vocab::from_tokens(
        ["<pad>", "<unk>", "<s>", "</s>", "a", "b", "c", "d"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    )
}

#[test]
fn fit_runs_all_epochs_and_writes_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(5);
    config.save_model = Some(dir.path().join("model"));
    config.save_mode = SaveMode::Best;
    config.log = Some(dir.path().join("logs"));

    let (mut trainer, source) = build_trainer(config, 0.0);
    let device = Device::Cpu;
    let probe_batch = batch_from_gold(gold(), 2, SEQ_LEN, &device).unwrap();
    let probe = SamplingProbe::new(probe_batch, probe_vocab(), 50);

    trainer.fit(&source, &source, Some(&probe)).unwrap();

    // Fixed-name best checkpoint plus sidecar.
    let weights = dir.path().join("model.chkpt.safetensors");
    let sidecar = dir.path().join("model.chkpt.json");
    assert!(weights.exists());
    assert!(sidecar.exists());
    let meta: CheckpointMeta =
        serde_json::from_str(&std::fs::read_to_string(&sidecar).unwrap()).unwrap();
    assert_eq!(meta.settings.epochs, 5);
    assert!(meta.epoch < 5);

    // Header row plus one record per epoch, in both files.
    for name in ["train.log", "valid.log"] {
        let text = std::fs::read_to_string(dir.path().join("logs").join(name)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6, "{name}: {text}");
        assert_eq!(lines[0], "epoch, loss, ppl, accuracy");
        assert!(lines[1].starts_with("0, "));
    }

    // One optimiser step per batch per epoch, never reset.
    assert_eq!(trainer.global_step(), 5);
}

#[test]
fn fit_without_artifacts_is_silent() {
    let (mut trainer, source) = build_trainer(test_config(2), 0.0);
    trainer.fit(&source, &source, None).unwrap();
    assert_eq!(trainer.global_step(), 2);
}

#[test]
fn all_mode_writes_accuracy_suffixed_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(2);
    config.save_model = Some(dir.path().join("model"));
    config.save_mode = SaveMode::All;

    let (mut trainer, source) = build_trainer(config, 0.0);
    trainer.fit(&source, &source, None).unwrap();

    // The peaked mock predicts every non-PAD token, so both epochs land on
    // the same 100.000-accuracy filename.
    assert!(dir.path().join("model_accu_100.000.chkpt.safetensors").exists());
    assert!(dir.path().join("model_accu_100.000.chkpt.json").exists());
    assert!(!dir.path().join("model.chkpt.safetensors").exists());
}

#[test]
fn train_measures_scheduled_beta_eval_measures_full_kl() {
    // Posterior shifted one unit from the prior: KL = 0.5 · z_dim = 1 per
    // example, so kl_per_sequence is exactly 1 when β = 1.
    let (mut trainer, source) = build_trainer(test_config(4), 1.0);

    let train = trainer.train_epoch(&source, 0.0).unwrap();
    assert!(train.kl_per_sequence.abs() < 1e-6);
    assert_eq!(train.accuracy, 1.0);

    let eval = trainer.eval_epoch(&source).unwrap();
    assert!((eval.kl_per_sequence - 1.0).abs() < 1e-4, "{}", eval.kl_per_sequence);
    assert_eq!(eval.accuracy, 1.0);

    // Half-weight training pass scales the measured KL accordingly.
    let half = trainer.train_epoch(&source, 0.5).unwrap();
    assert!((half.kl_per_sequence - 0.5).abs() < 1e-4, "{}", half.kl_per_sequence);
}

#[test]
fn loss_decreases_under_training() {
    let (mut trainer, source) = build_trainer(test_config(1), 0.0);
    let first = trainer.train_epoch(&source, 0.0).unwrap();
    for _ in 0..5 {
        trainer.train_epoch(&source, 0.0).unwrap();
    }
    let later = trainer.eval_epoch(&source).unwrap();
    assert!(
        later.loss_per_token < first.loss_per_token,
        "{} !< {}",
        later.loss_per_token,
        first.loss_per_token
    );
}

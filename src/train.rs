// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/train.rs - 分类器微调
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

//! 训练流程
//!
//! ```text
//! Initializing -> Training(1) -> Evaluating(1) -> Training(2) -> ...
//!                                    |
//!                                    +-> StoppedEarly(i) | Completed(i)
//! ```
//!
//! 每次评估指标创新高时保存检查点，结束后用最佳检查点导出到 `final/`。

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  classifier::{self, Classifier, ModelConfig, ProcessorConfig},
  config::TrainConfig,
  dataset::{DataLoader, ImageFolder, LabelMap, Pipeline, Split, epoch_order},
  output,
};

mod checkpoint;
mod early_stopping;
mod metrics;
mod schedule;

pub use self::checkpoint::{CheckpointManager, SavedCheckpoint};
pub use self::early_stopping::{EarlyStopping, Verdict};
pub use self::metrics::{
  EvalMetrics, EvalResults, LabelAccuracy, MetricAccumulator, argmax, cross_entropy,
};
pub use self::schedule::LinearSchedule;

pub const RUN_PREFIX: &str = "bird-classifier-";
pub const FINAL_DIR: &str = "final";
pub const LOGS_DIR: &str = "logs";
pub const LOG_FILE: &str = "trainer_log.jsonl";
pub const STATS_FILE: &str = "training_stats.json";
pub const EVAL_FILE: &str = "eval_results.json";

/// 验证集加载时固定的种子，验证预处理本身没有随机性
const EVAL_SEED: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
  Initializing,
  Training { epoch: usize },
  Evaluating { epoch: usize },
  StoppedEarly { epoch: usize },
  Completed { epoch: usize },
}

impl RunState {
  /// 第 `epoch` 轮评估之后的状态
  pub fn after_evaluation(epoch: usize, max_epochs: usize, verdict: Verdict) -> Self {
    if verdict == Verdict::Stop {
      RunState::StoppedEarly { epoch }
    } else if epoch >= max_epochs {
      RunState::Completed { epoch }
    } else {
      RunState::Training { epoch: epoch + 1 }
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      RunState::StoppedEarly { .. } | RunState::Completed { .. }
    )
  }
}

/// `training_stats.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingStats {
  pub train_runtime: f64,
  pub train_samples_per_second: f64,
  /// 所有训练步的平均损失
  pub train_loss: f64,
  pub species: Vec<String>,
  pub num_train_samples: usize,
  pub num_val_samples: usize,
  pub epochs_completed: usize,
  pub best_epoch: usize,
  pub best_accuracy: f64,
  pub stopped_early: bool,
  pub global_steps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochSummary {
  pub epoch: usize,
  pub train_loss: f64,
  pub eval_loss: f64,
  pub eval_accuracy: f64,
  pub checkpoint: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
  pub run_dir: PathBuf,
  pub final_dir: PathBuf,
  pub state: RunState,
  pub stats: TrainingStats,
  pub eval: EvalResults,
  pub history: Vec<EpochSummary>,
}

/// `logs/trainer_log.jsonl`，每行一条记录
struct TrainerLog {
  writer: BufWriter<File>,
}

impl TrainerLog {
  fn create(path: &Path) -> Result<Self> {
    let file = File::create(path)?;
    Ok(Self {
      writer: BufWriter::new(file),
    })
  }

  fn record(&mut self, value: &serde_json::Value) -> Result<()> {
    serde_json::to_writer(&mut self.writer, value)?;
    self.writer.write_all(b"\n")?;
    self.writer.flush()?;
    Ok(())
  }
}

/// 一次训练中各轮共享的数据
struct Session {
  train_set: ImageFolder,
  val_set: ImageFolder,
  train_pipeline: Pipeline,
  eval_pipeline: Pipeline,
  loader: DataLoader,
  schedule: LinearSchedule,
  log: TrainerLog,
  rng: StdRng,
  global_step: usize,
  loss_sum: f64,
}

pub struct Trainer<C: Classifier> {
  config: TrainConfig,
  labels: LabelMap,
  classifier: C,
}

impl<C: Classifier> Trainer<C> {
  pub fn new(config: TrainConfig, species: &[String], classifier: C) -> Result<Self> {
    config.validate()?;
    let labels = LabelMap::new(species.to_vec())?;
    if classifier.num_labels() != labels.len() {
      return Err(Error::config(format!(
        "分类器输出 {} 类，但配置了 {} 个物种",
        classifier.num_labels(),
        labels.len()
      )));
    }
    Ok(Self {
      config,
      labels,
      classifier,
    })
  }

  pub fn labels(&self) -> &LabelMap {
    &self.labels
  }

  pub fn classifier(&self) -> &C {
    &self.classifier
  }

  pub fn into_classifier(self) -> C {
    self.classifier
  }

  pub fn run(&mut self) -> Result<TrainingReport> {
    let started = Instant::now();
    let mut state = RunState::Initializing;
    info!("🚀 开始训练: {}", self.labels.labels().join(", "));
    info!("📂 数据集: {}", self.config.data_dir.display());

    let train_set = ImageFolder::load(&self.config.data_dir, Split::Train, &self.labels)?;
    let val_set = ImageFolder::load(&self.config.data_dir, Split::Val, &self.labels)?;

    let run_dir = create_run_dir(&self.config.output_root)?;
    let logs_dir = run_dir.join(LOGS_DIR);
    std::fs::create_dir_all(&logs_dir)?;
    info!("📁 输出目录: {}", run_dir.display());

    let (mean, std) = self.classifier.normalization();
    let processor = ProcessorConfig {
      image_mean: mean,
      image_std: std,
      size: self.config.image_size,
    };
    let loader = DataLoader::new(self.config.batch_size, self.config.num_workers)?;
    let total_steps = loader.num_batches(train_set.len()) * self.config.epochs;
    let mut session = Session {
      train_pipeline: Pipeline::train(
        self.config.image_size,
        &self.config.augmentation,
        mean,
        std,
      ),
      eval_pipeline: Pipeline::eval(
        self.config.image_size,
        self.config.resize_margin,
        mean,
        std,
      ),
      schedule: LinearSchedule::new(
        self.config.learning_rate,
        self.config.warmup_ratio,
        total_steps,
      ),
      log: TrainerLog::create(&logs_dir.join(LOG_FILE))?,
      rng: match self.config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
      },
      train_set,
      val_set,
      loader,
      global_step: 0,
      loss_sum: 0.0,
    };

    let mut stopping = EarlyStopping::new(self.config.early_stopping_patience);
    let mut checkpoints = CheckpointManager::new(&run_dir, self.config.save_total_limit);
    let mut history = Vec::new();
    let mut epoch_loss = 0.0;

    transition(&mut state, RunState::Training { epoch: 1 });
    while !state.is_terminal() {
      match state {
        RunState::Training { epoch } => {
          epoch_loss = self.train_epoch(&mut session, epoch)?;
          transition(&mut state, RunState::Evaluating { epoch });
        }
        RunState::Evaluating { epoch } => {
          let metrics = self.evaluate(&session.val_set, &session.eval_pipeline, &session.loader)?;
          info!(
            "📊 Epoch {}: loss {:.4}, 验证准确率 {:.2}%",
            epoch,
            metrics.loss,
            metrics.accuracy * 100.0
          );
          session.log.record(&serde_json::json!({
            "epoch": epoch,
            "step": session.global_step,
            "eval_loss": metrics.loss,
            "eval_accuracy": metrics.accuracy,
          }))?;

          let verdict = stopping.observe(epoch, metrics.accuracy);
          let checkpoint = if verdict == Verdict::Improved {
            let config = self.model_config(epoch, session.global_step, metrics.accuracy);
            Some(checkpoints.save(&self.classifier, &config, &processor)?.path.clone())
          } else {
            None
          };
          if let Verdict::NoImprovement { waited } = verdict {
            debug!("验证准确率未提升 ({}/{})", waited, self.config.early_stopping_patience);
          }

          history.push(EpochSummary {
            epoch,
            train_loss: epoch_loss,
            eval_loss: metrics.loss,
            eval_accuracy: metrics.accuracy,
            checkpoint,
          });
          transition(
            &mut state,
            RunState::after_evaluation(epoch, self.config.epochs, verdict),
          );
        }
        RunState::Initializing | RunState::StoppedEarly { .. } | RunState::Completed { .. } => {
          break;
        }
      }
    }

    let (epochs_completed, stopped_early) = match state {
      RunState::StoppedEarly { epoch } => {
        info!("⏹️ 连续 {} 轮未提升，提前停止", self.config.early_stopping_patience);
        (epoch, true)
      }
      RunState::Completed { epoch } => (epoch, false),
      _ => (0, false),
    };

    // 用最佳检查点导出最终模型
    let best = checkpoints
      .best()
      .cloned()
      .ok_or_else(|| Error::internal("训练结束时没有可用的检查点"))?;
    let (model_config, _) =
      classifier::load_pretrained(&mut self.classifier, &best.path, &self.labels)?;
    let final_dir = run_dir.join(FINAL_DIR);
    classifier::save_pretrained(&self.classifier, &final_dir, &model_config, &processor)?;

    info!("🧪 最终评估 (epoch {})", model_config.epoch);
    let eval_started = Instant::now();
    let metrics = self.evaluate(&session.val_set, &session.eval_pipeline, &session.loader)?;
    metrics.log_table();
    let eval = metrics.to_results(model_config.epoch, eval_started.elapsed().as_secs_f64());
    output::write_json(&eval, &run_dir.join(EVAL_FILE))?;

    let train_runtime = started.elapsed().as_secs_f64();
    let stats = TrainingStats {
      train_runtime,
      train_samples_per_second: (session.train_set.len() * epochs_completed) as f64
        / train_runtime.max(f64::EPSILON),
      train_loss: if session.global_step == 0 {
        0.0
      } else {
        session.loss_sum / session.global_step as f64
      },
      species: self.labels.labels().to_vec(),
      num_train_samples: session.train_set.len(),
      num_val_samples: session.val_set.len(),
      epochs_completed,
      best_epoch: best.epoch,
      best_accuracy: best.accuracy,
      stopped_early,
      global_steps: session.global_step,
    };
    output::write_json(&stats, &run_dir.join(STATS_FILE))?;

    info!("✅ 训练完成! 模型: {}", final_dir.display());
    info!(
      "   用时 {:.1} 秒, {:.1} 样本/秒",
      stats.train_runtime, stats.train_samples_per_second
    );

    Ok(TrainingReport {
      run_dir,
      final_dir,
      state,
      stats,
      eval,
      history,
    })
  }

  fn model_config(&self, epoch: usize, global_step: usize, accuracy: f64) -> ModelConfig {
    ModelConfig {
      labels: self.labels.clone(),
      num_labels: self.labels.len(),
      epoch,
      global_step,
      eval_accuracy: accuracy,
    }
  }

  /// 训练一轮，返回该轮的平均损失
  fn train_epoch(&mut self, session: &mut Session, epoch: usize) -> Result<f64> {
    let order = epoch_order(session.train_set.len(), true, &mut session.rng);
    let steps_per_epoch = session.loader.num_batches(order.len()).max(1);
    let mut epoch_loss = 0.0;
    let mut steps = 0usize;

    for chunk in order.chunks(session.loader.batch_size()) {
      let batch = session.loader.load(
        &session.train_set,
        chunk,
        &session.train_pipeline,
        &mut session.rng,
      )?;
      let learning_rate = session.schedule.learning_rate(session.global_step);
      let loss = f64::from(
        self
          .classifier
          .train_step(&batch, learning_rate)
          .map_err(Error::classifier)?,
      );
      if !loss.is_finite() {
        warn!("第 {} 步损失异常: {}", session.global_step + 1, loss);
      }

      session.global_step += 1;
      session.loss_sum += loss;
      epoch_loss += loss;
      steps += 1;

      if session.global_step % self.config.logging_steps == 0 {
        let progress = (epoch - 1) as f64 + steps as f64 / steps_per_epoch as f64;
        debug!(
          "step {}: loss {:.4}, lr {:.2e}",
          session.global_step, loss, learning_rate
        );
        session.log.record(&serde_json::json!({
          "step": session.global_step,
          "epoch": progress,
          "loss": loss,
          "learning_rate": learning_rate,
        }))?;
      }
    }

    Ok(if steps == 0 { 0.0 } else { epoch_loss / steps as f64 })
  }

  fn evaluate(
    &self,
    dataset: &ImageFolder,
    pipeline: &Pipeline,
    loader: &DataLoader,
  ) -> Result<EvalMetrics> {
    let mut accumulator = MetricAccumulator::new(self.labels.len());
    let mut rng = StdRng::seed_from_u64(EVAL_SEED);
    let order: Vec<usize> = (0..dataset.len()).collect();

    for chunk in order.chunks(loader.batch_size()) {
      let batch = loader.load(dataset, chunk, pipeline, &mut rng)?;
      let logits = self
        .classifier
        .forward(&batch.pixel_values)
        .map_err(Error::classifier)?;
      if logits.len() != batch.len() {
        return Err(Error::classifier(std::io::Error::new(
          std::io::ErrorKind::InvalidData,
          format!("分类器输出 {} 行，批次大小为 {}", logits.len(), batch.len()),
        )));
      }
      for (row, &label) in logits.iter().zip(&batch.labels) {
        accumulator.update(row, label);
      }
    }
    Ok(accumulator.finish(&self.labels))
  }
}

fn transition(state: &mut RunState, next: RunState) {
  debug!("训练状态: {:?} -> {:?}", state, next);
  *state = next;
}

/// `output_root/bird-classifier-<时间戳>`，同一秒内重复启动时追加序号
fn create_run_dir(output_root: &Path) -> Result<PathBuf> {
  std::fs::create_dir_all(output_root)?;
  let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
  let base = format!("{}{}", RUN_PREFIX, stamp);

  let mut attempt = 0;
  loop {
    let name = if attempt == 0 {
      base.clone()
    } else {
      format!("{}-{}", base, attempt)
    };
    let dir = output_root.join(name);
    match std::fs::create_dir(&dir) {
      Ok(()) => return Ok(dir),
      Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
      Err(e) => return Err(e.into()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::dataset::Batch;
  use crate::frame::NchwTensor;
  use image::{Rgb, RgbImage};
  use std::cell::Cell;

  const VAL_IMAGES: usize = 10;
  const STEPS_PER_EPOCH: usize = 2;

  /// 按轮次给出预设准确率的分类器
  ///
  /// 验证集只有第 0 类，每次评估前 `round(acc * 10)` 个样本判对。
  struct ScriptedClassifier {
    accuracies: Vec<f64>,
    train_steps: usize,
    seen: Cell<usize>,
    evaluated_at: Cell<Option<usize>>,
    /// 每批少输出一行
    short_output: bool,
  }

  impl ScriptedClassifier {
    fn new(accuracies: &[f64]) -> Self {
      Self {
        accuracies: accuracies.to_vec(),
        train_steps: 0,
        seen: Cell::new(0),
        evaluated_at: Cell::new(None),
        short_output: false,
      }
    }
  }

  impl Classifier for ScriptedClassifier {
    type Error = std::io::Error;

    fn num_labels(&self) -> usize {
      2
    }

    fn forward(&self, pixel_values: &[NchwTensor]) -> Result<Vec<Vec<f32>>, Self::Error> {
      if self.evaluated_at.get() != Some(self.train_steps) {
        self.evaluated_at.set(Some(self.train_steps));
        self.seen.set(0);
      }
      let epoch = (self.train_steps / STEPS_PER_EPOCH).max(1);
      let accuracy = self.accuracies[(epoch - 1).min(self.accuracies.len() - 1)];
      let correct = (accuracy * VAL_IMAGES as f64).round() as usize;

      let mut logits: Vec<Vec<f32>> = pixel_values
        .iter()
        .map(|_| {
          let index = self.seen.get();
          self.seen.set(index + 1);
          if index < correct {
            vec![1.0, 0.0]
          } else {
            vec![0.0, 1.0]
          }
        })
        .collect();
      if self.short_output {
        logits.pop();
      }
      Ok(logits)
    }

    fn train_step(&mut self, _batch: &Batch, _learning_rate: f64) -> Result<f32, Self::Error> {
      self.train_steps += 1;
      Ok(1.0 / self.train_steps as f32)
    }

    fn save(&self, dir: &Path) -> Result<(), Self::Error> {
      std::fs::write(dir.join("scripted.txt"), self.train_steps.to_string())
    }

    fn load(&mut self, dir: &Path) -> Result<(), Self::Error> {
      let text = std::fs::read_to_string(dir.join("scripted.txt"))?;
      self.train_steps = text.trim().parse().map_err(std::io::Error::other)?;
      self.evaluated_at.set(Some(self.train_steps));
      self.seen.set(0);
      Ok(())
    }
  }

  fn write_images(dir: &Path, count: usize, shade: u8) {
    std::fs::create_dir_all(dir).unwrap();
    for i in 0..count {
      RgbImage::from_pixel(16, 12, Rgb([shade, shade / 2, 40]))
        .save(dir.join(format!("img_{:02}.png", i)))
        .unwrap();
    }
  }

  fn dataset(root: &Path) -> PathBuf {
    let data = root.join("organized");
    write_images(&data.join("train/amsel"), 2, 40);
    write_images(&data.join("train/star"), 2, 200);
    write_images(&data.join("val/amsel"), VAL_IMAGES, 40);
    data
  }

  fn config(root: &Path, epochs: usize, patience: usize) -> TrainConfig {
    TrainConfig {
      data_dir: root.join("organized"),
      output_root: root.join("models"),
      image_size: 8,
      resize_margin: 2,
      batch_size: 2,
      epochs,
      early_stopping_patience: patience,
      save_total_limit: 2,
      logging_steps: 1,
      num_workers: 1,
      seed: Some(7),
      ..TrainConfig::default()
    }
  }

  fn species() -> Vec<String> {
    vec!["amsel".into(), "star".into()]
  }

  #[test]
  fn state_transitions_after_evaluation() {
    assert_eq!(
      RunState::after_evaluation(2, 5, Verdict::Improved),
      RunState::Training { epoch: 3 }
    );
    assert_eq!(
      RunState::after_evaluation(5, 5, Verdict::NoImprovement { waited: 1 }),
      RunState::Completed { epoch: 5 }
    );
    assert_eq!(
      RunState::after_evaluation(3, 5, Verdict::Stop),
      RunState::StoppedEarly { epoch: 3 }
    );
  }

  #[test]
  fn early_stopping_keeps_best_checkpoint() {
    let root = tempfile::tempdir().unwrap();
    dataset(root.path());
    let classifier = ScriptedClassifier::new(&[0.3, 0.5, 0.8, 0.8, 0.6, 0.7, 0.9]);
    let mut trainer = Trainer::new(config(root.path(), 10, 3), &species(), classifier).unwrap();

    let report = trainer.run().unwrap();
    assert_eq!(report.state, RunState::StoppedEarly { epoch: 6 });
    assert!(report.stats.stopped_early);
    assert_eq!(report.stats.epochs_completed, 6);
    assert_eq!(report.stats.best_epoch, 3);
    assert_eq!(report.stats.best_accuracy, 0.8);
    assert_eq!(report.eval.epoch, 3);
    assert_eq!(report.eval.eval_accuracy, 0.8);
    assert_eq!(report.history.len(), 6);

    let final_config: serde_json::Value = serde_json::from_str(
      &std::fs::read_to_string(report.final_dir.join("config.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(final_config["epoch"], 3);
    assert_eq!(final_config["id2label"]["1"], "star");

    // 只保存了 epoch 1, 2, 3，保留最近两个
    assert!(!report.run_dir.join("checkpoint-2").exists());
    assert!(report.run_dir.join("checkpoint-4").exists());
    assert!(report.run_dir.join("checkpoint-6").exists());

    // 验证集没有 star，对应的键不出现
    let eval: serde_json::Value = serde_json::from_str(
      &std::fs::read_to_string(report.run_dir.join(EVAL_FILE)).unwrap(),
    )
    .unwrap();
    assert_eq!(eval["eval_acc_amsel"], 0.8);
    assert!(eval.get("eval_acc_star").is_none());
  }

  #[test]
  fn completes_all_epochs_and_writes_artifacts() {
    let root = tempfile::tempdir().unwrap();
    dataset(root.path());
    let classifier = ScriptedClassifier::new(&[0.1, 0.2, 0.4]);
    let mut trainer = Trainer::new(config(root.path(), 3, 5), &species(), classifier).unwrap();

    let report = trainer.run().unwrap();
    assert_eq!(report.state, RunState::Completed { epoch: 3 });
    assert!(!report.stats.stopped_early);
    assert_eq!(report.stats.best_epoch, 3);
    assert_eq!(report.stats.global_steps, 3 * STEPS_PER_EPOCH);
    assert_eq!(report.stats.num_train_samples, 4);
    assert_eq!(report.stats.num_val_samples, VAL_IMAGES);

    let name = report.run_dir.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with(RUN_PREFIX));
    assert!(report.final_dir.join("preprocessor_config.json").exists());
    assert!(report.final_dir.join("scripted.txt").exists());

    let stats: serde_json::Value = serde_json::from_str(
      &std::fs::read_to_string(report.run_dir.join(STATS_FILE)).unwrap(),
    )
    .unwrap();
    for key in [
      "train_runtime",
      "train_samples_per_second",
      "train_loss",
      "species",
      "num_train_samples",
      "num_val_samples",
    ] {
      assert!(stats.get(key).is_some(), "missing {}", key);
    }

    let log = std::fs::read_to_string(report.run_dir.join(LOGS_DIR).join(LOG_FILE)).unwrap();
    let lines: Vec<serde_json::Value> = log
      .lines()
      .map(|line| serde_json::from_str(line).unwrap())
      .collect();
    assert_eq!(lines.iter().filter(|l| l.get("loss").is_some()).count(), 6);
    assert_eq!(lines.iter().filter(|l| l.get("eval_accuracy").is_some()).count(), 3);
  }

  #[test]
  fn missing_val_split_fails_before_training() {
    let root = tempfile::tempdir().unwrap();
    let data = root.path().join("organized");
    write_images(&data.join("train/amsel"), 2, 40);
    let mut trainer = Trainer::new(
      config(root.path(), 2, 1),
      &species(),
      ScriptedClassifier::new(&[0.5]),
    )
    .unwrap();

    let err = trainer.run().unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
    assert!(!root.path().join("models").exists());
  }

  #[test]
  fn label_count_must_match_classifier() {
    let root = tempfile::tempdir().unwrap();
    let err = Trainer::new(
      config(root.path(), 1, 1),
      &["amsel".to_string()],
      ScriptedClassifier::new(&[0.5]),
    )
    .err()
    .unwrap();
    assert!(matches!(err, Error::Configuration(_)));
  }

  #[test]
  fn wrong_logit_row_count_is_a_classifier_error() {
    let root = tempfile::tempdir().unwrap();
    dataset(root.path());
    let mut classifier = ScriptedClassifier::new(&[0.5]);
    classifier.short_output = true;
    let mut trainer = Trainer::new(config(root.path(), 2, 1), &species(), classifier).unwrap();

    let err = trainer.run().unwrap_err();
    assert!(matches!(err, Error::Classifier(_)));
  }
}

// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/bin/train_classifier.rs - 训练鸟类物种分类器
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use vogel_trainer::{classifier::LinearClassifier, config::PipelineConfig, train::Trainer};

/// 线性分类器的池化网格边长
const LINEAR_GRID: usize = 16;

/// 在整理好的数据集上训练物种分类器
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// TOML 配置文件
  #[arg(long, value_name = "TOML")]
  pub config: Option<PathBuf>,

  /// 包含 train/ 和 val/ 的数据集目录
  #[arg(long, value_name = "DIR")]
  pub data: Option<PathBuf>,

  /// 模型输出根目录
  #[arg(long, value_name = "DIR")]
  pub output: Option<PathBuf>,

  #[arg(long, value_name = "N")]
  pub epochs: Option<usize>,

  #[arg(long, value_name = "N")]
  pub batch_size: Option<usize>,

  #[arg(long, value_name = "LR")]
  pub learning_rate: Option<f64>,

  /// 连续多少轮验证准确率未提升后停止
  #[arg(long, value_name = "N")]
  pub patience: Option<usize>,

  #[arg(long, value_name = "SEED")]
  pub seed: Option<u64>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let mut config = match &args.config {
    Some(path) => PipelineConfig::from_toml_file(path)?,
    None => PipelineConfig::default(),
  };
  let train = &mut config.train;
  if let Some(data) = args.data {
    train.data_dir = data;
  }
  if let Some(output) = args.output {
    train.output_root = output;
  }
  if let Some(epochs) = args.epochs {
    train.epochs = epochs;
  }
  if let Some(batch_size) = args.batch_size {
    train.batch_size = batch_size;
  }
  if let Some(lr) = args.learning_rate {
    train.learning_rate = lr;
  }
  if let Some(patience) = args.patience {
    train.early_stopping_patience = patience;
  }
  if args.seed.is_some() {
    train.seed = args.seed;
  }
  config.validate()?;

  info!("批大小: {}", config.train.batch_size);
  info!("训练轮数: {}", config.train.epochs);
  info!("学习率: {}", config.train.learning_rate);

  let classifier = LinearClassifier::new(config.species.len(), LINEAR_GRID);
  let mut trainer = Trainer::new(config.train, &config.species, classifier)?;
  let report = trainer.run()?;

  info!(
    "最佳验证准确率: {:.2}% (epoch {})",
    report.stats.best_accuracy * 100.0,
    report.stats.best_epoch
  );
  info!("模型目录: {}", report.final_dir.display());

  Ok(())
}

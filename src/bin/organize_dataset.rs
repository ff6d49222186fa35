// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/bin/organize_dataset.rs - 将裁剪图划分为训练集和验证集
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

use vogel_trainer::{config::PipelineConfig, partition::Partitioner};

/// 将 `{species}_video*` 目录中的图片按比例划分为 train/val
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// TOML 配置文件
  #[arg(long, value_name = "TOML")]
  pub config: Option<PathBuf>,

  /// 裁剪图所在的根目录
  #[arg(long, value_name = "DIR")]
  pub source: Option<PathBuf>,

  /// 输出目录，默认为 `<source>/organized`
  #[arg(long, value_name = "DIR")]
  pub output: Option<PathBuf>,

  /// 训练集比例 (0.0, 1.0]
  #[arg(long, value_name = "RATIO")]
  pub ratio: Option<f64>,

  /// 随机种子，指定后划分结果可复现
  #[arg(long, value_name = "SEED")]
  pub seed: Option<u64>,

  /// 物种列表，逗号分隔
  #[arg(long, value_name = "SPECIES", value_delimiter = ',')]
  pub species: Option<Vec<String>>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let mut config = match &args.config {
    Some(path) => PipelineConfig::from_toml_file(path)?,
    None => PipelineConfig::default(),
  };
  if let Some(source) = args.source {
    config.partition.source_root = source;
  }
  if let Some(output) = args.output {
    config.partition.output_root = Some(output);
  }
  if let Some(ratio) = args.ratio {
    config.partition.train_ratio = ratio;
  }
  if args.seed.is_some() {
    config.partition.seed = args.seed;
  }
  if let Some(species) = args.species {
    config.species = species;
  }
  config.validate()?;

  info!("源目录: {}", config.partition.source_root.display());
  info!("输出目录: {}", config.partition.output_root().display());
  info!("物种: {}", config.species.join(", "));

  let partitioner = Partitioner::new(config.partition, config.species)?;
  let report = partitioner.partition()?;
  info!("共整理 {} 张图片", report.total());

  Ok(())
}

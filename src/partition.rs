// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/partition.rs - 训练集/验证集划分
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

//! 按物种收集裁剪图，随机打乱后按比例划分并复制到
//! `output_root/{train,val}/{label}/`。源文件不会被移动或删除。

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  config::{PartitionConfig, validate_labels},
  input::is_image_file,
  output,
};

pub const TRAIN_DIR: &str = "train";
pub const VAL_DIR: &str = "val";
pub const REPORT_FILE: &str = "split_report.json";
/// 抽取输出目录的命名约定：`<label>_video<N>`
pub const VIDEO_DIR_SUFFIX: &str = "_video";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSplit {
  pub label: String,
  pub total: usize,
  pub train: usize,
  pub val: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartitionReport {
  /// 与输入标签顺序一致
  pub per_label: Vec<LabelSplit>,
  /// 没有找到任何图片的标签
  pub skipped: Vec<String>,
  pub seed: Option<u64>,
}

impl PartitionReport {
  pub fn get(&self, label: &str) -> Option<&LabelSplit> {
    self.per_label.iter().find(|split| split.label == label)
  }

  pub fn total(&self) -> usize {
    self.per_label.iter().map(|split| split.total).sum()
  }

  pub fn train(&self) -> usize {
    self.per_label.iter().map(|split| split.train).sum()
  }

  pub fn val(&self) -> usize {
    self.per_label.iter().map(|split| split.val).sum()
  }

  pub fn train_percent(&self) -> f64 {
    percent(self.train(), self.total())
  }

  pub fn val_percent(&self) -> f64 {
    percent(self.val(), self.total())
  }

  pub fn log_summary(&self) {
    info!("==================================================");
    info!("数据集整理完成");
    info!("==================================================");
    info!("总计: {} 张图片", self.total());
    info!("  训练集: {} ({:.1}%)", self.train(), self.train_percent());
    info!("  验证集: {} ({:.1}%)", self.val(), self.val_percent());
    info!("各物种:");
    for split in &self.per_label {
      info!(
        "  {:12}: {:3} 总计 ({:3} train, {:2} val)",
        split.label, split.total, split.train, split.val
      );
    }
    for label in &self.skipped {
      info!("  {:12}: 无图片，已跳过", label);
    }
  }
}

fn percent(part: usize, total: usize) -> f64 {
  if total == 0 {
    0.0
  } else {
    part as f64 / total as f64 * 100.0
  }
}

/// 训练集大小 `floor(count * ratio)`
pub fn split_point(count: usize, train_ratio: f64) -> usize {
  ((count as f64 * train_ratio).floor() as usize).min(count)
}

/// 一次打乱后切分，前半为训练集，后半为验证集
pub fn split_pool<T, R: rand::Rng + ?Sized>(
  mut pool: Vec<T>,
  train_ratio: f64,
  rng: &mut R,
) -> (Vec<T>, Vec<T>) {
  pool.shuffle(rng);
  let split = split_point(pool.len(), train_ratio);
  let val = pool.split_off(split);
  (pool, val)
}

/// 目录名为 `label` 或 `label_video*`（如 `kohlmeise_video1`）
///
/// 只认 `_video` 后缀，`specht_bunt_video1` 不会被算进 `specht`。
pub fn matches_label(dir_name: &str, label: &str) -> bool {
  dir_name == label
    || dir_name
      .strip_prefix(label)
      .is_some_and(|rest| rest.starts_with(VIDEO_DIR_SUFFIX))
}

pub struct Partitioner {
  config: PartitionConfig,
  labels: Vec<String>,
}

impl Partitioner {
  pub fn new(config: PartitionConfig, labels: Vec<String>) -> Result<Self> {
    config.validate()?;
    validate_labels(&labels)?;
    Ok(Self { config, labels })
  }

  pub fn output_root(&self) -> PathBuf {
    self.config.output_root()
  }

  /// 汇总 `source_root` 下所有属于 `label` 的图片，按路径排序
  pub fn discover(&self, label: &str) -> Result<Vec<PathBuf>> {
    let output_root = self.output_root();
    let mut images = Vec::new();

    for entry in std::fs::read_dir(&self.config.source_root)? {
      let dir = entry?.path();
      if !dir.is_dir() || dir == output_root {
        continue;
      }
      let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
        continue;
      };
      if !matches_label(name, label) {
        continue;
      }

      let before = images.len();
      for file in std::fs::read_dir(&dir)? {
        let path = file?.path();
        if path.is_file() && is_image_file(&path) && !output::is_partial(&path) {
          images.push(path);
        }
      }
      debug!("{}: {} 张图片来自 {}", label, images.len() - before, dir.display());
    }

    images.sort();
    Ok(images)
  }

  pub fn partition(&self) -> Result<PartitionReport> {
    let source_root = &self.config.source_root;
    if !source_root.is_dir() {
      return Err(Error::config(format!(
        "源目录不存在: {}",
        source_root.display()
      )));
    }
    let output_root = self.output_root();

    let mut rng = match self.config.seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    };
    let mut report = PartitionReport {
      seed: self.config.seed,
      ..Default::default()
    };

    info!("按物种收集图片...");
    let mut pools = Vec::with_capacity(self.labels.len());
    for label in &self.labels {
      let images = self.discover(label)?;
      info!("{}: 找到 {} 张图片", label, images.len());
      pools.push((label, images));
    }

    info!("划分并复制图片...");
    for (label, images) in pools {
      if images.is_empty() {
        warn!("⚠️ {}: 没有找到图片，跳过", label);
        report.skipped.push(label.clone());
        continue;
      }

      let total = images.len();
      let (train, val) = split_pool(images, self.config.train_ratio, &mut rng);

      let train_dir = output_root.join(TRAIN_DIR).join(label);
      let val_dir = output_root.join(VAL_DIR).join(label);
      for dir in [&train_dir, &val_dir] {
        if dir.exists() {
          debug!("清除旧的划分结果: {}", dir.display());
          std::fs::remove_dir_all(dir)?;
        }
        std::fs::create_dir_all(dir)?;
      }

      let mut used_names = HashSet::new();
      for (images, dir) in [(&train, &train_dir), (&val, &val_dir)] {
        for image in images.iter() {
          let name = destination_name(image, &mut used_names);
          output::copy_file(image, &dir.join(name))?;
        }
      }

      info!("✓ {}: {} train, {} val", label, train.len(), val.len());
      report.per_label.push(LabelSplit {
        label: label.clone(),
        total,
        train: train.len(),
        val: val.len(),
      });
    }

    output::write_json(&report, &output_root.join(REPORT_FILE))?;
    report.log_summary();
    info!("数据集目录: {}", output_root.display());
    Ok(report)
  }
}

/// 保留原文件名；同一标签下重名时加上来源目录名作为前缀
fn destination_name(image: &Path, used: &mut HashSet<OsString>) -> OsString {
  let original = image.file_name().map(OsString::from).unwrap_or_default();
  if used.insert(original.clone()) {
    return original;
  }

  let source_dir = image
    .parent()
    .and_then(|p| p.file_name())
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default();
  let original = original.to_string_lossy().into_owned();
  let mut candidate = OsString::from(format!("{}_{}", source_dir, original));
  let mut counter = 1;
  while !used.insert(candidate.clone()) {
    counter += 1;
    candidate = OsString::from(format!("{}_{}_{}", source_dir, counter, original));
  }
  warn!(
    "文件名重复: {}，改名为 {}",
    image.display(),
    candidate.to_string_lossy()
  );
  candidate
}

// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/config.rs - 流水线配置
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

//! 流水线配置
//!
//! 所有组件都从同一个 [`PipelineConfig`] 取参数，配置文件为 TOML 格式：
//!
//! ```toml
//! species = ["blaumeise", "kleiber", "kohlmeise"]
//!
//! [extract]
//! confidence_threshold = 0.3
//! sample_stride = 5
//!
//! [partition]
//! source_root = "/data/vogel-training-data"
//! train_ratio = 0.8
//!
//! [train]
//! data_dir = "/data/vogel-training-data/organized"
//! epochs = 50
//! ```
//!
//! 未出现的字段使用默认值。

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result, partition::VIDEO_DIR_SUFFIX};

/// COCO 数据集中 “bird” 的类别编号
pub const COCO_BIRD_CLASS: u32 = 14;

pub const DEFAULT_SPECIES: [&str; 5] = [
  "blaumeise",
  "kleiber",
  "kohlmeise",
  "rotkehlchen",
  "sumpfmeise",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// 物种标签，顺序即类别编号
  pub species: Vec<String>,
  pub extract: ExtractConfig,
  pub partition: PartitionConfig,
  pub train: TrainConfig,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      species: DEFAULT_SPECIES.iter().map(|s| s.to_string()).collect(),
      extract: ExtractConfig::default(),
      partition: PartitionConfig::default(),
      train: TrainConfig::default(),
    }
  }
}

impl PipelineConfig {
  pub fn from_toml_str(text: &str) -> Result<Self> {
    let config: PipelineConfig = toml::from_str(text)?;
    Ok(config)
  }

  pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    debug!("读取配置文件: {}", path.display());
    let text = std::fs::read_to_string(path).map_err(|e| {
      Error::config(format!("无法读取配置文件 {}: {}", path.display(), e))
    })?;
    Self::from_toml_str(&text)
  }

  pub fn validate(&self) -> Result<()> {
    validate_labels(&self.species)?;
    self.extract.validate()?;
    self.partition.validate()?;
    self.train.validate()?;
    Ok(())
  }
}

/// 标签列表不能为空，也不能重复
pub fn validate_labels(labels: &[String]) -> Result<()> {
  if labels.is_empty() {
    return Err(Error::config("物种标签列表为空"));
  }
  let mut seen = HashSet::new();
  for label in labels {
    if label.trim().is_empty() {
      return Err(Error::config("物种标签不能为空字符串"));
    }
    if label.contains(['/', '\\']) {
      return Err(Error::config(format!("物种标签包含路径分隔符: {}", label)));
    }
    if !seen.insert(label.as_str()) {
      return Err(Error::config(format!("物种标签重复: {}", label)));
    }
  }
  // `a_video...` 形式的标签会和 `a` 的抽取目录混淆
  for label in labels {
    let run_prefix = format!("{}{}", label, VIDEO_DIR_SUFFIX);
    if let Some(other) = labels.iter().find(|other| other.starts_with(&run_prefix)) {
      return Err(Error::config(format!(
        "物种标签 {} 与 {} 的目录无法区分",
        other, label
      )));
    }
  }
  Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
  pub target_class: u32,
  pub confidence_threshold: f32,
  /// 每隔多少帧分析一次，1 表示逐帧
  pub sample_stride: u64,
  pub crop_prefix: String,
  /// 每读取多少帧输出一次进度
  pub progress_interval: u64,
}

impl Default for ExtractConfig {
  fn default() -> Self {
    Self {
      target_class: COCO_BIRD_CLASS,
      confidence_threshold: 0.3,
      sample_stride: 5,
      crop_prefix: "bird".to_string(),
      progress_interval: 100,
    }
  }
}

impl ExtractConfig {
  pub fn validate(&self) -> Result<()> {
    if self.sample_stride == 0 {
      return Err(Error::config("采样间隔必须 >= 1"));
    }
    if !(0.0..=1.0).contains(&self.confidence_threshold) {
      return Err(Error::config(format!(
        "置信度阈值必须位于 [0, 1]，实际为 {}",
        self.confidence_threshold
      )));
    }
    if self.crop_prefix.is_empty() || self.crop_prefix.contains(['/', '\\']) {
      return Err(Error::config(format!(
        "无效的裁剪文件名前缀: '{}'",
        self.crop_prefix
      )));
    }
    if self.progress_interval == 0 {
      return Err(Error::config("进度输出间隔必须 >= 1"));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
  pub source_root: PathBuf,
  /// 缺省为 `source_root/organized`
  pub output_root: Option<PathBuf>,
  pub train_ratio: f64,
  /// 不设置时每次划分结果不同
  pub seed: Option<u64>,
}

impl Default for PartitionConfig {
  fn default() -> Self {
    Self {
      source_root: PathBuf::from("vogel-training-data"),
      output_root: None,
      train_ratio: 0.8,
      seed: None,
    }
  }
}

impl PartitionConfig {
  pub fn output_root(&self) -> PathBuf {
    self
      .output_root
      .clone()
      .unwrap_or_else(|| self.source_root.join("organized"))
  }

  pub fn validate(&self) -> Result<()> {
    if !(self.train_ratio > 0.0 && self.train_ratio <= 1.0) {
      return Err(Error::config(format!(
        "训练集比例必须位于 (0, 1]，实际为 {}",
        self.train_ratio
      )));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
  /// 划分后的数据集目录，包含 `train/` 与 `val/`
  pub data_dir: PathBuf,
  pub output_root: PathBuf,
  pub image_size: u32,
  /// 验证集先缩放到 `image_size + resize_margin` 再中心裁剪
  pub resize_margin: u32,
  pub batch_size: usize,
  pub epochs: usize,
  pub learning_rate: f64,
  pub warmup_ratio: f64,
  pub early_stopping_patience: usize,
  /// 最多保留的检查点数量
  pub save_total_limit: usize,
  pub logging_steps: usize,
  pub num_workers: usize,
  pub seed: Option<u64>,
  pub augmentation: AugmentConfig,
}

impl Default for TrainConfig {
  fn default() -> Self {
    Self {
      data_dir: PathBuf::from("vogel-training-data/organized"),
      output_root: PathBuf::from("vogel-models"),
      image_size: 224,
      resize_margin: 32,
      batch_size: 16,
      epochs: 50,
      learning_rate: 2e-4,
      warmup_ratio: 0.1,
      early_stopping_patience: 5,
      save_total_limit: 3,
      logging_steps: 10,
      num_workers: 4,
      seed: None,
      augmentation: AugmentConfig::default(),
    }
  }
}

impl TrainConfig {
  pub fn validate(&self) -> Result<()> {
    if self.image_size == 0 {
      return Err(Error::config("图像尺寸必须 > 0"));
    }
    if self.batch_size == 0 {
      return Err(Error::config("批大小必须 > 0"));
    }
    if self.epochs == 0 {
      return Err(Error::config("训练轮数必须 > 0"));
    }
    if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
      return Err(Error::config(format!(
        "学习率必须为正数，实际为 {}",
        self.learning_rate
      )));
    }
    if !(0.0..1.0).contains(&self.warmup_ratio) {
      return Err(Error::config(format!(
        "预热比例必须位于 [0, 1)，实际为 {}",
        self.warmup_ratio
      )));
    }
    if self.early_stopping_patience == 0 {
      return Err(Error::config("早停耐心值必须 >= 1"));
    }
    if self.save_total_limit == 0 {
      return Err(Error::config("检查点保留数量必须 >= 1"));
    }
    if self.logging_steps == 0 {
      return Err(Error::config("日志步长必须 >= 1"));
    }
    if self.num_workers == 0 {
      return Err(Error::config("数据加载线程数必须 >= 1"));
    }
    self.augmentation.validate()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
  /// 随机裁剪面积占原图的比例范围
  pub crop_scale: (f32, f32),
  /// 随机裁剪宽高比范围
  pub crop_ratio: (f32, f32),
  pub flip_probability: f32,
  pub brightness: f32,
  pub contrast: f32,
  pub saturation: f32,
  /// 色相抖动，单位为整圈，取值 [0, 0.5]
  pub hue: f32,
}

impl Default for AugmentConfig {
  fn default() -> Self {
    Self {
      crop_scale: (0.8, 1.0),
      crop_ratio: (3.0 / 4.0, 4.0 / 3.0),
      flip_probability: 0.5,
      brightness: 0.2,
      contrast: 0.2,
      saturation: 0.2,
      hue: 0.1,
    }
  }
}

impl AugmentConfig {
  pub fn validate(&self) -> Result<()> {
    let (lo, hi) = self.crop_scale;
    if !(lo > 0.0 && lo <= hi && hi <= 1.0) {
      return Err(Error::config(format!(
        "随机裁剪面积比例无效: ({}, {})",
        lo, hi
      )));
    }
    let (lo, hi) = self.crop_ratio;
    if !(lo > 0.0 && lo <= hi) {
      return Err(Error::config(format!(
        "随机裁剪宽高比无效: ({}, {})",
        lo, hi
      )));
    }
    if !(0.0..=1.0).contains(&self.flip_probability) {
      return Err(Error::config("翻转概率必须位于 [0, 1]"));
    }
    for (name, value) in [
      ("brightness", self.brightness),
      ("contrast", self.contrast),
      ("saturation", self.saturation),
    ] {
      if !(0.0..=1.0).contains(&value) {
        return Err(Error::config(format!("{} 抖动必须位于 [0, 1]", name)));
      }
    }
    if !(0.0..=0.5).contains(&self.hue) {
      return Err(Error::config("hue 抖动必须位于 [0, 0.5]"));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_valid() {
    let config = PipelineConfig::default();
    config.validate().unwrap();
    assert_eq!(config.species.len(), 5);
    assert_eq!(config.extract.target_class, COCO_BIRD_CLASS);
    assert_eq!(
      config.partition.output_root(),
      PathBuf::from("vogel-training-data/organized")
    );
  }

  #[test]
  fn partial_toml_keeps_defaults() {
    let config = PipelineConfig::from_toml_str(
      r#"
        species = ["amsel", "kleiber"]

        [partition]
        source_root = "/tmp/birds"
        seed = 7

        [train]
        epochs = 3

        [train.augmentation]
        hue = 0.0
      "#,
    )
    .unwrap();
    assert_eq!(config.species, vec!["amsel", "kleiber"]);
    assert_eq!(config.partition.seed, Some(7));
    assert_eq!(config.partition.train_ratio, 0.8);
    assert_eq!(config.train.epochs, 3);
    assert_eq!(config.train.batch_size, 16);
    assert_eq!(config.train.augmentation.hue, 0.0);
    assert_eq!(config.train.augmentation.brightness, 0.2);
    config.validate().unwrap();
  }

  #[test]
  fn rejects_bad_values() {
    let mut config = PipelineConfig::default();
    config.partition.train_ratio = 0.0;
    assert!(matches!(config.validate(), Err(Error::Configuration(_))));

    let mut config = PipelineConfig::default();
    config.extract.sample_stride = 0;
    assert!(matches!(config.validate(), Err(Error::Configuration(_))));

    let mut config = PipelineConfig::default();
    config.extract.confidence_threshold = 1.5;
    assert!(matches!(config.validate(), Err(Error::Configuration(_))));

    let mut config = PipelineConfig::default();
    config.species.push("kleiber".to_string());
    assert!(matches!(config.validate(), Err(Error::Configuration(_))));

    let mut config = PipelineConfig::default();
    config.species.clear();
    assert!(matches!(config.validate(), Err(Error::Configuration(_))));
  }

  #[test]
  fn labels_whose_run_dirs_would_overlap_are_rejected() {
    let labels = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    validate_labels(&labels(&["specht", "specht_bunt"])).unwrap();
    assert!(matches!(
      validate_labels(&labels(&["specht", "specht_video_alt"])),
      Err(Error::Configuration(_))
    ));
    assert!(matches!(
      validate_labels(&labels(&["specht_videos", "specht"])),
      Err(Error::Configuration(_))
    ));
  }

  #[test]
  fn ratio_of_one_is_allowed() {
    let config = PartitionConfig {
      train_ratio: 1.0,
      ..Default::default()
    };
    config.validate().unwrap();
  }
}

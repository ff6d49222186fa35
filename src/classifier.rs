// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/classifier.rs - 分类模型接口与检查点
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

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Error, Result, dataset::Batch, dataset::LabelMap, frame::NchwTensor, output};

mod linear;

pub use self::linear::{LinearClassifier, LinearClassifierError};

pub const MODEL_CONFIG_FILE: &str = "config.json";
pub const PROCESSOR_CONFIG_FILE: &str = "preprocessor_config.json";

/// ImageNet 统计量，预训练主干网络的惯例
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// 推理前的预处理参数，随模型一起保存
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorConfig {
  pub image_mean: [f32; 3],
  pub image_std: [f32; 3],
  pub size: u32,
}

/// 可训练的图像分类器
pub trait Classifier {
  type Error: std::error::Error + Send + Sync + 'static;

  fn num_labels(&self) -> usize;

  /// 输入归一化使用的均值和标准差
  fn normalization(&self) -> ([f32; 3], [f32; 3]) {
    (IMAGENET_MEAN, IMAGENET_STD)
  }

  /// 每个样本一行 logits
  fn forward(&self, pixel_values: &[NchwTensor]) -> Result<Vec<Vec<f32>>, Self::Error>;

  /// 一次梯度更新，返回该批次的平均损失
  fn train_step(&mut self, batch: &Batch, learning_rate: f64) -> Result<f32, Self::Error>;

  /// 把权重写入 `dir`
  fn save(&self, dir: &Path) -> Result<(), Self::Error>;

  fn load(&mut self, dir: &Path) -> Result<(), Self::Error>;
}

/// `config.json` 的内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
  #[serde(flatten)]
  pub labels: LabelMap,
  pub num_labels: usize,
  pub epoch: usize,
  pub global_step: usize,
  pub eval_accuracy: f64,
}

/// 把权重、标签映射和预处理参数作为一个整体写入 `dir`
pub fn save_pretrained<C: Classifier>(
  classifier: &C,
  dir: &Path,
  config: &ModelConfig,
  processor: &ProcessorConfig,
) -> Result<()> {
  output::publish_dir(dir, |partial| {
    classifier.save(partial).map_err(Error::classifier)?;
    output::write_json(config, &partial.join(MODEL_CONFIG_FILE))?;
    output::write_json(processor, &partial.join(PROCESSOR_CONFIG_FILE))?;
    Ok(())
  })?;
  info!("模型已保存: {}", dir.display());
  Ok(())
}

/// 读取检查点，标签映射与 `labels` 不一致时返回配置错误
pub fn load_pretrained<C: Classifier>(
  classifier: &mut C,
  dir: &Path,
  labels: &LabelMap,
) -> Result<(ModelConfig, ProcessorConfig)> {
  let config: ModelConfig =
    serde_json::from_str(&std::fs::read_to_string(dir.join(MODEL_CONFIG_FILE))?)?;
  if &config.labels != labels {
    return Err(Error::config(format!(
      "检查点标签与当前配置不一致: {:?} != {:?}",
      config.labels.labels(),
      labels.labels()
    )));
  }
  let processor: ProcessorConfig =
    serde_json::from_str(&std::fs::read_to_string(dir.join(PROCESSOR_CONFIG_FILE))?)?;
  classifier.load(dir).map_err(Error::classifier)?;
  debug!("已加载检查点: {} (epoch {})", dir.display(), config.epoch);
  Ok((config, processor))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn labels(names: &[&str]) -> LabelMap {
    LabelMap::new(names.iter().map(|s| s.to_string()).collect()).unwrap()
  }

  fn model_config(map: LabelMap) -> ModelConfig {
    ModelConfig {
      num_labels: map.len(),
      labels: map,
      epoch: 3,
      global_step: 12,
      eval_accuracy: 0.75,
    }
  }

  #[test]
  fn pretrained_roundtrip_checks_labels() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("final");
    let map = labels(&["amsel", "star"]);
    let processor = ProcessorConfig {
      image_mean: IMAGENET_MEAN,
      image_std: IMAGENET_STD,
      size: 32,
    };
    let model = LinearClassifier::new(2, 4);
    save_pretrained(&model, &target, &model_config(map.clone()), &processor).unwrap();

    let json: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(target.join(MODEL_CONFIG_FILE)).unwrap())
        .unwrap();
    assert_eq!(json["id2label"]["0"], "amsel");
    assert_eq!(json["label2id"]["star"], 1);
    assert_eq!(json["epoch"], 3);

    let mut restored = LinearClassifier::new(2, 4);
    let (config, loaded) = load_pretrained(&mut restored, &target, &map).unwrap();
    assert_eq!(config.global_step, 12);
    assert_eq!(loaded, processor);

    let err = load_pretrained(&mut restored, &target, &labels(&["star", "amsel"])).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
  }
}

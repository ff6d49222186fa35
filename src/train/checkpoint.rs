// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/train/checkpoint.rs - 检查点保存与清理
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

use tracing::{debug, warn};

use crate::{
  Result,
  classifier::{self, Classifier, ModelConfig, ProcessorConfig},
};

const CHECKPOINT_PREFIX: &str = "checkpoint-";

#[derive(Debug, Clone, PartialEq)]
pub struct SavedCheckpoint {
  pub path: PathBuf,
  pub epoch: usize,
  pub accuracy: f64,
}

/// 只在指标创新高时保存，超过上限的旧检查点被删除
///
/// 最新保存的检查点总是最佳的那个，不会被清理。
#[derive(Debug)]
pub struct CheckpointManager {
  root: PathBuf,
  limit: usize,
  saved: Vec<SavedCheckpoint>,
}

impl CheckpointManager {
  pub fn new(root: impl Into<PathBuf>, limit: usize) -> Self {
    Self {
      root: root.into(),
      limit: limit.max(1),
      saved: Vec::new(),
    }
  }

  pub fn checkpoint_dir(&self, global_step: usize) -> PathBuf {
    self
      .root
      .join(format!("{}{}", CHECKPOINT_PREFIX, global_step))
  }

  pub fn save<C: Classifier>(
    &mut self,
    classifier: &C,
    config: &ModelConfig,
    processor: &ProcessorConfig,
  ) -> Result<&SavedCheckpoint> {
    let path = self.checkpoint_dir(config.global_step);
    classifier::save_pretrained(classifier, &path, config, processor)?;
    self.saved.retain(|c| c.path != path);
    self.saved.push(SavedCheckpoint {
      path,
      epoch: config.epoch,
      accuracy: config.eval_accuracy,
    });
    self.prune();
    Ok(&self.saved[self.saved.len() - 1])
  }

  fn prune(&mut self) {
    while self.saved.len() > self.limit {
      let old = self.saved.remove(0);
      match std::fs::remove_dir_all(&old.path) {
        Ok(()) => debug!("已删除旧检查点: {}", old.path.display()),
        Err(e) => warn!("无法删除旧检查点 {}: {}", old.path.display(), e),
      }
    }
  }

  pub fn best(&self) -> Option<&SavedCheckpoint> {
    self.saved.last()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::classifier::{IMAGENET_MEAN, IMAGENET_STD, LinearClassifier};
  use crate::dataset::LabelMap;

  #[test]
  fn keeps_only_the_newest_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let labels = LabelMap::new(vec!["amsel".into(), "star".into()]).unwrap();
    let processor = ProcessorConfig {
      image_mean: IMAGENET_MEAN,
      image_std: IMAGENET_STD,
      size: 16,
    };
    let model = LinearClassifier::new(2, 2);
    let mut manager = CheckpointManager::new(dir.path(), 2);

    for epoch in 1..=4 {
      let config = ModelConfig {
        labels: labels.clone(),
        num_labels: 2,
        epoch,
        global_step: epoch * 5,
        eval_accuracy: epoch as f64 / 10.0,
      };
      manager.save(&model, &config, &processor).unwrap();
    }

    assert!(!dir.path().join("checkpoint-5").exists());
    assert!(!dir.path().join("checkpoint-10").exists());
    assert!(dir.path().join("checkpoint-15/config.json").exists());
    assert!(dir.path().join("checkpoint-20/model.json").exists());
    assert_eq!(manager.saved.len(), 2);
    assert_eq!(manager.best().map(|c| c.epoch), Some(4));
  }
}

// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/dataset.rs - 划分后数据集的读取
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

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
  Error, Result,
  config::validate_labels,
  input::is_image_file,
  output,
  partition::{TRAIN_DIR, VAL_DIR},
};

mod loader;
pub mod transforms;

pub use self::loader::{Batch, DataLoader, epoch_order};
pub use self::transforms::Pipeline;

/// 标签与类别编号的双向映射
///
/// 编号由标签列表顺序决定，随每个检查点一起保存，加载时校验。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LabelMapRepr", into = "LabelMapRepr")]
pub struct LabelMap {
  labels: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct LabelMapRepr {
  id2label: BTreeMap<String, String>,
  label2id: BTreeMap<String, usize>,
}

impl From<LabelMap> for LabelMapRepr {
  fn from(map: LabelMap) -> Self {
    let id2label = map
      .labels
      .iter()
      .enumerate()
      .map(|(id, label)| (id.to_string(), label.clone()))
      .collect();
    let label2id = map
      .labels
      .into_iter()
      .enumerate()
      .map(|(id, label)| (label, id))
      .collect();
    Self { id2label, label2id }
  }
}

impl TryFrom<LabelMapRepr> for LabelMap {
  type Error = String;

  fn try_from(repr: LabelMapRepr) -> Result<Self, Self::Error> {
    // JSON 对象的键只能是字符串
    let mut by_id = repr
      .id2label
      .into_iter()
      .map(|(id, label)| {
        id.parse::<usize>()
          .map(|id| (id, label))
          .map_err(|_| format!("无效的类别编号: {}", id))
      })
      .collect::<Result<Vec<_>, _>>()?;
    by_id.sort_by_key(|(id, _)| *id);

    let mut labels = Vec::with_capacity(by_id.len());
    for (expected, (id, label)) in by_id.into_iter().enumerate() {
      if id != expected {
        return Err(format!("类别编号不连续: 期望 {}, 实际 {}", expected, id));
      }
      labels.push(label);
    }
    if repr.label2id.len() != labels.len() {
      return Err("id2label 与 label2id 数量不一致".to_string());
    }
    for (label, id) in &repr.label2id {
      if labels.get(*id) != Some(label) {
        return Err(format!("label2id 与 id2label 不一致: {} -> {}", label, id));
      }
    }
    Ok(Self { labels })
  }
}

impl LabelMap {
  pub fn new(labels: Vec<String>) -> Result<Self> {
    validate_labels(&labels)?;
    Ok(Self { labels })
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn id_of(&self, label: &str) -> Option<usize> {
    self.labels.iter().position(|l| l == label)
  }

  pub fn label_of(&self, id: usize) -> Option<&str> {
    self.labels.get(id).map(String::as_str)
  }

  pub fn labels(&self) -> &[String] {
    &self.labels
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
  Train,
  Val,
}

impl Split {
  pub fn dir_name(&self) -> &'static str {
    match self {
      Split::Train => TRAIN_DIR,
      Split::Val => VAL_DIR,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
  pub path: PathBuf,
  pub label: usize,
}

/// `root/{train,val}/{label}/*.jpg` 形式的数据集
#[derive(Debug, Clone)]
pub struct ImageFolder {
  samples: Vec<Sample>,
  label_counts: Vec<usize>,
}

impl ImageFolder {
  /// 目录不存在或没有任何图片时返回配置错误
  pub fn load(root: &Path, split: Split, labels: &LabelMap) -> Result<Self> {
    let dir = root.join(split.dir_name());
    if !dir.is_dir() {
      return Err(Error::config(format!(
        "数据集目录缺失: {}",
        dir.display()
      )));
    }

    let mut samples = Vec::new();
    let mut label_counts = vec![0; labels.len()];
    for entry in std::fs::read_dir(&dir)? {
      let class_dir = entry?.path();
      if !class_dir.is_dir() {
        continue;
      }
      let name = class_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
      let Some(label) = labels.id_of(&name) else {
        warn!("忽略未知类别目录: {}", class_dir.display());
        continue;
      };

      for file in std::fs::read_dir(&class_dir)? {
        let path = file?.path();
        if path.is_file() && is_image_file(&path) && !output::is_partial(&path) {
          samples.push(Sample { path, label });
          label_counts[label] += 1;
        }
      }
    }

    if samples.is_empty() {
      return Err(Error::config(format!(
        "数据集目录为空: {}",
        dir.display()
      )));
    }
    samples.sort_by(|a, b| (a.label, &a.path).cmp(&(b.label, &b.path)));
    info!("  {}: {} 张图片", split.dir_name(), samples.len());

    Ok(Self {
      samples,
      label_counts,
    })
  }

  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }

  pub fn samples(&self) -> &[Sample] {
    &self.samples
  }

  pub fn count_for(&self, label: usize) -> usize {
    self.label_counts.get(label).copied().unwrap_or(0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn labels() -> LabelMap {
    LabelMap::new(vec!["amsel".into(), "kleiber".into(), "star".into()]).unwrap()
  }

  #[test]
  fn label_map_is_stable_both_ways() {
    let map = labels();
    assert_eq!(map.id_of("kleiber"), Some(1));
    assert_eq!(map.label_of(2), Some("star"));
    assert_eq!(map.id_of("spatz"), None);
    assert_eq!(map.label_of(3), None);
  }

  #[test]
  fn label_map_json_roundtrip_and_validation() {
    let map = labels();
    let json = serde_json::to_value(&map).unwrap();
    assert_eq!(json["id2label"]["1"], "kleiber");
    assert_eq!(json["label2id"]["star"], 2);
    let back: LabelMap = serde_json::from_value(json).unwrap();
    assert_eq!(back, map);

    let broken = serde_json::json!({
      "id2label": {"0": "amsel", "2": "star"},
      "label2id": {"amsel": 0, "star": 2}
    });
    assert!(serde_json::from_value::<LabelMap>(broken).is_err());
  }

  #[test]
  fn image_folder_counts_labels_and_ignores_unknown() {
    let root = tempfile::tempdir().unwrap();
    for (label, count) in [("amsel", 2), ("star", 3), ("spatz", 4)] {
      let dir = root.path().join("val").join(label);
      std::fs::create_dir_all(&dir).unwrap();
      for i in 0..count {
        std::fs::write(dir.join(format!("{}.jpg", i)), b"").unwrap();
      }
    }

    let folder = ImageFolder::load(root.path(), Split::Val, &labels()).unwrap();
    assert_eq!(folder.len(), 5);
    assert_eq!(folder.count_for(0), 2);
    assert_eq!(folder.count_for(1), 0);
    assert_eq!(folder.count_for(2), 3);
    assert_eq!(folder.samples()[0].label, 0);
  }

  #[test]
  fn missing_or_empty_split_is_a_configuration_error() {
    let root = tempfile::tempdir().unwrap();
    let err = ImageFolder::load(root.path(), Split::Train, &labels()).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));

    std::fs::create_dir_all(root.path().join("train/amsel")).unwrap();
    let err = ImageFolder::load(root.path(), Split::Train, &labels()).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
  }
}

// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/train/metrics.rs - 评估指标
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

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::LabelMap;

pub fn argmax(logits: &[f32]) -> usize {
  logits
    .iter()
    .enumerate()
    .fold((0, f32::NEG_INFINITY), |(best, max), (i, &v)| {
      if v > max { (i, v) } else { (best, max) }
    })
    .0
}

/// 数值稳定的交叉熵
pub fn cross_entropy(logits: &[f32], label: usize) -> f64 {
  let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
  let sum: f64 = logits.iter().map(|&l| f64::from(l - max).exp()).sum();
  let target = logits.get(label).copied().unwrap_or(f32::NEG_INFINITY);
  sum.ln() - f64::from(target - max)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tally {
  correct: usize,
  total: usize,
}

/// 累积一次验证的结果
#[derive(Debug, Clone)]
pub struct MetricAccumulator {
  overall: Tally,
  per_label: Vec<Tally>,
  loss_sum: f64,
}

impl MetricAccumulator {
  pub fn new(num_labels: usize) -> Self {
    Self {
      overall: Tally::default(),
      per_label: vec![Tally::default(); num_labels],
      loss_sum: 0.0,
    }
  }

  pub fn update(&mut self, logits: &[f32], label: usize) {
    let hit = argmax(logits) == label;
    self.loss_sum += cross_entropy(logits, label);
    for tally in [Some(&mut self.overall), self.per_label.get_mut(label)]
      .into_iter()
      .flatten()
    {
      tally.total += 1;
      if hit {
        tally.correct += 1;
      }
    }
  }

  /// 验证集中没有样本的类别不出现在结果里
  pub fn finish(&self, labels: &LabelMap) -> EvalMetrics {
    let ratio = |t: &Tally| {
      if t.total == 0 {
        0.0
      } else {
        t.correct as f64 / t.total as f64
      }
    };
    let per_label = self
      .per_label
      .iter()
      .enumerate()
      .filter(|(_, t)| t.total > 0)
      .filter_map(|(id, t)| {
        labels.label_of(id).map(|label| LabelAccuracy {
          label: label.to_string(),
          accuracy: ratio(t),
          correct: t.correct,
          total: t.total,
        })
      })
      .collect();

    EvalMetrics {
      accuracy: ratio(&self.overall),
      loss: if self.overall.total == 0 {
        0.0
      } else {
        self.loss_sum / self.overall.total as f64
      },
      samples: self.overall.total,
      per_label,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelAccuracy {
  pub label: String,
  pub accuracy: f64,
  pub correct: usize,
  pub total: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvalMetrics {
  pub accuracy: f64,
  pub loss: f64,
  pub samples: usize,
  pub per_label: Vec<LabelAccuracy>,
}

impl EvalMetrics {
  pub fn label_accuracy(&self, label: &str) -> Option<f64> {
    self
      .per_label
      .iter()
      .find(|entry| entry.label == label)
      .map(|entry| entry.accuracy)
  }

  pub fn log_table(&self) {
    info!("整体准确率: {:.2}%", self.accuracy * 100.0);
    for entry in &self.per_label {
      info!(
        "  {:<15} {:.2}% ({}/{})",
        entry.label,
        entry.accuracy * 100.0,
        entry.correct,
        entry.total
      );
    }
  }

  pub fn to_results(&self, epoch: usize, runtime: f64) -> EvalResults {
    EvalResults {
      eval_loss: self.loss,
      eval_accuracy: self.accuracy,
      per_label: self
        .per_label
        .iter()
        .map(|entry| (format!("eval_acc_{}", entry.label), entry.accuracy))
        .collect(),
      eval_samples: self.samples,
      eval_runtime: runtime,
      epoch,
    }
  }
}

/// `eval_results.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalResults {
  pub eval_loss: f64,
  pub eval_accuracy: f64,
  /// `eval_acc_<label>`
  #[serde(flatten)]
  pub per_label: BTreeMap<String, f64>,
  pub eval_samples: usize,
  pub eval_runtime: f64,
  pub epoch: usize,
}

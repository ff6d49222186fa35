// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/classifier/linear.rs - 线性 softmax 分类器
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
use thiserror::Error;

use super::Classifier;
use crate::{dataset::Batch, frame::NchwTensor};

pub const WEIGHTS_FILE: &str = "model.json";

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPS: f64 = 1e-8;

#[derive(Error, Debug)]
pub enum LinearClassifierError {
  #[error("IO error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON error: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("Shape mismatch: expected {expected}, got {actual}")]
  ShapeMismatch { expected: String, actual: String },
}

/// 在 `grid × grid` 平均池化后的像素上做 softmax 回归
///
/// 优化器为 Adam，权重以 JSON 形式保存在 `model.json`。
#[derive(Debug, Clone)]
pub struct LinearClassifier {
  weights: Weights,
  optimizer: AdamState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Weights {
  num_labels: usize,
  grid: usize,
  /// `num_labels × features`，行优先
  weight: Vec<f32>,
  bias: Vec<f32>,
}

#[derive(Debug, Clone, Default)]
struct AdamState {
  step: i32,
  m: Vec<f64>,
  v: Vec<f64>,
}

impl LinearClassifier {
  pub fn new(num_labels: usize, grid: usize) -> Self {
    let features = 3 * grid * grid;
    Self {
      weights: Weights {
        num_labels,
        grid,
        weight: vec![0.0; num_labels * features],
        bias: vec![0.0; num_labels],
      },
      optimizer: AdamState::default(),
    }
  }

  fn num_features(&self) -> usize {
    3 * self.weights.grid * self.weights.grid
  }

  /// 每个通道自适应平均池化到 `grid × grid`
  fn features(&self, tensor: &NchwTensor) -> Result<Vec<f32>, LinearClassifierError> {
    let grid = self.weights.grid;
    let (h, w) = (tensor.height(), tensor.width());
    if h < grid || w < grid || tensor.channels() != 3 {
      return Err(LinearClassifierError::ShapeMismatch {
        expected: format!("3x>={}x>={}", grid, grid),
        actual: format!("{}x{}x{}", tensor.channels(), h, w),
      });
    }

    let data = tensor.as_nchw();
    let mut out = Vec::with_capacity(self.num_features());
    for c in 0..3 {
      let plane = &data[c * h * w..(c + 1) * h * w];
      for gy in 0..grid {
        let (y0, y1) = (gy * h / grid, (gy + 1) * h / grid);
        for gx in 0..grid {
          let (x0, x1) = (gx * w / grid, (gx + 1) * w / grid);
          let mut sum = 0.0f32;
          for y in y0..y1 {
            sum += plane[y * w + x0..y * w + x1].iter().sum::<f32>();
          }
          out.push(sum / ((y1 - y0) * (x1 - x0)) as f32);
        }
      }
    }
    Ok(out)
  }

  fn logits(&self, features: &[f32]) -> Vec<f32> {
    let n = features.len();
    (0..self.weights.num_labels)
      .map(|k| {
        let row = &self.weights.weight[k * n..(k + 1) * n];
        row.iter().zip(features).map(|(a, b)| a * b).sum::<f32>() + self.weights.bias[k]
      })
      .collect()
  }

  fn adam_update(&mut self, grads: &[f64], learning_rate: f64) {
    let total = self.weights.weight.len() + self.weights.bias.len();
    if self.optimizer.m.len() != total {
      self.optimizer = AdamState {
        step: 0,
        m: vec![0.0; total],
        v: vec![0.0; total],
      };
    }
    let state = &mut self.optimizer;
    state.step += 1;
    let correction1 = 1.0 - ADAM_BETA1.powi(state.step);
    let correction2 = 1.0 - ADAM_BETA2.powi(state.step);

    let params = self
      .weights
      .weight
      .iter_mut()
      .chain(self.weights.bias.iter_mut());
    for (i, param) in params.enumerate() {
      let g = grads[i];
      state.m[i] = ADAM_BETA1 * state.m[i] + (1.0 - ADAM_BETA1) * g;
      state.v[i] = ADAM_BETA2 * state.v[i] + (1.0 - ADAM_BETA2) * g * g;
      let m_hat = state.m[i] / correction1;
      let v_hat = state.v[i] / correction2;
      *param -= (learning_rate * m_hat / (v_hat.sqrt() + ADAM_EPS)) as f32;
    }
  }
}

pub(crate) fn softmax(logits: &[f32]) -> Vec<f64> {
  let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
  let exps: Vec<f64> = logits.iter().map(|&l| f64::from(l - max).exp()).collect();
  let sum: f64 = exps.iter().sum();
  exps.into_iter().map(|e| e / sum).collect()
}

impl Classifier for LinearClassifier {
  type Error = LinearClassifierError;

  fn num_labels(&self) -> usize {
    self.weights.num_labels
  }

  fn forward(&self, pixel_values: &[NchwTensor]) -> Result<Vec<Vec<f32>>, Self::Error> {
    pixel_values
      .iter()
      .map(|tensor| Ok(self.logits(&self.features(tensor)?)))
      .collect()
  }

  fn train_step(&mut self, batch: &Batch, learning_rate: f64) -> Result<f32, Self::Error> {
    if batch.is_empty() {
      return Ok(0.0);
    }
    let n = self.num_features();
    let k = self.weights.num_labels;
    let mut grads = vec![0.0f64; k * n + k];
    let mut loss = 0.0f64;

    for (tensor, &label) in batch.pixel_values.iter().zip(&batch.labels) {
      if label >= k {
        return Err(LinearClassifierError::ShapeMismatch {
          expected: format!("label < {}", k),
          actual: label.to_string(),
        });
      }
      let features = self.features(tensor)?;
      let probs = softmax(&self.logits(&features));
      loss -= probs[label].max(f64::MIN_POSITIVE).ln();
      for (class, p) in probs.iter().enumerate() {
        let delta = p - if class == label { 1.0 } else { 0.0 };
        for (j, x) in features.iter().enumerate() {
          grads[class * n + j] += delta * f64::from(*x);
        }
        grads[k * n + class] += delta;
      }
    }

    let scale = 1.0 / batch.len() as f64;
    grads.iter_mut().for_each(|g| *g *= scale);
    self.adam_update(&grads, learning_rate);
    Ok((loss * scale) as f32)
  }

  fn save(&self, dir: &Path) -> Result<(), Self::Error> {
    let file = std::fs::File::create(dir.join(WEIGHTS_FILE))?;
    serde_json::to_writer(std::io::BufWriter::new(file), &self.weights)?;
    Ok(())
  }

  fn load(&mut self, dir: &Path) -> Result<(), Self::Error> {
    let text = std::fs::read_to_string(dir.join(WEIGHTS_FILE))?;
    let weights: Weights = serde_json::from_str(&text)?;
    let features = 3 * weights.grid * weights.grid;
    if weights.num_labels != self.weights.num_labels
      || weights.weight.len() != weights.num_labels * features
      || weights.bias.len() != weights.num_labels
    {
      return Err(LinearClassifierError::ShapeMismatch {
        expected: format!("{} labels", self.weights.num_labels),
        actual: format!(
          "{} labels, {} weights",
          weights.num_labels,
          weights.weight.len()
        ),
      });
    }
    self.weights = weights;
    self.optimizer = AdamState::default();
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn uniform(value: f32, size: usize) -> NchwTensor {
    let mut tensor = NchwTensor::with_shape(size, size);
    tensor.as_mut().iter_mut().for_each(|v| *v = value);
    tensor
  }

  #[test]
  fn pooling_averages_cells() {
    let model = LinearClassifier::new(2, 2);
    let mut tensor = NchwTensor::with_shape(4, 4);
    // 第一个通道左上角 2x2 为 4，其余为 0
    for y in 0..2 {
      for x in 0..2 {
        tensor.as_mut()[y * 4 + x] = 4.0;
      }
    }
    let features = model.features(&tensor).unwrap();
    assert_eq!(features.len(), 12);
    assert_eq!(&features[..4], &[4.0, 0.0, 0.0, 0.0]);
  }

  #[test]
  fn learns_to_separate_dark_from_bright() {
    let mut model = LinearClassifier::new(2, 2);
    let batch = Batch {
      pixel_values: vec![uniform(-1.0, 4), uniform(1.0, 4)],
      labels: vec![0, 1],
    };
    let first = model.train_step(&batch, 0.05).unwrap();
    let mut last = first;
    for _ in 0..50 {
      last = model.train_step(&batch, 0.05).unwrap();
    }
    assert!(last < first);

    let logits = model.forward(&batch.pixel_values).unwrap();
    assert!(logits[0][0] > logits[0][1]);
    assert!(logits[1][1] > logits[1][0]);
  }

  #[test]
  fn save_then_load_restores_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = LinearClassifier::new(3, 2);
    let batch = Batch {
      pixel_values: vec![uniform(0.5, 4)],
      labels: vec![2],
    };
    model.train_step(&batch, 0.1).unwrap();
    model.save(dir.path()).unwrap();

    let mut restored = LinearClassifier::new(3, 2);
    restored.load(dir.path()).unwrap();
    assert_eq!(
      model.forward(&batch.pixel_values).unwrap(),
      restored.forward(&batch.pixel_values).unwrap()
    );

    let mut wrong = LinearClassifier::new(2, 2);
    assert!(matches!(
      wrong.load(dir.path()),
      Err(LinearClassifierError::ShapeMismatch { .. })
    ));
  }

  #[test]
  fn rejects_too_small_input() {
    let model = LinearClassifier::new(2, 8);
    assert!(model.forward(&[uniform(0.0, 4)]).is_err());
  }
}

// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/train/schedule.rs - 学习率调度
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

/// 线性预热后线性衰减到 0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearSchedule {
  base: f64,
  warmup_steps: usize,
  total_steps: usize,
}

impl LinearSchedule {
  pub fn new(base: f64, warmup_ratio: f64, total_steps: usize) -> Self {
    let warmup_steps = (total_steps as f64 * warmup_ratio).ceil() as usize;
    Self {
      base,
      warmup_steps: warmup_steps.min(total_steps),
      total_steps,
    }
  }

  pub fn warmup_steps(&self) -> usize {
    self.warmup_steps
  }

  /// 已完成 `step` 次更新时的学习率
  pub fn learning_rate(&self, step: usize) -> f64 {
    if step < self.warmup_steps {
      return self.base * step as f64 / self.warmup_steps as f64;
    }
    let remaining = self.total_steps.saturating_sub(step);
    let decay = (self.total_steps - self.warmup_steps).max(1);
    self.base * remaining as f64 / decay as f64
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn warms_up_then_decays_to_zero() {
    let schedule = LinearSchedule::new(1e-3, 0.1, 100);
    assert_eq!(schedule.warmup_steps(), 10);
    assert_eq!(schedule.learning_rate(0), 0.0);
    assert!((schedule.learning_rate(5) - 5e-4).abs() < 1e-12);
    assert!((schedule.learning_rate(10) - 1e-3).abs() < 1e-12);
    assert!((schedule.learning_rate(55) - 5e-4).abs() < 1e-12);
    assert_eq!(schedule.learning_rate(100), 0.0);
    assert_eq!(schedule.learning_rate(120), 0.0);
  }

  #[test]
  fn zero_warmup_starts_at_base() {
    let schedule = LinearSchedule::new(2e-4, 0.0, 8);
    assert_eq!(schedule.learning_rate(0), 2e-4);
    assert!((schedule.learning_rate(4) - 1e-4).abs() < 1e-12);
  }
}
